//! # IPQC Common Library
//!
//! Data model for the in-process quality control checksheet:
//! - Stage catalog and line-dependent unit registry
//! - Observation shapes and stage construction
//! - Observation updates and line reconfiguration
//! - Audit record, editing session and advisory checks
//! - Configuration loading

pub mod catalog;
pub mod config;
pub mod error;
pub mod line;
pub mod merge;
pub mod observation;
pub mod ratio;
pub mod reconfigure;
pub mod record;
pub mod registry;
pub mod session;
pub mod shape;
pub mod stage;
pub mod time;
pub mod validation;

pub use error::{Error, Result, ShapeError};
pub use line::ProductionLine;
pub use observation::{ObservationSlot, ObservationValue};
pub use record::{AuditRecord, RecordIdentity};
pub use registry::StageConfigRegistry;
pub use stage::{ParameterDefinition, StageDefinition};
