//! # IPQC command-line client
//!
//! Backend client, report output and session persistence used by the
//! `ipqc` binary.

pub mod client;
pub mod report;
pub mod sync;

pub use client::{AuditClient, ClientError, SaveOutcome, StoredAudit};
pub use sync::{Opened, SessionSync, SyncError};
