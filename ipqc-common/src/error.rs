//! Common error types for IPQC

use thiserror::Error;

use crate::line::ProductionLine;

/// Common result type for IPQC operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the IPQC crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested stage or parameter is not part of the catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Observation shape could not be generated for a parameter
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Failure to derive an observation shape from the line mapping
///
/// Carried on the parameter instead of a partial value so renderers can
/// show an inline message for that one parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The stage has no stringer topology for this line
    #[error("stage {stage_id}: no stringer topology configured for line {line}")]
    MissingTopology { stage_id: u32, line: ProductionLine },

    /// The topology exists but one of its partitions is empty
    #[error("stage {stage_id}: stringer topology for line {line} has no {field}")]
    IncompleteTopology {
        stage_id: u32,
        line: ProductionLine,
        field: &'static str,
    },

    /// A stringer grid was requested with a flat unit list
    #[error("stringer grid requested without a stringer topology")]
    TopologyRequired,

    /// A unit-indexed shape was requested with a stringer topology
    #[error("unit-indexed shape requested with a stringer topology")]
    UnitListRequired,
}
