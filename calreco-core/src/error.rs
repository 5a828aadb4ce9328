//! Error types for calreco-core.

use thiserror::Error;

/// Result type alias for calreco operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for calreco operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Algorithm configuration error. Always fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required per-event input collection is absent.
    #[error("missing required input: {0}")]
    MissingInput(String),

    /// Invalid raw channel identifier.
    #[error("invalid channel id: {0:#010x}")]
    InvalidChannelId(u32),

    /// Channel coordinates outside the encodable range.
    #[error("invalid channel coordinates: ieta={ieta}, iphi={iphi}, depth={depth}")]
    InvalidCoordinates { ieta: i32, iphi: u32, depth: u32 },
}

/// Configuration errors detected while parsing an algorithm description.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The `Class` parameter names no known algorithm.
    #[error("unknown algorithm class \"{0}\"")]
    UnknownAlgorithm(String),

    /// A required parameter is absent.
    #[error("missing parameter \"{0}\"")]
    MissingParameter(String),

    /// A parameter exists but has the wrong type.
    #[error("parameter \"{name}\" has wrong type: expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    /// A fixed-size array parameter has the wrong number of elements.
    #[error("parameter \"{name}\" must have {expected} elements, found {found}")]
    WrongLength {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A parameter value is outside its allowed range.
    #[error("invalid value for \"{name}\": {reason}")]
    InvalidValue { name: String, reason: String },
}
