//! # Core Error Types
//!
//! Errors raised by the foundational layer: timestamp parsing and
//! configuration loading. Lifecycle transition errors live in `nsl-state`.

use thiserror::Error;

/// Top-level error type for `nsl-core`.
#[derive(Error, Debug)]
pub enum NslError {
    /// A timestamp or date could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Configuration is syntactically valid but semantically wrong.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
