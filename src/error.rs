//! Custom error types for the driver crate.
//!
//! `DaqError` is the single error type returned by transports, parameters and
//! drivers. It is built with `thiserror` so that lower-level errors (I/O,
//! configuration parsing) convert with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`UnsupportedModel`**: the `*IDN?` model is not in the driver's model table.
//! - **`OutOfRange`** / **`InvalidChoice`** / **`TypeMismatch`**: a value was
//!   rejected by a parameter validator before anything was sent to hardware.
//! - **`ReadOnly`** / **`NotGettable`**: the parameter does not support the
//!   requested direction.
//! - **`Transport`** / **`Timeout`**: the VISA session (or mock) failed.
//! - **`ResponseParse`**: the instrument answered with something that does not
//!   parse as the parameter's value kind.
//! - **`Config`** / **`Configuration`**: figment load errors and semantic
//!   validation errors in the instrument configuration.
//! - **`FeatureNotEnabled`**: functionality compiled out by a cargo feature.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Unsupported {family} model {model}")]
    UnsupportedModel { family: String, model: String },

    #[error("Value {value} for '{parameter}' out of range [{min}, {max}]")]
    OutOfRange {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid choice {value} for '{parameter}', expected one of {allowed}")]
    InvalidChoice {
        parameter: String,
        value: String,
        allowed: String,
    },

    #[error("Value {value} for '{parameter}' has the wrong type, expected {expected}")]
    TypeMismatch {
        parameter: String,
        value: String,
        expected: &'static str,
    },

    #[error("Parameter '{0}' is read-only")]
    ReadOnly(String),

    #[error("Parameter '{0}' has no get command")]
    NotGettable(String),

    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {timeout:?} waiting for response to '{command}'")]
    Timeout { command: String, timeout: Duration },

    #[error("Failed to parse response to '{command}': {response:?}")]
    ResponseParse { command: String, response: String },

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}
