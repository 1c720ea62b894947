use std::fmt;

use serde::{de, ser};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompatError {
    #[error("Type mismatch at {path}: {expected} expected, found {found}")]
    TypeMismatch { expected: String, found: String, path: String },
    #[error("Key not found at {path}: no value associated with key \"{key}\"")]
    KeyNotFound { key: String, path: String },
    #[error("Value not found at {path}: expected {expected}")]
    ValueNotFound { expected: String, path: String },
    #[error("Data corruption at {path}: {message}")]
    DataCorruption { message: String, path: String },
    #[error("Nesting depth limit of {limit} exceeded at {path}")]
    DepthLimitExceeded { limit: usize, path: String },
    #[error("{0}")]
    Message(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CompatError>;

// Path placeholder for errors raised before the decoder knows where they happened.
const UNPLACED: &str = "<unplaced>";

impl CompatError {
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::DataCorruption { message: message.into(), path: UNPLACED.to_string() }
    }
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::DataCorruption { .. })
    }
    /// Fills in the coding path of an error raised without one. Errors that
    /// already carry a path keep it, so the innermost position wins.
    pub fn placed(mut self, at: &str) -> Self {
        match &mut self {
            Self::TypeMismatch { path, .. }
            | Self::KeyNotFound { path, .. }
            | Self::ValueNotFound { path, .. }
            | Self::DataCorruption { path, .. }
            | Self::DepthLimitExceeded { path, .. } => {
                if path == UNPLACED {
                    *path = at.to_string();
                }
            }
            Self::Message(_) | Self::Config(_) => (),
        }
        self
    }
}

// Errors raised from user Serialize impls stay free-form.
impl ser::Error for CompatError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

// Deserialize impls (derived or hand-written) report through these hooks, so they
// are mapped onto the decode taxonomy. Positional context is filled in by the
// decoder when it has one.
impl de::Error for CompatError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::corruption(msg.to_string())
    }
    fn invalid_type(unexp: de::Unexpected<'_>, exp: &dyn de::Expected) -> Self {
        Self::TypeMismatch {
            expected: exp.to_string(),
            found: unexp.to_string(),
            path: UNPLACED.to_string(),
        }
    }
    fn invalid_length(len: usize, exp: &dyn de::Expected) -> Self {
        Self::ValueNotFound {
            expected: format!("{exp} (only {len} present)"),
            path: UNPLACED.to_string(),
        }
    }
    fn missing_field(field: &'static str) -> Self {
        Self::KeyNotFound {
            key: field.to_string(),
            path: UNPLACED.to_string(),
        }
    }
}

// Helper conversions
impl From<config::ConfigError> for CompatError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
