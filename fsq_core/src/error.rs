//! Error types for fsq_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using fsq_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving nodes, reading content or
/// evaluating attributes.
///
/// Metadata and directory listing failures are not represented here: they
/// degrade to sentinel values so that a traversal never aborts on a single
/// inaccessible entry.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file reads or process execution.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A leaf was not among its parent's already-listed children.
    #[error("{name} not found among cached children of {parent}")]
    NotFoundInCache { parent: String, name: String },

    /// Content access on something that is not a readable regular file.
    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Raw bytes could not be decoded with the detected or default encoding.
    #[error("Cannot decode {path} as {encoding}")]
    Decode { path: PathBuf, encoding: String },

    /// No attribute is registered under this name.
    #[error("Unknown attribute: {name}")]
    UnknownAttribute { name: String },

    /// Attribute called with the wrong number or kind of arguments.
    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    /// Forest configuration could not be parsed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a NotFoundInCache error.
    pub fn not_found_in_cache(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFoundInCache {
            parent: parent.into(),
            name: name.into(),
        }
    }

    /// Create a Read error.
    pub fn read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Read {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Decode error.
    pub fn decode(path: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Error::Decode {
            path: path.into(),
            encoding: encoding.into(),
        }
    }

    /// Create an UnknownAttribute error.
    pub fn unknown_attribute(name: impl Into<String>) -> Self {
        Error::UnknownAttribute { name: name.into() }
    }

    /// Create an InvalidArguments error.
    pub fn invalid_arguments(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArguments {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }
}
