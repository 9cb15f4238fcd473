//! Unified error type for convertkit.
//!
//! Every crate funnels its failures into [`Error`]. Callers only ever see one
//! of the four taxonomy kinds returned by [`Error::kind`]; the internal
//! variants (`Io`, `Tool`) exist so lower layers can keep their context and
//! are classified onto that taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing input file, unsupported format, option outside domain.
    Validation,
    /// Unknown operation kind or an internal builder defect.
    Configuration,
    /// Scratch-area creation, write or delete failure.
    Resource,
    /// Every backend failed to produce valid output.
    Encoding,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "ValidationError"),
            Self::Configuration => write!(f, "ConfigurationError"),
            Self::Resource => write!(f, "ResourceError"),
            Self::Encoding => write!(f, "EncodingError"),
        }
    }
}

/// Unified error type covering all failure modes in convertkit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Deployment or programming defect (unknown operation, bad plan).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Scratch storage could not be created, written or read.
    #[error("Resource error [{path}]: {message}")]
    Resource {
        /// The scratch path involved.
        path: String,
        /// Human-readable error description.
        message: String,
    },

    /// No backend produced valid output.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool or the embedded engine returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },
}

impl Error {
    /// Classify this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Resource { .. } | Error::Io { .. } => ErrorKind::Resource,
            Error::Encoding(_) | Error::Tool { .. } => ErrorKind::Encoding,
        }
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 2,
            ErrorKind::Configuration => 3,
            ErrorKind::Resource => 4,
            ErrorKind::Encoding => 5,
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Convenience constructor for [`Error::Resource`].
    pub fn resource(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Resource {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Encoding`].
    pub fn encoding(message: impl Into<String>) -> Self {
        Error::Encoding(message.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
