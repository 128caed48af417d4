//! Error types for a hosts-file check run.
//!
//! Only run-level failures live here. A pair that fails its probe is not an
//! error of the run; it is a [`MismatchReason`](crate::MismatchReason)
//! reported through the result stream.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Error type for failures that abort a whole check run.
#[derive(Debug)]
pub enum CheckError {
    /// The hosts file could not be opened
    Open {
        /// Path that failed to open
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },

    /// Reading the hosts file failed part way through the scan
    Read {
        /// 1-based number of the line being read when the failure happened
        line: usize,
        /// The underlying I/O error
        source: io::Error,
    },

    /// Writing a result line failed
    Write {
        /// The underlying I/O error
        source: io::Error,
    },

    /// Configuration could not be loaded or is invalid
    Config(ConfigError),

    /// The TLS client context could not be built
    Tls {
        /// OpenSSL error details
        details: String,
    },

    /// A pipeline task panicked or was torn down unexpectedly
    Runtime {
        /// Description of what went wrong
        message: String,
    },

    /// The run was cancelled before every pair was checked
    Interrupted,
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open hosts file {}: {}", path.display(), source)
            }
            Self::Read { line, source } => {
                write!(f, "failed to read hosts file at line {}: {}", line, source)
            }
            Self::Write { source } => write!(f, "failed to write results: {}", source),
            Self::Config(e) => write!(f, "{}", e),
            Self::Tls { details } => write!(f, "TLS setup failed: {}", details),
            Self::Runtime { message } => write!(f, "{}", message),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
            Self::Write { source } => Some(source),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CheckError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<openssl::error::ErrorStack> for CheckError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::Tls {
            details: e.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for CheckError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Runtime {
            message: format!("pipeline task failed: {}", e),
        }
    }
}
