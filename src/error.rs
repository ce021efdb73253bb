//! Error types.
//!
//! `block`/`unblock` never return these: surface failures are logged and
//! skipped so the reentrancy counter stays consistent. They surface from
//! [`Surface`](crate::Surface) implementations and config loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ElementId;

/// Failure reported by a [`Surface`](crate::Surface).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The handle does not name a live element.
    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    /// The surface refused the operation.
    #[error("surface rejected operation on {element}: {reason}")]
    Rejected {
        /// Element the operation targeted.
        element: ElementId,
        /// Human readable reason.
        reason: String,
    },
}

/// Errors loading [`BlockDefaults`](crate::BlockDefaults).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading a configuration file.
    #[error("I/O error reading {}: {error}", path.display())]
    Io {
        /// Path to the file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        error: std::io::Error,
    },

    /// The TOML did not parse or did not match the defaults schema.
    #[error("invalid blockui defaults: {0}")]
    Parse(#[from] toml::de::Error),
}
