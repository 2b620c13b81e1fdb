//! Error types for rootfs-differ

use std::io;
use std::path::PathBuf;

use crate::target::Side;

/// Errors surfaced by a comparison.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Package comparison was requested for a target that is not package-manager based.
    #[error("{name} ({side} target) is not RPM based")]
    UnsupportedTarget { side: Side, name: String },

    /// An inventory entry could not be turned into a package identifier.
    #[error("malformed package entry {entry:?} in {name} ({side} target): {reason}")]
    MalformedInventory {
        side: Side,
        name: String,
        entry: String,
        reason: String,
    },

    /// The package database query itself failed.
    #[error("package query failed for {name} ({side} target): {message}")]
    PackageQuery {
        side: Side,
        name: String,
        message: String,
    },

    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Both targets carry the same display name, which would collide in the report.
    #[error("targets must have distinct display names, both are {0:?}")]
    DuplicateName(String),

    /// The comparison was cancelled before it finished.
    #[error("comparison interrupted")]
    Interrupted,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that abort only the package half of a comparison.
    pub fn is_package_failure(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedTarget { .. }
                | Error::MalformedInventory { .. }
                | Error::PackageQuery { .. }
        )
    }

    /// The side an error is attributed to, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Error::UnsupportedTarget { side, .. }
            | Error::MalformedInventory { side, .. }
            | Error::PackageQuery { side, .. } => Some(*side),
            _ => None,
        }
    }
}

/// A subtree that could not be read while walking one side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to read {path} ({side} target): {message}")]
pub struct PartialReadError {
    pub side: Side,
    pub path: String,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, Error>;
