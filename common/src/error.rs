//! Run-level error type
//!
//! Every variant is a terminal outcome of a copy run. Configuration and safety
//! variants are raised before anything is written for the affected source;
//! [`Error::CopyFailed`] carries the underlying cause with path context.
//!
//! # Logging Convention
//! The Display implementation shows the full error chain for
//! [`Error::CopyFailed`], so a fatal error can be reported with a single
//! `tracing::error!("{}", &error)`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no source directories were given")]
    NoSources,
    #[error("Destination parent not found or not a directory: {0:?}")]
    DestinationParentMissing(PathBuf),
    #[error("Source not found or not a directory: {0:?}")]
    SourceMissing(PathBuf),
    #[error("Source {0:?} has no usable directory name")]
    InvalidSourceName(PathBuf),
    #[error("Invalid destination name {0:?}: must be a single path component")]
    InvalidName(String),
    #[error("Invalid ignore pattern: {0:#}")]
    InvalidPattern(anyhow::Error),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("Destination resolves to the same path as source {src:?}; aborting")]
    SameLocation { src: PathBuf, dst: PathBuf },
    #[error("Destination {dst:?} is inside source {src:?}; choose a different location")]
    DestinationInsideSource { src: PathBuf, dst: PathBuf },
    #[error("Aborted by user")]
    Cancelled,
    #[error("Copy failed: {0:#}")]
    CopyFailed(anyhow::Error),
    #[error("failed writing output: {0}")]
    Output(#[source] std::io::Error),
    #[error("failed to start the runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NoSources => 1,
            Error::SourceMissing(_) => 2,
            Error::DestinationParentMissing(_) => 3,
            Error::SameLocation { .. } => 4,
            Error::DestinationInsideSource { .. } => 5,
            Error::InvalidSourceName(_)
            | Error::InvalidName(_)
            | Error::InvalidPattern(_)
            | Error::InvalidSetting(_) => 6,
            Error::CopyFailed(_) | Error::Output(_) | Error::Runtime(_) => 7,
            Error::Cancelled => 8,
        }
    }

    /// True for user interruption, which is not a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
