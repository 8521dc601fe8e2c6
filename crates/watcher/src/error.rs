//! Error types for watch sessions and facility bindings

use crate::facility::WatchToken;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`WatchFacility`](crate::facility::WatchFacility)
#[derive(Debug, Error)]
pub enum FacilityError {
    /// The facility was shut down, locally or out-of-band
    #[error("watch facility is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Backend-specific failure that has no `io::Error` form
    #[error("watch backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<notify::Error> for FacilityError {
    fn from(err: notify::Error) -> Self {
        match err.kind {
            notify::ErrorKind::Io(io) => FacilityError::Io(io),
            kind => FacilityError::Backend(Box::new(notify::Error { kind, paths: err.paths })),
        }
    }
}

/// Errors returned by [`WatchSession`](crate::session::WatchSession)
#[derive(Debug, Error)]
pub enum WatchError {
    /// Operation attempted on, or interrupted by, a closed session
    #[error("watch session closed: {context}")]
    Closed { context: String },

    /// A notification referenced a token that was never registered
    #[error("no watched directory registered for {0}")]
    UnknownRegistration(WatchToken),

    #[error(transparent)]
    Facility(FacilityError),

    #[error("failed to read {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid ignore rules: {0}")]
    IgnoreRules(#[from] ignore::Error),
}

impl WatchError {
    pub(crate) fn closed(context: impl Into<String>) -> Self {
        WatchError::Closed { context: context.into() }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WatchError::Filesystem { path: path.into(), source }
    }

    /// True for the closed-session error
    pub fn is_closed(&self) -> bool {
        matches!(self, WatchError::Closed { .. })
    }
}
