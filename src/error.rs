//! Error kinds: expected build failures versus everything else.
//!
//! A `BuildError` is part of the tool's normal vocabulary (a command exited
//! non-zero, a source file is missing, a rule is malformed) and is reported
//! as a single line.  Anything else is unexpected and surfaces with its full
//! diagnostic chain, uncaught.

use std::rc::Rc;

/// An expected, user-visible build failure.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct BuildError(pub String);

impl BuildError {
    pub fn new(msg: impl Into<String>) -> Self {
        BuildError(msg.into())
    }
}

/// Outcome of one task update.  Clonable so that every awaiter of a shared
/// in-flight update observes the same result.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Unexpected failure; never caught below the driver.
    #[error("{0:#}")]
    Internal(Rc<anyhow::Error>),
}

impl From<anyhow::Error> for UpdateError {
    fn from(err: anyhow::Error) -> Self {
        UpdateError::Internal(Rc::new(err))
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        UpdateError::Internal(Rc::new(err.into()))
    }
}

pub type UpdateResult<T> = Result<T, UpdateError>;
