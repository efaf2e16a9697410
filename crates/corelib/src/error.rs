//! Error types for the core library.

use crate::allocator::AllocError;
use crate::middleware::MiddlewareError;
use crate::name::NameError;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Malformed or missing argument (bad name, bad options).
    ///
    /// The handle the call was made on is left untouched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The node's allocator refused an allocation during init.
    #[error("out of memory: allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    /// The middleware layer failed to create or destroy one of its objects.
    #[error("middleware error: {0}")]
    Middleware(#[from] MiddlewareError),

    /// `init` was called on a handle that is already valid.
    #[error("node handle already valid (node '{name}')")]
    AlreadyValid { name: String },

    /// The handle (or the node behind a back-reference) is not valid.
    #[error("node is not valid (never initialized or already finalized)")]
    NodeInvalid,

    /// One or more teardown steps failed; teardown still ran to completion.
    #[error("node teardown failed in {} step(s): {}", .0.len(), join(.0))]
    Teardown(Vec<Error>),
}

impl Error {
    /// True for the caller-error class of failures.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

impl From<NameError> for Error {
    fn from(err: NameError) -> Self {
        Error::InvalidArgument(format!("node name: {err}"))
    }
}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        Error::OutOfMemory {
            requested: err.requested,
        }
    }
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
