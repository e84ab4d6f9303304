//! Crate-level error aggregating the per-module error types.

use thiserror::Error;

use crate::parser::ParseError;
use crate::report::ReportError;
use crate::session::{AuthError, BootstrapError};
use crate::transport::FetchError;
use crate::validation::ValidationError;

/// Any failure of a client operation.
///
/// Every variant is `Clone` so one failure can be handed to all callers
/// sharing a coalesced execution.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Caller input rejected before any request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The login sequence failed.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// Account context bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// An exchange with the portal failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A report job failed or timed out.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// A response did not have the expected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Error {
    /// HTTP status of the failed exchange, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Fetch(error) => error.status_code(),
            Self::Authentication(error) => error.status_code(),
            Self::Bootstrap(BootstrapError::Fetch(error)) => error.status_code(),
            _ => None,
        }
    }
}
