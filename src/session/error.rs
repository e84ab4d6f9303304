//! Error types for the login sequence and account bootstrap.

use std::fmt;

use thiserror::Error;

use crate::parser::ParseError;
use crate::transport::FetchError;

/// Steps of the login sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Unauthenticated request to the host root to learn the effective scheme.
    DetectScheme,
    /// Fetching the login ticket, protocol version and salt.
    Seed,
    /// Submitting the login form.
    Submit,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DetectScheme => "scheme detection",
            Self::Seed => "login seed",
            Self::Submit => "login submit",
        };
        f.write_str(label)
    }
}

/// Why a login step failed.
#[derive(Debug, Clone, Error)]
pub enum AuthFailure {
    /// The exchange itself failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The response lacked expected fields.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The login sequence failed.
#[derive(Debug, Clone, Error)]
#[error("authentication failed during {step}: {reason}")]
pub struct AuthError {
    /// Step that failed.
    pub step: LoginStep,
    /// Underlying cause.
    #[source]
    pub reason: AuthFailure,
}

impl AuthError {
    /// Creates an error for `step`.
    pub fn new(step: LoginStep, reason: impl Into<AuthFailure>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }

    /// HTTP status of the failed exchange, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match &self.reason {
            AuthFailure::Fetch(error) => error.status_code(),
            AuthFailure::Parse(_) => None,
        }
    }
}

/// The one-time account context bootstrap failed.
#[derive(Debug, Clone, Error)]
pub enum BootstrapError {
    /// A filter source required to derive the account identity is absent.
    #[error("default filter catalog is missing the `{filter_id}` source")]
    MissingFilterSource {
        /// Missing filter id.
        filter_id: &'static str,
    },

    /// A filter source is present but has no usable value.
    #[error("filter source `{filter_id}` has no usable value ({detail})")]
    InvalidFilterSource {
        /// Offending filter id.
        filter_id: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// An operation needed the account identity but none is cached.
    #[error("account identity is not available; log in first")]
    MissingIdentity,

    /// Fetching the settings page or filter catalog failed.
    #[error("bootstrap request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The settings page or filter catalog could not be parsed.
    #[error("bootstrap response malformed: {0}")]
    Parse(#[from] ParseError),
}

impl BootstrapError {
    /// Creates an invalid-source error.
    pub fn invalid_source(filter_id: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidFilterSource {
            filter_id,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_names_step_and_status() {
        let error = AuthError::new(
            LoginStep::Submit,
            FetchError::status("POST", "https://sgo.example.org/webapi/login", 401, "denied"),
        );
        let msg = error.to_string();
        assert!(msg.contains("login submit"), "Expected step in: {msg}");
        assert!(msg.contains("401"), "Expected status in: {msg}");
        assert_eq!(error.status_code(), Some(401));
    }

    #[test]
    fn test_auth_error_from_parse_has_no_status() {
        let error = AuthError::new(LoginStep::Seed, ParseError::missing("login data", "salt"));
        assert_eq!(error.status_code(), None);
        assert!(error.to_string().contains("salt"));
    }

    #[test]
    fn test_bootstrap_missing_source_display() {
        let msg = BootstrapError::MissingFilterSource { filter_id: "PCLID" }.to_string();
        assert!(msg.contains("PCLID"), "Expected filter id in: {msg}");
    }
}
