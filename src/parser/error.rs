//! Error types for response parsing.

use thiserror::Error;

/// Errors raised when a portal payload does not have the expected shape.
///
/// A parser either returns a fully populated record or one of these; it never
/// hands back partial data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// JSON payload could not be deserialized into the expected record.
    #[error("malformed {what} payload: {message}")]
    Json {
        /// Record being parsed.
        what: &'static str,
        /// Deserializer message.
        message: String,
    },

    /// A required field or element is absent.
    #[error("{what} is missing required field `{field}`")]
    MissingField {
        /// Record being parsed.
        what: &'static str,
        /// Name of the absent field.
        field: &'static str,
    },

    /// A field is present but its value cannot be interpreted.
    #[error("{what} field `{field}` has invalid value {value:?}")]
    InvalidValue {
        /// Record being parsed.
        what: &'static str,
        /// Field name.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },
}

impl ParseError {
    /// Wraps a serde error for the named record.
    pub fn json(what: &'static str, source: &serde_json::Error) -> Self {
        Self::Json {
            what,
            message: source.to_string(),
        }
    }

    /// Creates a missing-field error.
    pub fn missing(what: &'static str, field: &'static str) -> Self {
        Self::MissingField { what, field }
    }

    /// Creates an invalid-value error.
    pub fn invalid(what: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            what,
            field,
            value: value.into(),
        }
    }
}
