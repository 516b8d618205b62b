use std::collections::BTreeMap;

use serde::Deserialize;

/// Message shown when the server gives nothing better.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure raised by a non-reqwest [`Transport`](crate::Transport).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: ErrorBody },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Token store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a server-side failure, if there was a response at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Field-level validation errors, keyed by form field name.
    #[must_use]
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Api {
                body: ErrorBody::Validation { messages },
                ..
            } => Some(messages),
            _ => None,
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Only the server's own top-level message is passed through; every
    /// other failure collapses to [`GENERIC_ERROR_MESSAGE`].
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Api {
                body: ErrorBody::Message { message },
                ..
            } => message,
            _ => GENERIC_ERROR_MESSAGE,
        }
    }
}

/// Error payload returned by the API.
///
/// The server answers either with a single top-level message or with a
/// map of per-field validation messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Message { message: String },
    Validation { messages: BTreeMap<String, String> },
    Unrecognized(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireErrorBody {
    Validation { messages: BTreeMap<String, String> },
    Message { message: String },
}

impl ErrorBody {
    /// Classify a raw response body. Never fails: unknown shapes are kept verbatim.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        match serde_json::from_slice::<WireErrorBody>(raw) {
            Ok(WireErrorBody::Validation { messages }) => Self::Validation { messages },
            Ok(WireErrorBody::Message { message }) => Self::Message { message },
            Err(_) => Self::Unrecognized(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Message { message } => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message { message } => f.write_str(message),
            Self::Validation { messages } => {
                let fields: Vec<&str> = messages.keys().map(String::as_str).collect();
                write!(f, "invalid fields: {}", fields.join(", "))
            }
            Self::Unrecognized(raw) if raw.is_empty() => f.write_str("<empty body>"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_level_message() {
        let body = ErrorBody::parse(br#"{"message":"Appointment slot taken"}"#);
        assert_eq!(body.message(), Some("Appointment slot taken"));
    }

    #[test]
    fn parses_field_messages() {
        let body = ErrorBody::parse(br#"{"messages":{"email":"must be valid","name":"required"}}"#);
        let ErrorBody::Validation { messages } = body else {
            panic!("expected validation body");
        };
        assert_eq!(messages.get("email").map(String::as_str), Some("must be valid"));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn keeps_unknown_bodies_verbatim() {
        assert_eq!(
            ErrorBody::parse(b"<html>Bad Gateway</html>"),
            ErrorBody::Unrecognized("<html>Bad Gateway</html>".into())
        );
    }

    #[test]
    fn user_message_hides_internals() {
        let err = Error::Api {
            status: 502,
            body: ErrorBody::Unrecognized("upstream stack trace".into()),
        };
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        let err = Error::Api {
            status: 409,
            body: ErrorBody::Message {
                message: "Course is full".into(),
            },
        };
        assert_eq!(err.user_message(), "Course is full");
        assert_eq!(err.status(), Some(409));
        assert!(err.field_errors().is_none());
    }
}
