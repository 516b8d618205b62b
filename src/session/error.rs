use crate::error::Error;

/// Login failures surfaced to callers.
///
/// The login form only distinguishes these three cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// Missing fields, or the server rejected the request as malformed (HTTP 400).
    #[error("Invalid login request")]
    InvalidRequest,

    /// Wrong username or password (HTTP 401).
    #[error("Invalid username or password")]
    CredentialError,

    /// Anything else, network failures included.
    #[error("Unexpected login error")]
    UnknownError,
}

impl LoginError {
    /// Stable code for UI translation tables.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::CredentialError => "CREDENTIAL_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl From<&Error> for LoginError {
    fn from(e: &Error) -> Self {
        match e.status() {
            Some(400) => Self::InvalidRequest,
            Some(401) => Self::CredentialError,
            _ => Self::UnknownError,
        }
    }
}

impl From<Error> for LoginError {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}
