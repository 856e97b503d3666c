//! Error types for thuto-core

use thiserror::Error;

use crate::entitlement::Capability;

/// Main error type for the thuto-core library
#[derive(Error, Debug)]
pub enum Error {
    /// The caller's plan does not grant the capability
    #[error("access denied: {} ({})", capability.description(), capability.upgrade_hint())]
    AccessDenied { capability: Capability },

    /// No identity was supplied with the request
    #[error("not authenticated")]
    NotAuthenticated,

    /// Record store failure, carrying the store's message
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed input (month out of range, bad reminder time, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result type alias for thuto-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_names_plan() {
        let err = Error::AccessDenied {
            capability: Capability::MonthlyReports,
        };
        assert!(err.to_string().contains("upgrade to Core/Pro"));

        let err = Error::AccessDenied {
            capability: Capability::Reminders,
        };
        assert!(err.to_string().contains("upgrade to Pro"));
    }

    #[test]
    fn test_sqlite_errors_become_storage() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Storage(_)));
    }
}
