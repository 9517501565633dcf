/// mongoconnect Error Module
///
/// This module defines the closed set of failures a session can report.
/// Driver errors never escape as-is: each one is re-signaled as one of the
/// variants below with the driver's message preserved.
use thiserror::Error;

/// Error type for every mongoconnect operation.
///
/// The first seven variants are the session taxonomy:
/// - connection establishment (`ConnectionFailure`)
/// - precondition failures of the connect → database → collection chain
/// - name binding (`InvalidOperation`)
/// - remote writes and reads (`WriteFailure`, `ReadFailure`)
///
/// The remaining variants cover configuration, I/O and the shell.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The client could not be created or the server could not be reached
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// An operation needed a connection and none is established
    #[error("Client is not connected. Call `connect()` first.")]
    NotConnected,

    /// A collection was selected before any database
    #[error("Database is not set. Call `select_database()` first.")]
    NoDatabaseSelected,

    /// A CRUD operation ran before any collection was selected
    #[error("Collection is not set. Call `select_collection()` first.")]
    NoCollectionSelected,

    /// Malformed database/collection name or a failed bind
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Insert, update or delete rejected by the driver
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// Query rejected by the driver
    #[error("Read failure: {0}")]
    ReadFailure(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shell command validation errors
    #[error("Command error: {0}")]
    Command(String),
}

/// Type alias for Result to use SessionError as the error type.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Type alias for shell command results that may carry output to print
pub type CommandResult = Result<Option<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let conn_err = SessionError::ConnectionFailure("network unreachable".to_string());
        assert!(conn_err.to_string().contains("Connection failure"));
        assert!(conn_err.to_string().contains("network unreachable"));

        let write_err = SessionError::WriteFailure("E11000 duplicate key".to_string());
        assert!(write_err.to_string().contains("E11000"));

        assert!(SessionError::NotConnected.to_string().contains("connect()"));
        assert!(SessionError::NoDatabaseSelected
            .to_string()
            .contains("select_database()"));
        assert!(SessionError::NoCollectionSelected
            .to_string()
            .contains("select_collection()"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SessionError = io_err.into();
        match err {
            SessionError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{ invalid json }");
        let err: SessionError = json_err.unwrap_err().into();
        match err {
            SessionError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
