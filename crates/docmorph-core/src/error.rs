//! Error types for docmorph.

use thiserror::Error;

use crate::version::DocumentVersion;

/// Result type alias using docmorph's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docmorph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A version string could not be parsed
    #[error("Invalid version format: {0}")]
    Format(String),

    /// A downgrade path contains a step that cannot be reversed
    #[error("Missing down migration for {document_type} at version {version}")]
    MissingDownMigration {
        document_type: String,
        version: DocumentVersion,
    },

    /// Two migrations claim the same version for one target, or the same ledger id
    #[error("Duplicate migration definition: {0}")]
    DuplicateMigrationDefinition(String),

    /// A migration body reported a failure
    #[error("Migration {migration} failed: {message}")]
    MigrationExecution { migration: String, message: String },

    /// A unique key already exists in the store
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a [`Error::MigrationExecution`] for a failing migration body.
    pub fn execution(migration: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MigrationExecution {
            migration: migration.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_format() {
        let err = Error::Format("1.2".to_string());
        assert_eq!(err.to_string(), "Invalid version format: 1.2");
    }

    #[test]
    fn test_error_display_missing_down() {
        let err = Error::MissingDownMigration {
            document_type: "Car".to_string(),
            version: DocumentVersion::new(0, 0, 2),
        };
        assert_eq!(
            err.to_string(),
            "Missing down migration for Car at version 0.0.2"
        );
    }

    #[test]
    fn test_error_display_duplicate_definition() {
        let err = Error::DuplicateMigrationDefinition("Car@0.0.1".to_string());
        assert_eq!(
            err.to_string(),
            "Duplicate migration definition: Car@0.0.1"
        );
    }

    #[test]
    fn test_execution_helper() {
        let err = Error::execution("AddIndex", "index already exists");
        match err {
            Error::MigrationExecution { migration, message } => {
                assert_eq!(migration, "AddIndex");
                assert_eq!(message, "index already exists");
            }
            _ => panic!("Expected MigrationExecution error"),
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
