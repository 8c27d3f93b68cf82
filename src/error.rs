use sqlx::Error as SqlxError;
use sqlx::error::ErrorKind;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum VaultError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] SqlxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed legacy data: {0}")]
    MalformedLegacy(String),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Config error: {0}")]
    Config(#[from] figment::Error),
}

impl VaultError {
    pub fn is_validation(&self) -> bool {
        matches!(self, VaultError::Validation(_))
    }

    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, VaultError::StorageUnavailable(_))
    }
}

/// Constraint violations reported by SQLite are the caller's fault; anything
/// else the engine raises means the store itself could not serve the call.
impl From<SqlxError> for VaultError {
    fn from(e: SqlxError) -> Self {
        if let SqlxError::Database(db_err) = &e {
            match db_err.kind() {
                ErrorKind::NotNullViolation
                | ErrorKind::UniqueViolation
                | ErrorKind::CheckViolation
                | ErrorKind::ForeignKeyViolation => {
                    return VaultError::Validation(db_err.message().to_string());
                }
                _ => {}
            }
        }
        VaultError::StorageUnavailable(e)
    }
}
