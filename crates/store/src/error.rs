use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated (SQLSTATE 23505).
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// The transaction could not be serialized with a concurrent one
    /// (SQLSTATE 40001 or 40P01) and may be retried.
    #[error("Transaction serialization failure")]
    SerializationFailure,

    /// A savepoint name was unknown or not a plain identifier.
    #[error("Invalid savepoint: {0}")]
    InvalidSavepoint(String),

    /// A value could not be mapped between its domain and stored forms.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the whole transaction may be retried.
    pub fn is_serialization_failure(&self) -> bool {
        matches!(self, StoreError::SerializationFailure)
    }

    /// Returns true if this is a violation of the named unique constraint.
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return StoreError::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or_default().to_string(),
                    };
                }
                Some("40001") | Some("40P01") => return StoreError::SerializationFailure,
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_matching() {
        let err = StoreError::UniqueViolation {
            constraint: "orders_business_number_key".into(),
        };
        assert!(err.is_unique_violation_of("orders_business_number_key"));
        assert!(!err.is_unique_violation_of("other"));
        assert!(!err.is_serialization_failure());
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
