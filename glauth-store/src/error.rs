/// Error types for the directory store
///
/// Every store operation returns [`StoreResult`]. The variants map onto the
/// four failure classes a directory front end needs to tell apart:
///
/// - [`StoreError::NotFound`]: the keyed record does not exist
/// - [`StoreError::Conflict`]: a name or numeric ID is already taken
/// - [`StoreError::Validation`]: the request itself is malformed
/// - [`StoreError::Database`]: anything else the database reported
///
/// # Example
///
/// ```no_run
/// use glauth_store::{DirectoryStore, StoreError};
///
/// # async fn example(store: DirectoryStore) -> Result<(), StoreError> {
/// match store.get_group_by_name("admins").await {
///     Ok(group) => println!("admins = {}", group.gid_number),
///     Err(e) if e.is_not_found() => println!("no admins group yet"),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```

use thiserror::Error;

/// Result alias used by every store operation
pub type StoreResult<T> = Result<T, StoreError>;

/// Directory store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record matched the lookup key
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record that was looked up ("user", "group", ...)
        entity: &'static str,

        /// The key that was used, rendered for display
        key: String,
    },

    /// A uniqueness rule would be violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request failed validation before touching the database
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying database failure, passed through unchanged
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// True for [`StoreError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True for [`StoreError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// True for [`StoreError::Validation`]
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // Concurrent writers can slip past the pre-insert existence checks
        let unique_violation = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if unique_violation {
            StoreError::Conflict(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Validation(format!("invalid custom attributes: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("group", 10000);
        assert_eq!(err.to_string(), "group not found: 10000");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_json_error_is_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = StoreError::from(json_err);
        assert!(err.is_validation());
        assert!(err.to_string().contains("invalid custom attributes"));
    }
}
