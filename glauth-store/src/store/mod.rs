/// The directory store
///
/// [`DirectoryStore`] owns a connection pool and exposes the typed CRUD
/// operations a directory front end needs. Group operations live in
/// `groups`, user and capability operations in `users`.
///
/// Every operation that issues more than one statement runs inside a single
/// transaction, so a failure part way through leaves no partial writes.
///
/// # Example
///
/// ```no_run
/// use glauth_store::db::pool::DatabaseConfig;
/// use glauth_store::models::group::CreateGroup;
/// use glauth_store::models::user::CreateUser;
/// use glauth_store::DirectoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = DirectoryStore::connect(DatabaseConfig::from_url("postgresql://localhost/glauth")?).await?;
///
/// let users = store
///     .create_group(CreateGroup { name: "users".to_string(), gid_number: None })
///     .await?;
///
/// let bob = store
///     .create_user(CreateUser {
///         name: "bob".to_string(),
///         primary_group: Some(users.gid_number),
///         password: Some("hunter2".to_string()),
///         ..Default::default()
///     })
///     .await?;
///
/// assert_eq!(bob.member_of().next().map(|g| g.name.as_str()), Some("users"));
/// # Ok(())
/// # }
/// ```

mod groups;
mod users;

use crate::db::pool::{close_pool, create_pool, DatabaseConfig};
use sqlx::PgPool;

/// Typed access to the directory tables
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    pool: PgPool,
}

impl DirectoryStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a pool from `config` and wraps it
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or fails its health check
    pub async fn connect(config: DatabaseConfig) -> Result<Self, sqlx::Error> {
        Ok(Self::new(create_pool(config).await?))
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the pool; other clones of this store stop working too
    pub async fn close(self) {
        close_pool(self.pool).await;
    }
}
