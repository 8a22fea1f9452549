/// Schema bootstrap for the directory tables
///
/// The DDL for `users`, `ldapgroups`, `includegroups` and `capabilities` is
/// embedded from the crate's `migrations/` directory at compile time. Running it
/// against a database that already has glauth's tables is a no-op apart from
/// the `_sqlx_migrations` bookkeeping table, since every statement uses
/// `IF NOT EXISTS`.
///
/// # Example
///
/// ```no_run
/// use glauth_store::db::pool::{create_pool, DatabaseConfig};
/// use glauth_store::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/glauth")?).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Runs all pending schema migrations
///
/// # Errors
///
/// Returns an error if a migration fails to execute or the database
/// connection is lost part way through.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying directory schema");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Directory schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Creates the database if it doesn't exist
///
/// Useful for development and tests; production databases are expected to
/// exist already.
///
/// # Errors
///
/// Returns an error if the server is unreachable or the role lacks
/// `CREATEDB`.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
        info!("Database created successfully");
    } else {
        debug!("Database already exists");
    }

    Ok(())
}
