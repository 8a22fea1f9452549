/// Configuration management for the directory store
///
/// Connection parameters are kept as separate parts (user, password, host,
/// port, database) and turned into [`PgConnectOptions`] directly, so
/// credentials never have to be spliced into a URL by hand.
///
/// # Environment Variables
///
/// - `DB_USERNAME`: Database user (required)
/// - `DB_PASSWORD`: Database password (required, may be empty)
/// - `DB_HOSTNAME`: Database host (required)
/// - `DB_PORT`: Database port (default: 5432)
/// - `DB_NAME`: Database name (required)
/// - `DB_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `DB_MIN_CONNECTIONS`: Idle connections kept warm (default: 2)
/// - `DB_CONNECT_TIMEOUT_SECS`: Acquire timeout (default: 30)
///
/// # Example
///
/// ```no_run
/// use glauth_store::config::StoreConfig;
/// use glauth_store::DirectoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StoreConfig::from_env()?;
/// let store = DirectoryStore::connect(config.database_config()).await?;
/// # Ok(())
/// # }
/// ```

use crate::db::pool::DatabaseConfig;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::fmt;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    /// A variable is set but cannot be parsed
    #[error("{name} has an invalid value: {value}")]
    InvalidVar {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Database connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionContext {
    /// Builds sqlx connect options from the individual parts
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.hostname)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Complete store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Where to connect
    pub connection: ConnectionContext,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// Minimum number of idle connections
    pub min_connections: u32,

    /// Acquire timeout in seconds
    pub connect_timeout_seconds: u64,
}

impl StoreConfig {
    /// Loads configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if a required variable is unset and
    /// [`ConfigError::InvalidVar`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    ///
    /// `from_env` is this with `std::env::var`; tests pass a map instead.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));

        let connection = ConnectionContext {
            username: required("DB_USERNAME")?,
            password: required("DB_PASSWORD")?,
            hostname: required("DB_HOSTNAME")?,
            port: parse_or(&lookup, "DB_PORT", 5432)?,
            database: required("DB_NAME")?,
        };

        let defaults = DatabaseConfig::default();

        Ok(Self {
            connection,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_seconds: parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_seconds,
            )?,
        })
    }

    /// Pool configuration for [`crate::db::pool::create_pool`]
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            connect_options: self.connection.connect_options(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_seconds: self.connect_timeout_seconds,
            ..Default::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_USERNAME", "glauth"),
            ("DB_PASSWORD", "s3cr3t"),
            ("DB_HOSTNAME", "db.internal"),
            ("DB_NAME", "directory"),
        ]
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&base_vars())).unwrap();
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.connection.hostname, "db.internal");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout_seconds, 30);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut vars = base_vars();
        vars.push(("DB_PORT", "6543"));
        vars.push(("DB_MAX_CONNECTIONS", "4"));
        let config = StoreConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.connection.port, 6543);
        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn test_missing_required_var() {
        let vars: Vec<_> = base_vars()
            .into_iter()
            .filter(|(k, _)| *k != "DB_NAME")
            .collect();
        let err = StoreConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("DB_NAME"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = base_vars();
        vars.push(("DB_PORT", "not-a-port"));
        let err = StoreConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "DB_PORT", .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = StoreConfig::from_lookup(lookup_from(&base_vars())).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }
}
