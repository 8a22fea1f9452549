//! # glauth Directory Store
//!
//! Typed CRUD access to the relational tables a glauth LDAP front end reads
//! its users, groups and capabilities from.
//!
//! ## Module Organization
//!
//! - `store`: [`DirectoryStore`], the entry point for every directory operation
//! - `models`: table rows, projected records and their SQL
//! - `db`: connection pool and schema bootstrap
//! - `config`: connection settings from the environment
//! - `password`: the SHA-256 digest stored for binds
//! - `error`: [`StoreError`] and [`StoreResult`]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod password;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::DirectoryStore;

/// Current version of the directory store library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
