/// Database models for the directory store
///
/// Each model owns the SQL for its table. Query functions are generic over
/// [`sqlx::postgres::PgExecutor`] so the store can run them against the pool
/// or inside a transaction.
///
/// # Models
///
/// - `user`: `users` rows and the projected [`user::User`] record
/// - `group`: `ldapgroups` rows and `includegroups` edges
/// - `capability`: per-user `capabilities` rows
/// - `gid_list`: the comma-joined `othergroups` encoding

pub mod capability;
pub mod gid_list;
pub mod group;
pub mod user;
