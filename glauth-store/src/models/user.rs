/// User model and database operations
///
/// Two shapes live here:
///
/// - [`UserRow`]: one row of the `users` table, exactly as stored
/// - [`User`]: the projected record callers get back, with the primary and
///   secondary groups resolved to [`GroupRef`]s and capabilities attached
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id SERIAL PRIMARY KEY,
///     name TEXT NOT NULL UNIQUE,
///     uidnumber INTEGER NOT NULL UNIQUE,
///     primarygroup INTEGER NOT NULL DEFAULT 0,
///     othergroups TEXT NOT NULL DEFAULT '',
///     givenname TEXT NOT NULL DEFAULT '',
///     sn TEXT NOT NULL DEFAULT '',
///     mail TEXT NOT NULL DEFAULT '',
///     loginshell TEXT NOT NULL DEFAULT '',
///     homedirectory TEXT NOT NULL DEFAULT '',
///     disabled BOOLEAN NOT NULL DEFAULT FALSE,
///     passsha256 TEXT NOT NULL DEFAULT '',
///     passbcrypt TEXT NOT NULL DEFAULT '',
///     otpsecret TEXT NOT NULL DEFAULT '',
///     yubikey TEXT NOT NULL DEFAULT '',
///     sshkeys TEXT NOT NULL DEFAULT '',
///     custattr TEXT NOT NULL DEFAULT '{}'
/// );
/// ```

use crate::models::capability::{Capability, CreateCapability};
use crate::models::group::Group;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use validator::Validate;

/// First UID handed out when the user table is empty
pub const FIRST_UID: i32 = 20000;

/// Value of `primarygroup` for a user without a primary group
pub const NO_PRIMARY_GROUP: i32 = 0;

/// Custom attributes stored when none are supplied
pub const EMPTY_CUST_ATTR: &str = "{}";

/// One row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: i32,
    pub name: String,
    #[sqlx(rename = "uidnumber")]
    pub uid_number: i32,
    #[sqlx(rename = "primarygroup")]
    pub primary_group: i32,
    /// Comma-joined GID list, see [`crate::models::gid_list`]
    #[sqlx(rename = "othergroups")]
    pub other_groups: String,
    #[sqlx(rename = "givenname")]
    pub given_name: String,
    pub sn: String,
    pub mail: String,
    #[sqlx(rename = "loginshell")]
    pub login_shell: String,
    #[sqlx(rename = "homedirectory")]
    pub home_directory: String,
    pub disabled: bool,
    #[sqlx(rename = "passsha256")]
    pub pass_sha256: String,
    #[sqlx(rename = "passbcrypt")]
    pub pass_bcrypt: String,
    #[sqlx(rename = "otpsecret")]
    pub otp_secret: String,
    pub yubikey: String,
    #[sqlx(rename = "sshkeys")]
    pub ssh_keys: String,
    #[sqlx(rename = "custattr")]
    pub cust_attr: String,
}

/// A group referenced from a user record
///
/// The reference is a GID stored on the user row; the group itself may have
/// been deleted since, or the lookup may have failed. Those cases are kept
/// apart instead of silently dropping the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupRef {
    /// The group exists
    Resolved(Group),

    /// No group has this GID
    Missing { gid: i32 },

    /// The lookup itself failed
    Unavailable { gid: i32, reason: String },
}

impl GroupRef {
    /// GID this reference points at, resolved or not
    pub fn gid(&self) -> i32 {
        match self {
            GroupRef::Resolved(group) => group.gid_number,
            GroupRef::Missing { gid } | GroupRef::Unavailable { gid, .. } => *gid,
        }
    }

    /// The group, if it resolved
    pub fn group(&self) -> Option<&Group> {
        match self {
            GroupRef::Resolved(group) => Some(group),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, GroupRef::Resolved(_))
    }
}

/// A related-data fetch that failed while assembling a [`User`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupFailure {
    /// Groups including the primary group could not be listed
    IncludedGroups { gid: i32, reason: String },

    /// The user's capabilities could not be listed
    Capabilities { uid: i32, reason: String },
}

/// A user as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal row id
    pub id: i32,

    /// Login name (cn / uid)
    pub name: String,

    /// LDAP uidNumber
    pub uid_number: i32,

    /// None when the user has no primary group
    pub primary_group: Option<GroupRef>,

    /// Secondary groups plus groups that include the primary group.
    /// Never contains the primary group or the same GID twice.
    pub other_groups: Vec<GroupRef>,

    pub capabilities: Vec<Capability>,

    pub given_name: String,
    pub sn: String,
    pub mail: String,
    pub login_shell: String,
    pub home_directory: String,
    pub disabled: bool,

    /// Hex SHA-256 of the password, empty if none was set
    pub pass_sha256: String,

    /// bcrypt hash, written by other tools
    pub pass_bcrypt: String,

    pub otp_secret: String,
    pub yubikey: String,

    /// Comma-joined sshPublicKey values
    pub ssh_keys: String,

    /// JSON object text
    pub cust_attr: String,

    /// Related lookups that failed; empty on a clean read
    pub lookup_failures: Vec<LookupFailure>,
}

impl User {
    /// Copies the scalar columns of a row; related data starts empty
    pub(crate) fn from_row(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            uid_number: row.uid_number,
            primary_group: None,
            other_groups: Vec::new(),
            capabilities: Vec::new(),
            given_name: row.given_name,
            sn: row.sn,
            mail: row.mail,
            login_shell: row.login_shell,
            home_directory: row.home_directory,
            disabled: row.disabled,
            pass_sha256: row.pass_sha256,
            pass_bcrypt: row.pass_bcrypt,
            otp_secret: row.otp_secret,
            yubikey: row.yubikey,
            ssh_keys: row.ssh_keys,
            cust_attr: row.cust_attr,
            lookup_failures: Vec::new(),
        }
    }

    /// Every resolved group the user belongs to, primary first
    pub fn member_of(&self) -> impl Iterator<Item = &Group> {
        self.primary_group
            .iter()
            .chain(self.other_groups.iter())
            .filter_map(GroupRef::group)
    }

    /// Individual SSH public keys
    pub fn ssh_key_list(&self) -> Vec<&str> {
        self.ssh_keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// Parsed custom attributes
    pub fn custom_attributes(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.cust_attr)
    }
}

/// Input for creating a user
///
/// `uid_number: None` allocates the next free UID. `cust_attr` must be a JSON
/// object when given; `None` or an empty string stores `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 64, message = "User name must be 1-64 characters"))]
    pub name: String,
    pub uid_number: Option<i32>,
    pub primary_group: Option<i32>,
    pub other_groups: Vec<i32>,
    pub capabilities: Vec<CreateCapability>,
    pub given_name: String,
    pub sn: String,
    pub mail: String,
    pub login_shell: String,
    pub home_directory: String,
    pub disabled: bool,
    /// Plaintext; only its SHA-256 digest is stored
    pub password: Option<String>,
    pub otp_secret: String,
    pub yubikey: String,
    pub ssh_keys: String,
    pub cust_attr: Option<String>,
}

/// Partial update for a user
///
/// Only `Some` fields are applied. `capabilities: Some(list)` replaces the
/// user's whole capability set with `list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub primary_group: Option<i32>,
    pub other_groups: Option<Vec<i32>>,
    pub capabilities: Option<Vec<CreateCapability>>,
    pub given_name: Option<String>,
    pub sn: Option<String>,
    pub mail: Option<String>,
    pub login_shell: Option<String>,
    pub home_directory: Option<String>,
    pub disabled: Option<bool>,
    /// Plaintext; only its SHA-256 digest is stored
    pub password: Option<String>,
    pub otp_secret: Option<String>,
    pub yubikey: Option<String>,
    pub ssh_keys: Option<String>,
    pub cust_attr: Option<String>,
}

/// Checks that custom attributes are a JSON object
pub fn validate_cust_attr(raw: &str) -> Result<(), serde_json::Error> {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw).map(|_| ())
}

/// Next UID to allocate given the current maximum
///
/// `None` once the highest UID is `i32::MAX`.
pub fn next_uid(current_max: Option<i32>) -> Option<i32> {
    current_max.map_or(Some(FIRST_UID), |max| max.checked_add(1))
}

const USER_COLUMNS: &str = "id, name, uidnumber, primarygroup, othergroups, givenname, sn, mail, \
     loginshell, homedirectory, disabled, passsha256, passbcrypt, otpsecret, yubikey, sshkeys, custattr";

impl UserRow {
    /// Finds a user row by login name
    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE name = $1",
            USER_COLUMNS
        ))
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Finds a user row by UID number
    pub async fn find_by_uid<'e, E>(executor: E, uid: i32) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE uidnumber = $1",
            USER_COLUMNS
        ))
        .bind(uid)
        .fetch_optional(executor)
        .await
    }

    pub async fn exists_by_name<'e, E>(executor: E, name: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE name = $1)")
            .bind(name)
            .fetch_one(executor)
            .await
    }

    pub async fn exists_by_uid<'e, E>(executor: E, uid: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE uidnumber = $1)")
            .bind(uid)
            .fetch_one(executor)
            .await
    }

    /// Highest UID currently in use, if any
    pub async fn max_uid<'e, E>(executor: E) -> Result<Option<i32>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT MAX(uidnumber) FROM users")
            .fetch_one(executor)
            .await
    }

    /// Lists every user row
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(executor)
            .await
    }

    /// Inserts this row; `id` is ignored and assigned by the database
    pub async fn insert<'e, E>(&self, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, uidnumber, primarygroup, othergroups, givenname, sn, mail,
                               loginshell, homedirectory, disabled, passsha256, passbcrypt,
                               otpsecret, yubikey, sshkeys, custattr)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&self.name)
        .bind(self.uid_number)
        .bind(self.primary_group)
        .bind(&self.other_groups)
        .bind(&self.given_name)
        .bind(&self.sn)
        .bind(&self.mail)
        .bind(&self.login_shell)
        .bind(&self.home_directory)
        .bind(self.disabled)
        .bind(&self.pass_sha256)
        .bind(&self.pass_bcrypt)
        .bind(&self.otp_secret)
        .bind(&self.yubikey)
        .bind(&self.ssh_keys)
        .bind(&self.cust_attr)
        .fetch_one(executor)
        .await
    }

    /// Writes every column back for the row with this internal id
    pub async fn save<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, uidnumber = $3, primarygroup = $4, othergroups = $5,
                givenname = $6, sn = $7, mail = $8, loginshell = $9, homedirectory = $10,
                disabled = $11, passsha256 = $12, passbcrypt = $13, otpsecret = $14,
                yubikey = $15, sshkeys = $16, custattr = $17
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.uid_number)
        .bind(self.primary_group)
        .bind(&self.other_groups)
        .bind(&self.given_name)
        .bind(&self.sn)
        .bind(&self.mail)
        .bind(&self.login_shell)
        .bind(&self.home_directory)
        .bind(self.disabled)
        .bind(&self.pass_sha256)
        .bind(&self.pass_bcrypt)
        .bind(&self.otp_secret)
        .bind(&self.yubikey)
        .bind(&self.ssh_keys)
        .bind(&self.cust_attr)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Sets only the SHA-256 column for the named user
    ///
    /// Returns true if a row matched.
    pub async fn set_pass_sha256_by_name<'e, E>(
        executor: E,
        name: &str,
        digest: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET passsha256 = $2 WHERE name = $1")
            .bind(name)
            .bind(digest)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets only the SHA-256 column for the user with this UID
    pub async fn set_pass_sha256_by_uid<'e, E>(
        executor: E,
        uid: i32,
        digest: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET passsha256 = $2 WHERE uidnumber = $1")
            .bind(uid)
            .bind(digest)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the user row by UID; returns true if it existed
    pub async fn delete<'e, E>(executor: E, uid: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE uidnumber = $1")
            .bind(uid)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
