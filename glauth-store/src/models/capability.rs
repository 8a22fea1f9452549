/// Capability model
///
/// A capability grants one user an action over an object scope, for example
/// `search` over `ou=superheros,dc=glauth,dc=com`. Rows are keyed by the
/// owning user's UID number in the `userid` column.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE capabilities (
///     id SERIAL PRIMARY KEY,
///     userid INTEGER NOT NULL,
///     action TEXT NOT NULL,
///     object TEXT NOT NULL
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use std::fmt;

/// Action a capability allows
///
/// glauth currently only evaluates `search`. Anything else read back from the
/// database is kept verbatim in [`CapabilityAction::Unknown`] so it survives a
/// read/replace cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapabilityAction {
    Search,
    Unknown(String),
}

impl CapabilityAction {
    /// Text stored in the `action` column
    pub fn as_str(&self) -> &str {
        match self {
            CapabilityAction::Search => "search",
            CapabilityAction::Unknown(action) => action,
        }
    }

    /// Whether glauth knows how to enforce this action
    pub fn is_recognized(&self) -> bool {
        !matches!(self, CapabilityAction::Unknown(_))
    }
}

impl From<String> for CapabilityAction {
    fn from(action: String) -> Self {
        match action.as_str() {
            "search" => CapabilityAction::Search,
            _ => CapabilityAction::Unknown(action),
        }
    }
}

impl From<&str> for CapabilityAction {
    fn from(action: &str) -> Self {
        CapabilityAction::from(action.to_string())
    }
}

impl From<CapabilityAction> for String {
    fn from(action: CapabilityAction) -> Self {
        match action {
            CapabilityAction::Search => "search".to_string(),
            CapabilityAction::Unknown(action) => action,
        }
    }
}

impl fmt::Display for CapabilityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Internal row id
    pub id: i32,

    /// UID number of the owning user
    pub user_id: i32,

    pub action: CapabilityAction,

    /// Scope the action applies to (`*` for everything)
    pub object: String,
}

/// Input for a new capability
///
/// The owning UID is supplied separately so the same list can be stamped onto
/// whichever user it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCapability {
    pub action: CapabilityAction,
    pub object: String,
}

impl CreateCapability {
    /// `search` over the given scope
    pub fn search(object: impl Into<String>) -> Self {
        Self {
            action: CapabilityAction::Search,
            object: object.into(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CapabilityRow {
    id: i32,
    userid: i32,
    action: String,
    object: String,
}

impl From<CapabilityRow> for Capability {
    fn from(row: CapabilityRow) -> Self {
        Self {
            id: row.id,
            user_id: row.userid,
            action: row.action.into(),
            object: row.object,
        }
    }
}

impl Capability {
    /// Inserts one capability row for `uid`
    pub async fn insert<'e, E>(
        executor: E,
        uid: i32,
        data: &CreateCapability,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, CapabilityRow>(
            r#"
            INSERT INTO capabilities (userid, action, object)
            VALUES ($1, $2, $3)
            RETURNING id, userid, action, object
            "#,
        )
        .bind(uid)
        .bind(data.action.as_str())
        .bind(&data.object)
        .fetch_one(executor)
        .await?;

        Ok(row.into())
    }

    /// All capabilities owned by `uid`, oldest first
    pub async fn list_by_uid<'e, E>(executor: E, uid: i32) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, CapabilityRow>(
            r#"
            SELECT id, userid, action, object
            FROM capabilities
            WHERE userid = $1
            ORDER BY id
            "#,
        )
        .bind(uid)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(Capability::from).collect())
    }

    /// Deletes every capability owned by `uid`; returns the number removed
    pub async fn delete_by_uid<'e, E>(executor: E, uid: i32) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM capabilities WHERE userid = $1")
            .bind(uid)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
