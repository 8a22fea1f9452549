/// Group and group-inclusion models
///
/// Groups are addressed by their GID number everywhere outside this module;
/// the serial `id` column is internal to the database.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE ldapgroups (
///     id SERIAL PRIMARY KEY,
///     name TEXT NOT NULL UNIQUE,
///     gidnumber INTEGER NOT NULL UNIQUE
/// );
///
/// CREATE TABLE includegroups (
///     id SERIAL PRIMARY KEY,
///     parentgroupid INTEGER NOT NULL,  -- GID of the including group
///     includegroupid INTEGER NOT NULL  -- GID of the included group
/// );
/// ```
///
/// An inclusion row `(parent, child)` means the members of `child` are also
/// treated as members of `parent`. Cycles are not detected.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use validator::Validate;

/// First GID handed out when the group table is empty
pub const FIRST_GID: i32 = 10000;

/// A directory group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    /// Internal row id
    pub id: i32,

    /// Group name (cn / ou depending on context)
    pub name: String,

    /// LDAP gidNumber
    #[sqlx(rename = "gidnumber")]
    pub gid_number: i32,
}

/// Input for creating a group
///
/// A `gid_number` of `None` asks the store to allocate the next free GID.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateGroup {
    #[validate(length(min = 1, max = 64, message = "Group name must be 1-64 characters"))]
    pub name: String,

    pub gid_number: Option<i32>,
}

/// Partial update for a group
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub gid_number: Option<i32>,
}

/// A group-includes-group edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupInclusion {
    pub id: i32,

    /// GID of the group whose membership is extended
    #[sqlx(rename = "parentgroupid")]
    pub parent_gid: i32,

    /// GID of the group being included
    #[sqlx(rename = "includegroupid")]
    pub include_gid: i32,
}

impl Group {
    /// Finds a group by GID number
    pub async fn find_by_gid<'e, E>(executor: E, gid: i32) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, gidnumber
            FROM ldapgroups
            WHERE gidnumber = $1
            "#,
        )
        .bind(gid)
        .fetch_optional(executor)
        .await
    }

    /// Finds a group by name
    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, gidnumber
            FROM ldapgroups
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Whether a group with this GID exists
    pub async fn exists_by_gid<'e, E>(executor: E, gid: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ldapgroups WHERE gidnumber = $1)")
            .bind(gid)
            .fetch_one(executor)
            .await
    }

    /// Whether a group with this name exists
    pub async fn exists_by_name<'e, E>(executor: E, name: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ldapgroups WHERE name = $1)")
            .bind(name)
            .fetch_one(executor)
            .await
    }

    /// Highest GID currently in use, if any
    pub async fn max_gid<'e, E>(executor: E) -> Result<Option<i32>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT MAX(gidnumber) FROM ldapgroups")
            .fetch_one(executor)
            .await
    }

    /// Inserts a group row with an already-decided GID
    pub async fn insert<'e, E>(executor: E, name: &str, gid: i32) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO ldapgroups (name, gidnumber)
            VALUES ($1, $2)
            RETURNING id, name, gidnumber
            "#,
        )
        .bind(name)
        .bind(gid)
        .fetch_one(executor)
        .await
    }

    /// Writes name and GID back for the row with this internal id
    pub async fn save<'e, E>(&self, executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE ldapgroups SET name = $2, gidnumber = $3 WHERE id = $1")
            .bind(self.id)
            .bind(&self.name)
            .bind(self.gid_number)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Deletes the group row by GID
    ///
    /// Returns true if a row was removed.
    pub async fn delete<'e, E>(executor: E, gid: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM ldapgroups WHERE gidnumber = $1")
            .bind(gid)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Groups that include `gid`, following inclusion edges child to parent
    ///
    /// Edges whose parent GID no longer names a group are skipped.
    pub async fn list_including<'e, E>(executor: E, gid: i32) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.gidnumber
            FROM includegroups i
            JOIN ldapgroups g ON g.gidnumber = i.parentgroupid
            WHERE i.includegroupid = $1
            ORDER BY i.id
            "#,
        )
        .bind(gid)
        .fetch_all(executor)
        .await
    }

    /// Groups included into `gid`, following inclusion edges parent to child
    pub async fn list_included_by<'e, E>(executor: E, gid: i32) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.gidnumber
            FROM includegroups i
            JOIN ldapgroups g ON g.gidnumber = i.includegroupid
            WHERE i.parentgroupid = $1
            ORDER BY i.id
            "#,
        )
        .bind(gid)
        .fetch_all(executor)
        .await
    }

    /// Lists every group
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Group>("SELECT id, name, gidnumber FROM ldapgroups")
            .fetch_all(executor)
            .await
    }
}

impl GroupInclusion {
    /// Whether the edge `parent -> include` already exists
    pub async fn exists<'e, E>(executor: E, parent: i32, include: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM includegroups WHERE parentgroupid = $1 AND includegroupid = $2)",
        )
        .bind(parent)
        .bind(include)
        .fetch_one(executor)
        .await
    }

    pub async fn insert<'e, E>(executor: E, parent: i32, include: i32) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, GroupInclusion>(
            r#"
            INSERT INTO includegroups (parentgroupid, includegroupid)
            VALUES ($1, $2)
            RETURNING id, parentgroupid, includegroupid
            "#,
        )
        .bind(parent)
        .bind(include)
        .fetch_one(executor)
        .await
    }

    /// Removes one edge; returns true if it existed
    pub async fn delete<'e, E>(executor: E, parent: i32, include: i32) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM includegroups WHERE parentgroupid = $1 AND includegroupid = $2")
                .bind(parent)
                .bind(include)
                .execute(executor)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes every edge whose parent is `gid`; returns the number removed
    pub async fn delete_by_parent_gid<'e, E>(executor: E, gid: i32) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM includegroups WHERE parentgroupid = $1")
            .bind(gid)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Next GID to allocate given the current maximum
///
/// `None` once the highest GID is `i32::MAX`.
pub fn next_gid(current_max: Option<i32>) -> Option<i32> {
    current_max.map_or(Some(FIRST_GID), |max| max.checked_add(1))
}
