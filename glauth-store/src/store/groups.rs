use super::DirectoryStore;
use crate::error::{StoreError, StoreResult};
use crate::models::group::{next_gid, CreateGroup, Group, GroupInclusion, UpdateGroup};
use tracing::{debug, info};
use validator::Validate;

impl DirectoryStore {
    /// Looks up a group by GID
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no group has this GID.
    pub async fn get_group_by_gid(&self, gid: i32) -> StoreResult<Group> {
        debug!(gid, "Looking up group by GID");
        Group::find_by_gid(&self.pool, gid)
            .await?
            .ok_or_else(|| StoreError::not_found("group", gid))
    }

    /// Looks up a group by name
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no group has this name.
    pub async fn get_group_by_name(&self, name: &str) -> StoreResult<Group> {
        debug!(name, "Looking up group by name");
        Group::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::not_found("group", name))
    }

    /// Groups that include the group `gid` as a member
    ///
    /// Inclusion edges pointing at a parent that no longer exists are skipped.
    pub async fn get_include_groups_by_include_group_gid(&self, gid: i32) -> StoreResult<Vec<Group>> {
        Ok(Group::list_including(&self.pool, gid).await?)
    }

    /// Groups included into the group `gid`
    pub async fn get_included_groups(&self, gid: i32) -> StoreResult<Vec<Group>> {
        Ok(Group::list_included_by(&self.pool, gid).await?)
    }

    /// Creates a group, allocating a GID when none is given
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the name is empty or too long
    /// - [`StoreError::Conflict`] if the GID or the name is already taken, or no
    ///   GID is left to allocate
    pub async fn create_group(&self, data: CreateGroup) -> StoreResult<Group> {
        data.validate()?;

        let mut tx = self.pool.begin().await?;

        if let Some(gid) = data.gid_number {
            if Group::exists_by_gid(&mut *tx, gid).await? {
                return Err(StoreError::Conflict(format!(
                    "group with GID {} already exists",
                    gid
                )));
            }
        }

        if Group::exists_by_name(&mut *tx, &data.name).await? {
            return Err(StoreError::Conflict(format!(
                "group with name {} already exists",
                data.name
            )));
        }

        let gid = match data.gid_number {
            Some(gid) => gid,
            None => {
                let gid = next_gid(Group::max_gid(&mut *tx).await?).ok_or_else(gid_exhausted)?;
                debug!(gid, "Allocated GID");
                gid
            }
        };

        let group = Group::insert(&mut *tx, &data.name, gid).await?;
        tx.commit().await?;

        info!(gid = group.gid_number, name = %group.name, "Created group");
        Ok(group)
    }

    /// Applies a partial update to the named group
    ///
    /// Users and inclusion edges referencing the old GID are not rewritten.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the group does not exist
    /// - [`StoreError::Conflict`] if the new name or GID is taken
    pub async fn update_group(&self, name: &str, data: UpdateGroup) -> StoreResult<Group> {
        let mut tx = self.pool.begin().await?;

        let mut group = Group::find_by_name(&mut *tx, name)
            .await?
            .ok_or_else(|| StoreError::not_found("group", name))?;

        if let Some(new_name) = data.name {
            group.name = new_name;
        }
        if let Some(gid) = data.gid_number {
            group.gid_number = gid;
        }

        group.save(&mut *tx).await?;
        tx.commit().await?;

        info!(gid = group.gid_number, name = %group.name, "Updated group");
        Ok(group)
    }

    /// Deletes a group and every inclusion edge where it is the parent
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no group has this GID.
    pub async fn delete_group(&self, gid: i32) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if !Group::delete(&mut *tx, gid).await? {
            return Err(StoreError::not_found("group", gid));
        }
        let edges = GroupInclusion::delete_by_parent_gid(&mut *tx, gid).await?;

        tx.commit().await?;

        info!(gid, removed_inclusions = edges, "Deleted group");
        Ok(())
    }

    /// Whether a group with this GID exists
    pub async fn group_exist_by_gid(&self, gid: i32) -> StoreResult<bool> {
        Ok(Group::exists_by_gid(&self.pool, gid).await?)
    }

    /// Whether a group with this name exists
    pub async fn group_exist_by_name(&self, name: &str) -> StoreResult<bool> {
        Ok(Group::exists_by_name(&self.pool, name).await?)
    }

    /// GID the next auto-numbered group would get
    ///
    /// 10000 on an empty table, otherwise one past the highest GID.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the highest GID is already `i32::MAX`.
    pub async fn find_next_group_id(&self) -> StoreResult<i32> {
        next_gid(Group::max_gid(&self.pool).await?).ok_or_else(gid_exhausted)
    }

    /// Every group, in no particular order
    pub async fn get_groups(&self) -> StoreResult<Vec<Group>> {
        Ok(Group::list(&self.pool).await?)
    }

    /// Makes members of `include_gid` members of `parent_gid` as well
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if either group does not exist
    /// - [`StoreError::Conflict`] if the edge already exists
    pub async fn include_group(&self, parent_gid: i32, include_gid: i32) -> StoreResult<GroupInclusion> {
        let mut tx = self.pool.begin().await?;

        for gid in [parent_gid, include_gid] {
            if !Group::exists_by_gid(&mut *tx, gid).await? {
                return Err(StoreError::not_found("group", gid));
            }
        }

        if GroupInclusion::exists(&mut *tx, parent_gid, include_gid).await? {
            return Err(StoreError::Conflict(format!(
                "group {} already includes group {}",
                parent_gid, include_gid
            )));
        }

        let edge = GroupInclusion::insert(&mut *tx, parent_gid, include_gid).await?;
        tx.commit().await?;

        info!(parent_gid, include_gid, "Added group inclusion");
        Ok(edge)
    }

    /// Removes the inclusion edge `parent_gid -> include_gid`
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the edge does not exist.
    pub async fn exclude_group(&self, parent_gid: i32, include_gid: i32) -> StoreResult<()> {
        if !GroupInclusion::delete(&self.pool, parent_gid, include_gid).await? {
            return Err(StoreError::not_found(
                "group inclusion",
                format!("{} -> {}", parent_gid, include_gid),
            ));
        }

        info!(parent_gid, include_gid, "Removed group inclusion");
        Ok(())
    }
}

fn gid_exhausted() -> StoreError {
    StoreError::Conflict("GID space exhausted".to_string())
}
