use super::DirectoryStore;
use crate::error::{StoreError, StoreResult};
use crate::models::capability::{Capability, CreateCapability};
use crate::models::gid_list::{parse_comma_separated, to_comma_separated};
use crate::models::group::Group;
use crate::models::user::{
    next_uid, validate_cust_attr, CreateUser, GroupRef, LookupFailure, UpdateUser, User, UserRow,
    EMPTY_CUST_ATTR, NO_PRIMARY_GROUP,
};
use crate::password::sha256_hex;
use tracing::{debug, info, warn};
use validator::Validate;

impl DirectoryStore {
    /// Whether a user with this login name exists
    pub async fn user_exist_by_name(&self, name: &str) -> StoreResult<bool> {
        Ok(UserRow::exists_by_name(&self.pool, name).await?)
    }

    /// Whether a user with this UID exists
    pub async fn user_exist_by_uid(&self, uid: i32) -> StoreResult<bool> {
        Ok(UserRow::exists_by_uid(&self.pool, uid).await?)
    }

    /// UID the next auto-numbered user would get
    ///
    /// 20000 on an empty table, otherwise one past the highest UID.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the highest UID is already `i32::MAX`.
    pub async fn find_next_user_id(&self) -> StoreResult<i32> {
        next_uid(UserRow::max_uid(&self.pool).await?).ok_or_else(uid_exhausted)
    }

    /// Grants a capability to the user with this UID
    ///
    /// The UID is not checked against the users table.
    pub async fn create_capability(&self, uid: i32, data: CreateCapability) -> StoreResult<Capability> {
        let capability = Capability::insert(&self.pool, uid, &data).await?;
        info!(uid, action = %capability.action, object = %capability.object, "Created capability");
        Ok(capability)
    }

    /// Every capability owned by this UID
    pub async fn get_capabilities_by_user_uid_number(&self, uid: i32) -> StoreResult<Vec<Capability>> {
        Ok(Capability::list_by_uid(&self.pool, uid).await?)
    }

    /// Loads and projects a user by login name
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no user has this name. Failures while
    /// resolving groups or capabilities are reported inside the returned
    /// [`User`] instead.
    pub async fn get_user_by_name(&self, name: &str) -> StoreResult<User> {
        debug!(name, "Looking up user by name");
        let row = UserRow::find_by_name(&self.pool, name)
            .await?
            .ok_or_else(|| StoreError::not_found("user", name))?;

        Ok(self.project_user(row).await)
    }

    /// Loads and projects a user by UID
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no user has this UID.
    pub async fn get_user_by_uid(&self, uid: i32) -> StoreResult<User> {
        debug!(uid, "Looking up user by UID");
        let row = UserRow::find_by_uid(&self.pool, uid)
            .await?
            .ok_or_else(|| StoreError::not_found("user", uid))?;

        Ok(self.project_user(row).await)
    }

    /// Every user, each projected as by [`DirectoryStore::get_user_by_name`]
    pub async fn get_users(&self) -> StoreResult<Vec<User>> {
        let rows = UserRow::list(&self.pool).await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(self.project_user(row).await);
        }

        Ok(users)
    }

    /// Creates a user and its capabilities
    ///
    /// Secondary groups are stored as given; their existence is only enforced
    /// by [`DirectoryStore::update_user`].
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] for an empty name or malformed `cust_attr`
    /// - [`StoreError::Conflict`] if the name or the explicit UID is taken, or no
    ///   UID is left to allocate
    pub async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        data.validate()?;

        let cust_attr = match data.cust_attr.as_deref().map(str::trim) {
            None | Some("") => EMPTY_CUST_ATTR.to_string(),
            Some(raw) => {
                validate_cust_attr(raw)?;
                raw.to_string()
            }
        };

        let mut tx = self.pool.begin().await?;

        if UserRow::exists_by_name(&mut *tx, &data.name).await? {
            return Err(StoreError::Conflict(format!(
                "user with name {} already exists",
                data.name
            )));
        }

        let uid = match data.uid_number {
            Some(uid) => {
                if UserRow::exists_by_uid(&mut *tx, uid).await? {
                    return Err(StoreError::Conflict(format!(
                        "user with UID {} already exists",
                        uid
                    )));
                }
                uid
            }
            None => {
                let uid = next_uid(UserRow::max_uid(&mut *tx).await?).ok_or_else(uid_exhausted)?;
                debug!(uid, "Allocated UID");
                uid
            }
        };

        let pass_sha256 = data
            .password
            .as_deref()
            .filter(|password| !password.is_empty())
            .map(sha256_hex)
            .unwrap_or_default();

        let row = UserRow {
            id: 0,
            name: data.name,
            uid_number: uid,
            primary_group: data.primary_group.unwrap_or(NO_PRIMARY_GROUP),
            other_groups: to_comma_separated(&data.other_groups),
            given_name: data.given_name,
            sn: data.sn,
            mail: data.mail,
            login_shell: data.login_shell,
            home_directory: data.home_directory,
            disabled: data.disabled,
            pass_sha256,
            pass_bcrypt: String::new(),
            otp_secret: data.otp_secret,
            yubikey: data.yubikey,
            ssh_keys: data.ssh_keys,
            cust_attr,
        };

        let row = row.insert(&mut *tx).await?;

        for capability in &data.capabilities {
            Capability::insert(&mut *tx, uid, capability).await?;
        }

        tx.commit().await?;

        info!(
            uid,
            name = %row.name,
            capabilities = data.capabilities.len(),
            "Created user"
        );
        Ok(self.project_user(row).await)
    }

    /// Replaces the stored password digest of the named user
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no user has this name.
    pub async fn update_user_password(&self, name: &str, password: &str) -> StoreResult<()> {
        if !UserRow::set_pass_sha256_by_name(&self.pool, name, &sha256_hex(password)).await? {
            return Err(StoreError::not_found("user", name));
        }

        info!(name, "Updated user password");
        Ok(())
    }

    /// Replaces the stored password digest of the user with this UID
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no user has this UID.
    pub async fn update_user_password_by_uid(&self, uid: i32, password: &str) -> StoreResult<()> {
        if !UserRow::set_pass_sha256_by_uid(&self.pool, uid, &sha256_hex(password)).await? {
            return Err(StoreError::not_found("user", uid));
        }

        info!(uid, "Updated user password");
        Ok(())
    }

    /// Applies a partial update to the named user
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the user does not exist
    /// - [`StoreError::Validation`] if a secondary GID names no group, the
    ///   primary group appears among the secondary groups, or `cust_attr` is
    ///   not a JSON object
    pub async fn update_user(&self, name: &str, data: UpdateUser) -> StoreResult<User> {
        if let Some(raw) = &data.cust_attr {
            validate_cust_attr(raw)?;
        }

        let mut tx = self.pool.begin().await?;

        let mut row = UserRow::find_by_name(&mut *tx, name)
            .await?
            .ok_or_else(|| StoreError::not_found("user", name))?;

        if let Some(value) = data.given_name {
            row.given_name = value;
        }
        if let Some(value) = data.sn {
            row.sn = value;
        }
        if let Some(value) = data.mail {
            row.mail = value;
        }
        if let Some(value) = data.login_shell {
            row.login_shell = value;
        }
        if let Some(value) = data.home_directory {
            row.home_directory = value;
        }
        if let Some(value) = data.disabled {
            row.disabled = value;
        }
        if let Some(value) = data.otp_secret {
            row.otp_secret = value;
        }
        if let Some(value) = data.yubikey {
            row.yubikey = value;
        }
        if let Some(value) = data.ssh_keys {
            row.ssh_keys = value;
        }

        let groups_changed = data.primary_group.is_some() || data.other_groups.is_some();

        if let Some(gid) = data.primary_group {
            row.primary_group = gid;
        }

        if let Some(gids) = &data.other_groups {
            for gid in gids {
                if !Group::exists_by_gid(&mut *tx, *gid).await? {
                    return Err(StoreError::Validation(format!(
                        "group with GID {} does not exist",
                        gid
                    )));
                }
            }
            row.other_groups = to_comma_separated(gids);
        }

        if groups_changed
            && row.primary_group != NO_PRIMARY_GROUP
            && parse_comma_separated(&row.other_groups).contains(&row.primary_group)
        {
            return Err(StoreError::Validation(
                "primary group cannot be in the other groups".to_string(),
            ));
        }

        if let Some(password) = data.password {
            row.pass_sha256 = sha256_hex(&password);
        }

        if let Some(raw) = data.cust_attr {
            row.cust_attr = raw;
        }

        row.save(&mut *tx).await?;

        if let Some(capabilities) = &data.capabilities {
            let removed = Capability::delete_by_uid(&mut *tx, row.uid_number).await?;
            for capability in capabilities {
                Capability::insert(&mut *tx, row.uid_number, capability).await?;
            }
            debug!(
                uid = row.uid_number,
                removed,
                inserted = capabilities.len(),
                "Replaced capabilities"
            );
        }

        tx.commit().await?;

        info!(uid = row.uid_number, name = %row.name, "Updated user");
        Ok(self.project_user(row).await)
    }

    /// Deletes a user and all of its capabilities
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no user has this UID.
    pub async fn delete_user(&self, uid: i32) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        if !UserRow::delete(&mut *tx, uid).await? {
            return Err(StoreError::not_found("user", uid));
        }
        let capabilities = Capability::delete_by_uid(&mut *tx, uid).await?;

        tx.commit().await?;

        info!(uid, removed_capabilities = capabilities, "Deleted user");
        Ok(())
    }

    /// Builds the caller-facing record for a stored row
    ///
    /// Group order: stored secondary groups first, then groups that include
    /// the primary group. The primary GID and repeated GIDs are dropped.
    async fn project_user(&self, row: UserRow) -> User {
        let primary_gid = row.primary_group;
        let secondary = parse_comma_separated(&row.other_groups);
        let mut user = User::from_row(row);

        if primary_gid != NO_PRIMARY_GROUP {
            user.primary_group = Some(self.resolve_group(primary_gid).await);
        }

        for gid in secondary {
            if should_merge(&user.other_groups, primary_gid, gid) {
                let group = self.resolve_group(gid).await;
                user.other_groups.push(group);
            }
        }

        if primary_gid != NO_PRIMARY_GROUP {
            match Group::list_including(&self.pool, primary_gid).await {
                Ok(parents) => {
                    for parent in parents {
                        if should_merge(&user.other_groups, primary_gid, parent.gid_number) {
                            user.other_groups.push(GroupRef::Resolved(parent));
                        }
                    }
                }
                Err(e) => {
                    warn!(gid = primary_gid, error = %e, "Failed to list including groups");
                    user.lookup_failures.push(LookupFailure::IncludedGroups {
                        gid: primary_gid,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match Capability::list_by_uid(&self.pool, user.uid_number).await {
            Ok(capabilities) => user.capabilities = capabilities,
            Err(e) => {
                warn!(uid = user.uid_number, error = %e, "Failed to load capabilities");
                user.lookup_failures.push(LookupFailure::Capabilities {
                    uid: user.uid_number,
                    reason: e.to_string(),
                });
            }
        }

        user
    }

    async fn resolve_group(&self, gid: i32) -> GroupRef {
        match Group::find_by_gid(&self.pool, gid).await {
            Ok(Some(group)) => GroupRef::Resolved(group),
            Ok(None) => {
                debug!(gid, "Referenced group does not exist");
                GroupRef::Missing { gid }
            }
            Err(e) => {
                warn!(gid, error = %e, "Failed to resolve group");
                GroupRef::Unavailable {
                    gid,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn uid_exhausted() -> StoreError {
    StoreError::Conflict("UID space exhausted".to_string())
}

/// Whether `gid` belongs in a user's secondary group list
fn should_merge(groups: &[GroupRef], primary_gid: i32, gid: i32) -> bool {
    gid != primary_gid && !contains_gid(groups, gid)
}

/// Whether any reference in `groups` points at `gid`
fn contains_gid(groups: &[GroupRef], gid: i32) -> bool {
    groups.iter().any(|group| group.gid() == gid)
}
