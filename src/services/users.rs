use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{hash_password, verify_password, Capability, PasswordPolicy, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{NewUser, Permissions, User};
use crate::store::{FlatFileStore, RecordStore};

/// Result of a delete request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "user", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted(User),
    Cancelled,
}

/// Service for user accounts and their capability flags
pub struct UserService<S = FlatFileStore<User>> {
    users: Arc<S>,
    policy: PasswordPolicy,
}

impl<S> UserService<S>
where
    S: RecordStore<User>,
{
    pub fn new(users: Arc<S>, policy: PasswordPolicy) -> Self {
        Self { users, policy }
    }

    /// Creates an active account. Usernames must not already be taken.
    #[instrument(skip(self, session, input), fields(username = %input.username))]
    pub fn add_user(&self, session: &Session, input: NewUser) -> Result<User> {
        session.require(Capability::ManageUsers)?;
        input.validate()?;
        self.policy.validate(&input.password)?;

        if self
            .users
            .find_first(|user| user.username == input.username)?
            .is_some()
        {
            return Err(ServiceError::ValidationError(format!(
                "username '{}' already exists",
                input.username
            )));
        }

        let user = User {
            id: self.users.next_id()?,
            username: input.username,
            password_hash: hash_password(&input.password)?,
            permissions: input.permissions,
            is_active: true,
        };
        self.users.append(&user)?;
        info!(user_id = user.id, "user added");
        Ok(user)
    }

    pub fn list_users(&self, session: &Session) -> Result<Vec<User>> {
        session.require(Capability::ManageUsers)?;
        self.users.load_all()
    }

    pub fn find_user(&self, session: &Session, id: u32) -> Result<User> {
        session.require(Capability::ManageUsers)?;
        self.users.find_by_id(id)?.ok_or_else(|| not_found(id))
    }

    /// Replaces every capability flag of one account. The username is left as
    /// is and its uniqueness is not re-checked.
    #[instrument(skip(self, session))]
    pub fn edit_permissions(
        &self,
        session: &Session,
        id: u32,
        permissions: Permissions,
    ) -> Result<User> {
        session.require(Capability::ManageUsers)?;
        let user = self.update(id, |mut user| {
            user.permissions = permissions;
            user
        })?;
        info!(user_id = id, "permissions updated");
        Ok(user)
    }

    /// Activates or deactivates an account. Inactive accounts cannot log in.
    #[instrument(skip(self, session))]
    pub fn set_active(&self, session: &Session, id: u32, active: bool) -> Result<User> {
        session.require(Capability::ManageUsers)?;
        if !active && id == session.user_id() {
            return Err(ServiceError::ValidationError(
                "cannot deactivate the account you are logged in with".to_string(),
            ));
        }
        let user = self.update(id, |mut user| {
            user.is_active = active;
            user
        })?;
        info!(user_id = id, active, "account status updated");
        Ok(user)
    }

    pub fn deactivate_user(&self, session: &Session, id: u32) -> Result<User> {
        self.set_active(session, id, false)
    }

    /// Removes an account after `confirm` approves it. Deleting the logged-in
    /// account is rejected before any lookup.
    #[instrument(skip(self, session, confirm))]
    pub fn delete_user<F>(&self, session: &Session, id: u32, confirm: F) -> Result<DeleteOutcome>
    where
        F: FnOnce(&User) -> bool,
    {
        session.require(Capability::ManageUsers)?;
        if id == session.user_id() {
            return Err(ServiceError::ValidationError(
                "cannot delete the account you are logged in with".to_string(),
            ));
        }

        let user = self.users.find_by_id(id)?.ok_or_else(|| not_found(id))?;
        if !confirm(&user) {
            info!(user_id = id, "deletion cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        self.users
            .remove_where(|candidate| candidate.id == id)
            .map_err(|err| err.or_not_found(|| format!("User {} not found", id)))?;
        warn!(user_id = id, username = %user.username, "user deleted");
        Ok(DeleteOutcome::Deleted(user))
    }

    /// Changes the session user's own password after checking the current one.
    #[instrument(skip_all, fields(user_id = session.user_id()))]
    pub fn change_password(
        &self,
        session: &mut Session,
        current: &str,
        new_password: &str,
    ) -> Result<()> {
        let id = session.user_id();
        let stored = self.users.find_by_id(id)?.ok_or_else(|| not_found(id))?;
        if !verify_password(current, &stored.password_hash) {
            return Err(ServiceError::AuthError(
                "current password is incorrect".to_string(),
            ));
        }
        self.policy.validate(new_password)?;

        let hash = hash_password(new_password)?;
        self.update(id, |mut user| {
            user.password_hash = hash.clone();
            user
        })?;
        session.set_password_hash(hash);
        info!("password changed");
        Ok(())
    }

    fn update<T>(&self, id: u32, transform: T) -> Result<User>
    where
        T: FnMut(User) -> User,
    {
        self.users
            .update_by_id(id, transform)
            .map_err(|err| err.or_not_found(|| format!("User {} not found", id)))
    }
}

fn not_found(id: u32) -> ServiceError {
    ServiceError::NotFound(format!("User {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::session_for;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        users: UserService,
        admin: Session,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let users = UserService::new(
            Arc::new(FlatFileStore::new(dir.path())),
            PasswordPolicy::new(4),
        );
        let admin = session_for(1, Permissions::all());
        users
            .users
            .append(&User {
                id: 1,
                username: "admin".into(),
                password_hash: hash_password("admin").unwrap(),
                permissions: Permissions::all(),
                is_active: true,
            })
            .unwrap();
        Fixture { dir, users, admin }
    }

    fn clerk() -> NewUser {
        NewUser {
            username: "clerk".into(),
            password: "counter".into(),
            permissions: Permissions {
                can_manage_sales: true,
                ..Permissions::default()
            },
        }
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let fx = fixture();
        fx.users.add_user(&fx.admin, clerk()).unwrap();
        let err = fx.users.add_user(&fx.admin, clerk()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: username 'clerk' already exists"
        );
    }

    #[test]
    fn short_password_is_rejected() {
        let fx = fixture();
        let mut input = clerk();
        input.password = "abc".into();
        assert_matches!(
            fx.users.add_user(&fx.admin, input),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn edit_permissions_replaces_flags() {
        let fx = fixture();
        let clerk = fx.users.add_user(&fx.admin, clerk()).unwrap();
        let updated = fx
            .users
            .edit_permissions(&fx.admin, clerk.id, Permissions::all())
            .unwrap();
        assert_eq!(updated.permissions, Permissions::all());
        assert_eq!(updated.password_hash, clerk.password_hash);
    }

    #[test]
    fn self_deactivation_is_rejected() {
        let fx = fixture();
        assert_matches!(
            fx.users.deactivate_user(&fx.admin, 1),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn cancelled_delete_leaves_file_untouched() {
        let fx = fixture();
        let clerk = fx.users.add_user(&fx.admin, clerk()).unwrap();
        let path = fx.dir.path().join("users.csv");
        let before = fs::read(&path).unwrap();

        let outcome = fx.users.delete_user(&fx.admin, clerk.id, |_| false).unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn confirmed_delete_removes_the_row() {
        let fx = fixture();
        let clerk = fx.users.add_user(&fx.admin, clerk()).unwrap();
        let mut seen = None;
        let outcome = fx
            .users
            .delete_user(&fx.admin, clerk.id, |user| {
                seen = Some(user.username.clone());
                true
            })
            .unwrap();
        assert_matches!(outcome, DeleteOutcome::Deleted(user) if user.id == clerk.id);
        assert_eq!(seen.as_deref(), Some("clerk"));
        assert_eq!(fx.users.list_users(&fx.admin).unwrap().len(), 1);
    }

    #[test]
    fn delete_of_unknown_user_skips_confirmation() {
        let fx = fixture();
        let result = fx
            .users
            .delete_user(&fx.admin, 9, |_| panic!("confirmation must not be asked"));
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }

    #[test]
    fn change_password_requires_current_password() {
        let fx = fixture();
        let mut admin = fx.admin.clone();
        assert_matches!(
            fx.users.change_password(&mut admin, "wrong", "newpass"),
            Err(ServiceError::AuthError(_))
        );

        fx.users.change_password(&mut admin, "admin", "newpass").unwrap();
        assert!(verify_password("newpass", &admin.user().password_hash));
        let stored = fx.users.find_user(&admin, 1).unwrap();
        assert_eq!(stored.password_hash, admin.user().password_hash);
    }
}
