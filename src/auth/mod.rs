/*!
 * # Authentication Module
 *
 * Login, the bootstrap administrator account and the [`Session`] value that
 * every gated operation receives. Services never consult global state for the
 * current user; they check the capability on the session they are handed.
 */

pub mod password_policy;
pub mod permissions;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::errors::{Result, ServiceError};
use crate::models::{Permissions, User};
use crate::store::{FlatFileStore, RecordStore};

pub use password_policy::{hash_password, verify_password, PasswordPolicy, PasswordPolicyError};
pub use permissions::Capability;

/// The authenticated user an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> u32 {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.user.permissions.allows(capability)
    }

    /// Fails with `PermissionDenied` unless the session user holds `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "user '{}' lacks {}",
                self.user.username, capability
            )))
        }
    }

    pub(crate) fn set_password_hash(&mut self, hash: String) {
        self.user.password_hash = hash;
    }
}

/// Credentials for the account created on first run.
#[derive(Debug, Clone)]
pub struct DefaultAdmin {
    pub username: String,
    pub password: String,
}

impl Default for DefaultAdmin {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

pub struct AuthService<S = FlatFileStore<User>> {
    users: Arc<S>,
}

impl<S> AuthService<S>
where
    S: RecordStore<User>,
{
    pub fn new(users: Arc<S>) -> Self {
        Self { users }
    }

    /// Writes the bootstrap administrator when the users file does not exist
    /// yet. Returns the created account, or `None` when users already exist.
    #[instrument(skip(self, admin), fields(username = %admin.username))]
    pub fn ensure_default_user(&self, admin: &DefaultAdmin) -> Result<Option<User>> {
        if self.users.exists() {
            return Ok(None);
        }

        let user = User {
            id: self.users.next_id()?,
            username: admin.username.clone(),
            password_hash: hash_password(&admin.password)?,
            permissions: Permissions::all(),
            is_active: true,
        };
        self.users.append(&user)?;

        warn!(
            username = %user.username,
            "created default administrator account; change its password"
        );
        Ok(Some(user))
    }

    /// Opens a session for an active user whose password verifies. Unknown,
    /// inactive and wrong-password attempts fail identically.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self
            .users
            .find_first(|user| user.is_active && user.username == username)?;

        match user {
            Some(user) if verify_password(password, &user.password_hash) => {
                info!(user_id = user.id, "login succeeded");
                Ok(Session::new(user))
            }
            _ => {
                warn!(username, "login rejected");
                Err(ServiceError::AuthError(
                    "invalid username or password".to_string(),
                ))
            }
        }
    }
}
