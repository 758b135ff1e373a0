use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validate_text;
use crate::auth::Capability;
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

/// Per-user capability flags, persisted as `1`/`0` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_manage_products: bool,
    pub can_manage_customers: bool,
    pub can_manage_sales: bool,
    pub can_view_reports: bool,
    pub can_manage_users: bool,
}

impl Permissions {
    pub const fn all() -> Self {
        Self {
            can_manage_products: true,
            can_manage_customers: true,
            can_manage_sales: true,
            can_view_reports: true,
            can_manage_users: true,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageProducts => self.can_manage_products,
            Capability::ManageCustomers => self.can_manage_customers,
            Capability::ManageSales => self.can_manage_sales,
            Capability::ViewReports => self.can_view_reports,
            Capability::ManageUsers => self.can_manage_users,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub username: String,
    /// PHC-formatted Argon2id hash. Never serialized to output.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub permissions: Permissions,
    pub is_active: bool,
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

impl Record for User {
    const FILE_NAME: &'static str = "users.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        let p = &self.permissions;
        vec![
            self.id.to_string(),
            self.username.clone(),
            self.password_hash.clone(),
            flag(p.can_manage_products),
            flag(p.can_manage_customers),
            flag(p.can_manage_sales),
            flag(p.can_view_reports),
            flag(p.can_manage_users),
            flag(self.is_active),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            username: raw.text(1)?.to_string(),
            password_hash: raw.text(2)?.to_string(),
            permissions: Permissions {
                can_manage_products: raw.flag(3)?,
                can_manage_customers: raw.flag(4)?,
                can_manage_sales: raw.flag(5)?,
                can_view_reports: raw.flag(6)?,
                can_manage_users: raw.flag(7)?,
            },
            is_active: raw.flag(8)?,
        })
    }
}

/// Input for creating a user account. The password is hashed before storage.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 50), custom = "validate_username")]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Usernames are matched exactly at login.
fn validate_username(value: &str) -> Result<(), validator::ValidationError> {
    validate_text(value)?;
    if value.trim() != value {
        return Err(validator::ValidationError::new("untrimmed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Capability;
    use strum::IntoEnumIterator;

    fn clerk() -> User {
        User {
            id: 3,
            username: "clerk".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            permissions: Permissions {
                can_manage_sales: true,
                ..Permissions::default()
            },
            is_active: true,
        }
    }

    #[test]
    fn hash_with_commas_survives_the_codec() {
        let user = clerk();
        let line = crate::store::codec::encode_record(user.to_fields());
        assert_eq!(User::from_raw(&RawRecord::parse(&line)).unwrap(), user);
    }

    #[test]
    fn flags_are_written_as_digits() {
        let fields = clerk().to_fields();
        assert_eq!(&fields[3..], ["0", "0", "1", "0", "0", "1"]);
    }

    #[test]
    fn permissions_gate_capabilities() {
        let user = clerk();
        assert!(user.permissions.allows(Capability::ManageSales));
        assert!(!user.permissions.allows(Capability::ManageUsers));
        assert!(Capability::iter().all(|capability| Permissions::all().allows(capability)));
    }

    #[test]
    fn serialized_user_omits_password_hash() {
        let json = serde_json::to_value(clerk()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "clerk");
    }

    #[test]
    fn username_must_be_trimmed() {
        let input = NewUser {
            username: " admin".into(),
            password: "secret".into(),
            permissions: Permissions::default(),
        };
        assert!(input.validate().is_err());
    }
}
