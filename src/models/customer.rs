use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validate_text;
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u32,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl Customer {
    pub fn matches(&self, term: &str) -> bool {
        self.name.contains(term) || self.phone.contains(term) || self.email.contains(term)
    }
}

impl Record for Customer {
    const FILE_NAME: &'static str = "customers.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.address.clone(),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            name: raw.text(1)?.to_string(),
            phone: raw.text(2)?.to_string(),
            email: raw.text(3)?.to_string(),
            address: raw.text(4)?.to_string(),
        })
    }
}

/// Input for registering a customer. Every field is required.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(length(max = 100), custom = "validate_text")]
    pub name: String,
    #[validate(length(max = 30), custom = "validate_text")]
    pub phone: String,
    #[validate(length(max = 100), custom = "validate_text")]
    pub email: String,
    #[validate(length(max = 200), custom = "validate_text")]
    pub address: String,
}

impl NewCustomer {
    pub fn into_customer(self, id: u32) -> Customer {
        Customer {
            id,
            name: self.name,
            phone: self.phone,
            email: self.email,
            address: self.address,
        }
    }
}
