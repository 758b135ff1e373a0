use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use validator::Validate;

use super::{format_money, validate_non_negative, validate_text};
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

/// Lifecycle of a custom-build order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum AssemblyStatus {
    Pending,
    Assembled,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    pub id: u32,
    pub customer_id: u32,
    pub description: String,
    pub price: Decimal,
    pub status: AssemblyStatus,
    pub date: String,
}

impl Record for Assembly {
    const FILE_NAME: &'static str = "assemblies.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.customer_id.to_string(),
            self.description.clone(),
            format_money(self.price),
            self.status.to_string(),
            self.date.clone(),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            customer_id: raw.parse_field(1)?,
            description: raw.text(2)?.to_string(),
            price: raw.parse_field(3)?,
            status: raw.parse_field(4)?,
            date: raw.text(5)?.to_string(),
        })
    }
}

/// Input for opening an assembly order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAssembly {
    pub customer_id: u32,
    #[validate(length(max = 200), custom = "validate_text")]
    pub description: String,
    #[validate(custom = "validate_non_negative")]
    pub price: Decimal,
}
