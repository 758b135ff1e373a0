use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{format_money, validate_text};
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

/// A completed sale. `total_price` is captured when the sale is made and never
/// recomputed from later product prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: u32,
    pub product_id: u32,
    pub customer_id: u32,
    pub quantity: u32,
    pub total_price: Decimal,
    pub date: String,
    pub cashier: String,
}

impl Record for Sale {
    const FILE_NAME: &'static str = "sales.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.product_id.to_string(),
            self.customer_id.to_string(),
            self.quantity.to_string(),
            format_money(self.total_price),
            self.date.clone(),
            self.cashier.clone(),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            product_id: raw.parse_field(1)?,
            customer_id: raw.parse_field(2)?,
            quantity: raw.parse_field(3)?,
            total_price: raw.parse_field(4)?,
            date: raw.text(5)?.to_string(),
            cashier: raw.text(6)?.to_string(),
        })
    }
}

/// Input for recording a sale.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSale {
    pub product_id: u32,
    pub customer_id: u32,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(length(max = 50), custom = "validate_text")]
    pub cashier: String,
}
