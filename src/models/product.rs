use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{format_money, validate_non_negative, validate_text};
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub cost_price: Decimal,
    pub sell_price: Decimal,
    pub stock: u32,
    pub min_stock_level: u32,
}

impl Product {
    /// Applies a signed stock change, clamping at zero.
    pub fn adjust_stock(&mut self, delta: i64) {
        let adjusted = (i64::from(self.stock) + delta).clamp(0, i64::from(u32::MAX));
        self.stock = adjusted as u32;
    }

    pub fn is_below_minimum(&self) -> bool {
        self.stock < self.min_stock_level
    }

    pub fn matches(&self, term: &str) -> bool {
        self.name.contains(term) || self.category.contains(term) || self.brand.contains(term)
    }
}

impl Record for Product {
    const FILE_NAME: &'static str = "products.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.category.clone(),
            self.brand.clone(),
            format_money(self.cost_price),
            format_money(self.sell_price),
            self.stock.to_string(),
            self.min_stock_level.to_string(),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            name: raw.text(1)?.to_string(),
            category: raw.text(2)?.to_string(),
            brand: raw.text(3)?.to_string(),
            cost_price: raw.parse_field(4)?,
            sell_price: raw.parse_field(5)?,
            stock: raw.parse_field(6)?,
            min_stock_level: raw.parse_field(7)?,
        })
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(max = 100), custom = "validate_text")]
    pub name: String,
    #[validate(length(max = 50), custom = "validate_text")]
    pub category: String,
    #[validate(length(max = 50), custom = "validate_text")]
    pub brand: String,
    #[validate(custom = "validate_non_negative")]
    pub cost_price: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub sell_price: Decimal,
    #[validate(range(max = 10000))]
    pub stock: u32,
    #[validate(range(max = 10000))]
    pub min_stock_level: u32,
}

impl NewProduct {
    pub fn into_product(self, id: u32) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            brand: self.brand,
            cost_price: self.cost_price,
            sell_price: self.sell_price,
            stock: self.stock,
            min_stock_level: self.min_stock_level,
        }
    }
}
