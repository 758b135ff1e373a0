//! Entity records persisted by the shop, one file per type.

pub mod assembly;
pub mod customer;
pub mod product;
pub mod repair;
pub mod sale;
pub mod user;

pub use assembly::{Assembly, AssemblyStatus, NewAssembly};
pub use customer::{Customer, NewCustomer};
pub use product::{NewProduct, Product};
pub use repair::{NewRepair, Repair, RepairStatus};
pub use sale::{NewSale, Sale};
pub use user::{NewUser, Permissions, User};

use chrono::Local;
use rust_decimal::Decimal;
use validator::ValidationError;

/// Format of every timestamp stored in the record files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Upper bound accepted for stock quantities and stock thresholds.
pub const MAX_STOCK: u32 = 10_000;

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Currency amounts are persisted with exactly two decimal places.
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Required text: not blank, and free of line breaks since every record is one line.
pub(crate) fn validate_text(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(ValidationError::new("single_line"));
    }
    Ok(())
}

pub(crate) fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}
