/*!
 * # Permissions Module
 *
 * Capabilities a user account may hold. Each one maps to a single boolean
 * column of the users file and gates a group of shop operations.
 */

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A capability flag checked before an operation touches storage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[strum(to_string = "can_manage_products", serialize = "products")]
    ManageProducts,
    #[strum(to_string = "can_manage_customers", serialize = "customers")]
    ManageCustomers,
    #[strum(to_string = "can_manage_sales", serialize = "sales")]
    ManageSales,
    #[strum(to_string = "can_view_reports", serialize = "reports")]
    ViewReports,
    #[strum(to_string = "can_manage_users", serialize = "users")]
    ManageUsers,
}
