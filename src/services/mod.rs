//! Entity services. Every operation takes the caller's [`Session`] and checks
//! its capability before any record file is touched.
//!
//! [`Session`]: crate::auth::Session

// Inventory and sales
pub mod inventory;
pub mod sales;

// Customers and service jobs
pub mod assemblies;
pub mod customers;
pub mod repairs;

// Accounts
pub mod users;

// Read-only consumers and maintenance
pub mod backup;
pub mod reports;

use std::fmt::Display;
use std::str::FromStr;

use crate::errors::{Result, ServiceError};

/// Parses a status name from operator input, reporting the accepted names on failure.
pub fn parse_status<T>(input: &str) -> Result<T>
where
    T: FromStr + strum::IntoEnumIterator + Display,
{
    input.trim().parse().map_err(|_| {
        let accepted: Vec<String> = T::iter().map(|status| status.to_string()).collect();
        ServiceError::ValidationError(format!(
            "unrecognized status '{}'; expected one of: {}",
            input.trim(),
            accepted.join(", ")
        ))
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssemblyStatus, RepairStatus};
    use assert_matches::assert_matches;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(
            parse_status::<RepairStatus>(" in progress ").unwrap(),
            RepairStatus::InProgress
        );
        assert_eq!(
            parse_status::<AssemblyStatus>("delivered").unwrap(),
            AssemblyStatus::Delivered
        );
    }

    #[test]
    fn unknown_status_lists_alternatives() {
        let err = parse_status::<AssemblyStatus>("Shipped").unwrap_err();
        assert_matches!(&err, ServiceError::ValidationError(msg) if msg.contains("Pending, Assembled, Delivered"));
    }
}
