use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use validator::Validate;

use super::{format_money, validate_non_negative, validate_text};
use crate::store::codec::{FieldError, RawRecord};
use crate::store::Record;

/// Lifecycle of a repair job.
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
pub enum RepairStatus {
    Received,
    #[strum(to_string = "In Progress", serialize = "in_progress")]
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Collected,
}

impl RepairStatus {
    /// Terminal states carry a completion timestamp.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Collected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    pub id: u32,
    pub customer_id: u32,
    pub device: String,
    pub problem: String,
    pub status: RepairStatus,
    pub cost_estimate: Decimal,
    pub date_received: String,
    /// Empty until the job reaches a terminal status.
    pub date_completed: String,
}

impl Repair {
    /// Moves the job to `status`. Moving from an open status into a terminal
    /// one stamps `completed_at`, so a reopened job gets a fresh completion
    /// time. Moves between terminal statuses keep the recorded time.
    pub fn transition(&mut self, status: RepairStatus, completed_at: impl FnOnce() -> String) {
        if status.is_terminal() && !self.status.is_terminal() {
            self.date_completed = completed_at();
        }
        self.status = status;
    }
}

impl Record for Repair {
    const FILE_NAME: &'static str = "repairs.csv";

    fn id(&self) -> u32 {
        self.id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.customer_id.to_string(),
            self.device.clone(),
            self.problem.clone(),
            self.status.to_string(),
            format_money(self.cost_estimate),
            self.date_received.clone(),
            self.date_completed.clone(),
        ]
    }

    fn from_raw(raw: &RawRecord) -> Result<Self, FieldError> {
        Ok(Self {
            id: raw.parse_field(0)?,
            customer_id: raw.parse_field(1)?,
            device: raw.text(2)?.to_string(),
            problem: raw.text(3)?.to_string(),
            status: raw.parse_field(4)?,
            cost_estimate: raw.parse_field(5)?,
            date_received: raw.text(6)?.to_string(),
            // Older files omit the trailing empty completion field.
            date_completed: raw.text(7).unwrap_or_default().to_string(),
        })
    }
}

/// Input for opening a repair job.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRepair {
    pub customer_id: u32,
    #[validate(length(max = 100), custom = "validate_text")]
    pub device: String,
    #[validate(length(max = 200), custom = "validate_text")]
    pub problem: String,
    #[validate(custom = "validate_non_negative")]
    pub cost_estimate: Decimal,
}
