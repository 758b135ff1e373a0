use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use super::customers::find_customer;
use crate::auth::{Capability, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{timestamp_now, Customer, NewRepair, Repair, RepairStatus};
use crate::store::{FlatFileStore, RecordStore};

/// Service for repair jobs brought in by customers
pub struct RepairService<S = FlatFileStore<Repair>, C = FlatFileStore<Customer>> {
    repairs: Arc<S>,
    customers: Arc<C>,
}

impl<S, C> RepairService<S, C>
where
    S: RecordStore<Repair>,
    C: RecordStore<Customer>,
{
    pub fn new(repairs: Arc<S>, customers: Arc<C>) -> Self {
        Self { repairs, customers }
    }

    /// Opens a job in `Received` state
    #[instrument(skip(self, session, input), fields(customer_id = input.customer_id))]
    pub fn create_repair(&self, session: &Session, input: NewRepair) -> Result<Repair> {
        session.require(Capability::ManageSales)?;
        input.validate()?;
        find_customer(self.customers.as_ref(), input.customer_id)?;

        let repair = Repair {
            id: self.repairs.next_id()?,
            customer_id: input.customer_id,
            device: input.device,
            problem: input.problem,
            status: RepairStatus::Received,
            cost_estimate: input.cost_estimate,
            date_received: timestamp_now(),
            date_completed: String::new(),
        };
        self.repairs.append(&repair)?;
        info!(repair_id = repair.id, "repair received");
        Ok(repair)
    }

    pub fn list_repairs(&self, session: &Session) -> Result<Vec<Repair>> {
        session.require(Capability::ManageSales)?;
        self.repairs.load_all()
    }

    pub fn find_repair(&self, session: &Session, id: u32) -> Result<Repair> {
        session.require(Capability::ManageSales)?;
        self.repairs
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Repair {} not found", id)))
    }

    /// Moves a job to `status`, stamping the completion time whenever an open
    /// job enters `Completed` or `Collected`.
    #[instrument(skip(self, session))]
    pub fn set_status(&self, session: &Session, id: u32, status: RepairStatus) -> Result<Repair> {
        session.require(Capability::ManageSales)?;

        let repair = self
            .repairs
            .update_by_id(id, |mut repair| {
                repair.transition(status, timestamp_now);
                repair
            })
            .map_err(|err| err.or_not_found(|| format!("Repair {} not found", id)))?;

        info!(repair_id = id, status = %repair.status, "repair status updated");
        Ok(repair)
    }
}
