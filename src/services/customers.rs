use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{Capability, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{Customer, NewCustomer};
use crate::store::{FlatFileStore, RecordStore};

pub struct CustomerService<S = FlatFileStore<Customer>> {
    customers: Arc<S>,
}

impl<S> CustomerService<S>
where
    S: RecordStore<Customer>,
{
    pub fn new(customers: Arc<S>) -> Self {
        Self { customers }
    }

    #[instrument(skip(self, session, input), fields(name = %input.name))]
    pub fn add_customer(&self, session: &Session, input: NewCustomer) -> Result<Customer> {
        session.require(Capability::ManageCustomers)?;
        input.validate()?;

        let customer = input.into_customer(self.customers.next_id()?);
        self.customers.append(&customer)?;
        info!(customer_id = customer.id, "customer added");
        Ok(customer)
    }

    pub fn list_customers(&self, _session: &Session) -> Result<Vec<Customer>> {
        self.customers.load_all()
    }

    /// Substring match on name, phone or email
    pub fn search_customers(&self, _session: &Session, term: &str) -> Result<Vec<Customer>> {
        self.customers
            .scan()?
            .filter(|customer| customer.as_ref().map_or(true, |c| c.matches(term)))
            .collect()
    }

    pub fn find_customer(&self, _session: &Session, id: u32) -> Result<Customer> {
        find_customer(self.customers.as_ref(), id)
    }
}

/// Referential check shared by the services that attach records to a customer.
pub(crate) fn find_customer<S>(customers: &S, id: u32) -> Result<Customer>
where
    S: RecordStore<Customer>,
{
    customers
        .find_by_id(id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
}
