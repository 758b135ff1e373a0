use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use super::customers::find_customer;
use crate::auth::{Capability, Session};
use crate::errors::Result;
use crate::models::{timestamp_now, Assembly, AssemblyStatus, Customer, NewAssembly};
use crate::store::{FlatFileStore, RecordStore};

/// Service for custom-build orders
pub struct AssemblyService<S = FlatFileStore<Assembly>, C = FlatFileStore<Customer>> {
    assemblies: Arc<S>,
    customers: Arc<C>,
}

impl<S, C> AssemblyService<S, C>
where
    S: RecordStore<Assembly>,
    C: RecordStore<Customer>,
{
    pub fn new(assemblies: Arc<S>, customers: Arc<C>) -> Self {
        Self {
            assemblies,
            customers,
        }
    }

    #[instrument(skip(self, session, input), fields(customer_id = input.customer_id))]
    pub fn create_assembly(&self, session: &Session, input: NewAssembly) -> Result<Assembly> {
        session.require(Capability::ManageSales)?;
        input.validate()?;
        find_customer(self.customers.as_ref(), input.customer_id)?;

        let assembly = Assembly {
            id: self.assemblies.next_id()?,
            customer_id: input.customer_id,
            description: input.description,
            price: input.price,
            status: AssemblyStatus::Pending,
            date: timestamp_now(),
        };
        self.assemblies.append(&assembly)?;
        info!(assembly_id = assembly.id, "assembly ordered");
        Ok(assembly)
    }

    pub fn list_assemblies(&self, session: &Session) -> Result<Vec<Assembly>> {
        session.require(Capability::ManageSales)?;
        self.assemblies.load_all()
    }

    #[instrument(skip(self, session))]
    pub fn set_status(
        &self,
        session: &Session,
        id: u32,
        status: AssemblyStatus,
    ) -> Result<Assembly> {
        session.require(Capability::ManageSales)?;

        let assembly = self
            .assemblies
            .update_by_id(id, |mut assembly| {
                assembly.status = status;
                assembly
            })
            .map_err(|err| err.or_not_found(|| format!("Assembly {} not found", id)))?;

        info!(assembly_id = id, status = %assembly.status, "assembly status updated");
        Ok(assembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCustomer, Permissions};
    use crate::services::customers::CustomerService;
    use crate::errors::ServiceError;
    use crate::services::testing::session;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn status_change_rewrites_only_the_target() {
        let dir = TempDir::new().unwrap();
        let admin = session(Permissions::all());
        let customers: Arc<FlatFileStore<Customer>> = Arc::new(FlatFileStore::new(dir.path()));
        CustomerService::new(Arc::clone(&customers))
            .add_customer(
                &admin,
                NewCustomer {
                    name: "Bo".into(),
                    phone: "555-0102".into(),
                    email: "bo@example.com".into(),
                    address: "3 Oak St".into(),
                },
            )
            .unwrap();
        let assemblies: AssemblyService =
            AssemblyService::new(Arc::new(FlatFileStore::new(dir.path())), customers);

        for description in ["Gaming PC, RGB", "Office PC"] {
            assemblies
                .create_assembly(
                    &admin,
                    NewAssembly {
                        customer_id: 1,
                        description: description.into(),
                        price: dec!(999),
                    },
                )
                .unwrap();
        }

        let updated = assemblies
            .set_status(&admin, 1, AssemblyStatus::Assembled)
            .unwrap();
        assert_eq!(updated.status, AssemblyStatus::Assembled);
        assert_eq!(updated.description, "Gaming PC, RGB");

        let statuses: Vec<_> = assemblies
            .list_assemblies(&admin)
            .unwrap()
            .into_iter()
            .map(|a| a.status)
            .collect();
        assert_eq!(statuses, vec![AssemblyStatus::Assembled, AssemblyStatus::Pending]);

        let before = fs::read(dir.path().join("assemblies.csv")).unwrap();
        assert_matches!(
            assemblies.set_status(&admin, 7, AssemblyStatus::Delivered),
            Err(ServiceError::NotFound(_))
        );
        assert_eq!(fs::read(dir.path().join("assemblies.csv")).unwrap(), before);
    }
}
