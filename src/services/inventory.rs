use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{Capability, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{NewProduct, Product};
use crate::store::{FlatFileStore, RecordStore};

/// Service for managing the product catalogue and stock levels
pub struct InventoryService<S = FlatFileStore<Product>> {
    products: Arc<S>,
}

impl<S> Clone for InventoryService<S> {
    fn clone(&self) -> Self {
        Self {
            products: Arc::clone(&self.products),
        }
    }
}

impl<S> InventoryService<S>
where
    S: RecordStore<Product>,
{
    pub fn new(products: Arc<S>) -> Self {
        Self { products }
    }

    /// Creates a new product with the next free id
    #[instrument(skip(self, session, input), fields(name = %input.name))]
    pub fn add_product(&self, session: &Session, input: NewProduct) -> Result<Product> {
        session.require(Capability::ManageProducts)?;
        input.validate()?;
        if input.sell_price < input.cost_price {
            return Err(ServiceError::ValidationError(format!(
                "sell price {} is below cost price {}",
                input.sell_price, input.cost_price
            )));
        }

        let product = input.into_product(self.products.next_id()?);
        self.products.append(&product)?;
        info!(product_id = product.id, "product added");
        Ok(product)
    }

    pub fn list_products(&self, _session: &Session) -> Result<Vec<Product>> {
        self.products.load_all()
    }

    /// Case-sensitive substring match on name, category or brand
    pub fn search_products(&self, _session: &Session, term: &str) -> Result<Vec<Product>> {
        self.products
            .scan()?
            .filter(|product| product.as_ref().map_or(true, |p| p.matches(term)))
            .collect()
    }

    pub fn find_product(&self, _session: &Session, id: u32) -> Result<Product> {
        self.lookup(id)
    }

    /// Applies a signed stock change; the result is clamped at zero
    #[instrument(skip(self, session))]
    pub fn adjust_stock(&self, session: &Session, product_id: u32, delta: i64) -> Result<Product> {
        session.require(Capability::ManageProducts)?;
        self.apply_stock_delta(product_id, delta)
    }

    pub(crate) fn lookup(&self, id: u32) -> Result<Product> {
        self.products
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Stock change without a capability check, for callers that have already
    /// authorised a wider operation such as a sale.
    pub(crate) fn apply_stock_delta(&self, product_id: u32, delta: i64) -> Result<Product> {
        let product = self
            .products
            .update_by_id(product_id, |mut product| {
                product.adjust_stock(delta);
                product
            })
            .map_err(|err| err.or_not_found(|| format!("Product {} not found", product_id)))?;

        info!(product_id, delta, stock = product.stock, "stock adjusted");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Permissions;
    use crate::services::testing::session;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn keyboard() -> NewProduct {
        NewProduct {
            name: "Keyboard".into(),
            category: "Peripherals".into(),
            brand: "Acme".into(),
            cost_price: dec!(12.50),
            sell_price: dec!(20),
            stock: 4,
            min_stock_level: 1,
        }
    }

    fn service(dir: &TempDir) -> InventoryService {
        InventoryService::new(Arc::new(FlatFileStore::new(dir.path())))
    }

    #[test]
    fn add_assigns_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let inventory = service(&dir);
        let admin = session(Permissions::all());

        assert_eq!(inventory.add_product(&admin, keyboard()).unwrap().id, 1);
        assert_eq!(inventory.add_product(&admin, keyboard()).unwrap().id, 2);
    }

    #[test]
    fn rejects_sell_price_below_cost() {
        let dir = TempDir::new().unwrap();
        let mut input = keyboard();
        input.sell_price = dec!(10);
        assert_matches!(
            service(&dir).add_product(&session(Permissions::all()), input),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn rejects_stock_above_limit() {
        let dir = TempDir::new().unwrap();
        let mut input = keyboard();
        input.stock = 10_001;
        assert_matches!(
            service(&dir).add_product(&session(Permissions::all()), input),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn adjust_requires_capability_before_touching_storage() {
        let dir = TempDir::new().unwrap();
        let inventory = service(&dir);
        assert_matches!(
            inventory.adjust_stock(&session(Permissions::default()), 1, 5),
            Err(ServiceError::PermissionDenied(_))
        );
        assert!(!dir.path().join("products.csv").exists());
    }

    #[test]
    fn adjust_unknown_product_is_not_found() {
        let dir = TempDir::new().unwrap();
        let inventory = service(&dir);
        let admin = session(Permissions::all());
        inventory.add_product(&admin, keyboard()).unwrap();

        let err = inventory.adjust_stock(&admin, 9, 1).unwrap_err();
        assert_eq!(err.to_string(), "Not found: Product 9 not found");
    }

    #[test]
    fn search_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let inventory = service(&dir);
        let admin = session(Permissions::all());
        inventory.add_product(&admin, keyboard()).unwrap();

        assert_eq!(inventory.search_products(&admin, "Peri").unwrap().len(), 1);
        assert!(inventory.search_products(&admin, "peri").unwrap().is_empty());
    }
}
