use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};
use validator::Validate;

use super::customers::find_customer;
use super::inventory::InventoryService;
use crate::auth::{Capability, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{timestamp_now, Customer, NewSale, Product, Sale};
use crate::store::{FlatFileStore, RecordStore};

/// Service for recording sales against stocked products
pub struct SalesService<
    S = FlatFileStore<Sale>,
    P = FlatFileStore<Product>,
    C = FlatFileStore<Customer>,
> {
    sales: Arc<S>,
    inventory: InventoryService<P>,
    customers: Arc<C>,
}

impl<S, P, C> SalesService<S, P, C>
where
    S: RecordStore<Sale>,
    P: RecordStore<Product>,
    C: RecordStore<Customer>,
{
    pub fn new(sales: Arc<S>, inventory: InventoryService<P>, customers: Arc<C>) -> Self {
        Self {
            sales,
            inventory,
            customers,
        }
    }

    /// Records a sale and takes the sold units out of stock.
    ///
    /// The total is the product's current sell price times the quantity,
    /// rounded to cents. The sale line is appended before stock is adjusted.
    #[instrument(skip(self, session, input), fields(product_id = input.product_id, quantity = input.quantity))]
    pub fn create_sale(&self, session: &Session, input: NewSale) -> Result<Sale> {
        session.require(Capability::ManageSales)?;
        input.validate()?;

        let product = self.inventory.lookup(input.product_id)?;
        find_customer(self.customers.as_ref(), input.customer_id)?;

        if input.quantity > product.stock {
            return Err(ServiceError::ValidationError(format!(
                "insufficient stock for product {}: requested {}, available {}",
                product.id, input.quantity, product.stock
            )));
        }

        let sale = Sale {
            id: self.sales.next_id()?,
            product_id: product.id,
            customer_id: input.customer_id,
            quantity: input.quantity,
            total_price: (product.sell_price * Decimal::from(input.quantity)).round_dp(2),
            date: timestamp_now(),
            cashier: input.cashier,
        };
        self.sales.append(&sale)?;
        info!(sale_id = sale.id, total = %sale.total_price, "sale recorded");

        self.inventory
            .apply_stock_delta(product.id, -i64::from(sale.quantity))?;
        Ok(sale)
    }

    pub fn list_sales(&self, session: &Session) -> Result<Vec<Sale>> {
        session.require(Capability::ManageSales)?;
        self.sales.load_all()
    }
}
