use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::auth::{Capability, Session};
use crate::errors::{Result, ServiceError};
use crate::models::{Product, Sale, MAX_STOCK};
use crate::store::{FlatFileStore, RecordStore};

/// Service for read-only reports over products and sales
pub struct ReportService<P = FlatFileStore<Product>, S = FlatFileStore<Sale>> {
    products: Arc<P>,
    sales: Arc<S>,
}

/// Products at or below a stock threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockReport {
    pub threshold: u32,
    pub products: Vec<Product>,
}

/// Sales totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub transactions: usize,
    pub units_sold: u64,
    pub revenue: Decimal,
    pub average_sale: Decimal,
}

/// Revenue against current product cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAnalysis {
    pub transactions: usize,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
}

impl<P, S> ReportService<P, S>
where
    P: RecordStore<Product>,
    S: RecordStore<Sale>,
{
    pub fn new(products: Arc<P>, sales: Arc<S>) -> Self {
        Self { products, sales }
    }

    /// Products whose stock is at or below `threshold`, in file order
    #[instrument(skip(self, session))]
    pub fn low_stock(&self, session: &Session, threshold: u32) -> Result<LowStockReport> {
        session.require(Capability::ViewReports)?;
        if threshold > MAX_STOCK {
            return Err(ServiceError::ValidationError(format!(
                "threshold must be between 0 and {}",
                MAX_STOCK
            )));
        }

        let products = self
            .products
            .scan()?
            .filter(|product| product.as_ref().map_or(true, |p| p.stock <= threshold))
            .collect::<Result<Vec<_>>>()?;
        Ok(LowStockReport {
            threshold,
            products,
        })
    }

    #[instrument(skip(self, session))]
    pub fn sales_summary(&self, session: &Session) -> Result<SalesSummary> {
        session.require(Capability::ViewReports)?;

        let mut transactions = 0usize;
        let mut units_sold = 0u64;
        let mut revenue = Decimal::ZERO;
        for sale in self.sales.scan()? {
            let sale = sale?;
            transactions += 1;
            units_sold += u64::from(sale.quantity);
            revenue += sale.total_price;
        }

        Ok(SalesSummary {
            transactions,
            units_sold,
            revenue,
            average_sale: ratio(revenue, Decimal::from(transactions)),
        })
    }

    /// Cost is each sale's quantity times the product's current cost price.
    /// Sales of products that no longer exist count at zero cost.
    #[instrument(skip(self, session))]
    pub fn profit_analysis(&self, session: &Session) -> Result<ProfitAnalysis> {
        session.require(Capability::ViewReports)?;

        let mut cost_prices = HashMap::new();
        for product in self.products.scan()? {
            let product = product?;
            cost_prices.entry(product.id).or_insert(product.cost_price);
        }

        let mut transactions = 0usize;
        let mut revenue = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        for sale in self.sales.scan()? {
            let sale = sale?;
            transactions += 1;
            revenue += sale.total_price;
            if let Some(unit_cost) = cost_prices.get(&sale.product_id) {
                cost += *unit_cost * Decimal::from(sale.quantity);
            }
        }

        let profit = revenue - cost;
        Ok(ProfitAnalysis {
            transactions,
            revenue,
            cost,
            profit,
            margin_percent: ratio(profit * Decimal::ONE_HUNDRED, revenue),
        })
    }
}

/// `numerator / denominator` to two places, or zero when there is nothing to divide by.
fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        (numerator / denominator).round_dp(2)
    }
}
