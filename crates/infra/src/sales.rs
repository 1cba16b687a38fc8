//! Sale Record Manager: creates and cancels sales with their stock effect
//! applied exactly once.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use stockroom_core::{Aggregate, DomainError, ProductId, Quantity, SaleId};
use stockroom_events::MovementReason;
use stockroom_products::Product;
use stockroom_sales::{CancelSale, RecordSale, Sale, SaleCommand, SalesChannel};

use crate::error::ServiceError;
use crate::ledger::{LedgerStore, UnitOfWork, finish};
use crate::stock_mutator::StockMutator;

/// A created sale and the product as it stands after the decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedSale {
    pub sale: Sale,
    pub product: Product,
}

/// A cancelled sale and the product's stock after the units were returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelledSale {
    pub sale: Sale,
    pub stock: i64,
}

/// Revenue over all non-cancelled sales, in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Revenue {
    pub total_revenue: u64,
    pub sales_counted: usize,
}

#[derive(Debug, Clone)]
pub struct SaleRecordManager<S> {
    store: S,
    mutator: StockMutator,
}

impl<S> SaleRecordManager<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            mutator: StockMutator::new(),
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Decrement stock and insert the sale in one unit of work.
    #[instrument(skip(self), fields(product_id = %product_id, channel = %channel), err)]
    pub async fn create_sale(
        &self,
        product_id: ProductId,
        channel: SalesChannel,
        quantity: i64,
    ) -> Result<RecordedSale, ServiceError> {
        // Fail fast, before any stock read.
        Quantity::new(quantity)?;

        let mut unit = self.store.begin().await?;
        let result = self
            .record_in(unit.as_mut(), product_id, channel, quantity, None)
            .await;
        let recorded = finish(unit, result).await?;

        info!(
            sale_id = %recorded.sale.id_typed(),
            stock = recorded.product.stock(),
            "sale recorded"
        );
        Ok(recorded)
    }

    /// Decrement-then-record inside the caller's unit. Shared with order ingestion.
    pub(crate) async fn record_in(
        &self,
        unit: &mut dyn UnitOfWork,
        product_id: ProductId,
        channel: SalesChannel,
        quantity: i64,
        external_order_id: Option<String>,
    ) -> Result<RecordedSale, ServiceError> {
        let sale_id = SaleId::new();
        let reason = match &external_order_id {
            Some(order_id) => MovementReason::ExternalOrder {
                sale_id,
                external_order_id: order_id.clone(),
            },
            None => MovementReason::Sale { sale_id },
        };

        let change = self
            .mutator
            .decrement(unit, product_id, quantity, reason)
            .await?;

        let mut sale = Sale::empty(sale_id);
        sale.execute(&SaleCommand::RecordSale(RecordSale {
            sale_id,
            product_id,
            channel,
            quantity,
            external_order_id,
            occurred_at: Utc::now(),
        }))?;
        unit.save_sale(&sale).await?;

        Ok(RecordedSale {
            sale,
            product: change.product,
        })
    }

    /// Return the sale's units to stock and mark it cancelled. One-way.
    #[instrument(skip(self, reason), fields(sale_id = %sale_id), err)]
    pub async fn cancel_sale(
        &self,
        sale_id: SaleId,
        reason: &str,
    ) -> Result<CancelledSale, ServiceError> {
        if reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required").into());
        }

        let mut unit = self.store.begin().await?;
        let result = self.cancel_in(unit.as_mut(), sale_id, reason).await;
        let cancelled = finish(unit, result).await?;

        info!(stock = cancelled.stock, "sale cancelled");
        Ok(cancelled)
    }

    async fn cancel_in(
        &self,
        unit: &mut dyn UnitOfWork,
        sale_id: SaleId,
        reason: &str,
    ) -> Result<CancelledSale, ServiceError> {
        let mut sale = unit
            .sale(sale_id)
            .await?
            .ok_or(DomainError::SaleNotFound(sale_id))?;

        let command = SaleCommand::CancelSale(CancelSale {
            sale_id,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        });
        // Decide first (AlreadyCancelled leaves stock alone), then move stock, then apply.
        let events = sale.handle(&command)?;

        let change = self
            .mutator
            .increment(
                unit,
                sale.product_id(),
                sale.quantity(),
                MovementReason::SaleCancelled { sale_id },
            )
            .await?;

        for event in &events {
            sale.apply(event);
        }
        unit.save_sale(&sale).await?;

        Ok(CancelledSale {
            sale,
            stock: change.new_stock(),
        })
    }

    pub async fn get_sale(&self, sale_id: SaleId) -> Result<Sale, ServiceError> {
        self.store
            .find_sale(sale_id)
            .await?
            .ok_or_else(|| DomainError::SaleNotFound(sale_id).into())
    }

    /// All sales, most recent first.
    pub async fn list_sales(&self) -> Result<Vec<Sale>, ServiceError> {
        Ok(self.store.list_sales().await?)
    }

    /// Sales (cancelled included) that occurred on `date`, a UTC calendar day.
    pub async fn sales_on(&self, date: NaiveDate) -> Result<Vec<Sale>, ServiceError> {
        let sales = self.store.list_sales().await?;
        Ok(sales
            .into_iter()
            .filter(|s| s.occurred_at().date_naive() == date)
            .collect())
    }

    /// `price × quantity` over non-cancelled sales at current product prices.
    ///
    /// Saturates at `u64::MAX`.
    pub async fn revenue(&self) -> Result<Revenue, ServiceError> {
        let prices: HashMap<ProductId, u64> = self
            .store
            .list_products()
            .await?
            .iter()
            .map(|p| (p.id_typed(), p.details().price))
            .collect();
        let sales = self.store.list_sales().await?;

        let mut revenue = Revenue {
            total_revenue: 0,
            sales_counted: 0,
        };
        for sale in sales.iter().filter(|s| !s.is_cancelled()) {
            let Some(price) = prices.get(&sale.product_id()) else {
                continue;
            };
            let quantity = u64::try_from(sale.quantity()).unwrap_or(0);
            revenue.total_revenue = revenue
                .total_revenue
                .saturating_add(price.saturating_mul(quantity));
            revenue.sales_counted += 1;
        }
        Ok(revenue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{new_product, seeded};
    use crate::catalog::ProductCatalog;
    use crate::ledger::InMemoryLedger;
    use std::sync::Arc;

    async fn setup(
        stock: i64,
    ) -> (
        ProductCatalog<Arc<InMemoryLedger>>,
        SaleRecordManager<Arc<InMemoryLedger>>,
        Product,
    ) {
        let (ledger, catalog) = seeded();
        let product = catalog
            .register(new_product("Vitamin C", Some("8690000000012"), stock))
            .await
            .unwrap();
        (catalog, SaleRecordManager::new(ledger), product)
    }

    #[tokio::test]
    async fn create_decrements_and_records() {
        let (catalog, sales, product) = setup(10).await;

        let recorded = sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 3)
            .await
            .unwrap();

        assert_eq!(recorded.product.stock(), 7);
        assert!(!recorded.sale.is_cancelled());
        assert_eq!(recorded.sale.quantity(), 3);
        assert_eq!(sales.get_sale(recorded.sale.id_typed()).await.unwrap(), recorded.sale);
        assert_eq!(catalog.get(product.id_typed()).await.unwrap().stock(), 7);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_trace() {
        let (catalog, sales, product) = setup(2).await;

        let err = sales
            .create_sale(product.id_typed(), SalesChannel::Marketplace, 5)
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InsufficientStock { available: 2, .. })));

        assert!(sales.list_sales().await.unwrap().is_empty());
        assert!(catalog.movements(product.id_typed()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_quantity_is_rejected_up_front() {
        let (_, sales, _) = setup(2).await;
        let err = sales
            .create_sale(ProductId::new(), SalesChannel::InStore, -1)
            .await
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::InvalidQuantity(-1)));
    }

    #[tokio::test]
    async fn cancel_restores_stock_once() {
        let (catalog, sales, product) = setup(10).await;
        let recorded = sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 4)
            .await
            .unwrap();
        let sale_id = recorded.sale.id_typed();

        let cancelled = sales.cancel_sale(sale_id, "customer return").await.unwrap();
        assert_eq!(cancelled.stock, 10);
        assert!(cancelled.sale.is_cancelled());
        assert_eq!(
            cancelled.sale.cancellation().map(|c| c.reason.as_str()),
            Some("customer return")
        );

        let err = sales.cancel_sale(sale_id, "again").await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::AlreadyCancelled(sale_id)));
        assert_eq!(catalog.get(product.id_typed()).await.unwrap().stock(), 10);
    }

    #[tokio::test]
    async fn cancel_validates_reason_before_lookup() {
        let (_, sales, _) = setup(1).await;
        let err = sales.cancel_sale(SaleId::new(), "   ").await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));

        let missing = SaleId::new();
        let err = sales.cancel_sale(missing, "typo").await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::SaleNotFound(missing)));
    }

    #[tokio::test]
    async fn revenue_excludes_cancelled_sales() {
        let (catalog, sales, product) = setup(10).await;
        let other = catalog
            .register(new_product("Zinc", None, 5))
            .await
            .unwrap();

        sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 3)
            .await
            .unwrap();
        sales
            .create_sale(other.id_typed(), SalesChannel::Marketplace, 2)
            .await
            .unwrap();
        let refunded = sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 4)
            .await
            .unwrap();
        sales
            .cancel_sale(refunded.sale.id_typed(), "wrong item")
            .await
            .unwrap();

        let revenue = sales.revenue().await.unwrap();
        assert_eq!(revenue.sales_counted, 2);
        assert_eq!(revenue.total_revenue, 5 * 1_000);
    }

    #[tokio::test]
    async fn sales_on_filters_by_calendar_day() {
        let (_, sales, product) = setup(10).await;
        let recorded = sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 1)
            .await
            .unwrap();
        sales
            .cancel_sale(recorded.sale.id_typed(), "void")
            .await
            .unwrap();

        let day = recorded.sale.occurred_at().date_naive();
        let on_day = sales.sales_on(day).await.unwrap();
        assert_eq!(on_day.len(), 1);
        assert!(on_day[0].is_cancelled());

        let day_before = day.pred_opt().unwrap();
        assert!(sales.sales_on(day_before).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let (_, sales, product) = setup(10).await;
        let first = sales
            .create_sale(product.id_typed(), SalesChannel::InStore, 1)
            .await
            .unwrap();
        let second = sales
            .create_sale(product.id_typed(), SalesChannel::External, 1)
            .await
            .unwrap();

        let listed = sales.list_sales().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id_typed(), second.sale.id_typed());
        assert_eq!(listed[1].id_typed(), first.sale.id_typed());
    }
}
