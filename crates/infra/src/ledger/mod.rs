//! Transactional storage for the product ledger and the records that move it.
//!
//! Every stock-changing operation runs inside one [`UnitOfWork`]: the stock
//! write, its triggering record (sale, count session) and its audit movement
//! are committed together or not at all.
//!
//! ## Guarantees
//!
//! - Reads of a product through a unit serialize against every other unit
//!   touching the same product until commit/rollback (no stale read-then-write).
//! - Nothing written through a unit is visible to others before `commit`.
//! - Dropping a unit without committing discards its writes.
//!
//! Two backends: [`InMemoryLedger`] (tests/dev) and [`PostgresLedger`].

mod in_memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::{CountSessionId, ProductId, SaleId};
use stockroom_events::StockMovement;
use stockroom_inventory::CountSession;
use stockroom_products::Product;
use stockroom_sales::Sale;

use crate::error::ServiceError;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

/// Storage failure (as opposed to a domain rule violation).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (e.g. duplicate barcode).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend failed (connection, constraint, IO).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted row could not be decoded into its domain type.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// One atomic, all-or-nothing group of reads and writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load a product for update; blocks other units touching it until this one ends.
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn product_by_barcode(&mut self, barcode: &str) -> Result<Option<Product>, StoreError>;

    async fn product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Product>, StoreError>;

    /// Active products in registration order.
    async fn active_products(&mut self) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Persist a product's stock and version.
    async fn update_stock(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError>;

    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError>;

    /// Insert or update a sale.
    async fn save_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;

    async fn session(&mut self, id: CountSessionId) -> Result<Option<CountSession>, StoreError>;

    /// Insert or update a count session (items included).
    async fn save_session(&mut self, session: &CountSession) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Ledger storage backend.
///
/// Writes only happen through a unit opened with [`LedgerStore::begin`]. The
/// query methods read committed state and must not be called while the same
/// task holds an open unit.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError>;

    /// All products in registration order.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Movements of one product, oldest first.
    async fn list_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError>;

    async fn find_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError>;

    /// All sales, most recent first.
    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError>;

    async fn find_session(&self, id: CountSessionId) -> Result<Option<CountSession>, StoreError>;

    /// All count sessions, most recent first.
    async fn list_sessions(&self) -> Result<Vec<CountSession>, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_product(id).await
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_product_by_barcode(barcode).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn list_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).list_movements(product_id).await
    }

    async fn find_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        (**self).find_sale(id).await
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError> {
        (**self).list_sales().await
    }

    async fn find_session(&self, id: CountSessionId) -> Result<Option<CountSession>, StoreError> {
        (**self).find_session(id).await
    }

    async fn list_sessions(&self) -> Result<Vec<CountSession>, StoreError> {
        (**self).list_sessions().await
    }
}

/// Commit on success, roll back on failure.
///
/// The caller sees the original error even if the rollback itself fails.
pub(crate) async fn finish<T>(
    unit: Box<dyn UnitOfWork>,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
