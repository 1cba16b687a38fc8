//! Infrastructure layer: transactional ledger storage and the services that
//! change stock through it.

pub mod catalog;
pub mod counts;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod sales;
pub mod stock_mutator;

#[cfg(test)]
mod integration_tests;

pub use catalog::ProductCatalog;
pub use counts::{CompletedSession, InventoryCountEngine, NewCountSession, Reconciled};
pub use error::ServiceError;
pub use ingestion::{IngestionOutcome, OrderIngestionAdapter, WebhookVerifier};
pub use ledger::{InMemoryLedger, LedgerStore, PostgresLedger, StoreError, UnitOfWork};
pub use sales::{CancelledSale, RecordedSale, Revenue, SaleRecordManager};
pub use stock_mutator::{StockChange, StockMutator};
