//! Sale records domain module.
//!
//! Business rules for recording and cancelling sales, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock effects are
//! applied by the caller in the same unit of work.

pub mod channel;
pub mod sale;

pub use channel::SalesChannel;
pub use sale::{
    CancelSale, Cancellation, RecordSale, Sale, SaleCancelled, SaleCommand, SaleEvent,
    SaleRecord, SaleRecorded,
};
