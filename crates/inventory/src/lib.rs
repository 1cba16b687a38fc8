//! Inventory count domain module.
//!
//! A count session snapshots stock, collects physical counts and decides what
//! to reconcile. Pure logic; stock itself is changed by the caller.

pub mod count;

pub use count::{
    CompleteCountSession, CountCommand, CountEvent, CountItem, CountSession,
    CountSessionCompleted, CountSessionOpened, CountStarted, CountStatus, CountSummary,
    ItemCounted, OpenCountSession, RecordCount, SnapshotLine,
};
