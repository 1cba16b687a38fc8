//! Product ledger domain module.
//!
//! Holds the product record and the pure decision logic for every stock
//! change (no IO, no HTTP, no storage).

pub mod lookup;
pub mod product;
pub mod stock_level;

pub use lookup::ProductLookup;
pub use product::{
    DecrementStock, IncrementStock, NewProduct, Product, ProductDetails, SetStock, StockChanged,
    StockCommand, StockEvent, Unit,
};
pub use stock_level::StockLevel;
