//! `stockroom-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult, ErrorClass};
pub use id::{CategoryId, CountSessionId, MovementId, ProductId, SaleId};
pub use value_object::{Quantity, ValueObject};
