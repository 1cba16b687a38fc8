//! Domain events and the stock movement audit record.

pub mod event;
pub mod movement;

pub use event::Event;
pub use movement::{MovementReason, StockMovement};
