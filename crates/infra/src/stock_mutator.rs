//! The only writer of product stock.
//!
//! Each operation loads the product through the caller's unit of work (taking
//! its per-product lock), lets the `Product` aggregate decide, writes the new
//! stock and appends the audit movement. Nothing is committed here: the caller
//! owns the unit and commits the stock change together with its own writes.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};

use stockroom_core::{Aggregate, DomainError, ProductId, Quantity};
use stockroom_events::{Event, MovementReason, StockMovement};
use stockroom_products::{DecrementStock, IncrementStock, Product, SetStock, StockCommand};

use crate::error::ServiceError;
use crate::ledger::UnitOfWork;

/// Before/after view of one stock write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChange {
    /// Product as it stands after the write.
    pub product: Product,
    pub previous: i64,
}

impl StockChange {
    pub fn new_stock(&self) -> i64 {
        self.product.stock()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StockMutator;

impl StockMutator {
    pub fn new() -> Self {
        Self
    }

    /// Remove `amount` units; fails with `InsufficientStock` rather than going below zero.
    #[instrument(skip(self, unit, reason), fields(product_id = %product_id, reason = reason.label()), err)]
    pub async fn decrement(
        &self,
        unit: &mut dyn UnitOfWork,
        product_id: ProductId,
        amount: i64,
        reason: MovementReason,
    ) -> Result<StockChange, ServiceError> {
        let amount = Quantity::new(amount)?.get();
        let command = StockCommand::Decrement(DecrementStock {
            product_id,
            amount,
            occurred_at: Utc::now(),
        });
        self.execute(unit, product_id, command, reason).await
    }

    /// Add `amount` units (returns, cancellations).
    #[instrument(skip(self, unit, reason), fields(product_id = %product_id, reason = reason.label()), err)]
    pub async fn increment(
        &self,
        unit: &mut dyn UnitOfWork,
        product_id: ProductId,
        amount: i64,
        reason: MovementReason,
    ) -> Result<StockChange, ServiceError> {
        let amount = Quantity::new(amount)?.get();
        let command = StockCommand::Increment(IncrementStock {
            product_id,
            amount,
            occurred_at: Utc::now(),
        });
        self.execute(unit, product_id, command, reason).await
    }

    /// Overwrite stock with a counted value.
    #[instrument(skip(self, unit, reason), fields(product_id = %product_id, reason = reason.label()), err)]
    pub async fn set_absolute(
        &self,
        unit: &mut dyn UnitOfWork,
        product_id: ProductId,
        value: i64,
        reason: MovementReason,
    ) -> Result<StockChange, ServiceError> {
        if value < 0 {
            return Err(DomainError::InvalidQuantity(value).into());
        }
        let command = StockCommand::SetAbsolute(SetStock {
            product_id,
            value,
            occurred_at: Utc::now(),
        });
        self.execute(unit, product_id, command, reason).await
    }

    async fn execute(
        &self,
        unit: &mut dyn UnitOfWork,
        product_id: ProductId,
        command: StockCommand,
        reason: MovementReason,
    ) -> Result<StockChange, ServiceError> {
        let mut product = unit
            .product(product_id)
            .await?
            .ok_or_else(|| DomainError::product_not_found(product_id))?;

        let previous = product.stock();
        let events = product.execute(&command)?;
        let Some(event) = events.last() else {
            return Err(DomainError::validation("stock command produced no change").into());
        };
        let occurred_at = event.occurred_at();

        unit.update_stock(&product).await?;
        unit.append_movement(&StockMovement::new(
            product_id,
            reason,
            previous,
            product.stock(),
            occurred_at,
        ))
        .await?;

        debug!(
            event = event.event_type(),
            previous,
            new = product.stock(),
            "stock staged"
        );
        Ok(StockChange { product, previous })
    }
}
