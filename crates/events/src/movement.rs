//! Stock movement audit trail.
//!
//! Every change to a product's stock is recorded as a `StockMovement` inside
//! the same unit of work as the change itself, so a movement exists if and
//! only if the stock change was committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CountSessionId, MovementId, ProductId, SaleId};

use crate::event::Event;

/// Why a product's stock changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementReason {
    /// A sale recorded through the point of sale.
    Sale { sale_id: SaleId },
    /// Stock returned by cancelling a sale.
    SaleCancelled { sale_id: SaleId },
    /// A sale created from an inbound e-commerce order.
    ExternalOrder {
        sale_id: SaleId,
        external_order_id: String,
    },
    /// Stock overwritten with a physically counted value.
    CountReconciled { session_id: CountSessionId },
}

impl MovementReason {
    pub fn label(&self) -> &'static str {
        match self {
            MovementReason::Sale { .. } => "sale",
            MovementReason::SaleCancelled { .. } => "sale_cancelled",
            MovementReason::ExternalOrder { .. } => "external_order",
            MovementReason::CountReconciled { .. } => "count_reconciled",
        }
    }
}

/// One audited stock change: before/after values plus the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub reason: MovementReason,
    pub previous: i64,
    pub new: i64,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        product_id: ProductId,
        reason: MovementReason,
        previous: i64,
        new: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            product_id,
            reason,
            previous,
            new,
            occurred_at,
        }
    }

    /// Signed change applied to the stock (`new - previous`).
    pub fn delta(&self) -> i64 {
        self.new - self.previous
    }
}

impl Event for StockMovement {
    fn event_type(&self) -> &'static str {
        match self.reason {
            MovementReason::Sale { .. } => "stock.movement.sale",
            MovementReason::SaleCancelled { .. } => "stock.movement.sale_cancelled",
            MovementReason::ExternalOrder { .. } => "stock.movement.external_order",
            MovementReason::CountReconciled { .. } => "stock.movement.count_reconciled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
