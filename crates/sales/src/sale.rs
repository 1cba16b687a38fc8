use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, DomainError, ProductId, Quantity, SaleId};
use stockroom_events::Event;

use crate::channel::SalesChannel;

/// Cancellation details. Present iff the sale is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
}

/// Aggregate root: Sale.
///
/// Immutable once recorded except for the one-way cancellation transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "SaleRecord")]
pub struct Sale {
    id: SaleId,
    product_id: ProductId,
    channel: SalesChannel,
    quantity: i64,
    occurred_at: DateTime<Utc>,
    cancellation: Option<Cancellation>,
    external_order_id: Option<String>,
    version: u64,
    created: bool,
}

impl Sale {
    /// Create an empty, not-yet-recorded instance.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            product_id: ProductId::from_uuid(Default::default()),
            channel: SalesChannel::InStore,
            quantity: 0,
            occurred_at: DateTime::<Utc>::UNIX_EPOCH,
            cancellation: None,
            external_order_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn channel(&self) -> SalesChannel {
        self.channel
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.cancellation.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some()
    }

    pub fn external_order_id(&self) -> Option<&str> {
        self.external_order_id.as_deref()
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Flat persisted/transfer shape of a sale.
///
/// The cancellation fields must be mutually consistent: `cancelled_at` and
/// `cancel_reason` are set iff `is_cancelled` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub product_id: ProductId,
    pub channel: SalesChannel,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl From<Sale> for SaleRecord {
    fn from(sale: Sale) -> Self {
        let (cancelled_at, cancel_reason) = match sale.cancellation {
            Some(c) => (Some(c.cancelled_at), Some(c.reason)),
            None => (None, None),
        };
        Self {
            id: sale.id,
            product_id: sale.product_id,
            channel: sale.channel,
            quantity: sale.quantity,
            occurred_at: sale.occurred_at,
            is_cancelled: cancelled_at.is_some(),
            cancelled_at,
            cancel_reason,
            external_order_id: sale.external_order_id,
            version: sale.version,
        }
    }
}

impl TryFrom<SaleRecord> for Sale {
    type Error = DomainError;

    fn try_from(record: SaleRecord) -> Result<Self, Self::Error> {
        let cancellation = match (record.is_cancelled, record.cancelled_at, record.cancel_reason) {
            (true, Some(cancelled_at), Some(reason)) => Some(Cancellation {
                cancelled_at,
                reason,
            }),
            (false, None, None) => None,
            _ => {
                return Err(DomainError::validation(format!(
                    "sale {} has inconsistent cancellation fields",
                    record.id
                )));
            }
        };
        Quantity::new(record.quantity)?;

        Ok(Self {
            id: record.id,
            product_id: record.product_id,
            channel: record.channel,
            quantity: record.quantity,
            occurred_at: record.occurred_at,
            cancellation,
            external_order_id: record.external_order_id,
            version: record.version,
            created: true,
        })
    }
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub channel: SalesChannel,
    pub quantity: i64,
    pub external_order_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSale {
    pub sale_id: SaleId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
    CancelSale(CancelSale),
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub channel: SalesChannel,
    pub quantity: i64,
    pub external_order_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub sale_id: SaleId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
    SaleCancelled(SaleCancelled),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
            SaleEvent::SaleCancelled(_) => "sales.sale.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
            SaleEvent::SaleCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.product_id = e.product_id;
                self.channel = e.channel;
                self.quantity = e.quantity;
                self.occurred_at = e.occurred_at;
                self.external_order_id = e.external_order_id.clone();
                self.cancellation = None;
                self.created = true;
            }
            SaleEvent::SaleCancelled(e) => {
                self.cancellation = Some(Cancellation {
                    cancelled_at: e.occurred_at,
                    reason: e.reason.clone(),
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
            SaleCommand::CancelSale(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Sale {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::validation("sale already recorded"));
        }
        let quantity = Quantity::new(cmd.quantity)?;

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            product_id: cmd.product_id,
            channel: cmd.channel,
            quantity: quantity.get(),
            external_order_id: cmd.external_order_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSale) -> Result<Vec<SaleEvent>, DomainError> {
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }
        if !self.created || self.id != cmd.sale_id {
            return Err(DomainError::SaleNotFound(cmd.sale_id));
        }
        if self.is_cancelled() {
            return Err(DomainError::AlreadyCancelled(self.id));
        }

        Ok(vec![SaleEvent::SaleCancelled(SaleCancelled {
            sale_id: self.id,
            reason: reason.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
