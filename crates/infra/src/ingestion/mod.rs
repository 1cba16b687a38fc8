//! Order Ingestion Adapter: verified inbound orders become sales.
//!
//! One order is one unit of work. Lines whose product has no external-id
//! mapping are skipped; any other failure (for example insufficient stock on a
//! mapped line) aborts the whole order.

mod order;
mod signature;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stockroom_core::DomainError;
use stockroom_sales::SalesChannel;

use crate::error::ServiceError;
use crate::ledger::{LedgerStore, UnitOfWork, finish};
use crate::sales::{RecordedSale, SaleRecordManager};

pub use order::{ExternalRef, InboundOrder, LineItem, READY_TO_FULFILL};
pub use signature::{SIGNATURE_HEADER, WebhookVerifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestionOutcome {
    /// Order not in the ready-to-fulfill state; nothing was done.
    Ignored { order_id: String, status: String },
    Processed {
        order_id: String,
        sales: Vec<RecordedSale>,
        /// External product ids with no matching product.
        skipped: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct OrderIngestionAdapter<S> {
    sales: SaleRecordManager<S>,
    verifier: WebhookVerifier,
}

impl<S> OrderIngestionAdapter<S>
where
    S: LedgerStore,
{
    pub fn new(sales: SaleRecordManager<S>, verifier: WebhookVerifier) -> Self {
        Self { sales, verifier }
    }

    /// Verify `raw` against `signature`, then turn the order into sales.
    #[instrument(skip(self, raw, signature), fields(bytes = raw.len()), err)]
    pub async fn ingest(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestionOutcome, ServiceError> {
        self.verifier.verify(raw, signature)?;

        let order: InboundOrder = serde_json::from_slice(raw)
            .map_err(|e| DomainError::validation(format!("malformed order payload: {e}")))?;
        self.ingest_order(order).await
    }

    /// Process an already-verified order.
    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status), err)]
    pub async fn ingest_order(&self, order: InboundOrder) -> Result<IngestionOutcome, ServiceError> {
        let order_id = order.id.to_string();
        if !order.is_ready_to_fulfill() {
            debug!("order not ready to fulfill; ignored");
            return Ok(IngestionOutcome::Ignored {
                order_id,
                status: order.status,
            });
        }

        let mut unit = self.sales.store().begin().await?;
        let result = self.process_in(unit.as_mut(), &order_id, &order.line_items).await;
        let (sales, skipped) = finish(unit, result).await?;

        info!(sales = sales.len(), skipped = skipped.len(), "order ingested");
        Ok(IngestionOutcome::Processed {
            order_id,
            sales,
            skipped,
        })
    }

    async fn process_in(
        &self,
        unit: &mut dyn UnitOfWork,
        order_id: &str,
        lines: &[LineItem],
    ) -> Result<(Vec<RecordedSale>, Vec<String>), ServiceError> {
        let mut sales = Vec::with_capacity(lines.len());
        let mut skipped = Vec::new();

        for line in lines {
            let external_id = line.product_id.to_string();
            let Some(product) = unit.product_by_external_id(&external_id).await? else {
                warn!(external_product_id = %external_id, "no product mapped to line item; skipped");
                skipped.push(external_id);
                continue;
            };

            let recorded = self
                .sales
                .record_in(
                    unit,
                    product.id_typed(),
                    SalesChannel::External,
                    line.quantity,
                    Some(order_id.to_string()),
                )
                .await?;
            sales.push(recorded);
        }

        Ok((sales, skipped))
    }
}
