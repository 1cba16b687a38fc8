use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;
use stockroom_infra::{CompletedSession, Reconciled};
use stockroom_inventory::{CountSession, CountSummary};
use stockroom_sales::{Sale, SalesChannel};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub product_id: String,
    /// Accepts canonical and legacy channel tags, any case.
    pub channel: String,
    pub quantity: i64,
}

impl CreateSaleRequest {
    pub fn channel(&self) -> Result<SalesChannel, DomainError> {
        self.channel.parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelSaleRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordCountRequest {
    /// Product id or barcode.
    #[serde(alias = "product_id", alias = "barcode")]
    pub product: String,
    pub counted_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CompleteSessionRequest {
    #[serde(default)]
    pub apply_stock_updates: bool,
}

#[derive(Debug, Deserialize)]
pub struct DailySalesQuery {
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// A count session with its running summary.
#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    #[serde(flatten)]
    pub session: &'a CountSession,
    pub summary: CountSummary,
}

impl<'a> From<&'a CountSession> for SessionView<'a> {
    fn from(session: &'a CountSession) -> Self {
        Self {
            session,
            summary: session.summary(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompletedSessionView<'a> {
    pub session: SessionView<'a>,
    pub reconciled: &'a [Reconciled],
}

impl<'a> From<&'a CompletedSession> for CompletedSessionView<'a> {
    fn from(completed: &'a CompletedSession) -> Self {
        Self {
            session: SessionView::from(&completed.session),
            reconciled: &completed.reconciled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct DailySalesReport {
    pub date: NaiveDate,
    pub items: Vec<Sale>,
}
