//! Inventory Count Engine: session lifecycle and reconciliation of counted
//! quantities into live stock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use stockroom_core::{Aggregate, CountSessionId, DomainError, ProductId};
use stockroom_events::MovementReason;
use stockroom_inventory::{
    CompleteCountSession, CountCommand, CountSession, OpenCountSession, RecordCount, SnapshotLine,
};
use stockroom_products::{Product, ProductLookup};

use crate::error::ServiceError;
use crate::ledger::{LedgerStore, UnitOfWork, finish};
use crate::stock_mutator::StockMutator;

/// Input for opening a count session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewCountSession {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// One stock overwrite performed while completing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub product_id: ProductId,
    pub previous: i64,
    pub new: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedSession {
    pub session: CountSession,
    /// Empty when stock updates were not requested.
    pub reconciled: Vec<Reconciled>,
}

#[derive(Debug, Clone)]
pub struct InventoryCountEngine<S> {
    store: S,
    mutator: StockMutator,
}

impl<S> InventoryCountEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            mutator: StockMutator::new(),
        }
    }

    /// Snapshot every active product's stock into a new draft session.
    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub async fn create_session(&self, new: NewCountSession) -> Result<CountSession, ServiceError> {
        let mut unit = self.store.begin().await?;
        let result = self.create_in(unit.as_mut(), new).await;
        let session = finish(unit, result).await?;

        info!(
            session_id = %session.id_typed(),
            items = session.items().len(),
            "count session opened"
        );
        Ok(session)
    }

    async fn create_in(
        &self,
        unit: &mut dyn UnitOfWork,
        new: NewCountSession,
    ) -> Result<CountSession, ServiceError> {
        let snapshot = unit
            .active_products()
            .await?
            .iter()
            .map(|p| SnapshotLine {
                product_id: p.id_typed(),
                system_quantity: p.stock(),
            })
            .collect();

        let session_id = CountSessionId::new();
        let mut session = CountSession::empty(session_id);
        session.execute(&CountCommand::Open(OpenCountSession {
            session_id,
            name: new.name,
            notes: new.notes,
            created_by: new.created_by,
            snapshot,
            occurred_at: Utc::now(),
        }))?;
        unit.save_session(&session).await?;
        Ok(session)
    }

    /// Record a physical count for the product named by `identifier` (id or barcode).
    #[instrument(skip(self), fields(session_id = %session_id), err)]
    pub async fn record_count(
        &self,
        session_id: CountSessionId,
        identifier: &str,
        counted_quantity: i64,
    ) -> Result<CountSession, ServiceError> {
        let mut unit = self.store.begin().await?;
        let result = self
            .record_in(unit.as_mut(), session_id, identifier, counted_quantity)
            .await;
        finish(unit, result).await
    }

    async fn record_in(
        &self,
        unit: &mut dyn UnitOfWork,
        session_id: CountSessionId,
        identifier: &str,
        counted_quantity: i64,
    ) -> Result<CountSession, ServiceError> {
        let mut session = load_session(unit, session_id).await?;
        if session.is_completed() {
            return Err(DomainError::SessionCompleted(session_id).into());
        }

        let product = resolve(unit, identifier).await?;
        session.execute(&CountCommand::RecordCount(RecordCount {
            session_id,
            product_id: product.id_typed(),
            counted_quantity,
            occurred_at: Utc::now(),
        }))?;
        unit.save_session(&session).await?;
        Ok(session)
    }

    /// Close the session; optionally overwrite stock for every counted item.
    ///
    /// Uncounted items never touch stock.
    #[instrument(skip(self), fields(session_id = %session_id), err)]
    pub async fn complete_session(
        &self,
        session_id: CountSessionId,
        apply_stock_updates: bool,
    ) -> Result<CompletedSession, ServiceError> {
        let mut unit = self.store.begin().await?;
        let result = self
            .complete_in(unit.as_mut(), session_id, apply_stock_updates)
            .await;
        let completed = finish(unit, result).await?;

        info!(reconciled = completed.reconciled.len(), "count session completed");
        Ok(completed)
    }

    async fn complete_in(
        &self,
        unit: &mut dyn UnitOfWork,
        session_id: CountSessionId,
        apply_stock_updates: bool,
    ) -> Result<CompletedSession, ServiceError> {
        let mut session = load_session(unit, session_id).await?;
        session.execute(&CountCommand::Complete(CompleteCountSession {
            session_id,
            apply_stock_updates,
            occurred_at: Utc::now(),
        }))?;

        let mut reconciled = Vec::new();
        if apply_stock_updates {
            let counts: Vec<(ProductId, i64)> = session.reconciliation().collect();
            for (product_id, counted) in counts {
                let change = self
                    .mutator
                    .set_absolute(
                        unit,
                        product_id,
                        counted,
                        MovementReason::CountReconciled { session_id },
                    )
                    .await?;
                reconciled.push(Reconciled {
                    product_id,
                    previous: change.previous,
                    new: change.new_stock(),
                });
            }
        }

        unit.save_session(&session).await?;
        Ok(CompletedSession {
            session,
            reconciled,
        })
    }

    pub async fn get_session(&self, session_id: CountSessionId) -> Result<CountSession, ServiceError> {
        self.store
            .find_session(session_id)
            .await?
            .ok_or_else(|| DomainError::SessionNotFound(session_id).into())
    }

    /// All sessions, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<CountSession>, ServiceError> {
        Ok(self.store.list_sessions().await?)
    }
}

async fn load_session(
    unit: &mut dyn UnitOfWork,
    session_id: CountSessionId,
) -> Result<CountSession, ServiceError> {
    unit.session(session_id)
        .await?
        .ok_or_else(|| DomainError::SessionNotFound(session_id).into())
}

async fn resolve(unit: &mut dyn UnitOfWork, identifier: &str) -> Result<Product, ServiceError> {
    let found = match ProductLookup::parse(identifier)? {
        ProductLookup::Id(id) => unit.product(id).await?,
        ProductLookup::Barcode(code) => unit.product_by_barcode(&code).await?,
    };
    found.ok_or_else(|| DomainError::product_not_found(identifier.trim()).into())
}
