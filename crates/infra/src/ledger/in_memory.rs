use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockroom_core::{CountSessionId, ProductId, SaleId};
use stockroom_events::StockMovement;
use stockroom_inventory::CountSession;
use stockroom_products::Product;
use stockroom_sales::Sale;

use super::{LedgerStore, StoreError, UnitOfWork};

#[derive(Debug, Default, Clone)]
struct Records {
    /// Registration order.
    products: Vec<Product>,
    sales: HashMap<SaleId, Sale>,
    sessions: HashMap<CountSessionId, CountSession>,
}

impl Records {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id_typed() == id)
    }

    fn product_by_barcode(&self, barcode: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.barcode() == Some(barcode))
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Records,
    movements: Vec<StockMovement>,
}

/// In-memory ledger.
///
/// Intended for tests/dev. A unit of work holds the whole ledger lock for its
/// lifetime, so units are fully serialized; writes go to a private copy that
/// replaces the shared state on commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryUnit {
    guard: OwnedMutexGuard<LedgerState>,
    working: Records,
    movements: Vec<StockMovement>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.product(id).cloned())
    }

    async fn product_by_barcode(&mut self, barcode: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.working.product_by_barcode(barcode).cloned())
    }

    async fn product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.external_id() == Some(external_id))
            .cloned())
    }

    async fn active_products(&mut self) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .working
            .products
            .iter()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if self.working.product(product.id_typed()).is_some() {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id_typed()
            )));
        }
        if let Some(barcode) = product.barcode() {
            if self.working.product_by_barcode(barcode).is_some() {
                return Err(StoreError::Conflict(format!("barcode '{barcode}' already in use")));
            }
        }
        self.working.products.push(product.clone());
        Ok(())
    }

    async fn update_stock(&mut self, product: &Product) -> Result<(), StoreError> {
        let slot = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id_typed() == product.id_typed())
            .ok_or_else(|| {
                StoreError::Corrupt(format!("product {} vanished mid-unit", product.id_typed()))
            })?;
        *slot = product.clone();
        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        self.movements.push(movement.clone());
        Ok(())
    }

    async fn sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        Ok(self.working.sales.get(&id).cloned())
    }

    async fn save_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        self.working.sales.insert(sale.id_typed(), sale.clone());
        Ok(())
    }

    async fn session(&mut self, id: CountSessionId) -> Result<Option<CountSession>, StoreError> {
        Ok(self.working.sessions.get(&id).cloned())
    }

    async fn save_session(&mut self, session: &CountSession) -> Result<(), StoreError> {
        self.working.sessions.insert(session.id_typed(), session.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnit {
            mut guard,
            working,
            movements,
        } = *self;
        guard.records = working;
        guard.movements.extend(movements);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes are dropped with the unit; the guard releases the lock.
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.records.clone();
        Ok(Box::new(InMemoryUnit {
            guard,
            working,
            movements: Vec::new(),
        }))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.records.product(id).cloned())
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.records.product_by_barcode(barcode).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.state.lock().await.records.products.clone())
    }

    async fn list_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn find_sale(&self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        Ok(self.state.lock().await.records.sales.get(&id).cloned())
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let state = self.state.lock().await;
        let mut sales: Vec<Sale> = state.records.sales.values().cloned().collect();
        sales.sort_by(|a, b| {
            b.occurred_at()
                .cmp(&a.occurred_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(sales)
    }

    async fn find_session(&self, id: CountSessionId) -> Result<Option<CountSession>, StoreError> {
        Ok(self.state.lock().await.records.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<CountSession>, StoreError> {
        let state = self.state.lock().await;
        let mut sessions: Vec<CountSession> = state.records.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });
        Ok(sessions)
    }
}
