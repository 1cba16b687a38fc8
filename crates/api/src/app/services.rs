use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use stockroom_infra::{
    InMemoryLedger, InventoryCountEngine, LedgerStore, OrderIngestionAdapter, PostgresLedger,
    ProductCatalog, SaleRecordManager, WebhookVerifier,
};

use crate::config::AppConfig;

/// Ledger shared by every service; the backend is picked at startup.
pub type SharedLedger = Arc<dyn LedgerStore>;

/// Core services, all backed by the same ledger.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: ProductCatalog<SharedLedger>,
    pub sales: SaleRecordManager<SharedLedger>,
    pub counts: InventoryCountEngine<SharedLedger>,
    pub orders: OrderIngestionAdapter<SharedLedger>,
}

impl AppServices {
    pub fn new(ledger: SharedLedger, webhook_secret: &str) -> Self {
        Self {
            catalog: ProductCatalog::new(ledger.clone()),
            sales: SaleRecordManager::new(ledger.clone()),
            counts: InventoryCountEngine::new(ledger.clone()),
            orders: OrderIngestionAdapter::new(
                SaleRecordManager::new(ledger),
                WebhookVerifier::new(webhook_secret),
            ),
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let ledger: SharedLedger = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            let ledger = PostgresLedger::new(pool);
            ledger
                .ensure_schema()
                .await
                .context("failed to prepare ledger schema")?;
            tracing::info!("using postgres ledger");
            Arc::new(ledger)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory ledger");
            Arc::new(InMemoryLedger::new())
        }
    };

    Ok(AppServices::new(ledger, &config.webhook_secret))
}
