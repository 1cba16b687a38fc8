//! Runtime configuration read from the environment.

/// Default listen address (the storefront's historical port).
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3050";

const DEV_WEBHOOK_SECRET: &str = "dev-webhook-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres connection string; the in-memory ledger is used when absent.
    pub database_url: Option<String>,
    /// Shared secret for order webhook signatures.
    pub webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr = non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let database_url = non_empty_var("DATABASE_URL");
        let webhook_secret = non_empty_var("WEBHOOK_SECRET").unwrap_or_else(|| {
            tracing::warn!("WEBHOOK_SECRET not set; using insecure dev default");
            DEV_WEBHOOK_SECRET.to_string()
        });

        Self {
            bind_addr,
            database_url,
            webhook_secret,
        }
    }

    /// In-memory configuration for tests and local experiments.
    pub fn in_memory(webhook_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            webhook_secret: webhook_secret.into(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
