use axum::Router;

pub mod inventory;
pub mod products;
pub mod reports;
pub mod sales;
pub mod system;
pub mod webhooks;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/sales", sales::router())
        .nest("/inventory", inventory::router())
        .nest("/reports", reports::router())
        .nest("/webhooks", webhooks::router())
}
