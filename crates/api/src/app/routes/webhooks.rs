use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::post,
};

use stockroom_infra::ingestion::SIGNATURE_HEADER;

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/orders", post(receive_order))
        // Path the storefront plugin was originally configured with.
        .route("/woocommerce/order", post(receive_order))
}

/// Signed order webhook. The body is verified as raw bytes before it is parsed.
pub async fn receive_order(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    errors::respond(StatusCode::OK, services.orders.ingest(&body, signature).await)
}
