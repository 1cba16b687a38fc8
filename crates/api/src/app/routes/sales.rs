use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use stockroom_core::{ProductId, SaleId};

use crate::app::dto::{self, ListResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/cancel", post(cancel_sale))
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateSaleRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let channel = match body.channel() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let result = services
        .sales
        .create_sale(product_id, channel, body.quantity)
        .await;
    errors::respond(StatusCode::CREATED, result)
}

/// Most recent first.
pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let result = services.sales.list_sales().await.map(|items| ListResponse { items });
    errors::respond(StatusCode::OK, result)
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id: SaleId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    errors::respond(StatusCode::OK, services.sales.get_sale(sale_id).await)
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelSaleRequest>,
) -> axum::response::Response {
    let sale_id: SaleId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    errors::respond(
        StatusCode::OK,
        services.sales.cancel_sale(sale_id, &body.reason).await,
    )
}
