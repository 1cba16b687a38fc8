use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use stockroom_core::ProductId;
use stockroom_products::NewProduct;

use crate::app::dto::ListResponse;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/low-stock", get(low_stock))
        .route("/lookup/:identifier", get(lookup_product))
        .route("/:id", get(get_product))
        .route("/:id/movements", get(list_movements))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewProduct>,
) -> axum::response::Response {
    errors::respond(StatusCode::CREATED, services.catalog.register(body).await)
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let result = services.catalog.list().await.map(|items| ListResponse { items });
    errors::respond(StatusCode::OK, result)
}

/// Active products at or below their minimum stock.
pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let result = services
        .catalog
        .low_stock()
        .await
        .map(|items| ListResponse { items });
    errors::respond(StatusCode::OK, result)
}

/// Resolve by product id or barcode.
pub async fn lookup_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(identifier): Path<String>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.catalog.lookup(&identifier).await)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    errors::respond(StatusCode::OK, services.catalog.get(product_id).await)
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services
        .catalog
        .movements(product_id)
        .await
        .map(|items| ListResponse { items });
    errors::respond(StatusCode::OK, result)
}
