use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};
use chrono::{NaiveDate, Utc};

use stockroom_core::DomainError;

use crate::app::dto::{DailySalesQuery, DailySalesReport, ListResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/stock", get(stock))
        .route("/sales/daily", get(daily_sales))
        .route("/revenue", get(revenue))
}

/// Every product with its current stock.
pub async fn stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let result = services.catalog.list().await.map(|items| ListResponse { items });
    errors::respond(StatusCode::OK, result)
}

/// Sales on one UTC day, today when `date` is absent.
pub async fn daily_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<DailySalesQuery>,
) -> axum::response::Response {
    let date = match query.date.as_deref() {
        None => Utc::now().date_naive(),
        Some(raw) => match raw.parse::<NaiveDate>() {
            Ok(v) => v,
            Err(_) => {
                return errors::domain_error_to_response(DomainError::validation(format!(
                    "date must be YYYY-MM-DD, got {raw:?}"
                )));
            }
        },
    };
    let result = services
        .sales
        .sales_on(date)
        .await
        .map(|items| DailySalesReport { date, items });
    errors::respond(StatusCode::OK, result)
}

pub async fn revenue(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    errors::respond(StatusCode::OK, services.sales.revenue().await)
}
