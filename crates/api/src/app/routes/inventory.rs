use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_core::CountSessionId;
use stockroom_infra::NewCountSession;

use crate::app::dto::{self, CompletedSessionView, ListResponse, SessionView};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_session).get(list_sessions))
        .route("/:id", get(get_session))
        .route("/:id/count", post(record_count))
        .route("/:id/complete", post(complete_session))
}

fn parse_session_id(id: &str) -> Result<CountSessionId, axum::response::Response> {
    id.parse().map_err(errors::domain_error_to_response)
}

pub async fn create_session(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCountSession>,
) -> axum::response::Response {
    match services.counts.create_session(body).await {
        Ok(session) => (StatusCode::CREATED, Json(SessionView::from(&session))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Most recent first.
pub async fn list_sessions(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.counts.list_sessions().await {
        Ok(sessions) => {
            let items: Vec<SessionView<'_>> = sessions.iter().map(SessionView::from).collect();
            (StatusCode::OK, Json(ListResponse { items })).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let session_id = match parse_session_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.counts.get_session(session_id).await {
        Ok(session) => (StatusCode::OK, Json(SessionView::from(&session))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_count(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordCountRequest>,
) -> axum::response::Response {
    let session_id = match parse_session_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .counts
        .record_count(session_id, &body.product, body.counted_quantity)
        .await
    {
        Ok(session) => (StatusCode::OK, Json(SessionView::from(&session))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn complete_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::CompleteSessionRequest>>,
) -> axum::response::Response {
    let session_id = match parse_session_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let apply_stock_updates = body.is_some_and(|Json(b)| b.apply_stock_updates);

    match services
        .counts
        .complete_session(session_id, apply_stock_updates)
        .await
    {
        Ok(completed) => {
            (StatusCode::OK, Json(CompletedSessionView::from(&completed))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
