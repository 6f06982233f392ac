//! Counter route handlers.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::counter::NewCounter;
use crate::error::{AppError, AppResult};
use crate::models::Counter;
use crate::routes::helpers::{ResponseData, require_workspace, workspace_from_headers};
use crate::state::AppState;

/// Create the counter router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/counters", get(list_counters).post(create_counter))
        .route("/api/counters/{id}", get(get_counter))
        .route("/api/counters/{id}/current", get(current_value))
        .route("/api/counters/{id}/next", post(next_value))
        .route("/api/counters/{id}/increment", post(increment_counter))
}

/// Query parameters for advancing a counter.
#[derive(Debug, Deserialize)]
pub struct NextParams {
    /// Reserve this many values at once.
    pub count: Option<i64>,
}

/// GET /api/counters
async fn list_counters(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Counter>>> {
    let workspace = require_workspace(&headers)?;
    Ok(Json(state.counters().list(&workspace).await?))
}

/// POST /api/counters
async fn create_counter(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewCounter>, JsonRejection>,
) -> AppResult<Json<ResponseData<String>>> {
    let Json(mut body) = body?;
    match (workspace_from_headers(&headers), body.workspace.trim().is_empty()) {
        (Some(active), true) => body.workspace = active,
        (Some(active), false) if active != body.workspace.trim() => {
            return Err(AppError::Unauthorized(
                "Counter must be created in the current Workspace".to_string(),
            ));
        }
        (None, true) => return Err(AppError::NonExist("No active Workspace".to_string())),
        _ => {}
    }

    let id = state.counters().create(body).await?;
    Ok(Json(ResponseData::ok("Created Counter", id)))
}

/// GET /api/counters/{id}
async fn get_counter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<Counter>> {
    let workspace = require_workspace(&headers)?;
    Ok(Json(state.counters().authorize(&id, &workspace).await?))
}

/// GET /api/counters/{id}/current
async fn current_value(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<ResponseData<String>>> {
    let workspace = require_workspace(&headers)?;
    let counter = state.counters().authorize(&id, &workspace).await?;
    Ok(Json(ResponseData::ok(
        "Current Counter value",
        counter.current_value(),
    )))
}

/// POST /api/counters/{id}/next
async fn next_value(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    params: Result<Query<NextParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let workspace = require_workspace(&headers)?;
    let counters = state.counters();
    counters.authorize(&id, &workspace).await?;

    let response = match params.count {
        Some(count) => {
            let values = counters.next_values_with_retry(&id, count).await?;
            Json(ResponseData::ok("Next Counter values", values)).into_response()
        }
        None => {
            let value = counters.next_value_with_retry(&id).await?;
            Json(ResponseData::ok("Next Counter value", value)).into_response()
        }
    };
    Ok(response)
}

/// POST /api/counters/{id}/increment
///
/// Advances the Counter by one step without reporting the new value.
async fn increment_counter(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<ResponseData<String>>> {
    let workspace = require_workspace(&headers)?;
    let counters = state.counters();
    counters.authorize(&id, &workspace).await?;
    counters.increment_with_retry(&id).await?;
    Ok(Json(ResponseData::ok("Incremented Counter", id)))
}
