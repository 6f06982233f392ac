//! Search route handlers.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::models::SearchResult;
use crate::routes::helpers::workspace_from_headers;
use crate::search::{SearchFilters, SearchRequest};
use crate::state::AppState;

/// Create the search router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search_json))
        .route("/search", post(search_text))
        .route("/search/query", post(search_builder))
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free text, or a serialized filter in builder mode.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub is_builder: bool,
    pub limit: Option<i64>,
    #[serde(default)]
    pub show_archived: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub has_relationships: bool,
}

/// Body of the text search endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSearchBody {
    pub query: String,
    #[serde(default)]
    pub show_archived: bool,
    #[serde(default)]
    pub filters: SearchFilters,
}

/// Body of the builder search endpoint. `query` is either the filter
/// document or a string holding it.
#[derive(Debug, Deserialize)]
pub struct BuilderSearchBody {
    pub query: Value,
}

/// GET /api/search
async fn search_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> AppResult<Json<Vec<SearchResult>>> {
    let Query(params) = params?;
    let request = SearchRequest {
        query: params.query,
        is_builder: params.is_builder,
        workspace: workspace_from_headers(&headers),
        limit: state.search_limits().resolve(params.limit),
        show_archived: params.show_archived,
        filters: SearchFilters {
            start_date: params.start_date,
            end_date: params.end_date,
            has_relationships: params.has_relationships,
        },
    };
    Ok(Json(state.search().search(request).await?))
}

/// POST /search
async fn search_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TextSearchBody>, JsonRejection>,
) -> AppResult<Json<Vec<SearchResult>>> {
    let Json(body) = body?;
    let request = SearchRequest {
        query: body.query,
        is_builder: false,
        workspace: workspace_from_headers(&headers),
        limit: state.search_limits().resolve(None),
        show_archived: body.show_archived,
        filters: body.filters,
    };
    Ok(Json(state.search().search(request).await?))
}

/// POST /search/query
async fn search_builder(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BuilderSearchBody>, JsonRejection>,
) -> AppResult<Json<Vec<SearchResult>>> {
    let Json(body) = body?;
    let query = match body.query {
        Value::String(serialized) => serialized,
        document => document.to_string(),
    };
    let request = SearchRequest {
        query,
        is_builder: true,
        workspace: workspace_from_headers(&headers),
        limit: state.search_limits().resolve(None),
        show_archived: false,
        filters: SearchFilters::default(),
    };
    Ok(Json(state.search().search(request).await?))
}
