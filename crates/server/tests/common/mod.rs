#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] wires the real router and services to a fresh
//! [`MemoryStore`], so every test starts from an empty database and drives
//! the same code paths the server does.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use metadatify_server::models::Entity;
use metadatify_server::routes::helpers::WORKSPACE_HEADER;
use metadatify_server::state::{AppState, SearchLimits};
use metadatify_server::store::{EntityStore, MemoryStore};

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limits(SearchLimits::default())
    }

    pub fn with_limits(limits: SearchLimits) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_store(store.clone(), "memory", limits);
        let router = metadatify_server::router(state.clone());
        Self {
            router,
            store,
            state,
        }
    }

    /// Insert Entities directly into the store.
    pub async fn seed(&self, entities: &[Entity]) {
        for entity in entities {
            self.store
                .insert_entity(entity)
                .await
                .expect("Failed to seed entity");
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// GET `uri`, optionally as a member of `workspace`.
    pub async fn get(&self, uri: &str, workspace: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(ws) = workspace {
            builder = builder.header(WORKSPACE_HEADER, ws);
        }
        let response = self.request(builder.body(Body::empty()).unwrap()).await;
        read_json(response).await
    }

    /// POST a JSON body to `uri`, optionally as a member of `workspace`.
    pub async fn post(
        &self,
        uri: &str,
        workspace: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(ws) = workspace {
            builder = builder.header(WORKSPACE_HEADER, ws);
        }
        let response = self
            .request(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        read_json(response).await
    }
}

/// Split a response into its status and JSON body (`Null` when empty).
pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response body is not JSON")
    };
    (status, body)
}

/// Names in a JSON array of search results, in order.
pub fn names(results: &Value) -> Vec<String> {
    results
        .as_array()
        .expect("expected a JSON array")
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}
