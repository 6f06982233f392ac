//! Shared route helpers.

use axum::http::HeaderMap;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Header carrying the caller's active Workspace.
pub const WORKSPACE_HEADER: &str = "x-workspace";

/// Active Workspace from the request headers, if any.
pub fn workspace_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(WORKSPACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}

/// Active Workspace, or `NON_EXIST` when the request carries none.
pub fn require_workspace(headers: &HeaderMap) -> AppResult<String> {
    workspace_from_headers(headers)
        .ok_or_else(|| AppError::NonExist("No active Workspace".to_string()))
}

/// Success envelope for mutations and single values.
#[derive(Debug, Serialize)]
pub struct ResponseData<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ResponseData<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}
