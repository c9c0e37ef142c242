//! Shared HTTP response envelope and pagination helpers.
//!
//! Every endpoint answers `{ "success": bool, "data" | "message", "error"? }`
//! where `error` carries a stable machine-checkable kind label. List
//! endpoints accept `page`/`limit` and report `{page, limit, total, pages}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stable error classification exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Authorization,
    Conflict,
    ExternalService,
    Server,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Server => "server",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": data })),
    )
        .into_response()
}

pub fn failure(kind: ErrorKind, message: impl AsRef<str>) -> Response {
    (
        kind.status(),
        Json(json!({
            "success": false,
            "message": message.as_ref(),
            "error": kind.label(),
        })),
    )
        .into_response()
}

/// `page`/`limit` query parameters with the defaults the API documents.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// Slice an already-filtered collection into the requested page.
pub fn paginate<T>(items: Vec<T>, query: PageQuery) -> (Vec<T>, PageInfo) {
    let limit = query.limit.max(1);
    let page = query.page.max(1);
    let total = items.len();
    let pages = total.div_ceil(limit);

    let start = (page - 1).saturating_mul(limit);
    let page_items: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(limit)
        .collect();

    (
        page_items,
        PageInfo {
            page,
            limit,
            total,
            pages,
        },
    )
}

pub fn page<T: Serialize>(items: Vec<T>, info: PageInfo) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": items,
            "page": info.page,
            "limit": info.limit,
            "total": info.total,
            "pages": info.pages,
        })),
    )
        .into_response()
}
