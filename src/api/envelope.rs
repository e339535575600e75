//! Response envelope shared by the `/api/v1` endpoints.
//!
//! Successes are `{ "data": T, "meta": {...} }`, failures are
//! `{ "error": {...}, "meta": {...} }`. When the payload comes from an
//! engine snapshot, `meta.sequence` carries its sequence number so a
//! renderer polling faster than the engine publishes can skip repeats.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Envelope format version.
pub const API_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub generated_at: DateTime<Utc>,
    pub api_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl ResponseMeta {
    fn now(sequence: Option<u64>) -> Self {
        Self {
            generated_at: Utc::now(),
            api_version: API_VERSION,
            sequence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::respond(StatusCode::OK, data, None)
    }

    /// `200 OK` for data cut from the snapshot numbered `sequence`.
    pub fn from_snapshot(data: T, sequence: u64) -> Response {
        Self::respond(StatusCode::OK, data, Some(sequence))
    }

    /// `202 Accepted` for requests queued to the engine.
    pub fn accepted(data: T) -> Response {
        Self::respond(StatusCode::ACCEPTED, data, None)
    }

    fn respond(status: StatusCode, data: T, sequence: Option<u64>) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(sequence),
        };
        (status, axum::Json(body)).into_response()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure classes the monitor API can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No such route or resource
    NotFound,
    /// Unparseable path or body (e.g. an unknown axis)
    BadRequest,
    /// Engine has nothing to show yet, or is not accepting events
    Unavailable,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code: kind.code(),
                message: message.into(),
            },
            meta: ResponseMeta::now(None),
        };
        (kind.status(), axum::Json(body)).into_response()
    }

    pub fn not_found(message: impl Into<String>) -> Response {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Response {
        Self::new(ErrorKind::Unavailable, message)
    }
}
