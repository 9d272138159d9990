//! Standard response shaping
//!
//! Error responses carry a JSON envelope with a fixed `error` code per
//! status and an optional human-readable `message`. Success helpers return
//! the payload as-is.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{header, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// JSON error envelope
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            error: error.into(),
            message,
        }
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(body))
        .unwrap()
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: Option<String>,
) -> Response<Full<Bytes>> {
    let body = ErrorBody::new(code, message);
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    json_response(status, Bytes::from(bytes))
}

/// 200 OK with a JSON payload.
pub fn ok(payload: &serde_json::Value) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        Bytes::from(serde_json::to_vec(payload).unwrap_or_default()),
    )
}

/// 201 Created with a JSON payload.
pub fn created(payload: &serde_json::Value) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::CREATED,
        Bytes::from(serde_json::to_vec(payload).unwrap_or_default()),
    )
}

/// 202 Accepted, empty body.
pub fn accepted() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::ACCEPTED)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 204 No Content.
pub fn no_content() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 303 See Other pointing at `location`.
pub fn see_other(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, location)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 400 Bad Request envelope.
pub fn bad_request(message: impl Into<String>) -> Response<Full<Bytes>> {
    error_response(StatusCode::BAD_REQUEST, "bad_request", Some(message.into()))
}

/// 404 Not Found envelope.
pub fn not_found(message: impl Into<String>) -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "not_found", Some(message.into()))
}

/// 501 Not Implemented envelope.
pub fn not_implemented() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_IMPLEMENTED, "not_implemented", None)
}

/// 502 Bad Gateway envelope.
pub fn bad_gateway(message: impl Into<String>) -> Response<Full<Bytes>> {
    error_response(StatusCode::BAD_GATEWAY, "bad_gateway", Some(message.into()))
}

/// 503 Service Unavailable envelope.
pub fn service_unavailable(message: impl Into<String>) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "service_unavailable",
        Some(message.into()),
    )
}
