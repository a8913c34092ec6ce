//! HTTP routes for Sideline

pub mod dashboard;
pub mod health;
pub mod status;

pub use dashboard::{
    handle_activate, handle_deactivate, handle_goals, handle_refetch, handle_schedule,
    handle_state, handle_stats,
};
pub use health::health_check;
pub use status::status_check;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::SidelineError;

/// JSON response with permissive CORS
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value)
        .unwrap_or_else(|_| br#"{"error":"Serialization failed"}"#.to_vec());

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// Error response from a crate error
pub fn error_response(err: SidelineError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    json_response(
        status,
        &serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message,
        }),
    )
}
