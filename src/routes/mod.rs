//! HTTP route handlers

pub mod health;
pub mod requests;
pub mod state;

pub use health::{health_check, version_info};
pub use requests::{
    handle_cancel_request, handle_enqueue_request, handle_execute_request,
    handle_get_request, handle_queued_requests,
};
pub use state::{
    handle_clear_base_path, handle_group_base_paths, handle_list_groups, handle_service_state,
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::SwitchyardError;

/// Serialize a value as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(
                    r#"{"error": "Internal serialization error"}"#,
                )))
                .unwrap()
        }
    }
}

/// Map an operation error onto its HTTP status and JSON error body
pub fn error_response(err: SwitchyardError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    let body = serde_json::json!({ "error": message });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Look up a single query parameter, percent-decoded
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .map(|value| urlencoding::decode(value).unwrap_or_default().into_owned())
}
