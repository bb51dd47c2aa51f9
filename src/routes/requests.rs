//! Request lifecycle endpoints
//!
//! Submission, polling, cancellation, and the direct execution trigger.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{error_response, json_response, query_param};
use crate::models::{ChangeRequest, RequestAction};
use crate::server::AppState;
use crate::types::SwitchyardError;

/// POST /request - admit a change request
pub async fn handle_enqueue_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Request body error: {}", e);
            return error_response(SwitchyardError::BadRequest(
                "Failed to read request body".to_string(),
            ));
        }
    };

    let request: ChangeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rejecting malformed request body: {}", e);
            return error_response(SwitchyardError::BadRequest(format!(
                "Invalid request body: {}",
                e
            )));
        }
    };

    match state.coordinator.enqueue_request(&request).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(err) => error_response(err),
    }
}

/// GET /request/{id} - poll the current response projection
pub async fn handle_get_request(state: Arc<AppState>, request_id: &str) -> Response<Full<Bytes>> {
    match state.coordinator.get_response(request_id).await {
        Ok(Some(response)) => json_response(StatusCode::OK, &response),
        Ok(None) => error_response(SwitchyardError::NotFound(format!(
            "No request with id {}",
            request_id
        ))),
        Err(err) => error_response(err),
    }
}

/// DELETE /request/{id} - mark intent to revert
///
/// Always answers with the request's current response; cancellation that
/// arrives too late is a no-op, not an error.
pub async fn handle_cancel_request(
    state: Arc<AppState>,
    request_id: &str,
) -> Response<Full<Bytes>> {
    match state.coordinator.cancel_request(request_id).await {
        Ok(Some(_)) => match state.coordinator.get_response(request_id).await {
            Ok(Some(response)) => json_response(StatusCode::OK, &response),
            Ok(None) => error_response(SwitchyardError::NotFound(format!(
                "No request with id {}",
                request_id
            ))),
            Err(err) => error_response(err),
        },
        Ok(None) => error_response(SwitchyardError::NotFound(format!(
            "No request with id {}",
            request_id
        ))),
        Err(err) => error_response(err),
    }
}

/// POST /request/{id}/execute[?action=revert] - drive the request through
/// apply or revert inline instead of waiting for the polling worker
pub async fn handle_execute_request(
    state: Arc<AppState>,
    request_id: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let action = match query_param(query, "action").as_deref() {
        None => None,
        Some("apply") => Some(RequestAction::Apply),
        Some("revert") => Some(RequestAction::Revert),
        Some(other) => {
            return error_response(SwitchyardError::BadRequest(format!(
                "Unknown action '{}', expected 'apply' or 'revert'",
                other
            )));
        }
    };

    let Some(worker) = &state.worker else {
        return error_response(SwitchyardError::Internal(
            "No worker is running in this process".to_string(),
        ));
    };

    match worker.process_request(request_id, action).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(err) => error_response(err),
    }
}

/// GET /requests/queued - queue contents in FIFO order
pub async fn handle_queued_requests(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.coordinator.get_queued_request_ids().await {
        Ok(queued) => json_response(StatusCode::OK, &queued),
        Err(err) => error_response(err),
    }
}
