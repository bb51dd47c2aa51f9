//! Externally visible request response

use serde::{Deserialize, Serialize};

use super::state::{InternalRequestState, RequestState};

/// Response returned to callers polling a request.
///
/// Derived from stored state + message; never stored independently.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_id: String,

    /// Public projection of the internal lifecycle state
    pub state: RequestState,

    /// Human-readable status or error message, if one was recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestResponse {
    /// Build a response by projecting an internal state to its public value.
    pub fn from_state(
        request_id: impl Into<String>,
        state: InternalRequestState,
        message: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            state: state.to_request_state(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_internal_state() {
        let response = RequestResponse::from_state(
            "req-1",
            InternalRequestState::QueuedApply,
            None,
        );
        assert_eq!(response.state, RequestState::Waiting);
        assert_eq!(response.message, None);
    }

    #[test]
    fn message_is_omitted_from_json_when_absent() {
        let response =
            RequestResponse::from_state("req-1", InternalRequestState::Completed, None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["state"], "SUCCESS");
        assert!(json.get("message").is_none());
    }
}
