//! Request lifecycle states
//!
//! Internal states track the full apply/revert walk; the public
//! `RequestState` is the coarse view returned to callers. A request is
//! cancelable only while it sits in the queue with no apply step started.

use serde::{Deserialize, Serialize};

/// Internal lifecycle state of a change request.
///
/// Written by the coordinator (admission, cancellation) and the worker
/// (execution outcomes). The coordinator never interprets these beyond
/// `is_cancelable` and the public projection.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InternalRequestState {
    /// Rejected after persistence (e.g. lost the reservation race); nothing applied
    InvalidRequestNoop,
    /// Admitted and queued, no apply step started yet
    QueuedApply,
    /// Worker is sending apply requests to agents
    ApplyInFlight,
    /// Applied everywhere and committed
    Completed,
    /// Apply failed, revert queued
    FailedQueuedRevert,
    /// Worker is sending revert requests after a failed apply
    FailedRevertInFlight,
    /// Apply failed and the revert succeeded
    FailedReverted,
    /// Apply failed and the revert also failed
    FailedRevertFailed,
    /// Canceled by the caller, revert queued
    CancelledQueuedRevert,
    /// Worker is sending revert requests after cancellation
    CancelledRevertInFlight,
    /// Canceled and reverted
    Cancelled,
}

impl InternalRequestState {
    /// Whether a caller may still cancel a request in this state.
    ///
    /// True only before any apply/revert step has begun.
    pub fn is_cancelable(&self) -> bool {
        matches!(self, Self::QueuedApply)
    }

    /// Whether this state still has queued work for the worker.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::QueuedApply | Self::CancelledQueuedRevert | Self::FailedQueuedRevert
        )
    }

    /// Project to the externally visible request state.
    pub fn to_request_state(&self) -> RequestState {
        match self {
            Self::InvalidRequestNoop => RequestState::InvalidRequest,
            Self::QueuedApply => RequestState::Waiting,
            Self::ApplyInFlight => RequestState::InProgress,
            Self::Completed => RequestState::Success,
            Self::FailedQueuedRevert
            | Self::FailedRevertInFlight
            | Self::FailedReverted
            | Self::FailedRevertFailed => RequestState::Failed,
            Self::CancelledQueuedRevert | Self::CancelledRevertInFlight => RequestState::Cancelling,
            Self::Cancelled => RequestState::Cancelled,
        }
    }
}

/// Externally visible request state returned in responses.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    InvalidRequest,
    Waiting,
    InProgress,
    Success,
    Failed,
    Cancelling,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_queued_apply_is_cancelable() {
        let all = [
            InternalRequestState::InvalidRequestNoop,
            InternalRequestState::QueuedApply,
            InternalRequestState::ApplyInFlight,
            InternalRequestState::Completed,
            InternalRequestState::FailedQueuedRevert,
            InternalRequestState::FailedRevertInFlight,
            InternalRequestState::FailedReverted,
            InternalRequestState::FailedRevertFailed,
            InternalRequestState::CancelledQueuedRevert,
            InternalRequestState::CancelledRevertInFlight,
            InternalRequestState::Cancelled,
        ];
        for state in all {
            assert_eq!(
                state.is_cancelable(),
                state == InternalRequestState::QueuedApply,
                "unexpected cancelable flag for {:?}",
                state
            );
        }
    }

    #[test]
    fn queued_states_are_pending() {
        assert!(InternalRequestState::QueuedApply.is_pending());
        assert!(InternalRequestState::CancelledQueuedRevert.is_pending());
        assert!(InternalRequestState::FailedQueuedRevert.is_pending());
        assert!(!InternalRequestState::ApplyInFlight.is_pending());
        assert!(!InternalRequestState::Completed.is_pending());
    }

    #[test]
    fn failed_states_project_to_failed() {
        assert_eq!(
            InternalRequestState::FailedQueuedRevert.to_request_state(),
            RequestState::Failed
        );
        assert_eq!(
            InternalRequestState::FailedRevertFailed.to_request_state(),
            RequestState::Failed
        );
    }

    #[test]
    fn cancel_walk_projects_to_cancelling_then_cancelled() {
        assert_eq!(
            InternalRequestState::CancelledQueuedRevert.to_request_state(),
            RequestState::Cancelling
        );
        assert_eq!(
            InternalRequestState::Cancelled.to_request_state(),
            RequestState::Cancelled
        );
    }

    #[test]
    fn states_serialize_screaming_snake() {
        let json = serde_json::to_string(&InternalRequestState::QueuedApply).unwrap();
        assert_eq!(json, "\"QUEUED_APPLY\"");
        let json = serde_json::to_string(&RequestState::InvalidRequest).unwrap();
        assert_eq!(json, "\"INVALID_REQUEST\"");
    }
}
