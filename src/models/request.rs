//! Change request and queue handle models

use serde::{Deserialize, Serialize};

use super::service::{ServiceDefinition, UpstreamInfo};

/// A load-balancer configuration change request.
///
/// Immutable once accepted; `request_id` is caller-supplied and globally
/// unique. Re-submission under the same id is idempotent.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    /// Caller-supplied unique request id
    pub request_id: String,

    /// Service definition this request targets
    pub service: ServiceDefinition,

    /// Upstreams to register
    #[serde(default)]
    pub add_upstreams: Vec<UpstreamInfo>,

    /// Upstreams to deregister
    #[serde(default)]
    pub remove_upstreams: Vec<UpstreamInfo>,
}

impl ChangeRequest {
    /// Basic shape validation before admission.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_id.is_empty() {
            return Err("requestId must not be empty".to_string());
        }
        if self.service.service_id.is_empty() {
            return Err("serviceId must not be empty".to_string());
        }
        if self.service.base_path.is_empty() || !self.service.base_path.starts_with('/') {
            return Err("basePath must be a non-empty path starting with '/'".to_string());
        }
        if self.service.load_balancer_groups.is_empty() {
            return Err("loadBalancerGroups must not be empty".to_string());
        }
        Ok(())
    }
}

/// Requested worker action for the execution trigger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestAction {
    Apply,
    Revert,
}

/// FIFO queue handle for a pending request.
///
/// Appended by the coordinator at admission; removed by whoever drains the
/// queue once the request has been processed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRequestId {
    /// Service the queued request targets
    pub service_id: String,

    /// The queued request
    pub request_id: String,

    /// Store-assigned sequence number defining FIFO order
    pub index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::ServiceDefinition;

    fn request(groups: &[&str], base_path: &str) -> ChangeRequest {
        ChangeRequest {
            request_id: "req-1".to_string(),
            service: ServiceDefinition::new(
                "svc",
                base_path,
                groups.iter().map(|g| g.to_string()),
            ),
            add_upstreams: vec![],
            remove_upstreams: vec![],
        }
    }

    #[test]
    fn rejects_empty_groups() {
        let req = request(&[], "/svc");
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_relative_base_path() {
        let req = request(&["us-east-1"], "svc");
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        let req = request(&["us-east-1"], "/svc");
        assert!(req.validate().is_ok());
    }
}
