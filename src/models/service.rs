//! Service and upstream models

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// A load-balanced service definition.
///
/// `base_path` must be uniquely owned per load-balancer group; the
/// coordinator enforces this at admission time via the reservation table.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    /// Unique service identifier
    pub service_id: String,

    /// URL path prefix this service is routed under within each group
    pub base_path: String,

    /// Named load-balancer clusters this service is deployed to (non-empty)
    pub load_balancer_groups: BTreeSet<String>,

    /// Opaque template options passed through to the data plane
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ServiceDefinition {
    pub fn new(
        service_id: impl Into<String>,
        base_path: impl Into<String>,
        load_balancer_groups: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            base_path: base_path.into(),
            load_balancer_groups: load_balancer_groups.into_iter().collect(),
            options: serde_json::Map::new(),
        }
    }
}

/// A backend target registered to receive traffic for a service.
///
/// Compared by `upstream` identity only: `request_id` and `rack_id` are
/// metadata and do not participate in set membership.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamInfo {
    /// Target identifier (host:port or equivalent)
    pub upstream: String,

    /// Request that introduced this upstream (stamped by the state store)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Rack/zone hint for locality-aware balancing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack_id: Option<String>,
}

impl UpstreamInfo {
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            request_id: None,
            rack_id: None,
        }
    }
}

impl PartialEq for UpstreamInfo {
    fn eq(&self, other: &Self) -> bool {
        self.upstream == other.upstream
    }
}

impl Eq for UpstreamInfo {}

impl Hash for UpstreamInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.upstream.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn upstreams_compare_by_identity_only() {
        let a = UpstreamInfo::new("10.0.0.1:8080");
        let b = UpstreamInfo {
            upstream: "10.0.0.1:8080".to_string(),
            request_id: Some("req-7".to_string()),
            rack_id: Some("us-east-1a".to_string()),
        };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b), "metadata must not defeat set membership");
    }

    #[test]
    fn service_round_trips_camel_case() {
        let service = ServiceDefinition::new(
            "accounts",
            "/accounts",
            ["us-east-1".to_string()],
        );
        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(json["serviceId"], "accounts");
        assert_eq!(json["basePath"], "/accounts");
        let back: ServiceDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, service);
    }
}
