//! In-memory store implementations
//!
//! Backed by `DashMap`, used in dev mode and by tests. Single-process only;
//! the compare-and-set operations rely on DashMap's per-entry locking.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{LoadBalancerGroupStore, RequestStore, StateStore};
use crate::models::{
    ChangeRequest, InternalRequestState, QueuedRequestId, ServiceDefinition, UpstreamInfo,
};
use crate::types::{Result, SwitchyardError};

/// In-memory request store with a FIFO queue
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: DashMap<String, ChangeRequest>,
    states: DashMap<String, InternalRequestState>,
    messages: DashMap<String, String>,
    queue: Mutex<Vec<QueuedRequestId>>,
    next_index: AtomicU64,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get_request(&self, request_id: &str) -> Result<Option<ChangeRequest>> {
        Ok(self.requests.get(request_id).map(|r| r.clone()))
    }

    async fn add_request(&self, request: &ChangeRequest) -> Result<()> {
        // First writer wins; a racing duplicate submission keeps the original
        self.requests
            .entry(request.request_id.clone())
            .or_insert_with(|| request.clone());
        Ok(())
    }

    async fn get_request_state(
        &self,
        request_id: &str,
    ) -> Result<Option<InternalRequestState>> {
        Ok(self.states.get(request_id).map(|s| *s))
    }

    async fn set_request_state(
        &self,
        request_id: &str,
        state: InternalRequestState,
    ) -> Result<()> {
        self.states.insert(request_id.to_string(), state);
        Ok(())
    }

    async fn set_request_state_if(
        &self,
        request_id: &str,
        expected: InternalRequestState,
        state: InternalRequestState,
    ) -> Result<bool> {
        match self.states.get_mut(request_id) {
            Some(mut current) if *current == expected => {
                *current = state;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_request_message(&self, request_id: &str) -> Result<Option<String>> {
        Ok(self.messages.get(request_id).map(|m| m.clone()))
    }

    async fn set_request_message(&self, request_id: &str, message: &str) -> Result<()> {
        self.messages
            .insert(request_id.to_string(), message.to_string());
        Ok(())
    }

    async fn enqueue_request(&self, request: &ChangeRequest) -> Result<QueuedRequestId> {
        let queued = QueuedRequestId {
            service_id: request.service.service_id.clone(),
            request_id: request.request_id.clone(),
            index: self.next_index.fetch_add(1, Ordering::SeqCst),
        };
        let mut queue = self
            .queue
            .lock()
            .map_err(|e| SwitchyardError::Internal(format!("queue lock poisoned: {}", e)))?;
        queue.push(queued.clone());
        Ok(queued)
    }

    async fn get_queued_request_ids(&self) -> Result<Vec<QueuedRequestId>> {
        let queue = self
            .queue
            .lock()
            .map_err(|e| SwitchyardError::Internal(format!("queue lock poisoned: {}", e)))?;
        Ok(queue.clone())
    }

    async fn remove_queued_request(&self, queued: &QueuedRequestId) -> Result<()> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|e| SwitchyardError::Internal(format!("queue lock poisoned: {}", e)))?;
        queue.retain(|q| q.index != queued.index);
        Ok(())
    }
}

/// In-memory group membership and base-path reservation table
#[derive(Default)]
pub struct InMemoryGroupStore {
    clusters: DashMap<String, ()>,
    // (group, base_path) -> owning service id
    base_paths: DashMap<(String, String), String>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor seeding known groups.
    pub fn with_clusters(clusters: impl IntoIterator<Item = String>) -> Self {
        let store = Self::default();
        for cluster in clusters {
            store.clusters.insert(cluster, ());
        }
        store
    }
}

#[async_trait]
impl LoadBalancerGroupStore for InMemoryGroupStore {
    async fn get_clusters(&self) -> Result<BTreeSet<String>> {
        Ok(self.clusters.iter().map(|e| e.key().clone()).collect())
    }

    async fn add_cluster(&self, group: &str) -> Result<()> {
        self.clusters.insert(group.to_string(), ());
        Ok(())
    }

    async fn get_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .base_paths
            .get(&(group.to_string(), base_path.to_string()))
            .map(|v| v.clone()))
    }

    async fn set_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<()> {
        self.base_paths.insert(
            (group.to_string(), base_path.to_string()),
            service_id.to_string(),
        );
        Ok(())
    }

    async fn try_acquire_base_path(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<std::result::Result<(), String>> {
        // Entry API holds the shard lock across the ownership check
        let entry = self
            .base_paths
            .entry((group.to_string(), base_path.to_string()))
            .or_insert_with(|| service_id.to_string());
        if entry.value() == service_id {
            Ok(Ok(()))
        } else {
            Ok(Err(entry.value().clone()))
        }
    }

    async fn clear_base_path(&self, group: &str, base_path: &str) -> Result<()> {
        self.base_paths
            .remove(&(group.to_string(), base_path.to_string()));
        Ok(())
    }

    async fn get_base_paths(&self, group: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .base_paths
            .iter()
            .filter(|e| e.key().0 == group)
            .map(|e| e.key().1.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Committed service state held in memory
#[derive(Default)]
pub struct InMemoryStateStore {
    services: DashMap<String, ServiceDefinition>,
    upstreams: DashMap<String, Vec<UpstreamInfo>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_service(&self, service_id: &str) -> Result<Option<ServiceDefinition>> {
        Ok(self.services.get(service_id).map(|s| s.clone()))
    }

    async fn add_service(&self, service: &ServiceDefinition) -> Result<()> {
        self.services
            .insert(service.service_id.clone(), service.clone());
        Ok(())
    }

    async fn get_upstreams(&self, service_id: &str) -> Result<Vec<UpstreamInfo>> {
        Ok(self
            .upstreams
            .get(service_id)
            .map(|u| u.clone())
            .unwrap_or_default())
    }

    async fn remove_upstreams(
        &self,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()> {
        if let Some(mut current) = self.upstreams.get_mut(service_id) {
            current.retain(|u| !upstreams.contains(u));
        }
        Ok(())
    }

    async fn add_upstreams(
        &self,
        request_id: &str,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()> {
        let mut current = self.upstreams.entry(service_id.to_string()).or_default();
        for upstream in upstreams {
            let mut stamped = upstream.clone();
            stamped.request_id = Some(request_id.to_string());
            // Refresh metadata if the target is already registered
            current.retain(|u| u != &stamped);
            current.push(stamped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceDefinition;

    fn request(id: &str) -> ChangeRequest {
        ChangeRequest {
            request_id: id.to_string(),
            service: ServiceDefinition::new("svc", "/svc", ["g1".to_string()]),
            add_upstreams: vec![],
            remove_upstreams: vec![],
        }
    }

    #[tokio::test]
    async fn queue_preserves_fifo_order() {
        let store = InMemoryRequestStore::new();
        store.enqueue_request(&request("a")).await.unwrap();
        store.enqueue_request(&request("b")).await.unwrap();
        store.enqueue_request(&request("c")).await.unwrap();

        let ids: Vec<String> = store
            .get_queued_request_ids()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.request_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn remove_queued_request_drops_only_that_handle() {
        let store = InMemoryRequestStore::new();
        let a = store.enqueue_request(&request("a")).await.unwrap();
        store.enqueue_request(&request("b")).await.unwrap();

        store.remove_queued_request(&a).await.unwrap();
        let remaining = store.get_queued_request_ids().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].request_id, "b");
    }

    #[tokio::test]
    async fn add_request_is_first_writer_wins() {
        let store = InMemoryRequestStore::new();
        let original = request("a");
        let mut altered = request("a");
        altered.service.base_path = "/other".to_string();

        store.add_request(&original).await.unwrap();
        store.add_request(&altered).await.unwrap();

        let stored = store.get_request("a").await.unwrap().unwrap();
        assert_eq!(stored.service.base_path, "/svc");
    }

    #[tokio::test]
    async fn conditional_state_write_rejects_stale_expectation() {
        let store = InMemoryRequestStore::new();
        store
            .set_request_state("a", InternalRequestState::QueuedApply)
            .await
            .unwrap();

        let won = store
            .set_request_state_if(
                "a",
                InternalRequestState::QueuedApply,
                InternalRequestState::ApplyInFlight,
            )
            .await
            .unwrap();
        assert!(won);

        let lost = store
            .set_request_state_if(
                "a",
                InternalRequestState::QueuedApply,
                InternalRequestState::CancelledQueuedRevert,
            )
            .await
            .unwrap();
        assert!(!lost);
        assert_eq!(
            store.get_request_state("a").await.unwrap(),
            Some(InternalRequestState::ApplyInFlight)
        );
    }

    #[tokio::test]
    async fn base_path_acquire_reports_conflicting_owner() {
        let store = InMemoryGroupStore::with_clusters(["g1".to_string()]);
        assert!(store
            .try_acquire_base_path("g1", "/svc", "svc-a")
            .await
            .unwrap()
            .is_ok());

        // Same owner may re-acquire
        assert!(store
            .try_acquire_base_path("g1", "/svc", "svc-a")
            .await
            .unwrap()
            .is_ok());

        let conflict = store
            .try_acquire_base_path("g1", "/svc", "svc-b")
            .await
            .unwrap();
        assert_eq!(conflict, Err("svc-a".to_string()));
    }

    #[tokio::test]
    async fn add_upstreams_stamps_request_id_and_dedups() {
        let store = InMemoryStateStore::new();
        let target = UpstreamInfo::new("10.0.0.1:8080");
        store
            .add_upstreams("req-1", "svc", &[target.clone()])
            .await
            .unwrap();
        store
            .add_upstreams("req-2", "svc", &[target])
            .await
            .unwrap();

        let upstreams = store.get_upstreams("svc").await.unwrap();
        assert_eq!(upstreams.len(), 1);
        assert_eq!(upstreams[0].request_id.as_deref(), Some("req-2"));
    }
}
