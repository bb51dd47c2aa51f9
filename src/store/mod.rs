//! Store facades over the shared, externally-consistent datastore
//!
//! The coordinator is a stateless façade: all cross-request coordination is
//! expressed as single-key atomic operations against these stores, reachable
//! concurrently from any coordinator or worker process. No in-process locks
//! guard anything across processes; the compare-and-set operations below are
//! the only synchronization primitives.
//!
//! Two implementations: `memory` (DashMap, dev mode and tests) and `mongo`
//! (production, unique indexes backing the compare-and-set semantics).

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{
    ChangeRequest, InternalRequestState, QueuedRequestId, ServiceDefinition, UpstreamInfo,
};
use crate::types::Result;

pub use memory::{InMemoryGroupStore, InMemoryRequestStore, InMemoryStateStore};
pub use mongo::{MongoGroupStore, MongoRequestStore, MongoStateStore};

/// Shared handle types
pub type RequestStoreHandle = Arc<dyn RequestStore>;
pub type GroupStoreHandle = Arc<dyn LoadBalancerGroupStore>;
pub type StateStoreHandle = Arc<dyn StateStore>;

/// Request bodies, lifecycle state, messages, and the FIFO work queue.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Fetch a request body by id.
    async fn get_request(&self, request_id: &str) -> Result<Option<ChangeRequest>>;

    /// Persist a request body. Writing the same id twice is idempotent.
    async fn add_request(&self, request: &ChangeRequest) -> Result<()>;

    async fn get_request_state(&self, request_id: &str)
        -> Result<Option<InternalRequestState>>;

    /// Unconditional state write; callers own transition validity.
    async fn set_request_state(
        &self,
        request_id: &str,
        state: InternalRequestState,
    ) -> Result<()>;

    /// Conditional state write: succeeds only if the current state still
    /// equals `expected`. Returns whether the write happened.
    async fn set_request_state_if(
        &self,
        request_id: &str,
        expected: InternalRequestState,
        state: InternalRequestState,
    ) -> Result<bool>;

    async fn get_request_message(&self, request_id: &str) -> Result<Option<String>>;

    async fn set_request_message(&self, request_id: &str, message: &str) -> Result<()>;

    /// Append the request to the work queue, returning its FIFO handle.
    async fn enqueue_request(&self, request: &ChangeRequest) -> Result<QueuedRequestId>;

    /// Queued handles in FIFO order.
    async fn get_queued_request_ids(&self) -> Result<Vec<QueuedRequestId>>;

    async fn remove_queued_request(&self, queued: &QueuedRequestId) -> Result<()>;
}

/// Cluster membership and the base-path reservation table.
#[async_trait]
pub trait LoadBalancerGroupStore: Send + Sync {
    /// Names of all known load-balancer groups.
    async fn get_clusters(&self) -> Result<BTreeSet<String>>;

    /// Register a group as known. Idempotent.
    async fn add_cluster(&self, group: &str) -> Result<()>;

    /// Current owner of `(group, base_path)`, if reserved.
    async fn get_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
    ) -> Result<Option<String>>;

    /// Unconditional reservation write (admin surface; the coordinator uses
    /// `try_acquire_base_path` instead).
    async fn set_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<()>;

    /// Atomically reserve `(group, base_path)` for `service_id`.
    ///
    /// Succeeds if the key is vacant or already owned by the same service;
    /// otherwise returns the conflicting owner's id. This is the write that
    /// closes the check-then-reserve window between concurrent admissions.
    async fn try_acquire_base_path(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<std::result::Result<(), String>>;

    async fn clear_base_path(&self, group: &str, base_path: &str) -> Result<()>;

    /// All reserved base paths within a group.
    async fn get_base_paths(&self, group: &str) -> Result<Vec<String>>;
}

/// Committed service definitions and their upstream sets.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_service(&self, service_id: &str) -> Result<Option<ServiceDefinition>>;

    /// Upsert the committed service definition.
    async fn add_service(&self, service: &ServiceDefinition) -> Result<()>;

    async fn get_upstreams(&self, service_id: &str) -> Result<Vec<UpstreamInfo>>;

    async fn remove_upstreams(
        &self,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()>;

    /// Add upstreams to the committed set, stamping each with the request
    /// that introduced it. Adding an already-present upstream refreshes its
    /// metadata rather than duplicating it.
    async fn add_upstreams(
        &self,
        request_id: &str,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()>;
}
