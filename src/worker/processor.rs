//! Request worker - drains the queue and executes apply/revert
//!
//! Reads each queued request, walks it through the apply (or revert) state
//! transitions via the coordinator's primitives, and commits successful
//! results. Multiple worker processes may run; the conditional state writes
//! keep them from double-driving a request.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::relay::AgentRelay;
use crate::coordinator::RequestCoordinator;
use crate::models::{
    ChangeRequest, InternalRequestState, QueuedRequestId, RequestAction, RequestResponse,
};
use crate::types::{Result, SwitchyardError};

/// Worker configuration
pub struct WorkerConfig {
    /// Unique worker ID
    pub worker_id: String,
    /// How long to sleep between polls of an empty queue
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            poll_interval_ms: 1000,
        }
    }
}

/// Apply/revert worker over the coordinator's state/queue primitives
pub struct RequestWorker {
    config: WorkerConfig,
    coordinator: Arc<RequestCoordinator>,
    relay: Arc<dyn AgentRelay>,
    running: Arc<RwLock<bool>>,
}

impl RequestWorker {
    pub fn new(
        config: WorkerConfig,
        coordinator: Arc<RequestCoordinator>,
        relay: Arc<dyn AgentRelay>,
    ) -> Self {
        Self {
            config,
            coordinator,
            relay,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run the queue-draining loop until `stop` is called.
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;
        info!("Worker {} starting queue processing loop", self.config.worker_id);

        while *self.running.read().await {
            match self.drain_queue().await {
                Ok(0) => {
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
                Ok(count) => {
                    debug!("Processed {} queued requests", count);
                }
                Err(e) => {
                    error!("Error draining queue: {}", e);
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }

        info!("Worker {} stopped", self.config.worker_id);
        Ok(())
    }

    /// Stop the worker loop
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    /// Process every currently queued request once, FIFO.
    ///
    /// A queue entry is removed on success or when the request is gone for
    /// good; transient failures keep the entry so the next drain retries it.
    pub async fn drain_queue(&self) -> Result<usize> {
        let queued = self.coordinator.get_queued_request_ids().await?;
        let count = queued.len();

        for handle in queued {
            match self.process_queued(&handle).await {
                Ok(()) => {
                    self.coordinator.remove_queued_request(&handle).await?;
                }
                Err(SwitchyardError::NotFound(reason)) => {
                    warn!(
                        request_id = %handle.request_id,
                        reason = %reason,
                        "Dropping queue entry for missing request"
                    );
                    self.coordinator.remove_queued_request(&handle).await?;
                }
                Err(e) => {
                    warn!(
                        request_id = %handle.request_id,
                        error = %e,
                        "Failed to process queued request, keeping entry for retry"
                    );
                }
            }
        }

        Ok(count)
    }

    async fn process_queued(&self, handle: &QueuedRequestId) -> Result<()> {
        self.process_request(&handle.request_id, None).await.map(|_| ())
    }

    /// Drive one request through apply or revert and return the resulting
    /// response. This is the routine behind the execution trigger surface;
    /// `action` defaults to the forward apply.
    pub async fn process_request(
        &self,
        request_id: &str,
        action: Option<RequestAction>,
    ) -> Result<RequestResponse> {
        let request = self
            .coordinator
            .get_request(request_id)
            .await?
            .ok_or_else(|| {
                SwitchyardError::NotFound(format!("No request with id {}", request_id))
            })?;
        let state = self
            .coordinator
            .get_request_state(request_id)
            .await?
            .ok_or_else(|| {
                SwitchyardError::NotFound(format!("No state recorded for request {}", request_id))
            })?;

        match (state, action) {
            // Caller asked for a revert, or a cancellation/failed apply left
            // one queued (the latter happens when a worker dies between
            // marking the failure and running the revert)
            (InternalRequestState::CancelledQueuedRevert, _)
            | (InternalRequestState::FailedQueuedRevert, _)
            | (_, Some(RequestAction::Revert)) => {
                self.execute_revert(&request, state).await?;
            }
            (InternalRequestState::QueuedApply, _) | (_, Some(RequestAction::Apply)) => {
                self.execute_apply(&request).await?;
            }
            _ => {
                debug!(
                    request_id = %request_id,
                    state = ?state,
                    "Request has no queued work, leaving state untouched"
                );
            }
        }

        self.coordinator
            .get_response(request_id)
            .await?
            .ok_or_else(|| {
                SwitchyardError::Internal(format!(
                    "Response vanished for request {}",
                    request_id
                ))
            })
    }

    async fn execute_apply(&self, request: &ChangeRequest) -> Result<()> {
        let request_id = &request.request_id;

        // Conditional claim: a racing worker or a cancellation that landed
        // first wins, and we simply leave the request to them
        let claimed = self
            .coordinator
            .set_request_state_if(
                request_id,
                InternalRequestState::QueuedApply,
                InternalRequestState::ApplyInFlight,
            )
            .await?;
        if !claimed {
            debug!(request_id = %request_id, "Apply claim lost, skipping");
            return Ok(());
        }

        match self.relay_to_all_groups(request, RequestAction::Apply).await {
            Ok(()) => {
                self.coordinator.commit_request(request).await?;
                self.coordinator
                    .set_request_state(request_id, InternalRequestState::Completed)
                    .await?;
                self.coordinator
                    .set_request_message(request_id, "Apply succeeded on all groups")
                    .await?;
                info!(request_id = %request_id, "Request applied and committed");
            }
            Err(apply_err) => {
                warn!(request_id = %request_id, error = %apply_err, "Apply failed, reverting");
                self.coordinator
                    .set_request_state(request_id, InternalRequestState::FailedQueuedRevert)
                    .await?;
                self.coordinator
                    .set_request_message(request_id, &format!("Apply failed: {}", apply_err))
                    .await?;
                self.run_revert(
                    request,
                    InternalRequestState::FailedRevertInFlight,
                    InternalRequestState::FailedReverted,
                    InternalRequestState::FailedRevertFailed,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn execute_revert(
        &self,
        request: &ChangeRequest,
        state: InternalRequestState,
    ) -> Result<()> {
        match state {
            InternalRequestState::CancelledQueuedRevert => {
                self.run_revert(
                    request,
                    InternalRequestState::CancelledRevertInFlight,
                    InternalRequestState::Cancelled,
                    InternalRequestState::FailedRevertFailed,
                )
                .await
            }
            InternalRequestState::FailedQueuedRevert => {
                self.run_revert(
                    request,
                    InternalRequestState::FailedRevertInFlight,
                    InternalRequestState::FailedReverted,
                    InternalRequestState::FailedRevertFailed,
                )
                .await
            }
            other => {
                debug!(
                    request_id = %request.request_id,
                    state = ?other,
                    "No revert queued for this state"
                );
                Ok(())
            }
        }
    }

    async fn run_revert(
        &self,
        request: &ChangeRequest,
        in_flight: InternalRequestState,
        on_success: InternalRequestState,
        on_failure: InternalRequestState,
    ) -> Result<()> {
        let request_id = &request.request_id;
        self.coordinator
            .set_request_state(request_id, in_flight)
            .await?;

        match self.relay_to_all_groups(request, RequestAction::Revert).await {
            Ok(()) => {
                self.coordinator
                    .set_request_state(request_id, on_success)
                    .await?;
                self.coordinator
                    .set_request_message(request_id, "Revert succeeded on all groups")
                    .await?;
                info!(request_id = %request_id, state = ?on_success, "Request reverted");
            }
            Err(revert_err) => {
                error!(request_id = %request_id, error = %revert_err, "Revert failed");
                self.coordinator
                    .set_request_state(request_id, on_failure)
                    .await?;
                self.coordinator
                    .set_request_message(
                        request_id,
                        &format!("Revert failed: {}", revert_err),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn relay_to_all_groups(
        &self,
        request: &ChangeRequest,
        action: RequestAction,
    ) -> Result<()> {
        for group in &request.service.load_balancer_groups {
            match action {
                RequestAction::Apply => self.relay.apply(group, request).await?,
                RequestAction::Revert => self.relay.revert(group, request).await?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RequestCoordinator;
    use crate::models::{RequestState, ServiceDefinition, UpstreamInfo};
    use crate::store::{
        GroupStoreHandle, InMemoryGroupStore, InMemoryRequestStore, InMemoryStateStore,
        RequestStore, RequestStoreHandle, StateStore, StateStoreHandle,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Relay recording calls, optionally failing applies
    #[derive(Default)]
    struct RecordingRelay {
        fail_apply: AtomicBool,
        applied: AtomicBool,
        reverted: AtomicBool,
    }

    #[async_trait]
    impl AgentRelay for RecordingRelay {
        async fn apply(&self, _group: &str, request: &ChangeRequest) -> Result<()> {
            if self.fail_apply.load(Ordering::SeqCst) {
                return Err(SwitchyardError::Internal(format!(
                    "agent rejected request {}",
                    request.request_id
                )));
            }
            self.applied.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn revert(&self, _group: &str, _request: &ChangeRequest) -> Result<()> {
            self.reverted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fixture(relay: Arc<RecordingRelay>) -> (Arc<RequestCoordinator>, RequestWorker, StateStoreHandle) {
        let requests: RequestStoreHandle = Arc::new(InMemoryRequestStore::new());
        let groups: GroupStoreHandle = Arc::new(InMemoryGroupStore::with_clusters([
            "us-east-1".to_string(),
        ]));
        let state: StateStoreHandle = Arc::new(InMemoryStateStore::new());
        let coordinator = Arc::new(RequestCoordinator::new(
            requests,
            groups,
            Arc::clone(&state),
        ));
        let worker = RequestWorker::new(
            WorkerConfig {
                worker_id: "test-worker".to_string(),
                poll_interval_ms: 10,
            },
            Arc::clone(&coordinator),
            relay,
        );
        (coordinator, worker, state)
    }

    fn change_request(id: &str) -> ChangeRequest {
        ChangeRequest {
            request_id: id.to_string(),
            service: ServiceDefinition::new("svc-a", "/svc-a", ["us-east-1".to_string()]),
            add_upstreams: vec![UpstreamInfo::new("10.0.0.1:8080")],
            remove_upstreams: vec![],
        }
    }

    #[tokio::test]
    async fn successful_apply_commits_and_completes() {
        let relay = Arc::new(RecordingRelay::default());
        let (coordinator, worker, state) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        let processed = worker.drain_queue().await.unwrap();
        assert_eq!(processed, 1);

        assert!(relay.applied.load(Ordering::SeqCst));
        let response = coordinator.get_response("req-1").await.unwrap().unwrap();
        assert_eq!(response.state, RequestState::Success);

        // Committed upstreams visible in the state store
        let upstreams = state.get_upstreams("svc-a").await.unwrap();
        assert_eq!(upstreams.len(), 1);
        assert_eq!(upstreams[0].request_id.as_deref(), Some("req-1"));

        // Queue is drained
        assert!(coordinator.get_queued_request_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_apply_reverts_and_reports_failure() {
        let relay = Arc::new(RecordingRelay::default());
        relay.fail_apply.store(true, Ordering::SeqCst);
        let (coordinator, worker, state) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        worker.drain_queue().await.unwrap();

        assert!(relay.reverted.load(Ordering::SeqCst));
        let response = coordinator.get_response("req-1").await.unwrap().unwrap();
        assert_eq!(response.state, RequestState::Failed);
        assert!(response.message.unwrap().contains("Revert succeeded"));

        // Nothing was committed
        assert!(state.get_service("svc-a").await.unwrap().is_none());
        assert_eq!(
            coordinator.get_request_state("req-1").await.unwrap(),
            Some(InternalRequestState::FailedReverted)
        );
    }

    #[tokio::test]
    async fn cancelled_request_is_reverted_not_applied() {
        let relay = Arc::new(RecordingRelay::default());
        let (coordinator, worker, _) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        coordinator.cancel_request("req-1").await.unwrap();
        worker.drain_queue().await.unwrap();

        assert!(!relay.applied.load(Ordering::SeqCst));
        assert!(relay.reverted.load(Ordering::SeqCst));
        let response = coordinator.get_response("req-1").await.unwrap().unwrap();
        assert_eq!(response.state, RequestState::Cancelled);
    }

    #[tokio::test]
    async fn explicit_revert_action_drives_cancellation_path() {
        let relay = Arc::new(RecordingRelay::default());
        let (coordinator, worker, _) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        coordinator.cancel_request("req-1").await.unwrap();

        let response = worker
            .process_request("req-1", Some(RequestAction::Revert))
            .await
            .unwrap();
        assert_eq!(response.state, RequestState::Cancelled);
    }

    #[tokio::test]
    async fn terminal_request_is_left_untouched() {
        let relay = Arc::new(RecordingRelay::default());
        let (coordinator, worker, _) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        worker.drain_queue().await.unwrap();
        relay.applied.store(false, Ordering::SeqCst);

        // Processing again must not re-apply or change the terminal state
        let response = worker.process_request("req-1", None).await.unwrap();
        assert_eq!(response.state, RequestState::Success);
        assert!(!relay.applied.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let relay = Arc::new(RecordingRelay::default());
        let (_, worker, _) = fixture(relay);

        let err = worker.process_request("missing", None).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::NotFound(_)));
    }

    #[tokio::test]
    async fn orphaned_failed_revert_is_picked_up_by_the_poll_loop() {
        let relay = Arc::new(RecordingRelay::default());
        let (coordinator, worker, _) = fixture(Arc::clone(&relay));

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        // A worker died after marking the failed apply but before reverting
        coordinator
            .set_request_state("req-1", InternalRequestState::FailedQueuedRevert)
            .await
            .unwrap();

        worker.drain_queue().await.unwrap();

        assert!(relay.reverted.load(Ordering::SeqCst));
        assert!(!relay.applied.load(Ordering::SeqCst));
        assert_eq!(
            coordinator.get_request_state("req-1").await.unwrap(),
            Some(InternalRequestState::FailedReverted)
        );
    }

    /// Request store whose next body read fails with a store fault
    struct FlakyRequestStore {
        inner: InMemoryRequestStore,
        fail_next_get: AtomicBool,
    }

    #[async_trait]
    impl RequestStore for FlakyRequestStore {
        async fn get_request(&self, request_id: &str) -> Result<Option<ChangeRequest>> {
            if self.fail_next_get.swap(false, Ordering::SeqCst) {
                return Err(SwitchyardError::Database("connection reset".to_string()));
            }
            self.inner.get_request(request_id).await
        }
        async fn add_request(&self, request: &ChangeRequest) -> Result<()> {
            self.inner.add_request(request).await
        }
        async fn get_request_state(
            &self,
            request_id: &str,
        ) -> Result<Option<InternalRequestState>> {
            self.inner.get_request_state(request_id).await
        }
        async fn set_request_state(
            &self,
            request_id: &str,
            state: InternalRequestState,
        ) -> Result<()> {
            self.inner.set_request_state(request_id, state).await
        }
        async fn set_request_state_if(
            &self,
            request_id: &str,
            expected: InternalRequestState,
            state: InternalRequestState,
        ) -> Result<bool> {
            self.inner
                .set_request_state_if(request_id, expected, state)
                .await
        }
        async fn get_request_message(&self, request_id: &str) -> Result<Option<String>> {
            self.inner.get_request_message(request_id).await
        }
        async fn set_request_message(&self, request_id: &str, message: &str) -> Result<()> {
            self.inner.set_request_message(request_id, message).await
        }
        async fn enqueue_request(&self, request: &ChangeRequest) -> Result<QueuedRequestId> {
            self.inner.enqueue_request(request).await
        }
        async fn get_queued_request_ids(&self) -> Result<Vec<QueuedRequestId>> {
            self.inner.get_queued_request_ids().await
        }
        async fn remove_queued_request(&self, queued: &QueuedRequestId) -> Result<()> {
            self.inner.remove_queued_request(queued).await
        }
    }

    #[tokio::test]
    async fn transient_store_error_keeps_queue_entry_for_retry() {
        let relay = Arc::new(RecordingRelay::default());
        let requests = Arc::new(FlakyRequestStore {
            inner: InMemoryRequestStore::new(),
            fail_next_get: AtomicBool::new(false),
        });
        let groups: GroupStoreHandle = Arc::new(InMemoryGroupStore::with_clusters([
            "us-east-1".to_string(),
        ]));
        let coordinator = Arc::new(RequestCoordinator::new(
            Arc::clone(&requests) as RequestStoreHandle,
            groups,
            Arc::new(InMemoryStateStore::new()),
        ));
        let worker = RequestWorker::new(
            WorkerConfig {
                worker_id: "test-worker".to_string(),
                poll_interval_ms: 10,
            },
            Arc::clone(&coordinator),
            Arc::clone(&relay) as Arc<dyn AgentRelay>,
        );

        coordinator.enqueue_request(&change_request("req-1")).await.unwrap();
        requests.fail_next_get.store(true, Ordering::SeqCst);

        // The faulty drain must not lose the queue entry or touch the state
        worker.drain_queue().await.unwrap();
        assert_eq!(coordinator.get_queued_request_ids().await.unwrap().len(), 1);
        assert_eq!(
            coordinator.get_request_state("req-1").await.unwrap(),
            Some(InternalRequestState::QueuedApply)
        );
        assert!(!relay.applied.load(Ordering::SeqCst));

        // The next drain retries and completes the request
        worker.drain_queue().await.unwrap();
        assert!(relay.applied.load(Ordering::SeqCst));
        assert!(coordinator.get_queued_request_ids().await.unwrap().is_empty());
        let response = coordinator.get_response("req-1").await.unwrap().unwrap();
        assert_eq!(response.state, RequestState::Success);
    }

    #[tokio::test]
    async fn queue_entry_for_missing_request_is_dropped() {
        let relay = Arc::new(RecordingRelay::default());
        let requests: RequestStoreHandle = Arc::new(InMemoryRequestStore::new());
        let groups: GroupStoreHandle = Arc::new(InMemoryGroupStore::with_clusters([
            "us-east-1".to_string(),
        ]));
        let coordinator = Arc::new(RequestCoordinator::new(
            Arc::clone(&requests),
            groups,
            Arc::new(InMemoryStateStore::new()),
        ));
        let worker = RequestWorker::new(
            WorkerConfig {
                worker_id: "test-worker".to_string(),
                poll_interval_ms: 10,
            },
            Arc::clone(&coordinator),
            Arc::clone(&relay) as Arc<dyn AgentRelay>,
        );

        // A queue entry with no persisted request behind it is permanent
        // garbage, not a retry candidate
        requests.enqueue_request(&change_request("ghost")).await.unwrap();

        worker.drain_queue().await.unwrap();
        assert!(coordinator.get_queued_request_ids().await.unwrap().is_empty());
        assert!(!relay.applied.load(Ordering::SeqCst));
    }
}
