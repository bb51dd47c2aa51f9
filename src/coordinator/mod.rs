//! Request lifecycle coordinator
//!
//! The coordinator admits change requests exactly once, guards base-path
//! ownership across load-balancer groups, hands admitted work to the
//! apply/revert worker through the FIFO queue, and commits successful
//! results into the state store.
//!
//! It holds no state of its own: every operation is a sequence of single-key
//! reads and (conditional) writes against the shared stores, so any number
//! of coordinator processes can run concurrently.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{
    ChangeRequest, InternalRequestState, QueuedRequestId, RequestResponse,
};
use crate::store::{
    GroupStoreHandle, LoadBalancerGroupStore, RequestStore, RequestStoreHandle, StateStore,
    StateStoreHandle,
};
use crate::types::{Result, SwitchyardError};

/// Stateless façade coordinating request admission, cancellation, and commit.
pub struct RequestCoordinator {
    requests: RequestStoreHandle,
    groups: GroupStoreHandle,
    state: StateStoreHandle,
}

impl RequestCoordinator {
    pub fn new(
        requests: RequestStoreHandle,
        groups: GroupStoreHandle,
        state: StateStoreHandle,
    ) -> Self {
        Self {
            requests,
            groups,
            state,
        }
    }

    /// The request body, if admitted.
    pub async fn get_request(&self, request_id: &str) -> Result<Option<ChangeRequest>> {
        self.requests.get_request(request_id).await
    }

    pub async fn get_request_state(
        &self,
        request_id: &str,
    ) -> Result<Option<InternalRequestState>> {
        self.requests.get_request_state(request_id).await
    }

    /// Unconditional state write; callers (including the worker) own
    /// transition validity.
    pub async fn set_request_state(
        &self,
        request_id: &str,
        state: InternalRequestState,
    ) -> Result<()> {
        self.requests.set_request_state(request_id, state).await
    }

    /// Conditional state write for race-aware transitions.
    pub async fn set_request_state_if(
        &self,
        request_id: &str,
        expected: InternalRequestState,
        state: InternalRequestState,
    ) -> Result<bool> {
        self.requests
            .set_request_state_if(request_id, expected, state)
            .await
    }

    /// Attach a human-readable status/error message, independent of state.
    pub async fn set_request_message(&self, request_id: &str, message: &str) -> Result<()> {
        self.requests.set_request_message(request_id, message).await
    }

    /// Queued handles in FIFO order.
    pub async fn get_queued_request_ids(&self) -> Result<Vec<QueuedRequestId>> {
        self.requests.get_queued_request_ids().await
    }

    pub async fn remove_queued_request(&self, queued: &QueuedRequestId) -> Result<()> {
        self.requests.remove_queued_request(queued).await
    }

    /// The single polling read path: `None` when the id is unknown,
    /// otherwise the public projection of the recorded state plus the
    /// stored message.
    pub async fn get_response(&self, request_id: &str) -> Result<Option<RequestResponse>> {
        let Some(state) = self.requests.get_request_state(request_id).await? else {
            return Ok(None);
        };
        let message = self.requests.get_request_message(request_id).await?;
        Ok(Some(RequestResponse::from_state(request_id, state, message)))
    }

    /// Admit a change request: idempotency check, base-path and group
    /// validation, durable persistence, queue append, reservation acquire.
    ///
    /// Nothing is persisted when validation rejects the request. Losing the
    /// reservation race after persistence marks the request terminally
    /// invalid rather than overwriting the winner's reservation.
    pub async fn enqueue_request(&self, request: &ChangeRequest) -> Result<RequestResponse> {
        let request_id = &request.request_id;
        let service = &request.service;

        // Retried submissions (e.g. after a client-side timeout) must be
        // safe: an existing response is returned unchanged.
        if let Some(existing) = self.get_response(request_id).await? {
            debug!(request_id = %request_id, "Duplicate submission, returning existing response");
            return Ok(existing);
        }

        if let Err(reason) = request.validate() {
            return Err(SwitchyardError::BadRequest(reason));
        }

        self.ensure_base_paths_available(request).await?;
        self.ensure_groups_exist(request).await?;

        // Persist before reserving: a crash here leaves the request queued
        // but never leaves a reservation with no request behind it.
        self.requests.add_request(request).await?;
        self.requests
            .set_request_state(request_id, InternalRequestState::QueuedApply)
            .await?;
        let queued = self.requests.enqueue_request(request).await?;

        let mut acquired: Vec<&String> = Vec::with_capacity(service.load_balancer_groups.len());
        for group in &service.load_balancer_groups {
            match self
                .groups
                .try_acquire_base_path(group, &service.base_path, &service.service_id)
                .await?
            {
                Ok(()) => acquired.push(group),
                Err(owner) => {
                    // Lost the reservation race after validation passed.
                    // Back out what this call acquired and fail the request
                    // terminally instead of stealing the path.
                    warn!(
                        request_id = %request_id,
                        group = %group,
                        owner = %owner,
                        "Base path reservation lost to concurrent submission"
                    );
                    self.abandon_admission(request, &queued, group, &owner, &acquired)
                        .await?;
                    return Err(SwitchyardError::BasePathConflict {
                        request_id: request_id.clone(),
                        base_path: service.base_path.clone(),
                        owner,
                    });
                }
            }
        }

        info!(
            request_id = %request_id,
            service_id = %service.service_id,
            base_path = %service.base_path,
            groups = service.load_balancer_groups.len(),
            "Request admitted and queued for apply"
        );

        Ok(RequestResponse::from_state(
            request_id.clone(),
            InternalRequestState::QueuedApply,
            None,
        ))
    }

    /// Mark intent to revert. Absence and non-cancelable states are normal
    /// no-op outcomes, never errors; the returned value is whatever state
    /// the request ends up in.
    pub async fn cancel_request(
        &self,
        request_id: &str,
    ) -> Result<Option<InternalRequestState>> {
        let maybe_state = self.requests.get_request_state(request_id).await?;

        let Some(state) = maybe_state else {
            return Ok(None);
        };
        if !state.is_cancelable() {
            return Ok(Some(state));
        }

        // Conditional write: the worker may have started the apply between
        // our read and this write, and its transition must not be clobbered.
        let cancelled = self
            .requests
            .set_request_state_if(
                request_id,
                state,
                InternalRequestState::CancelledQueuedRevert,
            )
            .await?;

        if cancelled {
            info!(request_id = %request_id, "Request cancelled, queued for revert");
            Ok(Some(InternalRequestState::CancelledQueuedRevert))
        } else {
            // Lost to the worker; report what it wrote.
            self.requests.get_request_state(request_id).await
        }
    }

    /// Commit a successfully applied request into the state store.
    ///
    /// Callers guarantee at-most-once invocation, after the worker reports
    /// a successful apply.
    pub async fn commit_request(&self, request: &ChangeRequest) -> Result<()> {
        let service = &request.service;

        // A base-path move must not leave stale ownership on the old path
        if let Some(previous) = self.state.get_service(&service.service_id).await? {
            if previous.base_path != service.base_path {
                info!(
                    service_id = %service.service_id,
                    old = %previous.base_path,
                    new = %service.base_path,
                    "Base path changed, releasing old reservations"
                );
                for group in &previous.load_balancer_groups {
                    self.groups
                        .clear_base_path(group, &previous.base_path)
                        .await?;
                }
            }
        }

        self.state.add_service(service).await?;
        // Remove before add: a target in both sets nets to "added"
        self.state
            .remove_upstreams(&service.service_id, &request.remove_upstreams)
            .await?;
        self.state
            .add_upstreams(
                &request.request_id,
                &service.service_id,
                &request.add_upstreams,
            )
            .await?;

        debug!(
            request_id = %request.request_id,
            service_id = %service.service_id,
            "Request committed to state store"
        );
        Ok(())
    }

    /// Committed service state (definition + upstreams) for introspection.
    pub async fn get_committed_service(
        &self,
        service_id: &str,
    ) -> Result<Option<(crate::models::ServiceDefinition, Vec<crate::models::UpstreamInfo>)>> {
        let Some(service) = self.state.get_service(service_id).await? else {
            return Ok(None);
        };
        let upstreams = self.state.get_upstreams(service_id).await?;
        Ok(Some((service, upstreams)))
    }

    /// Group store handle for the introspection/admin surface.
    pub fn group_store(&self) -> &GroupStoreHandle {
        &self.groups
    }

    async fn ensure_base_paths_available(&self, request: &ChangeRequest) -> Result<()> {
        let service = &request.service;
        for group in &service.load_balancer_groups {
            let maybe_owner = self
                .groups
                .get_base_path_service_id(group, &service.base_path)
                .await?;
            if let Some(owner) = maybe_owner {
                if owner != service.service_id {
                    return Err(SwitchyardError::BasePathConflict {
                        request_id: request.request_id.clone(),
                        base_path: service.base_path.clone(),
                        owner,
                    });
                }
            }
        }
        Ok(())
    }

    async fn ensure_groups_exist(&self, request: &ChangeRequest) -> Result<()> {
        let known = self.groups.get_clusters().await?;
        let missing: Vec<String> = request
            .service
            .load_balancer_groups
            .iter()
            .filter(|g| !known.contains(*g))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SwitchyardError::MissingLoadBalancerGroups(missing))
        }
    }

    /// Back out a half-admitted request that lost the reservation race.
    async fn abandon_admission(
        &self,
        request: &ChangeRequest,
        queued: &QueuedRequestId,
        conflicting_group: &str,
        owner: &str,
        acquired: &[&String],
    ) -> Result<()> {
        let service = &request.service;
        for group in acquired {
            self.groups
                .clear_base_path(group, &service.base_path)
                .await?;
        }
        self.requests.remove_queued_request(queued).await?;

        // Conditional write: a worker may have claimed the request in the
        // window between queue append and reservation acquire, and its
        // in-flight transition must not be clobbered
        let marked = self
            .requests
            .set_request_state_if(
                &request.request_id,
                InternalRequestState::QueuedApply,
                InternalRequestState::InvalidRequestNoop,
            )
            .await?;
        if marked {
            self.requests
                .set_request_message(
                    &request.request_id,
                    &format!(
                        "Base path {} on group {} is already owned by service {}",
                        service.base_path, conflicting_group, owner
                    ),
                )
                .await?;
        } else {
            warn!(
                request_id = %request.request_id,
                "Request advanced past admission before abandonment, leaving its state alone"
            );
        }
        Ok(())
    }
}
