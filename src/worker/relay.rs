//! Agent relay - the data-plane boundary
//!
//! The worker drives live load-balancer agents through this trait; the wire
//! protocol to the agents themselves is out of scope for the coordinator.

use async_trait::async_trait;
use tracing::info;

use crate::models::ChangeRequest;
use crate::types::Result;

/// Sends apply/revert operations to the agents of one load-balancer group.
#[async_trait]
pub trait AgentRelay: Send + Sync {
    /// Apply the request's configuration change on every agent in `group`.
    async fn apply(&self, group: &str, request: &ChangeRequest) -> Result<()>;

    /// Roll the change back on every agent in `group`.
    async fn revert(&self, group: &str, request: &ChangeRequest) -> Result<()>;
}

/// Relay that records intent in the log and reports success.
///
/// Stands in wherever no live agents are wired up (dev mode, demos).
#[derive(Default)]
pub struct NoopAgentRelay;

#[async_trait]
impl AgentRelay for NoopAgentRelay {
    async fn apply(&self, group: &str, request: &ChangeRequest) -> Result<()> {
        info!(
            group = %group,
            request_id = %request.request_id,
            service_id = %request.service.service_id,
            "Apply relayed (noop)"
        );
        Ok(())
    }

    async fn revert(&self, group: &str, request: &ChangeRequest) -> Result<()> {
        info!(
            group = %group,
            request_id = %request.request_id,
            service_id = %request.service.service_id,
            "Revert relayed (noop)"
        );
        Ok(())
    }
}
