//! Committed state and load-balancer introspection endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{error_response, json_response, query_param};
use crate::models::{ServiceDefinition, UpstreamInfo};
use crate::server::AppState;
use crate::store::LoadBalancerGroupStore;
use crate::types::SwitchyardError;

/// Committed service view: the definition plus its active upstreams
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStateView {
    pub service: ServiceDefinition,
    pub upstreams: Vec<UpstreamInfo>,
}

/// GET /state/{serviceId} - committed state for one service
pub async fn handle_service_state(
    state: Arc<AppState>,
    service_id: &str,
) -> Response<Full<Bytes>> {
    match state.coordinator.get_committed_service(service_id).await {
        Ok(Some((service, upstreams))) => {
            json_response(StatusCode::OK, &ServiceStateView { service, upstreams })
        }
        Ok(None) => error_response(SwitchyardError::NotFound(format!(
            "No committed state for service {}",
            service_id
        ))),
        Err(err) => error_response(err),
    }
}

/// GET /load-balancer/groups - known load-balancer groups
pub async fn handle_list_groups(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.coordinator.group_store().get_clusters().await {
        Ok(groups) => json_response(StatusCode::OK, &groups),
        Err(err) => error_response(err),
    }
}

/// GET /load-balancer/{group}/base-paths - reserved base paths in a group
pub async fn handle_group_base_paths(
    state: Arc<AppState>,
    group: &str,
) -> Response<Full<Bytes>> {
    match state.coordinator.group_store().get_base_paths(group).await {
        Ok(paths) => json_response(StatusCode::OK, &paths),
        Err(err) => error_response(err),
    }
}

/// DELETE /load-balancer/{group}/base-path?basePath=... - operator escape
/// hatch releasing a reservation directly
pub async fn handle_clear_base_path(
    state: Arc<AppState>,
    group: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let Some(base_path) = query_param(query, "basePath") else {
        return error_response(SwitchyardError::BadRequest(
            "Missing basePath query parameter".to_string(),
        ));
    };

    match state
        .coordinator
        .group_store()
        .clear_base_path(group, &base_path)
        .await
    {
        Ok(()) => {
            info!(group = %group, base_path = %base_path, "Base path reservation cleared by operator");
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "group": group, "basePath": base_path, "cleared": true }),
            )
        }
        Err(err) => error_response(err),
    }
}
