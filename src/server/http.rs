//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling, with a match-based
//! router over method and path.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::coordinator::RequestCoordinator;
use crate::routes;
use crate::types::SwitchyardError;
use crate::worker::RequestWorker;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub coordinator: Arc<RequestCoordinator>,
    /// Set when this process also runs the apply/revert worker; the direct
    /// execution trigger needs it
    pub worker: Option<Arc<RequestWorker>>,
}

impl AppState {
    pub fn new(
        args: Args,
        coordinator: Arc<RequestCoordinator>,
        worker: Option<Arc<RequestWorker>>,
    ) -> Self {
        Self {
            args,
            coordinator,
            worker,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), SwitchyardError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Switchyard listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using in-memory stores");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(|q| q.to_string());

    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Admit a change request
        (Method::POST, "/request") => {
            return Ok(routes::handle_enqueue_request(req, Arc::clone(&state)).await);
        }

        // Queue contents in FIFO order
        (Method::GET, "/requests/queued") => {
            routes::handle_queued_requests(Arc::clone(&state)).await
        }

        // Direct execution trigger: POST /request/{id}/execute[?action=revert]
        (Method::POST, p) if p.starts_with("/request/") && p.ends_with("/execute") => {
            let request_id = p
                .strip_prefix("/request/")
                .and_then(|s| s.strip_suffix("/execute"))
                .unwrap_or("");
            routes::handle_execute_request(Arc::clone(&state), request_id, query.as_deref()).await
        }

        // Poll a request's response projection
        (Method::GET, p) if p.starts_with("/request/") => {
            let request_id = p.strip_prefix("/request/").unwrap_or("");
            routes::handle_get_request(Arc::clone(&state), request_id).await
        }

        // Cancel (revert) a request
        (Method::DELETE, p) if p.starts_with("/request/") => {
            let request_id = p.strip_prefix("/request/").unwrap_or("");
            routes::handle_cancel_request(Arc::clone(&state), request_id).await
        }

        // Committed state for one service
        (Method::GET, p) if p.starts_with("/state/") => {
            let service_id = p.strip_prefix("/state/").unwrap_or("");
            routes::handle_service_state(Arc::clone(&state), service_id).await
        }

        // Known load-balancer groups
        (Method::GET, "/load-balancer/groups") => {
            routes::handle_list_groups(Arc::clone(&state)).await
        }

        // Reserved base paths in one group
        (Method::GET, p) if p.starts_with("/load-balancer/") && p.ends_with("/base-paths") => {
            let group = p
                .strip_prefix("/load-balancer/")
                .and_then(|s| s.strip_suffix("/base-paths"))
                .unwrap_or("");
            routes::handle_group_base_paths(Arc::clone(&state), group).await
        }

        // Operator release of a single reservation
        (Method::DELETE, p) if p.starts_with("/load-balancer/") && p.ends_with("/base-path") => {
            let group = p
                .strip_prefix("/load-balancer/")
                .and_then(|s| s.strip_suffix("/base-path"))
                .unwrap_or("");
            routes::handle_clear_base_path(Arc::clone(&state), group, query.as_deref()).await
        }

        // Not found
        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
