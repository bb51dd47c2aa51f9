//! Switchyard - coordinator for distributed load-balancer configuration
//! changes

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use switchyard::{
    config::Args,
    coordinator::RequestCoordinator,
    db::MongoClient,
    logging, server,
    server::AppState,
    store::{
        GroupStoreHandle, InMemoryGroupStore, InMemoryRequestStore, InMemoryStateStore,
        LoadBalancerGroupStore, MongoGroupStore, MongoRequestStore, MongoStateStore,
        RequestStoreHandle, StateStoreHandle,
    },
    worker::{NoopAgentRelay, RequestWorker, WorkerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Switchyard - LB change coordinator");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Embedded worker: {}", args.worker_enabled);
    info!("======================================");

    let (requests, groups, state): (RequestStoreHandle, GroupStoreHandle, StateStoreHandle) =
        if args.dev_mode {
            warn!("Dev mode: using in-memory stores, nothing is persisted");
            (
                Arc::new(InMemoryRequestStore::new()),
                Arc::new(InMemoryGroupStore::new()),
                Arc::new(InMemoryStateStore::new()),
            )
        } else {
            let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
                Ok(client) => client,
                Err(e) => {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            };
            (
                Arc::new(MongoRequestStore::new(&mongo).await?),
                Arc::new(MongoGroupStore::new(&mongo).await?),
                Arc::new(MongoStateStore::new(&mongo).await?),
            )
        };

    // Register the configured load-balancer groups; admission rejects
    // requests naming groups not registered here or by another node
    for group in args.group_list() {
        groups.add_cluster(&group).await?;
        info!("Registered load balancer group '{}'", group);
    }

    let coordinator = Arc::new(RequestCoordinator::new(requests, groups, state));

    let worker = if args.worker_enabled {
        let worker = Arc::new(RequestWorker::new(
            WorkerConfig {
                worker_id: format!("{}-embedded", args.node_id),
                poll_interval_ms: args.worker_poll_ms,
            },
            Arc::clone(&coordinator),
            Arc::new(NoopAgentRelay),
        ));
        let runner = Arc::clone(&worker);
        tokio::spawn(async move {
            if let Err(e) = runner.run().await {
                error!("Embedded worker error: {}", e);
            }
        });
        Some(worker)
    } else {
        info!("Embedded worker disabled, expecting a standalone switchyard-worker");
        None
    };

    let app_state = Arc::new(AppState::new(args, coordinator, worker));
    server::run(app_state).await?;
    Ok(())
}
