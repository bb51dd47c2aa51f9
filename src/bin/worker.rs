//! Switchyard Worker - standalone apply/revert processor
//!
//! Runs the queue-draining loop against the shared MongoDB store without
//! serving HTTP. Deploy one or more of these alongside the coordinator when
//! the embedded worker is disabled (`WORKER_ENABLED=false`).
//!
//! Usage:
//!   switchyard-worker --mongodb-uri mongodb://localhost:27017
//!
//! Environment variables:
//!   MONGODB_URI - MongoDB connection URI (default: mongodb://localhost:27017)
//!   MONGODB_DB - Database name (default: switchyard)
//!   WORKER_ID - Unique worker identifier (default: auto-generated UUID)
//!   WORKER_POLL_MS - Queue poll interval in milliseconds (default: 1000)

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use switchyard::coordinator::RequestCoordinator;
use switchyard::db::MongoClient;
use switchyard::store::{MongoGroupStore, MongoRequestStore, MongoStateStore};
use switchyard::worker::{NoopAgentRelay, RequestWorker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "switchyard-worker")]
#[command(about = "Standalone apply/revert worker for Switchyard")]
#[command(version)]
struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "switchyard")]
    mongodb_db: String,

    /// Unique worker ID (auto-generated if not provided)
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Queue poll interval in milliseconds
    #[arg(long, env = "WORKER_POLL_MS", default_value = "1000")]
    worker_poll_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    switchyard::logging::init(&args.log_level);

    let config = WorkerConfig {
        worker_id: args
            .worker_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        poll_interval_ms: args.worker_poll_ms,
    };

    info!(
        "Starting Switchyard worker {} (MongoDB: {})",
        config.worker_id, args.mongodb_uri
    );

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let coordinator = Arc::new(RequestCoordinator::new(
        Arc::new(MongoRequestStore::new(&mongo).await?),
        Arc::new(MongoGroupStore::new(&mongo).await?),
        Arc::new(MongoStateStore::new(&mongo).await?),
    ));

    let worker = Arc::new(RequestWorker::new(
        config,
        coordinator,
        Arc::new(NoopAgentRelay),
    ));

    let runner = Arc::clone(&worker);
    let handle = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            error!("Worker error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            worker.stop().await;
        }
        result = handle => {
            if let Err(e) = result {
                error!("Worker task error: {}", e);
            }
        }
    }

    info!("Worker shutting down");
    Ok(())
}
