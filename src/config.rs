//! Configuration for Switchyard
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Switchyard - request lifecycle coordinator for load-balancer
/// configuration changes
#[derive(Parser, Debug, Clone)]
#[command(name = "switchyard")]
#[command(about = "Coordinator for distributed load-balancer configuration changes")]
pub struct Args {
    /// Unique node identifier for this coordinator instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "switchyard")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory stores, no MongoDB required)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Comma-separated load-balancer groups to register at startup
    /// e.g. "us-east-1,us-west-1"
    #[arg(long, env = "LOAD_BALANCER_GROUPS")]
    pub load_balancer_groups: Option<String>,

    /// Run the embedded apply/revert worker loop in this process
    #[arg(long, env = "WORKER_ENABLED", default_value = "true")]
    pub worker_enabled: bool,

    /// Worker queue poll interval in milliseconds
    #[arg(long, env = "WORKER_POLL_MS", default_value = "1000")]
    pub worker_poll_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Parse the configured startup group list
    pub fn group_list(&self) -> Vec<String> {
        self.load_balancer_groups
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_poll_ms == 0 {
            return Err("WORKER_POLL_MS must be greater than zero".to_string());
        }
        if !self.dev_mode && self.mongodb_uri.is_empty() {
            return Err("MONGODB_URI is required outside dev mode".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_list_splits_and_trims() {
        let args = Args::parse_from([
            "switchyard",
            "--load-balancer-groups",
            "us-east-1, us-west-1,,",
        ]);
        assert_eq!(args.group_list(), vec!["us-east-1", "us-west-1"]);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let args = Args::parse_from(["switchyard", "--worker-poll-ms", "0"]);
        assert!(args.validate().is_err());
    }
}
