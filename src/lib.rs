//! Switchyard - request lifecycle coordinator for distributed load-balancer
//! configuration changes
//!
//! Clients submit change requests (service definition plus upstream adds and
//! removes); the coordinator admits them exactly once, guards base-path
//! ownership across load-balancer groups, and queues them for the
//! apply/revert worker. Every coordination primitive is a single-key atomic
//! operation against the shared store, so any number of coordinator and
//! worker processes can run side by side.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod logging;
pub mod models;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;
pub mod worker;

pub use coordinator::RequestCoordinator;
pub use types::{Result, SwitchyardError};
