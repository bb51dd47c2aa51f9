//! Worker module - apply/revert execution
//!
//! The worker consumes the FIFO queue the coordinator fills, drives live
//! load-balancer agents through the `AgentRelay` boundary, and advances
//! request state through terminal outcomes. It runs embedded in the
//! coordinator service or standalone (`switchyard-worker` binary).

pub mod processor;
pub mod relay;

pub use processor::{RequestWorker, WorkerConfig};
pub use relay::{AgentRelay, NoopAgentRelay};
