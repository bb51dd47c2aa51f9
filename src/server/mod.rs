//! HTTP server module

pub mod http;

pub use http::{run, AppState};
