//! Shared types for Switchyard

pub mod error;

pub use error::{Result, SwitchyardError};
