//! Domain models for Switchyard

pub mod request;
pub mod response;
pub mod service;
pub mod state;

pub use request::{ChangeRequest, QueuedRequestId, RequestAction};
pub use response::RequestResponse;
pub use service::{ServiceDefinition, UpstreamInfo};
pub use state::{InternalRequestState, RequestState};
