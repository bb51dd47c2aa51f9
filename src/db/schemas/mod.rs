//! MongoDB document schemas

pub mod base_path;
pub mod metadata;
pub mod request;
pub mod service;

pub use base_path::{BasePathDoc, GroupDoc, BASE_PATH_COLLECTION, GROUP_COLLECTION};
pub use metadata::Metadata;
pub use request::{QueuedRequestDoc, RequestDoc, QUEUE_COLLECTION, REQUEST_COLLECTION};
pub use service::{ServiceStateDoc, SERVICE_COLLECTION};
