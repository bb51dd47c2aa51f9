//! Request and queue document schemas

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::models::{ChangeRequest, InternalRequestState};

/// Collection name for request records
pub const REQUEST_COLLECTION: &str = "requests";

/// Collection name for the FIFO work queue
pub const QUEUE_COLLECTION: &str = "request_queue";

/// Durable record of a change request: body, lifecycle state, and message.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RequestDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Caller-supplied request id (unique)
    pub request_id: String,

    /// The immutable request body; absent when state was written through
    /// the bare `set_request_state` primitive before admission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChangeRequest>,

    /// Current lifecycle state, absent until admission completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<InternalRequestState>,

    /// Latest human-readable status/error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestDoc {
    pub fn new(request: ChangeRequest) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            request_id: request.request_id.clone(),
            request: Some(request),
            state: None,
            message: None,
        }
    }
}

impl IntoIndexes for RequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "request_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("request_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for RequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// One entry in the FIFO work queue.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QueuedRequestDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Service the queued request targets
    pub service_id: String,

    /// The queued request
    pub request_id: String,

    /// Monotonic sequence number defining FIFO order
    pub index: i64,
}

impl IntoIndexes for QueuedRequestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "index": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("queue_index_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "request_id": 1 },
                Some(IndexOptions::builder().name("queue_request_id".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for QueuedRequestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_document_has_no_body() {
        // A bare set_request_state upsert creates a document without a
        // request body; reads must see absence, not a defaulted request
        let doc = doc! { "request_id": "req-1", "state": "QUEUED_APPLY" };
        let parsed: RequestDoc = bson::from_document(doc).unwrap();
        assert_eq!(parsed.request_id, "req-1");
        assert!(parsed.request.is_none());
        assert_eq!(parsed.state, Some(InternalRequestState::QueuedApply));
    }

    #[test]
    fn admitted_document_round_trips_its_body() {
        let request = ChangeRequest {
            request_id: "req-1".to_string(),
            ..Default::default()
        };
        let doc = RequestDoc::new(request);
        let encoded = bson::to_document(&doc).unwrap();
        let back: RequestDoc = bson::from_document(encoded).unwrap();
        assert_eq!(back.request.unwrap().request_id, "req-1");
    }
}
