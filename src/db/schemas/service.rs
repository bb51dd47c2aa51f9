//! Committed service state schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::models::{ServiceDefinition, UpstreamInfo};

/// Collection name for committed service state
pub const SERVICE_COLLECTION: &str = "services";

/// Committed service definition plus its live upstream set.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ServiceStateDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Service id (unique)
    pub service_id: String,

    /// The committed service definition
    pub service: ServiceDefinition,

    /// Upstreams currently registered for this service
    #[serde(default)]
    pub upstreams: Vec<UpstreamInfo>,
}

impl ServiceStateDoc {
    pub fn new(service: ServiceDefinition) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            service_id: service.service_id.clone(),
            service,
            upstreams: Vec::new(),
        }
    }
}

impl IntoIndexes for ServiceStateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "service_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("service_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ServiceStateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
