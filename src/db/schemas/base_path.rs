//! Load-balancer group and base-path reservation schemas

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for known load-balancer groups
pub const GROUP_COLLECTION: &str = "groups";

/// Collection name for base-path reservations
pub const BASE_PATH_COLLECTION: &str = "base_paths";

/// A known load-balancer group (cluster).
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GroupDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Group name
    pub name: String,
}

impl GroupDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name: name.into(),
        }
    }
}

impl IntoIndexes for GroupDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("group_name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for GroupDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Reservation of a base path within a group by one service.
///
/// The unique compound index on `(group, base_path)` is what makes the
/// reservation acquire atomic: a losing writer gets a duplicate-key error,
/// never a silent overwrite.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BasePathDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Load-balancer group name
    pub group: String,

    /// Reserved URL path prefix
    pub base_path: String,

    /// Owning service id
    pub service_id: String,
}

impl BasePathDoc {
    pub fn new(
        group: impl Into<String>,
        base_path: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            group: group.into(),
            base_path: base_path.into(),
            service_id: service_id.into(),
        }
    }
}

impl IntoIndexes for BasePathDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "group": 1, "base_path": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("group_base_path_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for BasePathDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
