//! MongoDB-backed store implementations
//!
//! All compare-and-set semantics lean on MongoDB primitives: unique indexes
//! for reservation acquire (duplicate key = lost the race) and filtered
//! `update_one` for conditional state transitions.

use async_trait::async_trait;
use bson::doc;
use std::collections::BTreeSet;
use tracing::debug;

use super::{LoadBalancerGroupStore, RequestStore, StateStore};
use crate::db::schemas::{
    BasePathDoc, GroupDoc, QueuedRequestDoc, RequestDoc, ServiceStateDoc, BASE_PATH_COLLECTION,
    GROUP_COLLECTION, QUEUE_COLLECTION, REQUEST_COLLECTION, SERVICE_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::models::{
    ChangeRequest, InternalRequestState, QueuedRequestId, ServiceDefinition, UpstreamInfo,
};
use crate::types::{Result, SwitchyardError};

/// Name of the queue sequence counter document
const QUEUE_SEQUENCE: &str = "request_queue_index";

fn to_bson<T: serde::Serialize>(value: &T) -> Result<bson::Bson> {
    bson::to_bson(value).map_err(|e| SwitchyardError::Database(format!("BSON encode failed: {}", e)))
}

/// Request store backed by the `requests` and `request_queue` collections
pub struct MongoRequestStore {
    client: MongoClient,
    requests: MongoCollection<RequestDoc>,
    queue: MongoCollection<QueuedRequestDoc>,
}

impl MongoRequestStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            client: client.clone(),
            requests: client.collection::<RequestDoc>(REQUEST_COLLECTION).await?,
            queue: client.collection::<QueuedRequestDoc>(QUEUE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl RequestStore for MongoRequestStore {
    async fn get_request(&self, request_id: &str) -> Result<Option<ChangeRequest>> {
        let doc = self.requests.find_one(doc! { "request_id": request_id }).await?;
        Ok(doc.and_then(|d| d.request))
    }

    async fn add_request(&self, request: &ChangeRequest) -> Result<()> {
        // Unique index on request_id makes duplicate submission a no-op
        // (first writer wins)
        if self
            .requests
            .insert_one_unique(RequestDoc::new(request.clone()))
            .await?
            .is_none()
        {
            debug!(request_id = %request.request_id, "Request already persisted, keeping original");
        }
        Ok(())
    }

    async fn get_request_state(
        &self,
        request_id: &str,
    ) -> Result<Option<InternalRequestState>> {
        let doc = self.requests.find_one(doc! { "request_id": request_id }).await?;
        Ok(doc.and_then(|d| d.state))
    }

    async fn set_request_state(
        &self,
        request_id: &str,
        state: InternalRequestState,
    ) -> Result<()> {
        self.requests
            .upsert_one(
                doc! { "request_id": request_id },
                doc! {
                    "$set": {
                        "state": to_bson(&state)?,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$setOnInsert": { "request_id": request_id },
                },
            )
            .await?;
        Ok(())
    }

    async fn set_request_state_if(
        &self,
        request_id: &str,
        expected: InternalRequestState,
        state: InternalRequestState,
    ) -> Result<bool> {
        let result = self
            .requests
            .update_one(
                doc! { "request_id": request_id, "state": to_bson(&expected)? },
                doc! {
                    "$set": {
                        "state": to_bson(&state)?,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn get_request_message(&self, request_id: &str) -> Result<Option<String>> {
        let doc = self.requests.find_one(doc! { "request_id": request_id }).await?;
        Ok(doc.and_then(|d| d.message))
    }

    async fn set_request_message(&self, request_id: &str, message: &str) -> Result<()> {
        self.requests
            .update_one(
                doc! { "request_id": request_id },
                doc! {
                    "$set": {
                        "message": message,
                        "metadata.updated_at": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn enqueue_request(&self, request: &ChangeRequest) -> Result<QueuedRequestId> {
        let index = self.client.next_sequence(QUEUE_SEQUENCE).await?;
        let entry = QueuedRequestDoc {
            _id: None,
            metadata: Default::default(),
            service_id: request.service.service_id.clone(),
            request_id: request.request_id.clone(),
            index: index as i64,
        };
        self.queue.insert_one(entry).await?;
        Ok(QueuedRequestId {
            service_id: request.service.service_id.clone(),
            request_id: request.request_id.clone(),
            index,
        })
    }

    async fn get_queued_request_ids(&self) -> Result<Vec<QueuedRequestId>> {
        let docs = self
            .queue
            .find_many(doc! {}, Some(doc! { "index": 1 }))
            .await?;
        Ok(docs
            .into_iter()
            .map(|d| QueuedRequestId {
                service_id: d.service_id,
                request_id: d.request_id,
                index: d.index as u64,
            })
            .collect())
    }

    async fn remove_queued_request(&self, queued: &QueuedRequestId) -> Result<()> {
        self.queue
            .delete_one(doc! { "index": queued.index as i64 })
            .await?;
        Ok(())
    }
}

/// Group membership and base-path reservations backed by MongoDB
pub struct MongoGroupStore {
    groups: MongoCollection<GroupDoc>,
    base_paths: MongoCollection<BasePathDoc>,
}

impl MongoGroupStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            groups: client.collection::<GroupDoc>(GROUP_COLLECTION).await?,
            base_paths: client.collection::<BasePathDoc>(BASE_PATH_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl LoadBalancerGroupStore for MongoGroupStore {
    async fn get_clusters(&self) -> Result<BTreeSet<String>> {
        let docs = self.groups.find_many(doc! {}, None).await?;
        Ok(docs.into_iter().map(|d| d.name).collect())
    }

    async fn add_cluster(&self, group: &str) -> Result<()> {
        self.groups
            .upsert_one(
                doc! { "name": group },
                doc! { "$setOnInsert": { "name": group } },
            )
            .await?;
        Ok(())
    }

    async fn get_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
    ) -> Result<Option<String>> {
        let doc = self
            .base_paths
            .find_one(doc! { "group": group, "base_path": base_path })
            .await?;
        Ok(doc.map(|d| d.service_id))
    }

    async fn set_base_path_service_id(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<()> {
        self.base_paths
            .upsert_one(
                doc! { "group": group, "base_path": base_path },
                doc! {
                    "$set": {
                        "service_id": service_id,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$setOnInsert": { "group": group, "base_path": base_path },
                },
            )
            .await?;
        Ok(())
    }

    async fn try_acquire_base_path(
        &self,
        group: &str,
        base_path: &str,
        service_id: &str,
    ) -> Result<std::result::Result<(), String>> {
        // Bounded retry: a conflicting owner can vacate between our failed
        // insert and the follow-up read.
        for _ in 0..2 {
            if self
                .base_paths
                .insert_one_unique(BasePathDoc::new(group, base_path, service_id))
                .await?
                .is_some()
            {
                return Ok(Ok(()));
            }

            match self.get_base_path_service_id(group, base_path).await? {
                Some(owner) if owner == service_id => return Ok(Ok(())),
                Some(owner) => return Ok(Err(owner)),
                None => continue,
            }
        }
        Err(SwitchyardError::Database(format!(
            "Could not settle base path ownership for {}:{}",
            group, base_path
        )))
    }

    async fn clear_base_path(&self, group: &str, base_path: &str) -> Result<()> {
        self.base_paths
            .delete_one(doc! { "group": group, "base_path": base_path })
            .await?;
        Ok(())
    }

    async fn get_base_paths(&self, group: &str) -> Result<Vec<String>> {
        let docs = self
            .base_paths
            .find_many(doc! { "group": group }, Some(doc! { "base_path": 1 }))
            .await?;
        Ok(docs.into_iter().map(|d| d.base_path).collect())
    }
}

/// Committed service state backed by the `services` collection
pub struct MongoStateStore {
    services: MongoCollection<ServiceStateDoc>,
}

impl MongoStateStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            services: client.collection::<ServiceStateDoc>(SERVICE_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl StateStore for MongoStateStore {
    async fn get_service(&self, service_id: &str) -> Result<Option<ServiceDefinition>> {
        let doc = self.services.find_one(doc! { "service_id": service_id }).await?;
        Ok(doc.map(|d| d.service))
    }

    async fn add_service(&self, service: &ServiceDefinition) -> Result<()> {
        // Upsert the definition only; the upstream set is managed by
        // add_upstreams/remove_upstreams and must not be clobbered here
        self.services
            .upsert_one(
                doc! { "service_id": &service.service_id },
                doc! {
                    "$set": {
                        "service": to_bson(service)?,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$setOnInsert": {
                        "service_id": &service.service_id,
                        "upstreams": [],
                    },
                },
            )
            .await?;
        Ok(())
    }

    async fn get_upstreams(&self, service_id: &str) -> Result<Vec<UpstreamInfo>> {
        let doc = self.services.find_one(doc! { "service_id": service_id }).await?;
        Ok(doc.map(|d| d.upstreams).unwrap_or_default())
    }

    async fn remove_upstreams(
        &self,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()> {
        if upstreams.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = upstreams.iter().map(|u| u.upstream.as_str()).collect();
        self.services
            .update_one(
                doc! { "service_id": service_id },
                doc! {
                    "$pull": { "upstreams": { "upstream": { "$in": names } } },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn add_upstreams(
        &self,
        request_id: &str,
        service_id: &str,
        upstreams: &[UpstreamInfo],
    ) -> Result<()> {
        if upstreams.is_empty() {
            return Ok(());
        }

        let stamped: Vec<UpstreamInfo> = upstreams
            .iter()
            .cloned()
            .map(|mut u| {
                u.request_id = Some(request_id.to_string());
                u
            })
            .collect();
        let names: Vec<&str> = stamped.iter().map(|u| u.upstream.as_str()).collect();

        // Pull any prior registration of the same targets, then push the
        // refreshed entries. Two single-key writes on the same document.
        self.services
            .update_one(
                doc! { "service_id": service_id },
                doc! { "$pull": { "upstreams": { "upstream": { "$in": names } } } },
            )
            .await?;
        self.services
            .update_one(
                doc! { "service_id": service_id },
                doc! {
                    "$push": { "upstreams": { "$each": to_bson(&stamped)? } },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await?;
        Ok(())
    }
}
