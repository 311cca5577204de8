//! src/services/object_store.rs
//!
//! The bucket lifecycle shared by every provider. `ManagedObjectStore<P>`
//! keeps the registry and the cloud in step:
//! - create: register intent, provision remotely, wait for existence, and
//!   roll the registry back when provisioning is refused
//! - delete: require exactly one managed record, delete remotely, wait for
//!   absence, then drop the record
//! - list: enumerate remote buckets and reconcile them with the registry

use crate::{
    errors::{ObjectStoreError, ObjectStoreResult, Presence},
    models::{AmazonPlacement, AzurePlacement, GooglePlacement, ManagedBucket, Owner, Placement, Provider},
    providers::{BucketClient, Connector, RemoteBucket, WaitPolicy},
    registry::{BucketCriteria, RegistryResult, Repository},
    services::naming::validate_bucket_name,
};
use async_trait::async_trait;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

/// The lifecycle contract every provider adapter offers.
#[async_trait]
pub trait CommonObjectStore: Send + Sync {
    fn provider(&self) -> Provider;

    /// Register and provision `name`, blocking until it is observable.
    ///
    /// An [`ObjectStoreError::Indeterminate`] means the provider accepted the
    /// request but existence was not confirmed in time.
    async fn create_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()>;

    /// Delete a bucket this owner manages, blocking until it is gone.
    async fn delete_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()>;

    async fn list_buckets(&self) -> ObjectStoreResult<BucketInventory>;
}

/// Anything that can look up managed-bucket records by name.
#[async_trait]
pub trait ManagedBucketsStore<P: Placement>: Send + Sync {
    async fn get_managed_buckets(&self, name: &str) -> ObjectStoreResult<Vec<ManagedBucket<P>>>;
}

/// Resolve `name` to exactly one managed record.
///
/// Zero matches and several matches are distinct errors; one is never picked
/// at random.
pub async fn get_validated_managed_bucket<P, S>(name: &str, store: &S) -> ObjectStoreResult<ManagedBucket<P>>
where
    P: Placement,
    S: ManagedBucketsStore<P> + ?Sized,
{
    let mut buckets = store.get_managed_buckets(name).await?;
    match buckets.len() {
        0 => Err(ObjectStoreError::ManagedBucketNotFound(name.to_string())),
        1 => Ok(buckets.remove(0)),
        count => Err(ObjectStoreError::MultipleManagedBucketsFound {
            name: name.to_string(),
            count,
        }),
    }
}

/// One remote bucket, with the id of its registry record if it is managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketListing {
    pub name: String,
    pub location: Option<String>,
    pub namespace: String,
    pub managed_id: Option<Uuid>,
}

/// A registry record whose bucket the provider no longer reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedRecord {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInventory {
    pub provider: Provider,
    pub buckets: Vec<BucketListing>,
    pub orphaned: Vec<OrphanedRecord>,
}

impl BucketInventory {
    pub fn managed(&self) -> impl Iterator<Item = &BucketListing> {
        self.buckets.iter().filter(|b| b.managed_id.is_some())
    }
}

/// Match remote buckets to registry records by `(namespace, name)`.
fn reconcile<P: Placement>(
    placement: &P,
    remote: Vec<RemoteBucket>,
    records: Vec<ManagedBucket<P>>,
) -> BucketInventory {
    let mut by_key: HashMap<(String, String), ManagedBucket<P>> = records
        .into_iter()
        .map(|record| ((record.placement.namespace(), record.name.clone()), record))
        .collect();

    let buckets = remote
        .into_iter()
        .map(|bucket| {
            let managed_id = by_key
                .remove(&(bucket.namespace.clone(), bucket.name.clone()))
                .map(|record| record.id);
            BucketListing {
                name: bucket.name,
                location: bucket.location,
                namespace: bucket.namespace,
                managed_id,
            }
        })
        .collect();

    let mut orphaned: Vec<OrphanedRecord> = by_key
        .into_values()
        .filter(|record| placement.covers_namespace(&record.placement.namespace()))
        .map(|record| OrphanedRecord {
            id: record.id,
            namespace: record.placement.namespace(),
            location: record.placement.location().to_string(),
            name: record.name,
        })
        .collect();
    orphaned.sort_by(|a, b| a.name.cmp(&b.name));

    BucketInventory {
        provider: P::PROVIDER,
        buckets,
        orphaned,
    }
}

/// Provider adapter: one placement, one owner, one set of credentials.
///
/// Built per logical operation by the dispatch factory and never shared
/// across concurrent callers.
pub struct ManagedObjectStore<P: Placement> {
    placement: P,
    owner: Owner,
    registry: Arc<dyn Repository<P>>,
    connector: Arc<dyn Connector>,
    span: Span,
}

pub type AmazonObjectStore = ManagedObjectStore<AmazonPlacement>;
pub type GoogleObjectStore = ManagedObjectStore<GooglePlacement>;
pub type AzureObjectStore = ManagedObjectStore<AzurePlacement>;

impl<P: Placement> ManagedObjectStore<P> {
    pub fn new(
        placement: P,
        owner: Owner,
        registry: Arc<dyn Repository<P>>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let span = info_span!("object_store", provider = %P::PROVIDER, owner = %owner.id);
        Self {
            placement,
            owner,
            registry,
            connector,
            span,
        }
    }

    /// Replace the span every operation is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn placement(&self) -> &P {
        &self.placement
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    fn search_criteria(&self, name: &str) -> BucketCriteria<P> {
        BucketCriteria::named(name)
            .owned_by(self.owner.id)
            .placed_in(self.placement.clone())
    }

    async fn connect(&self) -> ObjectStoreResult<Box<dyn BucketClient>> {
        self.connector.connect().await.map_err(|source| {
            error!(error = %source, "creating provider client failed");
            ObjectStoreError::Connect {
                provider: P::PROVIDER,
                source,
            }
        })
    }

    /// Undo the registry write of a failed create. The outcome is returned so
    /// the caller can report it next to the primary error.
    async fn roll_back(&self, record: &ManagedBucket<P>) -> RegistryResult<()> {
        match self.registry.delete(&self.search_criteria(&record.name)).await {
            Ok(removed) => {
                warn!(record = %record.id, removed, "rolled back managed bucket record");
                Ok(())
            }
            Err(err) => {
                error!(
                    record = %record.id,
                    bucket = %record.name,
                    error = %err,
                    "rolling back managed bucket record failed; record is orphaned"
                );
                Err(err)
            }
        }
    }

    async fn create(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        validate_bucket_name(P::PROVIDER, name)?;

        let client = self.connect().await?;
        debug!(location = %self.placement.location(), "provider client ready");

        let record = ManagedBucket::new(name, &self.owner, self.placement.clone());
        if let Err(err) = self.registry.save(&record).await {
            error!(error = %err, "persisting managed bucket failed");
            return Err(err.into());
        }

        if let Err(source) = client.create_bucket(name, wait).await {
            error!(error = %source, "provider refused to create bucket");
            let compensation = self.roll_back(&record).await.err();
            return Err(ObjectStoreError::Remote {
                provider: P::PROVIDER,
                action: "create",
                bucket: name.to_string(),
                source,
                compensation,
            });
        }

        debug!("waiting for bucket to be created");
        client
            .wait_for(name, Presence::Present, wait)
            .await
            .map_err(|source| {
                error!(error = %source, "bucket creation could not be confirmed");
                ObjectStoreError::Indeterminate {
                    provider: P::PROVIDER,
                    bucket: name.to_string(),
                    expected: Presence::Present,
                    source,
                }
            })?;

        info!(record = %record.id, "bucket created");
        Ok(())
    }

    async fn delete(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        let managed = get_validated_managed_bucket(name, self).await?;

        let client = self.connect().await?;
        match client.delete_bucket(name).await {
            Ok(()) => {}
            // A record left by a failed rollback has no bucket behind it.
            Err(source) if source.is_not_found() => {
                warn!(record = %managed.id, "bucket already absent at provider");
            }
            Err(source) => {
                return Err(ObjectStoreError::Remote {
                    provider: P::PROVIDER,
                    action: "delete",
                    bucket: name.to_string(),
                    source,
                    compensation: None,
                });
            }
        }

        // The record stays until absence is confirmed, so an unconfirmed
        // delete can still be found and retried.
        client
            .wait_for(name, Presence::Absent, wait)
            .await
            .map_err(|source| {
                error!(error = %source, "bucket deletion could not be confirmed");
                ObjectStoreError::Indeterminate {
                    provider: P::PROVIDER,
                    bucket: name.to_string(),
                    expected: Presence::Absent,
                    source,
                }
            })?;

        let removed = self.registry.delete(&self.search_criteria(name)).await?;
        info!(record = %managed.id, removed, "bucket deleted");
        Ok(())
    }

    async fn list(&self) -> ObjectStoreResult<BucketInventory> {
        let client = self.connect().await?;
        let remote = client
            .list_buckets()
            .await
            .map_err(|source| ObjectStoreError::Listing {
                provider: P::PROVIDER,
                source,
            })?;
        let records = self
            .registry
            .find(&BucketCriteria::default().owned_by(self.owner.id))
            .await?;

        let inventory = reconcile(&self.placement, remote, records);
        debug!(
            buckets = inventory.buckets.len(),
            orphaned = inventory.orphaned.len(),
            "reconciled bucket inventory"
        );
        Ok(inventory)
    }
}

#[async_trait]
impl<P: Placement> ManagedBucketsStore<P> for ManagedObjectStore<P> {
    async fn get_managed_buckets(&self, name: &str) -> ObjectStoreResult<Vec<ManagedBucket<P>>> {
        Ok(self.registry.find(&self.search_criteria(name)).await?)
    }
}

#[async_trait]
impl<P: Placement> CommonObjectStore for ManagedObjectStore<P> {
    fn provider(&self) -> Provider {
        P::PROVIDER
    }

    async fn create_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        let span = info_span!(parent: &self.span, "create_bucket", bucket = name);
        self.create(name, wait).instrument(span).await
    }

    async fn delete_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        let span = info_span!(parent: &self.span, "delete_bucket", bucket = name);
        self.delete(name, wait).instrument(span).await
    }

    async fn list_buckets(&self) -> ObjectStoreResult<BucketInventory> {
        let span = info_span!(parent: &self.span, "list_buckets");
        self.list().instrument(span).await
    }
}
