//! Dispatch factory: picks and builds the provider adapter for a secret.
//!
//! Credentials are resolved while the adapter is built, so a malformed
//! secret is reported before any registry or provider I/O happens.

use crate::{
    errors::{ObjectStoreError, ObjectStoreResult},
    models::{
        AmazonPlacement, AzurePlacement, CreateBucketRequest, GooglePlacement, Owner, Placement,
        Provider, Secret,
    },
    providers::{WaitPolicy, amazon::AmazonConnector, azure::AzureConnector, google::GoogleConnector},
    registry::Repository,
    services::{
        credentials::{AmazonCredentials, AzureCredentials, GoogleServiceAccount},
        object_store::{
            AmazonObjectStore, AzureObjectStore, BucketInventory, CommonObjectStore, GoogleObjectStore,
            ManagedObjectStore,
        },
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// A constructed adapter for exactly one provider.
pub enum ObjectStore {
    Amazon(AmazonObjectStore),
    Google(GoogleObjectStore),
    Azure(AzureObjectStore),
}

impl ObjectStore {
    fn as_common(&self) -> &dyn CommonObjectStore {
        match self {
            ObjectStore::Amazon(store) => store,
            ObjectStore::Google(store) => store,
            ObjectStore::Azure(store) => store,
        }
    }
}

#[async_trait]
impl CommonObjectStore for ObjectStore {
    fn provider(&self) -> Provider {
        self.as_common().provider()
    }

    async fn create_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        self.as_common().create_bucket(name, wait).await
    }

    async fn delete_bucket(&self, name: &str, wait: &WaitPolicy) -> ObjectStoreResult<()> {
        self.as_common().delete_bucket(name, wait).await
    }

    async fn list_buckets(&self) -> ObjectStoreResult<BucketInventory> {
        self.as_common().list_buckets().await
    }
}

/// Builds adapters that share one registry and one HTTP client.
pub struct ObjectStoreFactory<R> {
    registry: Arc<R>,
    http: reqwest::Client,
}

impl<R> Clone for ObjectStoreFactory<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            http: self.http.clone(),
        }
    }
}

impl<R> ObjectStoreFactory<R>
where
    R: Repository<AmazonPlacement> + Repository<GooglePlacement> + Repository<AzurePlacement> + 'static,
{
    pub fn new(registry: Arc<R>, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    fn registry<P: Placement>(&self) -> Arc<dyn Repository<P>>
    where
        R: Repository<P>,
    {
        self.registry.clone()
    }

    fn provider_of(secret: &Secret, operation: &'static str) -> ObjectStoreResult<Provider> {
        secret.provider().ok_or_else(|| ObjectStoreError::Unsupported {
            operation,
            provider: secret.secret_type.clone(),
        })
    }

    fn build(
        &self,
        provider: Provider,
        secret: &Secret,
        owner: &Owner,
        amazon: impl FnOnce() -> Option<AmazonPlacement>,
        google: impl FnOnce() -> Option<GooglePlacement>,
        azure: impl FnOnce() -> Option<AzurePlacement>,
    ) -> ObjectStoreResult<ObjectStore> {
        let missing = || ObjectStoreError::MissingProperties(provider);
        let store = match provider {
            Provider::Amazon => {
                let placement = amazon().ok_or_else(missing)?;
                let credentials = AmazonCredentials::from_secret(secret)?;
                let connector = AmazonConnector::new(credentials, placement.region.clone());
                ObjectStore::Amazon(ManagedObjectStore::new(
                    placement,
                    owner.clone(),
                    self.registry(),
                    Arc::new(connector),
                ))
            }
            Provider::Google => {
                let placement = google().ok_or_else(missing)?;
                let account = GoogleServiceAccount::from_secret(secret)?;
                let connector =
                    GoogleConnector::new(account, placement.location.clone(), self.http.clone());
                ObjectStore::Google(ManagedObjectStore::new(
                    placement,
                    owner.clone(),
                    self.registry(),
                    Arc::new(connector),
                ))
            }
            Provider::Azure => {
                let placement = azure().ok_or_else(missing)?;
                let credentials = AzureCredentials::from_secret(secret)?;
                let connector = AzureConnector::new(credentials, placement.clone(), self.http.clone());
                ObjectStore::Azure(ManagedObjectStore::new(
                    placement,
                    owner.clone(),
                    self.registry(),
                    Arc::new(connector),
                ))
            }
        };
        debug!(%provider, owner = %owner.id, "constructed object store");
        Ok(store)
    }

    /// Adapter for creating (or deleting) the bucket described by `request`.
    ///
    /// Only the property bundle matching the secret's provider is read; it
    /// must be present.
    pub fn create_common_object_store_buckets(
        &self,
        request: &CreateBucketRequest,
        secret: &Secret,
        owner: &Owner,
    ) -> ObjectStoreResult<ObjectStore> {
        let provider = Self::provider_of(secret, "creating")?;
        let properties = &request.properties;
        self.build(
            provider,
            secret,
            owner,
            || {
                properties.amazon.as_ref().map(|p| AmazonPlacement {
                    region: p.location.clone(),
                })
            },
            || {
                properties.google.as_ref().map(|p| GooglePlacement {
                    location: p.location.clone(),
                })
            },
            || {
                properties.azure.as_ref().map(|p| AzurePlacement {
                    resource_group: p.resource_group.clone(),
                    storage_account: p.storage_account.clone(),
                    location: p.location.clone(),
                })
            },
        )
    }

    /// Adapter for enumerating every bucket the secret's credential can see.
    pub fn list_common_object_store_buckets(
        &self,
        secret: &Secret,
        owner: &Owner,
    ) -> ObjectStoreResult<ObjectStore> {
        let provider = Self::provider_of(secret, "listing")?;
        self.build(
            provider,
            secret,
            owner,
            || Some(AmazonPlacement::default()),
            || Some(GooglePlacement::default()),
            || Some(AzurePlacement::default()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::CredentialError,
        models::{AmazonBucketProperties, AzureBucketProperties, CreateBucketProperties, GoogleBucketProperties},
        registry::SqliteRegistry,
        services::credentials::fixtures::{amazon_secret, azure_secret, google_secret},
    };
    use rstest::rstest;
    use uuid::Uuid;

    async fn factory() -> ObjectStoreFactory<SqliteRegistry> {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        ObjectStoreFactory::new(Arc::new(registry), reqwest::Client::new())
    }

    fn owner() -> Owner {
        Owner::new(Uuid::new_v4(), "U1")
    }

    fn full_request() -> CreateBucketRequest {
        CreateBucketRequest {
            name: "test-bucket-1".into(),
            properties: CreateBucketProperties {
                amazon: Some(AmazonBucketProperties {
                    location: "eu-central-1".into(),
                }),
                google: Some(GoogleBucketProperties {
                    location: "EU".into(),
                }),
                azure: Some(AzureBucketProperties {
                    resource_group: "rg-data".into(),
                    storage_account: "acctdata".into(),
                    location: "westeurope".into(),
                }),
            },
        }
    }

    #[rstest]
    #[case::amazon(amazon_secret(), Provider::Amazon)]
    #[case::google(google_secret(), Provider::Google)]
    #[case::azure(azure_secret(), Provider::Azure)]
    #[tokio::test]
    async fn create_dispatch_matches_the_declared_provider(#[case] secret: Secret, #[case] expected: Provider) {
        let store = factory()
            .await
            .create_common_object_store_buckets(&full_request(), &secret, &owner())
            .unwrap();
        assert_eq!(store.provider(), expected);
    }

    #[tokio::test]
    async fn create_dispatch_carries_the_requested_placement() {
        let factory = factory().await;
        let owner = owner();
        let request = full_request();

        match factory
            .create_common_object_store_buckets(&request, &amazon_secret(), &owner)
            .unwrap()
        {
            ObjectStore::Amazon(store) => {
                assert_eq!(store.placement().region, "eu-central-1");
                assert_eq!(store.owner(), &owner);
            }
            _ => panic!("expected an amazon store"),
        }

        match factory
            .create_common_object_store_buckets(&request, &azure_secret(), &owner)
            .unwrap()
        {
            ObjectStore::Azure(store) => {
                assert_eq!(
                    store.placement(),
                    &AzurePlacement {
                        resource_group: "rg-data".into(),
                        storage_account: "acctdata".into(),
                        location: "westeurope".into(),
                    }
                );
            }
            _ => panic!("expected an azure store"),
        }
    }

    #[rstest]
    #[case::create("creating")]
    #[case::list("listing")]
    #[tokio::test]
    async fn unknown_provider_is_unsupported(#[case] operation: &'static str) {
        let factory = factory().await;
        let secret = Secret::new("alibaba", [("key", "value")]);

        let result = match operation {
            "creating" => factory.create_common_object_store_buckets(&full_request(), &secret, &owner()),
            _ => factory.list_common_object_store_buckets(&secret, &owner()),
        };

        match result {
            Err(ObjectStoreError::Unsupported { operation: op, provider }) => {
                assert_eq!(op, operation);
                assert_eq!(provider, "alibaba");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("alibaba must not be dispatched"),
        }
    }

    #[tokio::test]
    async fn missing_properties_for_the_declared_provider_are_rejected() {
        let request = CreateBucketRequest {
            name: "test-bucket-1".into(),
            properties: CreateBucketProperties {
                amazon: Some(AmazonBucketProperties {
                    location: "us-east-1".into(),
                }),
                ..CreateBucketProperties::default()
            },
        };

        let result = factory()
            .await
            .create_common_object_store_buckets(&request, &google_secret(), &owner());

        assert!(matches!(result, Err(ObjectStoreError::MissingProperties(Provider::Google))));
    }

    #[tokio::test]
    async fn credential_errors_surface_at_dispatch() {
        let secret = Secret::new("amazon", [("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE")]);

        let result = factory()
            .await
            .create_common_object_store_buckets(&full_request(), &secret, &owner());

        assert!(matches!(
            result,
            Err(ObjectStoreError::Credential(CredentialError::MissingField("AWS_SECRET_ACCESS_KEY")))
        ));
    }

    #[tokio::test]
    async fn listing_dispatch_uses_default_placements() {
        let factory = factory().await;
        match factory
            .list_common_object_store_buckets(&amazon_secret(), &owner())
            .unwrap()
        {
            ObjectStore::Amazon(store) => assert_eq!(store.placement().region, "us-east-1"),
            _ => panic!("expected an amazon store"),
        }
        match factory
            .list_common_object_store_buckets(&azure_secret(), &owner())
            .unwrap()
        {
            ObjectStore::Azure(store) => assert!(store.placement().storage_account.is_empty()),
            _ => panic!("expected an azure store"),
        }
    }
}
