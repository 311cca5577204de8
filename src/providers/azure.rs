//! Azure Blob Storage containers managed through the Azure Resource Manager
//! REST API, authenticated with a service principal (client credentials).
//!
//! Containers live inside a storage account. Creating a container first
//! makes sure the account exists, provisioning it in the requested location
//! when it does not, and polls until Azure reports it `Succeeded`.

use crate::{
    errors::{Presence, ProviderError, ProviderResult},
    models::{AzurePlacement, Placement, placement::azure_namespace},
    providers::{BucketClient, Connector, RemoteBucket, WaitPolicy, error_for_status, waiter},
    services::credentials::AzureCredentials,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

pub const ARM_ENDPOINT: &str = "https://management.azure.com";
pub const LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";
pub const STORAGE_API_VERSION: &str = "2023-05-01";

/// Container listings in flight at once when walking a subscription.
const MAX_CONCURRENT_ACCOUNT_LISTINGS: usize = 8;

pub struct AzureConnector {
    credentials: AzureCredentials,
    placement: AzurePlacement,
    http: reqwest::Client,
    arm_endpoint: String,
    login_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl AzureConnector {
    pub fn new(credentials: AzureCredentials, placement: AzurePlacement, http: reqwest::Client) -> Self {
        Self {
            credentials,
            placement,
            http,
            arm_endpoint: ARM_ENDPOINT.to_string(),
            login_endpoint: LOGIN_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoints(mut self, arm: impl Into<String>, login: impl Into<String>) -> Self {
        self.arm_endpoint = arm.into();
        self.login_endpoint = login.into();
        self
    }

    async fn access_token(&self) -> ProviderResult<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_endpoint.trim_end_matches('/'),
            self.credentials.tenant_id
        );
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", ARM_SCOPE),
            ])
            .send()
            .await?;

        let response = error_for_status(response).await.map_err(|err| match err {
            ProviderError::Status { status, body } => {
                ProviderError::Auth(format!("token endpoint returned {status}: {body}"))
            }
            other => other,
        })?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl Connector for AzureConnector {
    async fn connect(&self) -> ProviderResult<Box<dyn BucketClient>> {
        info!(tenant = %self.credentials.tenant_id, "requesting Azure Resource Manager token");
        let token = self.access_token().await?;
        Ok(Box::new(AzureBucketClient::new(
            self.http.clone(),
            &self.arm_endpoint,
            &self.credentials.subscription_id,
            self.placement.clone(),
            token,
        )))
    }
}

pub struct AzureBucketClient {
    http: reqwest::Client,
    arm_endpoint: String,
    subscription_id: String,
    placement: AzurePlacement,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct NamedResource {
    name: String,
}

#[derive(Deserialize)]
struct StorageAccountResource {
    id: String,
    name: String,
    location: Option<String>,
    #[serde(default)]
    properties: StorageAccountProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StorageAccountProperties {
    provisioning_state: Option<String>,
}

/// Pull the resource group out of an ARM resource id
/// (`/subscriptions/{s}/resourceGroups/{rg}/providers/...`).
fn resource_group_of(id: &str) -> Option<&str> {
    let mut segments = id.split('/');
    segments
        .by_ref()
        .find(|segment| segment.eq_ignore_ascii_case("resourceGroups"))?;
    segments.next().filter(|rg| !rg.is_empty())
}

impl AzureBucketClient {
    pub fn new(
        http: reqwest::Client,
        arm_endpoint: &str,
        subscription_id: &str,
        placement: AzurePlacement,
        token: String,
    ) -> Self {
        Self {
            http,
            arm_endpoint: arm_endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            placement,
            token,
        }
    }

    fn account_url(&self, resource_group: &str, account: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.arm_endpoint, self.subscription_id, resource_group, account
        )
    }

    fn own_account_url(&self) -> String {
        self.account_url(&self.placement.resource_group, &self.placement.storage_account)
    }

    fn container_url(&self, name: &str) -> String {
        format!("{}/blobServices/default/containers/{}", self.own_account_url(), name)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("api-version", STORAGE_API_VERSION)])
    }

    /// Follow `nextLink` until the collection is exhausted. Next links already
    /// carry the api-version.
    async fn get_all<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Page<T> = error_for_status(self.get(url).send().await?).await?.json().await?;
        loop {
            items.append(&mut page.value);
            let Some(next) = page.next_link.take().filter(|link| !link.is_empty()) else {
                break;
            };
            let response = self.http.get(next).bearer_auth(&self.token).send().await?;
            page = error_for_status(response).await?.json().await?;
        }
        Ok(items)
    }

    /// `Ok(false)` while the account is missing or still provisioning.
    async fn storage_account_ready(&self) -> ProviderResult<bool> {
        let response = self.get(&self.own_account_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let account: StorageAccountResource = error_for_status(response).await?.json().await?;
        Ok(account
            .properties
            .provisioning_state
            .is_some_and(|state| state.eq_ignore_ascii_case("Succeeded")))
    }

    async fn ensure_storage_account(&self, wait: &WaitPolicy) -> ProviderResult<()> {
        let response = self.get(&self.own_account_url()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(
                account = %self.placement.storage_account,
                location = %self.placement.location,
                "provisioning storage account"
            );
            let response = self
                .http
                .put(self.own_account_url())
                .bearer_auth(&self.token)
                .query(&[("api-version", STORAGE_API_VERSION)])
                .json(&json!({
                    "location": self.placement.location,
                    "kind": "StorageV2",
                    "sku": { "name": "Standard_LRS" },
                }))
                .send()
                .await?;
            error_for_status(response).await?;
        } else {
            error_for_status(response).await?;
        }

        waiter::wait_for_presence(wait, Presence::Present, || self.storage_account_ready()).await
    }

    async fn list_account_containers(
        &self,
        resource_group: String,
        account: String,
        location: Option<String>,
    ) -> ProviderResult<Vec<RemoteBucket>> {
        let url = format!(
            "{}/blobServices/default/containers",
            self.account_url(&resource_group, &account)
        );
        let containers: Vec<NamedResource> = self.get_all(&url).await?;
        let namespace = azure_namespace(&resource_group, &account);
        Ok(containers
            .into_iter()
            .map(|container| RemoteBucket {
                name: container.name,
                location: location.clone(),
                namespace: namespace.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl BucketClient for AzureBucketClient {
    async fn create_bucket(&self, name: &str, wait: &WaitPolicy) -> ProviderResult<()> {
        self.ensure_storage_account(wait).await?;

        debug!(container = name, account = %self.placement.storage_account, "creating blob container");
        let response = self
            .http
            .put(self.container_url(name))
            .bearer_auth(&self.token)
            .query(&[("api-version", STORAGE_API_VERSION)])
            .json(&json!({ "properties": {} }))
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()> {
        debug!(container = name, account = %self.placement.storage_account, "deleting blob container");
        let response = self
            .http
            .delete(self.container_url(name))
            .bearer_auth(&self.token)
            .query(&[("api-version", STORAGE_API_VERSION)])
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> ProviderResult<bool> {
        let response = self.get(&self.container_url(name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(response).await?;
        Ok(true)
    }

    /// Containers of the placement's storage account, or of every storage
    /// account in the subscription when no account is set.
    async fn list_buckets(&self) -> ProviderResult<Vec<RemoteBucket>> {
        if !self.placement.storage_account.is_empty() {
            let location = Some(self.placement.location().to_string()).filter(|l| !l.is_empty());
            return self
                .list_account_containers(
                    self.placement.resource_group.clone(),
                    self.placement.storage_account.clone(),
                    location,
                )
                .await;
        }

        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Storage/storageAccounts",
            self.arm_endpoint, self.subscription_id
        );
        let accounts: Vec<StorageAccountResource> = self.get_all(&url).await?;
        let listings = accounts.into_iter().filter_map(|account| {
            let resource_group = resource_group_of(&account.id)?.to_string();
            Some(self.list_account_containers(resource_group, account.name, account.location))
        });

        let per_account: Vec<Vec<RemoteBucket>> = stream::iter(listings)
            .buffer_unordered(MAX_CONCURRENT_ACCOUNT_LISTINGS)
            .try_collect()
            .await?;
        Ok(per_account.into_iter().flatten().collect())
    }
}
