//! Cloud-side bucket clients.
//!
//! Each provider module exposes a [`Connector`] that turns resolved
//! credentials into a connected [`BucketClient`]. The lifecycle engine only
//! ever talks to these two traits, so tests substitute fakes for them.

pub mod amazon;
pub mod azure;
pub mod google;
pub mod waiter;

use crate::errors::{Presence, ProviderResult};
use async_trait::async_trait;
use serde::Serialize;

pub use waiter::WaitPolicy;

/// A bucket as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteBucket {
    pub name: String,
    pub location: Option<String>,
    /// Same meaning as [`crate::models::Placement::namespace`].
    pub namespace: String,
}

#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Issue the create call. Returns once the provider accepted it, which is
    /// not the same as the bucket being observable.
    async fn create_bucket(&self, name: &str, wait: &WaitPolicy) -> ProviderResult<()>;

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()>;

    async fn bucket_exists(&self, name: &str) -> ProviderResult<bool>;

    /// Every bucket the connected credential can see.
    async fn list_buckets(&self) -> ProviderResult<Vec<RemoteBucket>>;

    /// Block until the bucket's existence matches `presence`, within the
    /// policy's bounds. Defaults to polling [`BucketClient::bucket_exists`].
    async fn wait_for(&self, name: &str, presence: Presence, wait: &WaitPolicy) -> ProviderResult<()> {
        waiter::wait_for_presence(wait, presence, || self.bucket_exists(name)).await
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish an authenticated client. Token exchanges happen here.
    async fn connect(&self) -> ProviderResult<Box<dyn BucketClient>>;
}

/// Turn a non-success HTTP response into [`crate::errors::ProviderError::Status`].
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(crate::errors::ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}
