//! Amazon S3 bucket client built on `aws-sdk-s3` with static credentials.

use crate::{
    errors::{Presence, ProviderError, ProviderResult},
    models::placement::DEFAULT_AMAZON_REGION,
    providers::{BucketClient, Connector, RemoteBucket, WaitPolicy},
    services::credentials::AmazonCredentials,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    client::Waiters,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use tracing::{debug, info};

const CREDENTIALS_SOURCE: &str = "managed-buckets-secret";

pub struct AmazonConnector {
    credentials: AmazonCredentials,
    region: String,
}

impl AmazonConnector {
    pub fn new(credentials: AmazonCredentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }
}

#[async_trait]
impl Connector for AmazonConnector {
    async fn connect(&self) -> ProviderResult<Box<dyn BucketClient>> {
        info!(region = %self.region, "creating S3 client");
        Ok(Box::new(AmazonBucketClient::new(&self.credentials, &self.region)))
    }
}

pub struct AmazonBucketClient {
    client: Client,
    region: String,
}

impl AmazonBucketClient {
    pub fn new(credentials: &AmazonCredentials, region: &str) -> Self {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                CREDENTIALS_SOURCE,
            ))
            .build();

        Self {
            client: Client::from_conf(config),
            region: region.to_string(),
        }
    }

    /// `us-east-1` is the implicit default and must not be sent as a
    /// location constraint.
    fn location_constraint(&self) -> Option<CreateBucketConfiguration> {
        (self.region != DEFAULT_AMAZON_REGION).then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build()
        })
    }
}

fn sdk_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    ProviderError::Api(DisplayErrorContext(&err).to_string())
}

fn waiter_error<E: std::error::Error>(err: E) -> ProviderError {
    ProviderError::Api(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl BucketClient for AmazonBucketClient {
    async fn create_bucket(&self, name: &str, _wait: &WaitPolicy) -> ProviderResult<()> {
        debug!(bucket = name, region = %self.region, "issuing CreateBucket");
        self.client
            .create_bucket()
            .bucket(name)
            .set_create_bucket_configuration(self.location_constraint())
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()> {
        debug!(bucket = name, "issuing DeleteBucket");
        match self.client.delete_bucket().bucket(name).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err.as_service_error().and_then(|e| e.code()) == Some("NoSuchBucket")
                    || err.raw_response().is_some_and(|r| r.status().as_u16() == 404) =>
            {
                Err(ProviderError::NotFound)
            }
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn bucket_exists(&self, name: &str) -> ProviderResult<bool> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err.as_service_error().is_some_and(|e| e.is_not_found())
                    || err.raw_response().is_some_and(|r| r.status().as_u16() == 404) =>
            {
                Ok(false)
            }
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn list_buckets(&self) -> ProviderResult<Vec<RemoteBucket>> {
        let output = self.client.list_buckets().send().await.map_err(sdk_error)?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                bucket.name().map(|name| RemoteBucket {
                    name: name.to_string(),
                    location: bucket.bucket_region().map(str::to_string),
                    namespace: String::new(),
                })
            })
            .collect())
    }

    /// Uses the SDK's HeadBucket waiters instead of the generic poller.
    async fn wait_for(&self, name: &str, presence: Presence, wait: &WaitPolicy) -> ProviderResult<()> {
        let waiting = async {
            match presence {
                Presence::Present => self
                    .client
                    .wait_until_bucket_exists()
                    .bucket(name)
                    .wait(wait.timeout)
                    .await
                    .map(|_| ())
                    .map_err(waiter_error),
                Presence::Absent => self
                    .client
                    .wait_until_bucket_not_exists()
                    .bucket(name)
                    .wait(wait.timeout)
                    .await
                    .map(|_| ())
                    .map_err(waiter_error),
            }
        };

        tokio::select! {
            _ = wait.cancel.cancelled() => Err(ProviderError::Cancelled),
            result = waiting => result,
        }
    }
}
