//! Google Cloud Storage bucket client over the GCS JSON API.
//!
//! The service account is exchanged through `google-cloud-auth` for
//! authorization headers scoped to full control of storage; every request
//! then carries those headers.

use crate::{
    errors::{ProviderError, ProviderResult},
    providers::{BucketClient, Connector, RemoteBucket, WaitPolicy, error_for_status},
    services::credentials::GoogleServiceAccount,
};
use async_trait::async_trait;
use google_cloud_auth::credentials::{
    CacheableResource,
    service_account::{AccessSpecifier, Builder},
};
use http::{Extensions, HeaderMap};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

pub const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
pub const FULL_CONTROL_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.full_control";

pub struct GoogleConnector {
    account: GoogleServiceAccount,
    location: String,
    http: reqwest::Client,
}

impl GoogleConnector {
    pub fn new(account: GoogleServiceAccount, location: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            account,
            location: location.into(),
            http,
        }
    }

    async fn authorization_headers(&self) -> ProviderResult<HeaderMap> {
        let auth = |err: &dyn std::fmt::Display| ProviderError::Auth(err.to_string());

        let key_file = self.account.to_json().map_err(|e| auth(&e))?;
        let credentials = Builder::new(key_file)
            .with_access_specifier(AccessSpecifier::from_scopes([FULL_CONTROL_SCOPE]))
            .build()
            .map_err(|e| auth(&e))?;

        match credentials.headers(Extensions::new()).await.map_err(|e| auth(&e))? {
            CacheableResource::New { data, .. } => Ok(data),
            CacheableResource::NotModified => Err(ProviderError::Auth(
                "credential exchange returned no headers".into(),
            )),
        }
    }
}

#[async_trait]
impl Connector for GoogleConnector {
    async fn connect(&self) -> ProviderResult<Box<dyn BucketClient>> {
        info!(project = %self.account.project_id, "exchanging service account for storage credentials");
        let headers = self.authorization_headers().await?;
        Ok(Box::new(GoogleBucketClient::new(
            self.http.clone(),
            STORAGE_ENDPOINT,
            &self.account.project_id,
            &self.location,
            headers,
        )))
    }
}

pub struct GoogleBucketClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    location: String,
    auth: HeaderMap,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketResource>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct BucketResource {
    name: String,
    location: Option<String>,
}

impl GoogleBucketClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        project_id: &str,
        location: &str,
        auth: HeaderMap,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            location: location.to_string(),
            auth,
        }
    }

    fn buckets_url(&self) -> String {
        format!("{}/storage/v1/b", self.endpoint)
    }

    fn bucket_url(&self, name: &str) -> String {
        format!("{}/storage/v1/b/{}", self.endpoint, name)
    }
}

#[async_trait]
impl BucketClient for GoogleBucketClient {
    /// `buckets.insert` is synchronous: a 200 means the bucket exists.
    async fn create_bucket(&self, name: &str, _wait: &WaitPolicy) -> ProviderResult<()> {
        debug!(bucket = name, location = %self.location, "inserting GCS bucket");
        let response = self
            .http
            .post(self.buckets_url())
            .headers(self.auth.clone())
            .query(&[("project", self.project_id.as_str())])
            .json(&json!({
                "name": name,
                "location": self.location,
                "billing": { "requesterPays": false },
            }))
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> ProviderResult<()> {
        debug!(bucket = name, "deleting GCS bucket");
        let response = self
            .http
            .delete(self.bucket_url(name))
            .headers(self.auth.clone())
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn bucket_exists(&self, name: &str) -> ProviderResult<bool> {
        let response = self
            .http
            .get(self.bucket_url(name))
            .headers(self.auth.clone())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(response).await?;
        Ok(true)
    }

    async fn list_buckets(&self) -> ProviderResult<Vec<RemoteBucket>> {
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.buckets_url())
                .headers(self.auth.clone())
                .query(&[("project", self.project_id.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: BucketList = error_for_status(request.send().await?).await?.json().await?;
            buckets.extend(page.items.into_iter().map(|item| RemoteBucket {
                name: item.name,
                location: item.location,
                namespace: String::new(),
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Presence;
    use http::HeaderValue;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path, query_param},
    };

    fn client(server: &MockServer) -> GoogleBucketClient {
        let mut auth = HeaderMap::new();
        auth.insert("authorization", HeaderValue::from_static("Bearer test-token"));
        GoogleBucketClient::new(reqwest::Client::new(), &server.uri(), "demo-project", "EU", auth)
    }

    #[tokio::test]
    async fn create_posts_bucket_with_location_and_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", "demo-project"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({ "name": "analytics", "location": "EU" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "analytics" })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .create_bucket("analytics", &WaitPolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_conflict_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(409).set_body_string("bucket already exists"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_bucket("analytics", &WaitPolicy::default())
            .await
            .unwrap_err();

        assert!(
            matches!(err, ProviderError::Status { status: 409, ref body } if body == "bucket already exists")
        );
    }

    #[tokio::test]
    async fn missing_bucket_is_reported_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(!client.bucket_exists("gone").await.unwrap());
        client
            .wait_for("gone", Presence::Absent, &WaitPolicy::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "name": "second", "location": "US" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "name": "first", "location": "EU" }],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let buckets = client(&server).list_buckets().await.unwrap();
        let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(buckets[1].location.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn deleting_a_missing_bucket_reports_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client(&server).delete_bucket("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
