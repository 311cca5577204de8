//! Bucket creation request as received from the surrounding API layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(default)]
    pub properties: CreateBucketProperties,
}

/// One optional property bundle per provider; only the bundle matching the
/// secret's provider is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketProperties {
    pub amazon: Option<AmazonBucketProperties>,
    pub google: Option<GoogleBucketProperties>,
    pub azure: Option<AzureBucketProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonBucketProperties {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBucketProperties {
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureBucketProperties {
    pub resource_group: String,
    pub storage_account: String,
    pub location: String,
}
