//! Error taxonomy for the bucket lifecycle.
//!
//! `ObjectStoreError` is what callers of the library see. It keeps the
//! provider-level cause (`ProviderError`) and credential problems
//! (`CredentialError`) as typed sources so callers can tell "nothing to
//! delete" from "the registry is inconsistent" from "the cloud said no".

use crate::{models::Provider, registry::RegistryError};
use std::{fmt, time::Duration};
use thiserror::Error;

/// Failures talking to a cloud provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider (or its SDK) rejected the call.
    #[error("{0}")]
    Api(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected response {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("no such bucket")]
    NotFound,
}

impl ProviderError {
    /// The provider reported the bucket (or its container) as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProviderError::NotFound | ProviderError::Status { status: 404, .. }
        )
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Malformed or incomplete secret material.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("secret is missing field `{0}`")]
    MissingField(&'static str),
    #[error("secret field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("service account is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The two existence states a waiter can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub const fn exists(self) -> bool {
        matches!(self, Presence::Present)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Presence::Present => "present",
            Presence::Absent => "absent",
        })
    }
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("{operation} a bucket is not supported for `{provider}`")]
    Unsupported {
        operation: &'static str,
        provider: String,
    },
    #[error("no {0} bucket properties in request")]
    MissingProperties(Provider),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("could not create {provider} client: {source}")]
    Connect {
        provider: Provider,
        #[source]
        source: ProviderError,
    },
    /// The remote call failed. If the registry rollback also failed, its
    /// error rides along in `compensation`; the primary error is always
    /// `source`.
    #[error("{provider} failed to {action} bucket `{bucket}`: {source}")]
    Remote {
        provider: Provider,
        action: &'static str,
        bucket: String,
        #[source]
        source: ProviderError,
        compensation: Option<RegistryError>,
    },
    #[error("{provider} failed to list buckets: {source}")]
    Listing {
        provider: Provider,
        #[source]
        source: ProviderError,
    },
    /// The remote create/delete was accepted but could not be confirmed. The
    /// bucket's real state is unknown; reconcile by listing, do not retry
    /// blindly.
    #[error("bucket `{bucket}` at {provider} was not confirmed {expected}: {source}")]
    Indeterminate {
        provider: Provider,
        bucket: String,
        expected: Presence,
        #[source]
        source: ProviderError,
    },
    #[error("managed bucket `{0}` not found")]
    ManagedBucketNotFound(String),
    #[error("multiple managed buckets named `{name}` found ({count})")]
    MultipleManagedBucketsFound { name: String, count: usize },
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;
