//! Core data models for the managed-bucket registry.
//!
//! These entities describe who owns a bucket, where it was placed at the
//! provider, and the request/secret shapes handed in by callers. Registry
//! records map onto the `managed_buckets` table through `registry::sqlite`.

pub mod bucket;
pub mod placement;
pub mod provider;
pub mod request;
pub mod secret;

pub use bucket::{ManagedBucket, Owner};
pub use placement::{AmazonPlacement, AzurePlacement, GooglePlacement, Placement, PlacementColumns};
pub use provider::Provider;
pub use request::{
    AmazonBucketProperties, AzureBucketProperties, CreateBucketProperties, CreateBucketRequest,
    GoogleBucketProperties,
};
pub use secret::Secret;
