//! Bucket lifecycle services layered over the registry and provider clients.

pub mod credentials;
pub mod dispatch;
pub mod naming;
pub mod object_store;

pub use dispatch::{ObjectStore, ObjectStoreFactory};
pub use object_store::{
    BucketInventory, BucketListing, CommonObjectStore, ManagedBucketsStore, ManagedObjectStore,
    OrphanedRecord, get_validated_managed_bucket,
};
