//! Provider-agnostic lifecycle management for object-storage buckets.
//!
//! A [`services::ObjectStoreFactory`] turns a secret into a provider adapter
//! that creates, deletes and lists buckets at Amazon S3, Google Cloud Storage
//! or Azure Blob Storage, while keeping the managed-bucket registry in step.

pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod registry;
pub mod services;

pub use errors::{ObjectStoreError, ObjectStoreResult};
pub use providers::WaitPolicy;
pub use registry::{Repository, SqliteRegistry};
pub use services::{CommonObjectStore, ObjectStore, ObjectStoreFactory};
