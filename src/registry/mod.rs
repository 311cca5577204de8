//! Registry of managed buckets.
//!
//! The registry is the durable record of which buckets this system owns. It
//! is consumed by every provider adapter through the generic [`Repository`]
//! contract, parametrised by the provider's placement type so that records
//! of different providers can never be mixed up.

pub mod sqlite;

use crate::models::{ManagedBucket, Placement, Provider};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::SqliteRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("managed bucket `{name}` is already registered for {provider}")]
    Conflict { provider: Provider, name: String },
    #[error("refusing to delete managed buckets without a name criterion")]
    EmptyCriteria,
    #[error("corrupt managed bucket record: {0}")]
    CorruptRecord(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Equality criteria over a partial record. `None` fields match anything.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCriteria<P> {
    pub owner_id: Option<Uuid>,
    pub name: Option<String>,
    /// Narrows by the placement's scope columns (see [`Placement::scope`]).
    pub placement: Option<P>,
}

impl<P> Default for BucketCriteria<P> {
    fn default() -> Self {
        Self {
            owner_id: None,
            name: None,
            placement: None,
        }
    }
}

impl<P: Placement> BucketCriteria<P> {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn placed_in(mut self, placement: P) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Whether `bucket` satisfies these criteria. Mirrors the SQL filter so
    /// in-memory stores behave like the database.
    pub fn matches(&self, bucket: &ManagedBucket<P>) -> bool {
        if self.owner_id.is_some_and(|owner| owner != bucket.owner_id) {
            return false;
        }
        if self.name.as_ref().is_some_and(|name| *name != bucket.name) {
            return false;
        }
        match &self.placement {
            Some(placement) => placement.scope() == bucket.placement.scope(),
            None => true,
        }
    }
}

/// Persistence contract over managed-bucket records of one provider.
#[async_trait]
pub trait Repository<P: Placement>: Send + Sync {
    /// Persist a new record. Fails with [`RegistryError::Conflict`] when the
    /// name is already taken in the placement's namespace.
    async fn save(&self, bucket: &ManagedBucket<P>) -> RegistryResult<()>;

    async fn find(&self, criteria: &BucketCriteria<P>) -> RegistryResult<Vec<ManagedBucket<P>>>;

    /// Delete every record matching `criteria`, returning how many were
    /// removed. Criteria without a name are rejected.
    async fn delete(&self, criteria: &BucketCriteria<P>) -> RegistryResult<u64>;
}
