//! Represents a managed bucket: a registry record asserting that this system
//! created, and is responsible for, a bucket at some provider.

use crate::models::placement::Placement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user on whose behalf buckets are created.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    /// Stable identifier persisted in every managed-bucket record.
    pub id: Uuid,

    /// Human readable login, kept alongside the id for auditing.
    pub login: String,
}

impl Owner {
    pub fn new(id: Uuid, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
        }
    }
}

/// A registry record for one bucket at one provider.
///
/// Records are written before the bucket is provisioned remotely, so a record
/// expresses intent to own the bucket rather than confirmed existence. They
/// are never updated in place: a record is either rolled back after a failed
/// provisioning call or removed once the bucket is confirmed deleted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ManagedBucket<P> {
    /// Surrogate identifier (UUID for internal DB use).
    pub id: Uuid,

    /// ID of the user that requested the bucket.
    pub owner_id: Uuid,

    /// Bucket name exactly as created at the provider.
    pub name: String,

    /// Provider-specific placement chosen at creation.
    pub placement: P,

    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

impl<P: Placement> ManagedBucket<P> {
    pub fn new(name: impl Into<String>, owner: &Owner, placement: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            name: name.into(),
            placement,
            created_at: Utc::now(),
        }
    }
}
