//! Provider-specific placement of a bucket (where it lives at the provider).
//!
//! Every provider has its own placement type; the registry and the lifecycle
//! engine are generic over [`Placement`], so a record written for one
//! provider can never be read back as another provider's record.

use crate::{models::provider::Provider, registry::RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Flat column view of a placement, as stored in the `managed_buckets` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementColumns {
    pub location: String,
    pub resource_group: Option<String>,
    pub storage_account: Option<String>,
}

pub trait Placement: Clone + Debug + PartialEq + Send + Sync + 'static {
    const PROVIDER: Provider;

    /// Geographic placement (region or location).
    fn location(&self) -> &str;

    /// Scope in which bucket names must be unique at the provider.
    ///
    /// Amazon and Google share one global namespace per provider; Azure
    /// container names are only unique inside a storage account.
    fn namespace(&self) -> String {
        String::new()
    }

    /// Whether a listing through this placement enumerates `namespace`.
    /// Only registry records in enumerated namespaces can be orphans.
    fn covers_namespace(&self, _namespace: &str) -> bool {
        true
    }

    /// Columns a registry lookup is narrowed by, on top of owner and name.
    fn scope(&self) -> Vec<(&'static str, String)>;

    fn to_columns(&self) -> PlacementColumns;

    fn from_columns(columns: PlacementColumns) -> Result<Self, RegistryError>;
}

/// Amazon S3 buckets are placed in a single region.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AmazonPlacement {
    pub region: String,
}

/// S3 bucket enumeration is global, so listing adapters fall back to the
/// region every account can reach.
pub const DEFAULT_AMAZON_REGION: &str = "us-east-1";

impl Default for AmazonPlacement {
    fn default() -> Self {
        Self {
            region: DEFAULT_AMAZON_REGION.to_string(),
        }
    }
}

impl Placement for AmazonPlacement {
    const PROVIDER: Provider = Provider::Amazon;

    fn location(&self) -> &str {
        &self.region
    }

    fn scope(&self) -> Vec<(&'static str, String)> {
        vec![("location", self.region.clone())]
    }

    fn to_columns(&self) -> PlacementColumns {
        PlacementColumns {
            location: self.region.clone(),
            ..PlacementColumns::default()
        }
    }

    fn from_columns(columns: PlacementColumns) -> Result<Self, RegistryError> {
        Ok(Self {
            region: columns.location,
        })
    }
}

/// Google Cloud Storage buckets are placed in a location (region,
/// dual-region or multi-region). The billing project comes from the
/// service account, not from the placement.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct GooglePlacement {
    pub location: String,
}

impl Placement for GooglePlacement {
    const PROVIDER: Provider = Provider::Google;

    fn location(&self) -> &str {
        &self.location
    }

    fn scope(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn to_columns(&self) -> PlacementColumns {
        PlacementColumns {
            location: self.location.clone(),
            ..PlacementColumns::default()
        }
    }

    fn from_columns(columns: PlacementColumns) -> Result<Self, RegistryError> {
        Ok(Self {
            location: columns.location,
        })
    }
}

/// Azure blob containers live inside a storage account, which lives inside a
/// resource group. `location` is where the storage account is provisioned
/// when it does not exist yet.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AzurePlacement {
    pub resource_group: String,
    pub storage_account: String,
    pub location: String,
}

/// Namespace of a storage account inside a resource group.
pub fn azure_namespace(resource_group: &str, storage_account: &str) -> String {
    format!(
        "{}/{}",
        resource_group.to_ascii_lowercase(),
        storage_account.to_ascii_lowercase()
    )
}

impl Placement for AzurePlacement {
    const PROVIDER: Provider = Provider::Azure;

    fn location(&self) -> &str {
        &self.location
    }

    /// Resource-group names are case-insensitive in ARM, so the namespace
    /// uses the lowercased form.
    fn namespace(&self) -> String {
        azure_namespace(&self.resource_group, &self.storage_account)
    }

    /// Without a storage account the whole subscription is enumerated.
    fn covers_namespace(&self, namespace: &str) -> bool {
        self.storage_account.is_empty() || self.namespace().eq_ignore_ascii_case(namespace)
    }

    fn scope(&self) -> Vec<(&'static str, String)> {
        vec![
            ("resource_group", self.resource_group.clone()),
            ("storage_account", self.storage_account.clone()),
        ]
    }

    fn to_columns(&self) -> PlacementColumns {
        PlacementColumns {
            location: self.location.clone(),
            resource_group: Some(self.resource_group.clone()),
            storage_account: Some(self.storage_account.clone()),
        }
    }

    fn from_columns(columns: PlacementColumns) -> Result<Self, RegistryError> {
        let resource_group = columns
            .resource_group
            .ok_or_else(|| RegistryError::CorruptRecord("azure record without resource group".into()))?;
        let storage_account = columns.storage_account.ok_or_else(|| {
            RegistryError::CorruptRecord("azure record without storage account".into())
        })?;
        Ok(Self {
            resource_group,
            storage_account,
            location: columns.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_namespace_is_scoped_to_storage_account() {
        let placement = AzurePlacement {
            resource_group: "rg-data".into(),
            storage_account: "acctdata".into(),
            location: "westeurope".into(),
        };
        assert_eq!(placement.namespace(), "rg-data/acctdata");
        assert_eq!(AmazonPlacement::default().namespace(), "");
    }

    #[test]
    fn azure_namespace_ignores_resource_group_case() {
        let placement = AzurePlacement {
            resource_group: "RG-Data".into(),
            storage_account: "acctdata".into(),
            location: "westeurope".into(),
        };
        assert_eq!(placement.namespace(), "rg-data/acctdata");
        assert!(placement.covers_namespace("RG-DATA/acctdata"));
        assert!(!placement.covers_namespace("rg-data/other"));
    }

    #[test]
    fn azure_columns_without_account_are_rejected() {
        let columns = PlacementColumns {
            location: "westeurope".into(),
            resource_group: Some("rg".into()),
            storage_account: None,
        };
        assert!(matches!(
            AzurePlacement::from_columns(columns),
            Err(RegistryError::CorruptRecord(_))
        ));
    }
}
