//! The closed set of cloud providers a managed bucket can live in.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Amazon,
    Google,
    Azure,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Amazon, Provider::Google, Provider::Azure];

    /// Tag used both in secrets and in the `provider` column of the registry.
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Amazon => "amazon",
            Provider::Google => "google",
            Provider::Azure => "azure",
        }
    }

    /// Resolve a declared secret type tag. Matching is case-insensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
