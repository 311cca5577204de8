//! The opaque secret bag handed in by the secret store.
//!
//! The registry never persists a secret; the credential resolver only reads
//! the named fields it needs for one provider.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

use crate::models::provider::Provider;

/// Well-known field names inside a secret's value map.
pub mod keys {
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";

    pub const GOOGLE_TYPE: &str = "type";
    pub const GOOGLE_PROJECT_ID: &str = "project_id";
    pub const GOOGLE_PRIVATE_KEY_ID: &str = "private_key_id";
    pub const GOOGLE_PRIVATE_KEY: &str = "private_key";
    pub const GOOGLE_CLIENT_EMAIL: &str = "client_email";
    pub const GOOGLE_CLIENT_ID: &str = "client_id";
    pub const GOOGLE_AUTH_URI: &str = "auth_uri";
    pub const GOOGLE_TOKEN_URI: &str = "token_uri";
    pub const GOOGLE_AUTH_X509_URL: &str = "auth_provider_x509_cert_url";
    pub const GOOGLE_CLIENT_X509_URL: &str = "client_x509_cert_url";

    pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
    pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
    pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
    pub const AZURE_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
}

/// A key-value bag plus the declared provider type tag.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret {
    /// Declared provider type (`amazon`, `google`, `azure`).
    #[serde(rename = "type")]
    pub secret_type: String,

    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl Secret {
    pub fn new<K, V>(secret_type: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secret_type: secret_type.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The provider this secret declares, if it is one we know.
    pub fn provider(&self) -> Option<Provider> {
        Provider::from_tag(&self.secret_type)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.values.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("Secret")
            .field("secret_type", &self.secret_type)
            .field("fields", &fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_values() {
        let secret = Secret::new(
            "amazon",
            [
                (keys::AWS_ACCESS_KEY_ID, "AKIAEXAMPLE"),
                (keys::AWS_SECRET_ACCESS_KEY, "very-secret"),
            ],
        );
        let rendered = format!("{secret:?}");
        assert!(rendered.contains("AWS_SECRET_ACCESS_KEY"));
        assert!(!rendered.contains("very-secret"));
        assert_eq!(secret.provider(), Some(Provider::Amazon));
    }

    #[test]
    fn deserializes_from_secret_file_shape() {
        let secret: Secret = serde_json::from_str(
            r#"{"type":"google","values":{"project_id":"demo-project"}}"#,
        )
        .unwrap();
        assert_eq!(secret.provider(), Some(Provider::Google));
        assert_eq!(secret.value(keys::GOOGLE_PROJECT_ID), Some("demo-project"));
    }
}
