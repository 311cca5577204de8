//! Credential resolver: turns an opaque [`Secret`] into the credential shape
//! each provider's client needs. Nothing here talks to the network; token
//! exchanges happen when a provider client is connected.

use crate::{
    errors::CredentialError,
    models::secret::{Secret, keys},
};
use serde::Serialize;
use std::fmt;

/// Read a required, non-empty field. Never defaults.
fn required(secret: &Secret, key: &'static str) -> Result<String, CredentialError> {
    match secret.value(key) {
        None => Err(CredentialError::MissingField(key)),
        Some(value) if value.trim().is_empty() => Err(CredentialError::EmptyField(key)),
        Some(value) => Ok(value.to_string()),
    }
}

/// Static access-key pair (no session token).
#[derive(Clone, PartialEq, Eq)]
pub struct AmazonCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl AmazonCredentials {
    pub fn from_secret(secret: &Secret) -> Result<Self, CredentialError> {
        Ok(Self {
            access_key_id: required(secret, keys::AWS_ACCESS_KEY_ID)?,
            secret_access_key: required(secret, keys::AWS_SECRET_ACCESS_KEY)?,
        })
    }
}

impl fmt::Debug for AmazonCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmazonCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Service-account descriptor, serialized in the standard key-file layout.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct GoogleServiceAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
}

impl GoogleServiceAccount {
    pub fn from_secret(secret: &Secret) -> Result<Self, CredentialError> {
        Ok(Self {
            account_type: required(secret, keys::GOOGLE_TYPE)?,
            project_id: required(secret, keys::GOOGLE_PROJECT_ID)?,
            private_key_id: required(secret, keys::GOOGLE_PRIVATE_KEY_ID)?,
            private_key: required(secret, keys::GOOGLE_PRIVATE_KEY)?,
            client_email: required(secret, keys::GOOGLE_CLIENT_EMAIL)?,
            client_id: required(secret, keys::GOOGLE_CLIENT_ID)?,
            auth_uri: required(secret, keys::GOOGLE_AUTH_URI)?,
            token_uri: required(secret, keys::GOOGLE_TOKEN_URI)?,
            auth_provider_x509_cert_url: required(secret, keys::GOOGLE_AUTH_X509_URL)?,
            client_x509_cert_url: required(secret, keys::GOOGLE_CLIENT_X509_URL)?,
        })
    }

    /// The key-file JSON handed to the token exchange.
    pub fn to_json(&self) -> Result<serde_json::Value, CredentialError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl fmt::Debug for GoogleServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

/// Service-principal credentials for Azure Resource Manager.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl AzureCredentials {
    pub fn from_secret(secret: &Secret) -> Result<Self, CredentialError> {
        Ok(Self {
            client_id: required(secret, keys::AZURE_CLIENT_ID)?,
            client_secret: required(secret, keys::AZURE_CLIENT_SECRET)?,
            tenant_id: required(secret, keys::AZURE_TENANT_ID)?,
            subscription_id: required(secret, keys::AZURE_SUBSCRIPTION_ID)?,
        })
    }
}

impl fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
