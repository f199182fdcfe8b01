//! Credential references
//!
//! Storage credentials reach the training container through the cluster's
//! own secret mechanism. The dispatcher only ever holds the *name* of the
//! Secret, wrapped in [`CredentialRef`] so it cannot be confused with, or
//! replaced by, secret material.

use crate::validation::{ReferenceError, is_dns_subdomain};

/// Opaque reference to a pre-existing Secret.
///
/// Constructed only through [`CredentialRef::parse`]. Deliberately not
/// `Serialize`: the reference travels into manifests, not into storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialRef {
    secret_name: String,
}

impl CredentialRef {
    /// Parse and validate a Secret name.
    pub fn parse(secret_name: &str) -> Result<Self, ReferenceError> {
        if !is_dns_subdomain(secret_name) {
            return Err(ReferenceError::MalformedCredential {
                reference: secret_name.to_string(),
                reason: "must be a DNS-1123 subdomain".to_string(),
            });
        }

        Ok(Self {
            secret_name: secret_name.to_string(),
        })
    }

    /// Name of the referenced Secret, for the `secretRef` of a manifest.
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }
}

impl std::fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialRef(secret/{})", self.secret_name)
    }
}

impl std::fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "secret/{}", self.secret_name)
    }
}
