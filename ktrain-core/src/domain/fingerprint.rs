//! Content fingerprints
//!
//! A fingerprint is the natural dedup key of a training request. It is also
//! the label pair stamped on every cluster object the dispatcher creates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
///
/// 48 hex chars (192 bits) fit inside a label value and leave room for the
/// name prefix and generation suffix in a 63 character object name.
pub const DATA_HASH_LEN: usize = 48;

const DOMAIN_TAG: &[u8] = b"ktrain/fingerprint/v1";

/// Deterministic (project, content hash) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub project_id: String,
    pub data_hash: String,
}

impl Fingerprint {
    /// Compute the fingerprint of a training request's inputs.
    ///
    /// Every field is framed with an 8-byte big-endian length so that moving
    /// bytes across a field boundary always changes the digest.
    pub fn compute(project_id: &str, script: &[u8], data_reference: &str) -> Self {
        Self::compute_with_args(project_id, script, data_reference, &[])
    }

    /// Like [`Fingerprint::compute`], with extra runtime arguments folded in.
    ///
    /// Arguments change what a run produces, so they take part in the hash.
    /// An empty argument list hashes exactly like [`Fingerprint::compute`].
    pub fn compute_with_args(
        project_id: &str,
        script: &[u8],
        data_reference: &str,
        extra_args: &[String],
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        for field in [project_id.as_bytes(), script, data_reference.as_bytes()] {
            frame(&mut hasher, field);
        }
        if !extra_args.is_empty() {
            hasher.update((extra_args.len() as u64).to_be_bytes());
            for arg in extra_args {
                frame(&mut hasher, arg.as_bytes());
            }
        }

        let mut data_hash = hex::encode(hasher.finalize());
        data_hash.truncate(DATA_HASH_LEN);

        Self {
            project_id: project_id.to_string(),
            data_hash,
        }
    }
}

fn frame(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field);
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_id, self.data_hash)
    }
}
