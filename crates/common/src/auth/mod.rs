//! Renter credential utilities
//!
//! Provides:
//! - Deterministic default secret derivation
//! - Secret hashing and verification

use sha2::{Digest, Sha256};

/// Derive the default shared secret for a renter that did not supply one:
/// the SHA-256 hex digest of its external tenant identifier.
pub fn default_secret(renter_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(renter_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a secret for storage
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate a presented secret against a stored hash
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    hash_secret(secret) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_deterministic() {
        let a = default_secret("tenant-42");
        let b = default_secret("tenant-42");
        let c = default_secret("tenant-43");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verify_secret() {
        let hash = hash_secret("s3cr3t");
        assert!(verify_secret("s3cr3t", &hash));
        assert!(!verify_secret("wrong", &hash));
    }
}
