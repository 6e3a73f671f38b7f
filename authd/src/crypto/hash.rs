//! Password-to-key derivation.
//!
//! SHA-256 truncated to 16 bytes, no salt, no KDF iterations. This is
//! cryptographically weak by modern standards; it is preserved for wire
//! compatibility with the legacy protocol rather than replaced with a
//! memory-hard KDF. Treat this as a documented known weakness, not a bug
//! to silently "fix" underneath callers that depend on the exact derivation.

use sha2::{Digest, Sha256};

/// Derives a 16-byte symmetric key from a password the way the legacy wire
/// format expects: UTF-8 encode, SHA-256, take the first 16 bytes.
pub fn hash(password: &str) -> [u8; 16] {
    let digest = Sha256::digest(password.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash("secret"), hash("secret"));
    }

    #[test]
    fn distinct_passwords_differ() {
        assert_ne!(hash("secret"), hash("secret2"));
    }

    #[test]
    fn hash_is_sixteen_bytes() {
        assert_eq!(hash("x").len(), 16);
    }
}
