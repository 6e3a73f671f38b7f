//! Crypto Primitives: symmetric key generation, symmetric encrypt/decrypt
//! of typed messages, public-key wrap/unwrap for one hop, and
//! password-to-key derivation.

pub mod asymmetric;
pub mod hash;
pub mod symmetric;

pub use hash::hash;
pub use symmetric::{decrypt_symmetric, encrypt_symmetric};

use rand::RngCore;
use rsa::RsaPublicKey;

use crate::error::AuthError;

/// Generates a fresh 128-bit symmetric key from a CSPRNG.
pub fn generate_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// The key a session key may be wrapped under: the caller's password-derived
/// symmetric key, or the caller's RSA public key.
pub enum WrappingKey<'a> {
    Symmetric(&'a [u8; 16]),
    Asymmetric(&'a RsaPublicKey),
}

/// Wraps `data` under `wrapping_key`. When symmetric, this is exactly
/// [`symmetric::encrypt_bytes`] over the raw bytes; when asymmetric, an
/// RSA wrap. The KDC handler chains this twice (user key, then client key)
/// when a principal has both.
pub fn wrap_session_key(data: &[u8], wrapping_key: &WrappingKey) -> Result<Vec<u8>, AuthError> {
    match wrapping_key {
        WrappingKey::Symmetric(key) => symmetric::encrypt_bytes(data, key),
        WrappingKey::Asymmetric(public_key) => asymmetric::wrap(data, public_key),
    }
}
