//! Public-key wrap/unwrap for the one hop the protocol needs: a client
//! public key wraps an already-sealed session key in `handle_kdc_request`.
//! Everything beyond this single hop is out of scope (spec non-goal:
//! "public-key-only flows beyond the one point where a client public key
//! wraps a session key").

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::AuthError;

const KEY_BITS: usize = 2048;

/// Generates an RSA key pair. Returns `(public_der, private_der)` in
/// PKCS#1 DER, a portable encoding the controller can persist: the public
/// half goes into the credential store under `SERVICE_SERVER_ID`, the
/// private half is written to a 0600 file.
pub fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>), AuthError> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
        .map_err(|e| AuthError::crypto_fault(format!("RSA key generation failed: {e}")))?;
    let public_key = RsaPublicKey::from(&private_key);

    let public_der = public_key
        .to_pkcs1_der()
        .map_err(|e| AuthError::crypto_fault(format!("RSA public key encoding failed: {e}")))?
        .into_vec();
    let private_der = private_key
        .to_pkcs1_der()
        .map_err(|e| AuthError::crypto_fault(format!("RSA private key encoding failed: {e}")))?
        .as_bytes()
        .to_vec();

    Ok((public_der, private_der))
}

pub fn decode_public_key(der: &[u8]) -> Result<RsaPublicKey, AuthError> {
    RsaPublicKey::from_pkcs1_der(der)
        .map_err(|e| AuthError::crypto_fault(format!("RSA public key decoding failed: {e}")))
}

pub fn decode_private_key(der: &[u8]) -> Result<RsaPrivateKey, AuthError> {
    RsaPrivateKey::from_pkcs1_der(der)
        .map_err(|e| AuthError::crypto_fault(format!("RSA private key decoding failed: {e}")))
}

/// RSA-wraps `data` (an already-sealed session key, when chained after a
/// symmetric wrap) under `public_key`.
pub fn wrap(data: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, AuthError> {
    let mut rng = rand::thread_rng();
    public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, data)
        .map_err(|e| AuthError::crypto_fault(format!("RSA wrap failed: {e}")))
}

/// Unwraps bytes previously produced by [`wrap`].
pub fn unwrap(data: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, AuthError> {
    private_key
        .decrypt(Pkcs1v15Encrypt, data)
        .map_err(|_| AuthError::rejected(crate::error::reason::CRYPTO_FAILURE))
}
