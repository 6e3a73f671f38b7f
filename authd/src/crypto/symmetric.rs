//! Symmetric encryption of typed messages.
//!
//! The legacy wire format transformation is AES-128/ECB/PKCS5, matched here
//! bit-for-bit via the RustCrypto `aes`/`ecb` crates with PKCS7 padding
//! (PKCS5 and PKCS7 padding are identical for a 16-byte block size). ECB
//! leaks structural patterns in long plaintexts; the messages sealed here
//! (tickets, authenticators) are short and session-key-dominated so the
//! exposure is limited, but an implementation free of the wire-compatibility
//! constraint should prefer an authenticated mode such as AES-GCM instead.
//!
//! The canonical plaintext is the message's JSON serialization, sealed
//! directly — no outer object envelope, unlike the legacy Java
//! implementation this protocol was distilled from.

use aes::Aes128;
use cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use ecb::{Decryptor, Encryptor};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{reason, AuthError};

type Aes128EcbEnc = Encryptor<Aes128>;
type Aes128EcbDec = Decryptor<Aes128>;

/// Serializes `msg` to its canonical tagged-record byte form and encrypts
/// it under `key`. Never fails on the shape of `msg` — only on an
/// impossible algorithm/provider state.
pub fn encrypt_symmetric<M: Serialize>(msg: &M, key: &[u8; 16]) -> Result<Vec<u8>, AuthError> {
    let plaintext = serde_json::to_vec(msg)
        .map_err(|e| AuthError::crypto_fault(format!("message serialization failed: {e}")))?;
    encrypt_bytes(&plaintext, key)
}

/// Encrypts a raw byte string (used for session-key wrapping) under `key`.
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, AuthError> {
    let cipher = Aes128EcbEnc::new(key.into());
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypts `ciphertext` under `key` and parses the plaintext into `M`.
/// Padding failure, structural failure, and type mismatch are all
/// indistinguishable `Rejected` errors by design — revealing which one
/// occurred would leak an oracle to the caller.
pub fn decrypt_symmetric<M: DeserializeOwned>(
    ciphertext: &[u8],
    key: &[u8; 16],
) -> Result<M, AuthError> {
    let plaintext =
        decrypt_bytes(ciphertext, key).map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))?;
    serde_json::from_slice(&plaintext).map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))
}

/// Decrypts a raw byte string (the counterpart of [`encrypt_bytes`]).
pub fn decrypt_bytes(ciphertext: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, ()> {
    let cipher = Aes128EcbDec::new(key.into());
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Probe {
        a: String,
        b: u32,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct OtherShape {
        c: Vec<u8>,
        d: Vec<u8>,
        e: Vec<u8>,
    }

    #[test]
    fn round_trips() {
        let key = [7u8; 16];
        let msg = Probe {
            a: "hello".into(),
            b: 42,
        };
        let sealed = encrypt_symmetric(&msg, &key).unwrap();
        let opened: Probe = decrypt_symmetric(&sealed, &key).unwrap();
        assert_eq!(msg, opened);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = [7u8; 16];
        let other_key = [9u8; 16];
        let msg = Probe {
            a: "hello".into(),
            b: 42,
        };
        let sealed = encrypt_symmetric(&msg, &key).unwrap();
        let opened: Result<Probe, _> = decrypt_symmetric(&sealed, &other_key);
        assert!(matches!(opened, Err(AuthError::Rejected(_))));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let key = [7u8; 16];
        let msg = Probe {
            a: "hello".into(),
            b: 42,
        };
        let sealed = encrypt_symmetric(&msg, &key).unwrap();
        let opened: Result<OtherShape, _> = decrypt_symmetric(&sealed, &key);
        assert!(matches!(opened, Err(AuthError::Rejected(_))));
    }

    #[test]
    fn raw_bytes_round_trip() {
        let key = [1u8; 16];
        let data = b"0123456789abcdef";
        let sealed = encrypt_bytes(data, &key).unwrap();
        let opened = decrypt_bytes(&sealed, &key).unwrap();
        assert_eq!(opened, data);
    }
}
