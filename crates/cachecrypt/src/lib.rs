//! Authenticated encryption for the build cache.
//!
//! Layout: `16-byte random nonce || ASCON-128 ciphertext+tag` over a
//! serde_json-encoded payload. The key folds a version constant into the
//! derivation so incompatible cache layouts never decrypt as garbage:
//! `key = SHA-256(seed || VERSION)[..16]`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

const VERSION: &[u8] = b"sourceveil-cache-encryption-v1";

/// Errors from sealing and opening cache payloads.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload could not be serialized.
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Tampered data, truncated data, or a key derived from another seed.
    #[error("decryption failed (cache tampered or wrong key)")]
    DecryptionFailed,
}

fn cache_key(seed: &[u8]) -> [u8; 16] {
    let mut h = Sha256::new();
    h.update(seed);
    h.update(VERSION);
    let digest = h.finalize();
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

/// Serialize and encrypt `payload` under a key derived from `seed`.
pub fn seal<T: Serialize>(seed: &[u8], payload: &T) -> Result<Vec<u8>, Error> {
    let encoded = serde_json::to_vec(payload)?;
    let key = cache_key(seed);
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);

    let sealed = ascon::encrypt(&key, &nonce, &encoded)
        .expect("cache key and nonce are fixed-size");
    let mut out = Vec::with_capacity(16 + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt and deserialize a payload sealed by [`seal`].
pub fn open<T: DeserializeOwned>(seed: &[u8], data: &[u8]) -> Result<T, Error> {
    if data.len() < 16 + ascon::TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    let (nonce, sealed) = data.split_at(16);
    let key = cache_key(seed);
    let plaintext =
        ascon::decrypt(&key, nonce, sealed).map_err(|_| Error::DecryptionFailed)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        count: u32,
    }

    #[test]
    fn roundtrip_and_minimum_size() {
        let entry = Entry { name: "alpha".into(), count: 3 };
        let sealed = seal(b"seed", &entry).unwrap();
        assert!(sealed.len() >= 32, "nonce + tag alone are 32 bytes");
        let back: Entry = open(b"seed", &sealed).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn wrong_seed_fails() {
        let sealed = seal(b"seed", &Entry { name: "alpha".into(), count: 3 }).unwrap();
        let err = open::<Entry>(b"other-seed", &sealed).unwrap_err();
        assert!(err.to_string().contains("decryption failed"));
    }

    #[test]
    fn any_single_bit_flip_fails() {
        let sealed = seal(b"seed", &Entry { name: "alpha".into(), count: 3 }).unwrap();
        for byte in 0..sealed.len() {
            let mut forged = sealed.clone();
            forged[byte] ^= 0x10;
            assert!(
                open::<Entry>(b"seed", &forged).is_err(),
                "tampered byte {byte} must not open"
            );
        }
    }

    #[test]
    fn truncated_input_fails() {
        let sealed = seal(b"seed", &Entry { name: "a".into(), count: 0 }).unwrap();
        assert!(open::<Entry>(b"seed", &sealed[..20]).is_err());
        assert!(open::<Entry>(b"seed", &[]).is_err());
    }
}
