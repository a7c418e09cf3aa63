//! ASCON-128 authenticated encryption (AEAD).
//!
//! Overview
//! - Bit-exact implementation of the NIST Lightweight Cryptography winner,
//!   restricted to the ASCON-128 parameter set: 16-byte key, 16-byte nonce,
//!   16-byte tag, 8-byte rate.
//! - Associated data is always empty; callers that need AD should hash it
//!   into the nonce upstream.
//! - Deterministic: identical `(key, nonce, plaintext)` yields identical
//!   output, which build reproducibility depends on.
//! - Fail-closed: decryption zeroes the plaintext buffer and reports
//!   `AuthFailed` on any tag mismatch; the tag comparison is constant-time.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use subtle::ConstantTimeEq;

/// Key length in bytes.
pub const KEY_LEN: usize = 16;
/// Nonce length in bytes.
pub const NONCE_LEN: usize = 16;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const IV: u64 = 0x8040_0c06_0000_0000;
const RATE: usize = 8;

/// Errors produced by ASCON sealing and opening.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Key is not exactly 16 bytes.
    #[error("bad key size: {0} (want {KEY_LEN})")]
    BadKeySize(usize),
    /// Nonce is not exactly 16 bytes.
    #[error("bad nonce size: {0} (want {NONCE_LEN})")]
    BadNonceSize(usize),
    /// Tag mismatch, truncated input, or tampered ciphertext.
    #[error("authentication failed")]
    AuthFailed,
}

/// The 320-bit permutation state: five 64-bit lanes.
#[derive(Clone, Copy)]
struct State([u64; 5]);

impl State {
    fn init(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> Self {
        let k0 = be64(&key[..8]);
        let k1 = be64(&key[8..]);
        let mut s = State([IV, k0, k1, be64(&nonce[..8]), be64(&nonce[8..])]);
        s.permute(12);
        s.0[3] ^= k0;
        s.0[4] ^= k1;
        // Empty associated data: only the domain separation bit is absorbed.
        s.0[4] ^= 1;
        s
    }

    /// Apply the last `rounds` rounds of the 12-round permutation.
    fn permute(&mut self, rounds: usize) {
        debug_assert!(rounds <= 12);
        let s = &mut self.0;
        for i in (12 - rounds)..12 {
            // Round constant.
            s[2] ^= (0xf0 - 16 * i as u64) + i as u64;
            // Nonlinear layer (5-bit S-box across lanes).
            s[0] ^= s[4];
            s[4] ^= s[3];
            s[2] ^= s[1];
            let t = *s;
            for j in 0..5 {
                s[j] = t[j] ^ (!t[(j + 1) % 5] & t[(j + 2) % 5]);
            }
            s[1] ^= s[0];
            s[0] ^= s[4];
            s[3] ^= s[2];
            s[2] = !s[2];
            // Linear diffusion layer.
            s[0] ^= s[0].rotate_right(19) ^ s[0].rotate_right(28);
            s[1] ^= s[1].rotate_right(61) ^ s[1].rotate_right(39);
            s[2] ^= s[2].rotate_right(1) ^ s[2].rotate_right(6);
            s[3] ^= s[3].rotate_right(10) ^ s[3].rotate_right(17);
            s[4] ^= s[4].rotate_right(7) ^ s[4].rotate_right(41);
        }
    }

    fn finalize(&mut self, key: &[u8; KEY_LEN]) -> [u8; TAG_LEN] {
        let k0 = be64(&key[..8]);
        let k1 = be64(&key[8..]);
        self.0[1] ^= k0;
        self.0[2] ^= k1;
        self.permute(12);
        self.0[3] ^= k0;
        self.0[4] ^= k1;
        let mut tag = [0u8; TAG_LEN];
        tag[..8].copy_from_slice(&self.0[3].to_be_bytes());
        tag[8..].copy_from_slice(&self.0[4].to_be_bytes());
        tag
    }
}

fn be64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    u64::from_be_bytes(buf)
}

fn check_sizes(key: &[u8], nonce: &[u8]) -> Result<([u8; KEY_LEN], [u8; NONCE_LEN]), Error> {
    let key: [u8; KEY_LEN] = key.try_into().map_err(|_| Error::BadKeySize(key.len()))?;
    let nonce: [u8; NONCE_LEN] =
        nonce.try_into().map_err(|_| Error::BadNonceSize(nonce.len()))?;
    Ok((key, nonce))
}

/// Encrypt `plaintext` under `(key, nonce)`; returns `ciphertext || tag`.
///
/// The result is exactly `plaintext.len() + TAG_LEN` bytes.
pub fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let (key, nonce) = check_sizes(key, nonce)?;
    let mut s = State::init(&key, &nonce);

    let mut out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    let mut chunks = plaintext.chunks_exact(RATE);
    for block in &mut chunks {
        s.0[0] ^= be64(block);
        out.extend_from_slice(&s.0[0].to_be_bytes());
        s.permute(6);
    }
    let rest = chunks.remainder();
    // The padded final block is absorbed in full; only the non-padding
    // prefix of the keystream becomes ciphertext. The tag computation sees
    // the padded value whether or not a partial block exists.
    let mut last = [0u8; RATE];
    last[..rest.len()].copy_from_slice(rest);
    last[rest.len()] = 0x80;
    s.0[0] ^= be64(&last);
    out.extend_from_slice(&s.0[0].to_be_bytes()[..rest.len()]);

    out.extend_from_slice(&s.finalize(&key));
    Ok(out)
}

/// Decrypt `sealed` (`ciphertext || tag`) under `(key, nonce)`.
///
/// Returns `AuthFailed` when the input is shorter than a tag, or when the
/// recomputed tag does not match. The comparison is constant-time and the
/// partially recovered plaintext is wiped before the error is returned.
pub fn decrypt(key: &[u8], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>, Error> {
    let (key, nonce) = check_sizes(key, nonce)?;
    if sealed.len() < TAG_LEN {
        return Err(Error::AuthFailed);
    }
    let (ct, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    let mut s = State::init(&key, &nonce);

    let mut pt = Vec::with_capacity(ct.len());
    let mut chunks = ct.chunks_exact(RATE);
    for block in &mut chunks {
        let c = be64(block);
        pt.extend_from_slice(&(c ^ s.0[0]).to_be_bytes());
        s.0[0] = c;
        s.permute(6);
    }
    let rest = chunks.remainder();
    // Mirror the encrypt-side padding: the first `rest.len()` bytes of the
    // rate lane are replaced by ciphertext, then the 0x80 boundary marker is
    // folded in so finalization absorbs the same padded value.
    let keystream = s.0[0].to_be_bytes();
    let mut lane = keystream;
    for (i, (&c, &k)) in rest.iter().zip(keystream.iter()).enumerate() {
        pt.push(c ^ k);
        lane[i] = c;
    }
    lane[rest.len()] ^= 0x80;
    s.0[0] = be64(&lane);

    let expected = s.finalize(&key);
    if bool::from(expected.as_slice().ct_eq(tag)) {
        Ok(pt)
    } else {
        pt.iter_mut().for_each(|b| *b = 0);
        Err(Error::AuthFailed)
    }
}
