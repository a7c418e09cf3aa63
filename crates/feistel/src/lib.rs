//! Irreversible block cipher: AES S-box plus a reduced-round Feistel network
//! over 16-byte blocks.
//!
//! Overview
//! - Build-time `encrypt` only needs the subkeys; the runtime inverse is
//!   synthesized into protected programs by the rewriter. The `decrypt` here
//!   exists so the two directions can be tested against each other.
//! - "Irreversible" is an analysis property, not a cryptographic one: an
//!   observer of the binary who cannot execute the Feistel rounds (a static
//!   scanner) cannot undo the transformation, while the emitted decoder can.
//! - Subkeys come from caller-supplied KDF material, packed little-endian,
//!   one 64-bit word per round.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Cipher block length in bytes.
pub const BLOCK_LEN: usize = 16;
/// Number of Feistel rounds.
pub const ROUNDS: usize = 4;

/// Additive round constant inside the round function.
const ROUND_CONST: u64 = 0x9e37_79b9_7f4a_7c15;

/// The AES forward S-box.
pub const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// The inverse S-box, derived from [`SBOX`].
pub const INV_SBOX: [u8; 256] = invert(&SBOX);

const fn invert(sbox: &[u8; 256]) -> [u8; 256] {
    let mut inv = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inv[sbox[i] as usize] = i as u8;
        i += 1;
    }
    inv
}

/// Errors from subkey packing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Key material length is not a multiple of 8 bytes.
    #[error("subkey material length {0} is not a multiple of 8")]
    BadMaterial(usize),
}

/// Pack KDF material into round subkeys, one little-endian u64 per 8 bytes.
pub fn subkeys(material: &[u8]) -> Result<Vec<u64>, Error> {
    if material.is_empty() || material.len() % 8 != 0 {
        return Err(Error::BadMaterial(material.len()));
    }
    Ok(material
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// The Feistel round function.
///
/// The rotation amount is key-dependent but always odd, so a single-bit
/// input difference never stays in place across rounds.
pub fn round_fn(x: u64, k: u64) -> u64 {
    ((x ^ k).rotate_left(((k & 63) | 1) as u32) ^ k.rotate_left(17))
        .wrapping_add(ROUND_CONST)
}

/// Encrypt `data`, zero-padded to a multiple of [`BLOCK_LEN`].
///
/// The caller keeps the original length; [`decrypt`] truncates back to it.
pub fn encrypt(data: &[u8], subkeys: &[u64]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let rem = buf.len() % BLOCK_LEN;
    if rem != 0 || buf.is_empty() {
        buf.resize(buf.len() + BLOCK_LEN - rem, 0);
    }
    for block in buf.chunks_exact_mut(BLOCK_LEN) {
        let mut l = u64::from_le_bytes(block[..8].try_into().unwrap());
        let mut r = u64::from_le_bytes(block[8..].try_into().unwrap());
        for &k in subkeys {
            let next_l = r ^ round_fn(l, k);
            r = l;
            l = next_l;
        }
        block[..8].copy_from_slice(&l.to_le_bytes());
        block[8..].copy_from_slice(&r.to_le_bytes());
    }
    for b in &mut buf {
        *b = SBOX[*b as usize];
    }
    buf
}

/// Invert [`encrypt`]: inverse S-box, unwind the rounds, truncate to
/// `plain_len`.
pub fn decrypt(data: &[u8], subkeys: &[u64], plain_len: usize) -> Vec<u8> {
    let mut buf = data.to_vec();
    for b in &mut buf {
        *b = INV_SBOX[*b as usize];
    }
    for block in buf.chunks_exact_mut(BLOCK_LEN) {
        let mut l = u64::from_le_bytes(block[..8].try_into().unwrap());
        let mut r = u64::from_le_bytes(block[8..].try_into().unwrap());
        for &k in subkeys.iter().rev() {
            let prev_l = r;
            r = l ^ round_fn(prev_l, k);
            l = prev_l;
        }
        block[..8].copy_from_slice(&l.to_le_bytes());
        block[8..].copy_from_slice(&r.to_le_bytes());
    }
    buf.truncate(plain_len);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbox_matches_aes_anchors() {
        assert_eq!(SBOX[0x00], 0x63);
        assert_eq!(SBOX[0x53], 0xed);
        assert_eq!(SBOX[0xff], 0x16);
    }

    #[test]
    fn sbox_is_a_permutation() {
        let mut seen = [false; 256];
        for &v in SBOX.iter() {
            assert!(!seen[v as usize], "duplicate S-box entry {v:#x}");
            seen[v as usize] = true;
        }
    }

    #[test]
    fn inverse_sbox_inverts() {
        for x in 0..=255u8 {
            assert_eq!(INV_SBOX[SBOX[x as usize] as usize], x);
        }
    }

    #[test]
    fn subkey_packing_is_little_endian() {
        let ks = subkeys(&[1, 0, 0, 0, 0, 0, 0, 0, 0xff, 0, 0, 0, 0, 0, 0, 0x80]).unwrap();
        assert_eq!(ks, vec![1, 0x8000_0000_0000_00ff]);
        assert_eq!(subkeys(&[0; 7]), Err(Error::BadMaterial(7)));
        assert_eq!(subkeys(&[]), Err(Error::BadMaterial(0)));
    }
}
