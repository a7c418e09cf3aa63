//! External keys: typed random constants scattered through the rewritten
//! program and referenced from decoder lambdas.
//!
//! Every obfuscated site gets 2–5 keys that become the parameters of its
//! wrapping closure. Strategies mutate a few data bytes against key bytes
//! at build time and emit the reversing statements, so recovering the
//! literal requires tracking the key values through the call as well as
//! the decoder itself. Keys nothing referenced stay in the signature as
//! `_` parameters to keep the call well-typed.

use crate::names::NameProvider;
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use syn::{parse_quote, Expr, Stmt};

/// Unsigned width of an external key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWidth {
    /// 8-bit key.
    U8,
    /// 16-bit key.
    U16,
    /// 32-bit key.
    U32,
    /// 64-bit key.
    U64,
}

impl KeyWidth {
    const ALL: [KeyWidth; 4] = [KeyWidth::U8, KeyWidth::U16, KeyWidth::U32, KeyWidth::U64];

    /// Width in bits.
    pub fn bits(self) -> u32 {
        match self {
            KeyWidth::U8 => 8,
            KeyWidth::U16 => 16,
            KeyWidth::U32 => 32,
            KeyWidth::U64 => 64,
        }
    }

    /// Largest value the width can hold.
    pub fn max(self) -> u64 {
        match self {
            KeyWidth::U64 => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// The Rust type this width maps to.
    pub fn type_token(self) -> syn::Type {
        match self {
            KeyWidth::U8 => parse_quote!(u8),
            KeyWidth::U16 => parse_quote!(u16),
            KeyWidth::U32 => parse_quote!(u32),
            KeyWidth::U64 => parse_quote!(u64),
        }
    }

    /// Suffixed literal expression for `value` at this width.
    pub fn literal(self, value: u64) -> Expr {
        match self {
            KeyWidth::U8 => {
                let l = proc_macro2::Literal::u8_suffixed(value as u8);
                parse_quote!(#l)
            }
            KeyWidth::U16 => {
                let l = proc_macro2::Literal::u16_suffixed(value as u16);
                parse_quote!(#l)
            }
            KeyWidth::U32 => {
                let l = proc_macro2::Literal::u32_suffixed(value as u32);
                parse_quote!(#l)
            }
            KeyWidth::U64 => {
                let l = proc_macro2::Literal::u64_suffixed(value);
                parse_quote!(#l)
            }
        }
    }
}

/// One typed random key scoped to a single obfuscated site.
#[derive(Debug, Clone)]
pub struct ExternalKey {
    /// Generated parameter name.
    pub name: Ident,
    /// Key width.
    pub width: KeyWidth,
    /// Key value, always `<= width.max()`.
    pub value: u64,
    /// How many emitted operations reference the key.
    pub ref_count: u32,
}

impl ExternalKey {
    /// Expression extracting byte `index` of the key at runtime.
    fn byte_expr(&self, index: u32) -> Expr {
        let name = &self.name;
        if index == 0 && self.width == KeyWidth::U8 {
            parse_quote!(#name)
        } else {
            let shift = index * 8;
            parse_quote!(((#name >> #shift) as u8))
        }
    }

    /// Build-time value of byte `index`.
    fn byte_value(&self, index: u32) -> u8 {
        (self.value >> (index * 8)) as u8
    }
}

/// Generate 2–5 keys of uniformly random width and value.
pub(crate) fn rand_ext_keys(rng: &mut ChaCha20Rng, names: &mut NameProvider) -> Vec<ExternalKey> {
    let count = rng.gen_range(2..=5);
    (0..count)
        .map(|_| {
            let width = KeyWidth::ALL[rng.gen_range(0..KeyWidth::ALL.len())];
            ExternalKey {
                name: names.fresh(rng, "k"),
                width,
                value: rng.gen::<u64>() & width.max(),
                ref_count: 0,
            }
        })
        .collect()
}

#[derive(Clone, Copy)]
enum ByteOp {
    Xor,
    Add,
    Sub,
}

fn pick_op(rng: &mut ChaCha20Rng) -> ByteOp {
    match rng.gen_range(0..3) {
        0 => ByteOp::Xor,
        1 => ByteOp::Add,
        _ => ByteOp::Sub,
    }
}

/// Mutate 2–11 positions of `data` against random key bytes and return the
/// statements that reverse the mutations at runtime.
///
/// The returned statements are already in reverse application order; the
/// emitter splices them right after the definition of `target` (the slice
/// variable the statements index). Each recorded operation bumps the used
/// key's `ref_count`.
pub(crate) fn weave_into_bytes(
    rng: &mut ChaCha20Rng,
    target: &Ident,
    data: &mut [u8],
    keys: &mut [ExternalKey],
) -> Vec<Stmt> {
    if data.is_empty() || keys.is_empty() {
        return Vec::new();
    }
    let count = rng.gen_range(2..=11);
    let mut reversed = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = rng.gen_range(0..data.len());
        let key = rng.gen_range(0..keys.len());
        let byte_index = rng.gen_range(0..keys[key].width.bits() / 8);
        let kb = keys[key].byte_value(byte_index);
        let kb_expr = keys[key].byte_expr(byte_index);
        keys[key].ref_count += 1;

        let stmt: Stmt = match pick_op(rng) {
            ByteOp::Xor => {
                data[pos] ^= kb;
                parse_quote! { #target[#pos] = #target[#pos] ^ #kb_expr; }
            }
            ByteOp::Add => {
                data[pos] = data[pos].wrapping_add(kb);
                parse_quote! { #target[#pos] = #target[#pos].wrapping_sub(#kb_expr); }
            }
            ByteOp::Sub => {
                data[pos] = data[pos].wrapping_sub(kb);
                parse_quote! { #target[#pos] = #target[#pos].wrapping_add(#kb_expr); }
            }
        };
        reversed.push(stmt);
    }
    reversed.reverse();
    reversed
}

/// Rewrite the byte literal `value` as an expression mixing in a key byte,
/// with probability `probability`; otherwise return the plain literal.
pub(crate) fn byte_lit_with_ext_key(
    rng: &mut ChaCha20Rng,
    value: u8,
    keys: &mut [ExternalKey],
    probability: f64,
) -> Expr {
    if keys.is_empty() || !rng.gen_bool(probability) {
        return parse_quote!(#value);
    }
    let key = rng.gen_range(0..keys.len());
    let byte_index = rng.gen_range(0..keys[key].width.bits() / 8);
    let kb = keys[key].byte_value(byte_index);
    let kb_expr = keys[key].byte_expr(byte_index);
    keys[key].ref_count += 1;

    match pick_op(rng) {
        ByteOp::Xor => {
            let masked = value ^ kb;
            parse_quote!((#masked ^ #kb_expr))
        }
        ByteOp::Add => {
            let masked = value.wrapping_sub(kb);
            parse_quote!(#masked.wrapping_add(#kb_expr))
        }
        ByteOp::Sub => {
            let masked = value.wrapping_add(kb);
            parse_quote!(#masked.wrapping_sub(#kb_expr))
        }
    }
}

/// Closure parameter list for `keys`: referenced keys appear under their
/// generated names, unreferenced ones as `_`.
pub(crate) fn closure_params(keys: &[ExternalKey]) -> Vec<TokenStream> {
    keys.iter()
        .map(|k| {
            let ty = k.width.type_token();
            if k.ref_count > 0 {
                let name = &k.name;
                quote!(#name: #ty)
            } else {
                quote!(_: #ty)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn key_values_respect_width() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut names = NameProvider::new();
        for _ in 0..50 {
            let keys = rand_ext_keys(&mut rng, &mut names);
            assert!((2..=5).contains(&keys.len()));
            for k in keys {
                assert!(k.value <= k.width.max());
                assert_eq!(k.ref_count, 0);
            }
        }
    }

    #[test]
    fn weaving_counts_references() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut names = NameProvider::new();
        let mut keys = rand_ext_keys(&mut rng, &mut names);
        let mut data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let target = Ident::new("data", proc_macro2::Span::call_site());
        let stmts = weave_into_bytes(&mut rng, &target, &mut data, &mut keys);
        assert!((2..=11).contains(&stmts.len()));
        let total: u32 = keys.iter().map(|k| k.ref_count).sum();
        assert_eq!(total as usize, stmts.len());
    }

    #[test]
    fn unreferenced_keys_become_ignored_params() {
        let key = |refs| ExternalKey {
            name: Ident::new("_kabc", proc_macro2::Span::call_site()),
            width: KeyWidth::U16,
            value: 0x1234,
            ref_count: refs,
        };
        let params = closure_params(&[key(0), key(2)]);
        assert_eq!(params[0].to_string(), "_ : u16");
        assert_eq!(params[1].to_string(), "_kabc : u16");
    }

    #[test]
    fn empty_data_weaves_nothing() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let mut names = NameProvider::new();
        let mut keys = rand_ext_keys(&mut rng, &mut names);
        let target = Ident::new("data", proc_macro2::Span::call_site());
        assert!(weave_into_bytes(&mut rng, &target, &mut [], &mut keys).is_empty());
    }
}
