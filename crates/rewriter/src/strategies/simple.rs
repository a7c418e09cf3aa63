//! Layered XOR-chain strategy.
//!
//! Three build-time layers: a position-derived key, cyclic nonce mixing
//! with a random operator, and a ciphertext-feedback chain. The emitted
//! loop undoes them in reverse layer order in a single forward pass.

use crate::strategies::empty_data_block;
use crate::tree::byte_vec_expr;
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::Rng;
use syn::{parse_quote, Expr, Stmt};

/// The `simple` strategy.
pub struct Simple;

#[derive(Clone, Copy)]
enum MixOp {
    Xor,
    Add,
    Sub,
}

impl Obfuscator for Simple {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn obfuscate(
        &self,
        ctx: &mut Context<'_>,
        data: Vec<u8>,
        keys: &mut Vec<ExternalKey>,
    ) -> syn::Block {
        if data.is_empty() {
            return empty_data_block();
        }
        let n = data.len();
        let rng = ctx.rng_mut();

        let mut key = vec![0u8; n];
        rng.fill(key.as_mut_slice());
        let nonce_len = rng.gen_range(4..=16usize);
        let mut nonce = vec![0u8; nonce_len];
        rng.fill(nonce.as_mut_slice());
        let op = match rng.gen_range(0..3) {
            0 => MixOp::Xor,
            1 => MixOp::Add,
            _ => MixOp::Sub,
        };

        // Layer 1: position-derived key. Layer 2: cyclic nonce mixing.
        // Layer 3: feedback chain on the already-chained previous byte.
        let mut cipher = Vec::with_capacity(n);
        let mut prev = 0u8;
        for (i, &p) in data.iter().enumerate() {
            let l1 = p ^ key[i] ^ (i.wrapping_mul(7).wrapping_add(13)) as u8;
            let l2 = match op {
                MixOp::Xor => l1 ^ nonce[i % nonce_len],
                MixOp::Add => l1.wrapping_add(nonce[i % nonce_len]),
                MixOp::Sub => l1.wrapping_sub(nonce[i % nonce_len]),
            };
            let c = l2 ^ (prev >> 3);
            cipher.push(c);
            prev = c;
        }

        let data_id = Ident::new("data", Span::call_site());
        let key_id = ctx.fresh_ident("k");
        let nonce_id = ctx.fresh_ident("n");
        let prev_id = ctx.fresh_ident("v");
        let i_id = ctx.fresh_ident("i");
        let cur_id = ctx.fresh_ident("c");

        let weave_data = ctx.weave(&data_id, &mut cipher, keys);
        let weave_key = ctx.weave(&key_id, &mut key, keys);
        let weave_nonce = ctx.weave(&nonce_id, &mut nonce, keys);

        let cipher_expr = byte_vec_expr(&cipher);
        let key_expr = byte_vec_expr(&key);
        let nonce_expr = byte_vec_expr(&nonce);

        let nonce_at: Expr = parse_quote!(#nonce_id[#i_id % #nonce_len]);
        let unmix: Stmt = match op {
            MixOp::Xor => parse_quote! { #data_id[#i_id] = #data_id[#i_id] ^ #nonce_at; },
            MixOp::Add => parse_quote! { #data_id[#i_id] = #data_id[#i_id].wrapping_sub(#nonce_at); },
            MixOp::Sub => parse_quote! { #data_id[#i_id] = #data_id[#i_id].wrapping_add(#nonce_at); },
        };

        parse_quote!({
            let mut #data_id = #cipher_expr;
            #(#weave_data)*
            let mut #key_id = #key_expr;
            #(#weave_key)*
            let mut #nonce_id = #nonce_expr;
            #(#weave_nonce)*
            let mut #prev_id = 0u8;
            let mut #i_id = 0usize;
            while #i_id < #data_id.len() {
                let #cur_id = #data_id[#i_id];
                #data_id[#i_id] = #cur_id ^ (#prev_id >> 3u32);
                #unmix
                #data_id[#i_id] = #data_id[#i_id] ^ #key_id[#i_id]
                    ^ ((#i_id * 7usize + 13usize) as u8);
                #prev_id = #cur_id;
                #i_id += 1usize;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::{corpus, roundtrip};
    use crate::tree::any_literal_contains;
    use quote::ToTokens;

    #[test]
    fn restores_every_corpus_entry() {
        for (i, data) in corpus().into_iter().enumerate() {
            let got = roundtrip(&Simple, &data, 100 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }

    #[test]
    fn plaintext_never_survives_in_literals() {
        let data = b"do not leak this";
        for seed in 0..8 {
            let (block, ..) = crate::strategies::testutil::emit(
                &Simple,
                data,
                seed,
                crate::Config::new(seed),
            );
            let tokens = block.to_token_stream();
            assert!(!any_literal_contains(&tokens, data), "leak at seed {seed}");
        }
    }
}
