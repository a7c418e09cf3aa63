//! Per-site randomized substitution-permutation cipher.
//!
//! Every site gets a fresh Fisher-Yates S-box, 4–6 rounds, and random
//! 32-bit round keys, so no two emitted decoders share a byte table or a
//! key schedule and nothing constant is left to fingerprint. Every XOR in
//! the decoder is additionally rendered through a random mixed
//! boolean-arithmetic form.

use crate::mba;
use crate::strategies::empty_data_block;
use crate::tree::{byte_vec_expr, u32_array_expr};
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::seq::SliceRandom;
use rand::Rng;
use syn::{parse_quote, Expr, Stmt};

/// The `customCipher` strategy.
pub struct CustomCipher;

/// Build-time cipher parameters, freshly randomized per site.
pub(crate) struct CipherParams {
    pub(crate) sbox: [u8; 256],
    pub(crate) inv_sbox: [u8; 256],
    pub(crate) rounds: usize,
    pub(crate) round_keys: Vec<u32>,
}

impl CipherParams {
    pub(crate) fn random(rng: &mut rand_chacha::ChaCha20Rng) -> Self {
        let mut sbox = [0u8; 256];
        for (i, b) in sbox.iter_mut().enumerate() {
            *b = i as u8;
        }
        sbox.shuffle(rng);
        let mut inv_sbox = [0u8; 256];
        for (i, &s) in sbox.iter().enumerate() {
            inv_sbox[s as usize] = i as u8;
        }
        let rounds = rng.gen_range(4..=6);
        let round_keys = (0..rounds).map(|_| rng.gen()).collect();
        Self { sbox, inv_sbox, rounds, round_keys }
    }

    /// Substitute, then diffuse each byte with the chained previous byte
    /// and a cycling key byte.
    pub(crate) fn encrypt(&self, data: &mut [u8]) {
        for round in 0..self.rounds {
            let key = self.round_keys[round];
            for b in data.iter_mut() {
                *b = self.sbox[*b as usize];
            }
            if !data.is_empty() {
                data[0] ^= key as u8;
                for i in 1..data.len() {
                    data[i] ^= data[i - 1] ^ (key >> ((i % 4) * 8)) as u8;
                }
            }
        }
    }
}

impl Obfuscator for CustomCipher {
    fn name(&self) -> &'static str {
        "customCipher"
    }

    fn obfuscate(
        &self,
        ctx: &mut Context<'_>,
        mut data: Vec<u8>,
        keys: &mut Vec<ExternalKey>,
    ) -> syn::Block {
        if data.is_empty() {
            return empty_data_block();
        }
        let params = CipherParams::random(ctx.rng_mut());
        params.encrypt(&mut data);

        let data_id = Ident::new("data", Span::call_site());
        let inv_id = ctx.fresh_ident("t");
        let keys_id = ctx.fresh_ident("y");
        let r_id = ctx.fresh_ident("r");
        let i_id = ctx.fresh_ident("i");
        let j_id = ctx.fresh_ident("j");
        let weave_data = ctx.weave(&data_id, &mut data, keys);

        let cipher_expr = byte_vec_expr(&data);
        let inv_expr = byte_vec_expr(&params.inv_sbox);
        let keys_expr = u32_array_expr(&params.round_keys);

        // Inverse diffusion, one byte: data[i] ^= data[i-1] ^ keybyte(i).
        let rng = ctx.rng_mut();
        let chained: Expr = parse_quote!(#data_id[#i_id - 1usize]);
        let keybyte_i: Expr = parse_quote!(((#keys_id[#r_id] >> ((#i_id % 4usize) * 8usize)) as u8));
        let inner = mba::xor(rng, &chained, &keybyte_i);
        let cur: Expr = parse_quote!(#data_id[#i_id]);
        let undiffuse = mba::xor(rng, &cur, &inner);
        let undiffuse_stmt: Stmt = parse_quote! { #data_id[#i_id] = #undiffuse; };

        let first: Expr = parse_quote!(#data_id[0usize]);
        let keybyte_0: Expr = parse_quote!((#keys_id[#r_id] as u8));
        let unfirst = mba::xor(rng, &first, &keybyte_0);
        let unfirst_stmt: Stmt = parse_quote! { #data_id[0usize] = #unfirst; };

        parse_quote!({
            let mut #data_id = #cipher_expr;
            #(#weave_data)*
            let #inv_id = #inv_expr;
            let #keys_id = #keys_expr;
            let mut #r_id = #keys_id.len();
            while #r_id > 0usize {
                #r_id -= 1usize;
                let mut #i_id = #data_id.len();
                while #i_id > 1usize {
                    #i_id -= 1usize;
                    #undiffuse_stmt
                }
                #unfirst_stmt
                let mut #j_id = 0usize;
                while #j_id < #data_id.len() {
                    #data_id[#j_id] = #inv_id[#data_id[#j_id] as usize];
                    #j_id += 1usize;
                }
            }
        })
    }
}
