//! Rolling-seed strategy: each byte is XORed with a seed that evolves from
//! the ciphertext, so the decoder is self-synchronizing.

use crate::strategies::empty_data_block;
use crate::tree::byte_vec_expr;
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::Rng;
use syn::parse_quote;

/// The `seed` strategy.
pub struct Seed;

impl Obfuscator for Seed {
    fn name(&self) -> &'static str {
        "seed"
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
        let seed0: u8 = ctx.rng_mut().gen();

        let mut cipher = Vec::with_capacity(data.len());
        let mut seed = seed0;
        for &p in &data {
            let c = p ^ seed;
            cipher.push(c);
            seed = seed.wrapping_add(c).rotate_left(3);
        }

        let data_id = Ident::new("data", Span::call_site());
        let seed_id = ctx.fresh_ident("d");
        let i_id = ctx.fresh_ident("i");
        let c_id = ctx.fresh_ident("c");
        let weave_data = ctx.weave(&data_id, &mut cipher, keys);
        let seed_expr = ctx.byte_lit(seed0, keys);
        let cipher_expr = byte_vec_expr(&cipher);

        parse_quote!({
            let mut #data_id = #cipher_expr;
            #(#weave_data)*
            let mut #seed_id = #seed_expr;
            let mut #i_id = 0usize;
            while #i_id < #data_id.len() {
                let #c_id = #data_id[#i_id];
                #data_id[#i_id] = #c_id ^ #seed_id;
                #seed_id = #seed_id.wrapping_add(#c_id).rotate_left(3u32);
                #i_id += 1usize;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::{corpus, roundtrip};

    #[test]
    fn restores_every_corpus_entry() {
        for (i, data) in corpus().into_iter().enumerate() {
            let got = roundtrip(&Seed, &data, 500 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }
}
