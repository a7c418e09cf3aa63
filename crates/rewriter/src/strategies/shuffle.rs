//! Permutation strategy: bytes are stored shuffled and masked; the decoder
//! scatters them back through the emitted position table.

use crate::strategies::empty_data_block;
use crate::tree::{byte_vec_expr, index_lit};
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::seq::SliceRandom;
use rand::Rng;
use syn::{parse_quote, Expr, Stmt};

/// The `shuffle` strategy.
pub struct Shuffle;

impl Obfuscator for Shuffle {
    fn name(&self) -> &'static str {
        "shuffle"
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

        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(rng);
        let mask_len = rng.gen_range(4..=16usize);
        let mut mask = vec![0u8; mask_len];
        rng.fill(mask.as_mut_slice());
        let op: u8 = rng.gen_range(0..3);

        // stored[i] holds the masked byte that belongs at position perm[i].
        let mut stored = Vec::with_capacity(n);
        for (i, &from) in perm.iter().enumerate() {
            let kb = mask[i % mask_len];
            stored.push(match op {
                0 => data[from] ^ kb,
                1 => data[from].wrapping_add(kb),
                _ => data[from].wrapping_sub(kb),
            });
        }

        let data_id = Ident::new("data", Span::call_site());
        let pos_id = ctx.fresh_ident("s");
        let mask_id = ctx.fresh_ident("m");
        let out_id = ctx.fresh_ident("o");
        let i_id = ctx.fresh_ident("i");
        let weave_data = ctx.weave(&data_id, &mut stored, keys);

        let stored_expr = byte_vec_expr(&stored);
        let mask_expr = byte_vec_expr(&mask);
        let pos_lits: Vec<Expr> = perm.iter().map(|&p| index_lit(p, n)).collect();

        let mask_at: Expr = parse_quote!(#mask_id[#i_id % #mask_len]);
        let unmask: Stmt = match op {
            0 => parse_quote! { #out_id[#pos_id[#i_id] as usize] = #data_id[#i_id] ^ #mask_at; },
            1 => parse_quote! { #out_id[#pos_id[#i_id] as usize] = #data_id[#i_id].wrapping_sub(#mask_at); },
            _ => parse_quote! { #out_id[#pos_id[#i_id] as usize] = #data_id[#i_id].wrapping_add(#mask_at); },
        };

        parse_quote!({
            let mut #data_id = #stored_expr;
            #(#weave_data)*
            let #pos_id = [#(#pos_lits),*];
            let #mask_id = #mask_expr;
            let mut #out_id = #data_id.to_vec();
            let mut #i_id = 0usize;
            while #i_id < #data_id.len() {
                #unmask
                #i_id += 1usize;
            }
            #data_id = #out_id;
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
            let got = roundtrip(&Shuffle, &data, 400 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }
}
