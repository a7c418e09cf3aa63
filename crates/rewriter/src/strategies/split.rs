//! Chunk-split strategy: random chunks, each masked with its own operator
//! and key byte, decoded through small per-chunk tables.

use crate::strategies::empty_data_block;
use crate::tree::{byte_vec_expr, index_lit};
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::Rng;
use syn::{parse_quote, Expr};

/// The `split` strategy.
pub struct Split;

impl Obfuscator for Split {
    fn name(&self) -> &'static str {
        "split"
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
        let n = data.len();
        let rng = ctx.rng_mut();

        // Chunk boundaries; a 1-byte tail is its own chunk.
        let mut bounds = vec![0usize];
        while *bounds.last().unwrap() < n {
            let at = *bounds.last().unwrap();
            let step = rng.gen_range(1..=7usize).min(n - at);
            bounds.push(at + step);
        }
        let chunks = bounds.len() - 1;

        // Per-chunk operator table (0 xor, 1 add, 2 sub) and key byte.
        let mut ops = Vec::with_capacity(chunks);
        let mut chunk_keys = Vec::with_capacity(chunks);
        for c in 0..chunks {
            let op: u8 = rng.gen_range(0..3);
            let kb: u8 = rng.gen();
            for b in &mut data[bounds[c]..bounds[c + 1]] {
                *b = match op {
                    0 => *b ^ kb,
                    1 => b.wrapping_add(kb),
                    _ => b.wrapping_sub(kb),
                };
            }
            ops.push(op);
            chunk_keys.push(kb);
        }

        let data_id = Ident::new("data", Span::call_site());
        let bounds_id = ctx.fresh_ident("b");
        let ops_id = ctx.fresh_ident("o");
        let keys_id = ctx.fresh_ident("y");
        let c_id = ctx.fresh_ident("c");
        let j_id = ctx.fresh_ident("j");
        let weave_data = ctx.weave(&data_id, &mut data, keys);

        let cipher_expr = byte_vec_expr(&data);
        let bound_lits: Vec<Expr> = bounds.iter().map(|&b| index_lit(b, n + 1)).collect();
        let ops_expr = byte_vec_expr(&ops);
        let keys_expr = byte_vec_expr(&chunk_keys);

        parse_quote!({
            let mut #data_id = #cipher_expr;
            #(#weave_data)*
            let #bounds_id = [#(#bound_lits),*];
            let #ops_id = #ops_expr;
            let #keys_id = #keys_expr;
            let mut #c_id = 0usize;
            while #c_id + 1usize < #bounds_id.len() {
                let mut #j_id = #bounds_id[#c_id] as usize;
                while #j_id < #bounds_id[#c_id + 1usize] as usize {
                    if #ops_id[#c_id] == 0u8 {
                        #data_id[#j_id] = #data_id[#j_id] ^ #keys_id[#c_id];
                    } else if #ops_id[#c_id] == 1u8 {
                        #data_id[#j_id] = #data_id[#j_id].wrapping_sub(#keys_id[#c_id]);
                    } else {
                        #data_id[#j_id] = #data_id[#j_id].wrapping_add(#keys_id[#c_id]);
                    }
                    #j_id += 1usize;
                }
                #c_id += 1usize;
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
            let got = roundtrip(&Split, &data, 300 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }

    #[test]
    fn single_byte_input_becomes_one_chunk() {
        let got = roundtrip(&Split, &[0xA7], 301).unwrap();
        assert_eq!(got, vec![0xA7]);
    }
}
