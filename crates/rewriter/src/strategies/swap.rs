//! Pair-swap strategy: an even number of index swaps, undone in reverse.

use crate::strategies::empty_data_block;
use crate::tree::{byte_vec_expr, index_lit};
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::Rng;
use syn::{parse_quote, Expr};

/// The `swap` strategy.
pub struct Swap;

impl Obfuscator for Swap {
    fn name(&self) -> &'static str {
        "swap"
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
        // At least n swaps, rounded up to an even count.
        let count = (n + (n & 1)).max(2);

        let rng = ctx.rng_mut();
        let mut positions = Vec::with_capacity(count * 2);
        for _ in 0..count {
            let a = rng.gen_range(0..n);
            let b = rng.gen_range(0..n);
            data.swap(a, b);
            positions.push(a);
            positions.push(b);
        }

        let data_id = Ident::new("data", Span::call_site());
        let pos_id = ctx.fresh_ident("s");
        let i_id = ctx.fresh_ident("i");
        let weave_data = ctx.weave(&data_id, &mut data, keys);

        let cipher_expr = byte_vec_expr(&data);
        let pos_lits: Vec<Expr> = positions.iter().map(|&p| index_lit(p, n)).collect();

        parse_quote!({
            let mut #data_id = #cipher_expr;
            #(#weave_data)*
            let #pos_id = [#(#pos_lits),*];
            let mut #i_id = #pos_id.len();
            while #i_id > 0usize {
                #i_id -= 2usize;
                #data_id.swap(#pos_id[#i_id] as usize, #pos_id[#i_id + 1usize] as usize);
            }
        })
    }
}
