//! Irreversible-cipher strategy: S-box + Feistel encryption with subkeys
//! from the deterministic provider, decoded through the per-file shared
//! decoder. A static scanner that cannot execute the rounds cannot undo it.

use crate::strategies::empty_data_block;
use crate::tree::{byte_vec_expr, u64_array_expr};
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use syn::parse_quote;

/// The `irreversible` strategy.
pub struct Irreversible;

impl Obfuscator for Irreversible {
    fn name(&self) -> &'static str {
        "irreversible"
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
        let material = ctx.next_irreversible_material(feistel::ROUNDS * 8);
        let subkeys = feistel::subkeys(&material).expect("material size is a round multiple");
        let mut cipher = feistel::encrypt(&data, &subkeys);
        let plain_len = data.len();

        let data_id = Ident::new("data", Span::call_site());
        let ct_id = ctx.fresh_ident("c");
        let ks_id = ctx.fresh_ident("w");
        let decoder = ctx.irreversible_decoder();
        let weave_ct = ctx.weave(&ct_id, &mut cipher, keys);

        let ct_expr = byte_vec_expr(&cipher);
        let ks_expr = u64_array_expr(&subkeys);

        parse_quote!({
            let mut #ct_id = #ct_expr;
            #(#weave_ct)*
            let #ks_id = #ks_expr;
            let #data_id = #decoder(&#ct_id, &#ks_id, #plain_len);
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
            let got = roundtrip(&Irreversible, &data, 800 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }

    #[test]
    fn ciphertext_is_padded_to_blocks() {
        use quote::ToTokens;
        let (block, ..) = crate::strategies::testutil::emit(
            &Irreversible,
            b"short",
            801,
            crate::Config::new(801),
        );
        let literals = crate::tree::literal_bytes(&block.to_token_stream());
        assert!(literals.iter().any(|l| l.len() == feistel::BLOCK_LEN));
    }
}
