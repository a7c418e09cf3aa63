//! ASCON-128 strategy: authenticated encryption with keys from the
//! deterministic provider, decoded through the per-file shared decoder.

use crate::strategies::empty_data_block;
use crate::tree::byte_vec_expr;
use crate::{extkeys::ExternalKey, Context, Obfuscator};
use proc_macro2::{Ident, Span};
use rand::Rng;
use syn::parse_quote;

/// The `ascon` strategy.
pub struct AsconStrategy;

impl Obfuscator for AsconStrategy {
    fn name(&self) -> &'static str {
        "ascon"
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
        let (key, nonce) = ctx.next_literal_keys();
        let sealed = ::ascon::encrypt(&key, &nonce, &data)
            .expect("provider keys and nonces are always 16 bytes");

        let mut key = key.to_vec();
        let mut nonce = nonce.to_vec();
        let mut sealed = sealed;

        let data_id = Ident::new("data", Span::call_site());
        let key_id = ctx.fresh_ident("a");
        let nonce_id = ctx.fresh_ident("n");
        let ct_id = ctx.fresh_ident("c");
        let out_id = ctx.fresh_ident("d");
        let decoder = ctx.ascon_decoder();

        // Probabilistic interleaving of the key material with external
        // keys; the ciphertext is always entangled.
        let mut weave_key = Vec::new();
        let mut weave_nonce = Vec::new();
        if !ctx.disable_ascon_interleave() {
            if ctx.rng_mut().gen_bool(0.5) {
                weave_key = ctx.weave(&key_id, &mut key, keys);
            }
            if ctx.rng_mut().gen_bool(0.5) {
                weave_nonce = ctx.weave(&nonce_id, &mut nonce, keys);
            }
        }
        let weave_ct = ctx.weave(&ct_id, &mut sealed, keys);

        let key_expr = byte_vec_expr(&key);
        let nonce_expr = byte_vec_expr(&nonce);
        let ct_expr = byte_vec_expr(&sealed);

        parse_quote!({
            let mut #key_id = #key_expr;
            #(#weave_key)*
            let mut #nonce_id = #nonce_expr;
            #(#weave_nonce)*
            let mut #ct_id = #ct_expr;
            #(#weave_ct)*
            let #data_id = match #decoder(&#key_id, &#nonce_id, &#ct_id) {
                Some(#out_id) => #out_id,
                None => panic!("literal authentication failed"),
            };
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::testutil::{corpus, emit, eval_emitted, roundtrip};
    use crate::Config;

    #[test]
    fn restores_every_corpus_entry() {
        for (i, data) in corpus().into_iter().enumerate() {
            let got = roundtrip(&AsconStrategy, &data, 700 + i as u64).unwrap();
            assert_eq!(got, data, "corpus entry {i}");
        }
    }

    #[test]
    fn interleave_can_be_disabled() {
        let mut config = Config::new(701);
        config.disable_ascon_interleave = true;
        let (block, keys, ascon_name, irrev_name) =
            emit(&AsconStrategy, b"plain ascon", 701, config);
        let got = eval_emitted(&block, &keys, &ascon_name, &irrev_name).unwrap();
        assert_eq!(got, b"plain ascon".to_vec());
    }

    #[test]
    fn tampered_ciphertext_panics_at_runtime() {
        let (mut block, keys, ascon_name, irrev_name) =
            emit(&AsconStrategy, b"tamper me", 702, Config::new(702));
        // Flip one byte inside the first emitted array literal.
        flip_first_literal_byte(&mut block);
        let err = eval_emitted(&block, &keys, &ascon_name, &irrev_name).unwrap_err();
        assert_eq!(
            err,
            crate::exec::EvalError::Panicked("literal authentication failed".into())
        );
    }

    fn flip_first_literal_byte(block: &mut syn::Block) {
        for stmt in &mut block.stmts {
            if let syn::Stmt::Local(local) = stmt {
                if let Some(init) = &mut local.init {
                    if let syn::Expr::MethodCall(mc) = init.expr.as_mut() {
                        if let syn::Expr::Array(arr) = mc.receiver.as_mut() {
                            if let Some(syn::Expr::Lit(l)) = arr.elems.first_mut() {
                                if let syn::Lit::Int(int) = &l.lit {
                                    let flipped =
                                        (int.base10_parse::<u8>().unwrap() ^ 1).to_string();
                                    l.lit = syn::Lit::Int(syn::LitInt::new(
                                        &format!("{flipped}u8"),
                                        proc_macro2::Span::call_site(),
                                    ));
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
        panic!("no literal found to tamper with");
    }
}
