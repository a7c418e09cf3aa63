//! Proxy dispatcher: file-local indirection for selected constants.
//!
//! Instead of appearing inline, a dispatched constant is fetched through a
//! generated accessor over a masked table, so pattern-matching on literal
//! call arguments stops working. A file carries a small number of dispatch
//! tables; constants are assigned to a random one.

use crate::names::NameProvider;
use proc_macro2::Ident;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use syn::{parse_quote, Expr, Item};

const MAX_TABLES: usize = 3;
/// Chance that an eligible constant is dispatched instead of inlined.
const DISPATCH_PROBABILITY: f64 = 0.4;

struct Table {
    fn_name: Ident,
    static_name: Ident,
    mask: u32,
    entries: Vec<u32>,
}

/// Per-file dispatcher state. Emitted declarations are appended to the
/// file when the rewrite finalizes.
pub(crate) struct ProxyDispatcher {
    tables: Vec<Table>,
}

impl ProxyDispatcher {
    pub(crate) fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// With the dispatch probability, reify `value` into a table slot and
    /// return the accessor call expression replacing it.
    pub(crate) fn maybe_dispatch(
        &mut self,
        rng: &mut ChaCha20Rng,
        names: &mut NameProvider,
        value: u32,
    ) -> Option<Expr> {
        if !rng.gen_bool(DISPATCH_PROBABILITY) {
            return None;
        }
        let index = if self.tables.is_empty()
            || (self.tables.len() < MAX_TABLES && rng.gen_bool(0.3))
        {
            self.tables.push(Table {
                fn_name: names.fresh(rng, "p"),
                static_name: names.fresh(rng, "t"),
                mask: rng.gen(),
                entries: Vec::new(),
            });
            self.tables.len() - 1
        } else {
            rng.gen_range(0..self.tables.len())
        };

        let table = &mut self.tables[index];
        let slot = table.entries.len();
        table.entries.push(value ^ table.mask);
        let fn_name = &table.fn_name;
        Some(parse_quote!(#fn_name(#slot)))
    }

    /// Emit the table statics and accessor functions for every table that
    /// received at least one constant.
    pub(crate) fn finalize(&mut self) -> Vec<Item> {
        let mut items = Vec::with_capacity(self.tables.len() * 2);
        for table in self.tables.drain(..) {
            if table.entries.is_empty() {
                continue;
            }
            let Table { fn_name, static_name, mask, entries } = table;
            let len = entries.len();
            items.push(parse_quote! {
                static #static_name: [u32; #len] = [#(#entries),*];
            });
            items.push(parse_quote! {
                fn #fn_name(i: usize) -> u32 {
                    #static_name[i] ^ #mask
                }
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Env, Value};
    use rand::SeedableRng;

    #[test]
    fn dispatched_constants_evaluate_back() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let mut names = NameProvider::new();
        let mut proxy = ProxyDispatcher::new();

        let mut dispatched = Vec::new();
        for value in 0..200u32 {
            if let Some(call) = proxy.maybe_dispatch(&mut rng, &mut names, value) {
                dispatched.push((value, call));
            }
        }
        assert!(!dispatched.is_empty(), "some constants must dispatch");

        let items = proxy.finalize();
        assert!(!items.is_empty());
        let mut env = Env::new();
        env.load_items(&items).unwrap();
        for (value, call) in dispatched {
            assert_eq!(env.eval_expr(&call).unwrap(), Value::Int(u64::from(value)));
        }
    }

    #[test]
    fn unused_dispatcher_emits_nothing() {
        let mut proxy = ProxyDispatcher::new();
        assert!(proxy.finalize().is_empty());
    }

    #[test]
    fn table_count_is_bounded() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let mut names = NameProvider::new();
        let mut proxy = ProxyDispatcher::new();
        for value in 0..2000u32 {
            let _ = proxy.maybe_dispatch(&mut rng, &mut names, value);
        }
        assert!(proxy.tables.len() <= MAX_TABLES);
    }
}
