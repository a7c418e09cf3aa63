//! Randomized identifier generation.
//!
//! Every helper emitted into a rewritten file (decoder functions, dispatch
//! tables, loop counters) gets a fresh `_x…` name so no two builds and no
//! two files share a grep-able symbol. Names are a pure function of the rng
//! state, which keeps rewrites reproducible.

use proc_macro2::{Ident, Span};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Issues unique, deterministic identifiers within one file rewrite.
pub(crate) struct NameProvider {
    taken: HashSet<String>,
}

impl NameProvider {
    pub(crate) fn new() -> Self {
        Self { taken: HashSet::new() }
    }

    /// Fresh identifier of the form `_<base><6 random alphanumerics>`.
    ///
    /// `base` is a single-letter role tag (`f` function, `t` table, `k`
    /// key, …); it keeps generated code debuggable without leaking what the
    /// helper does.
    pub(crate) fn fresh(&mut self, rng: &mut ChaCha20Rng, base: &str) -> Ident {
        loop {
            let mut name = String::with_capacity(base.len() + 7);
            name.push('_');
            name.push_str(base);
            for _ in 0..6 {
                name.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
            }
            if self.taken.insert(name.clone()) {
                return Ident::new(&name, Span::call_site());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn deterministic_per_rng_state() {
        let mut a = ChaCha20Rng::seed_from_u64(1);
        let mut b = ChaCha20Rng::seed_from_u64(1);
        let mut pa = NameProvider::new();
        let mut pb = NameProvider::new();
        for base in ["f", "t", "k"] {
            assert_eq!(pa.fresh(&mut a, base).to_string(), pb.fresh(&mut b, base).to_string());
        }
    }

    #[test]
    fn names_are_unique_and_valid() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut p = NameProvider::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let id = p.fresh(&mut rng, "f").to_string();
            assert!(id.starts_with("_f"));
            assert!(seen.insert(id));
        }
    }
}
