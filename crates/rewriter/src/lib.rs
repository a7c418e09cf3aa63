//! Literal obfuscation engine.
//!
//! Overview
//! - Walks a parsed source file, finds every obfuscatable string and
//!   byte-array literal, and splices in a self-contained closure call that
//!   rebuilds the original bytes at run time.
//! - Each site is protected by one of several registered strategies, picked
//!   by weighted random selection with a size-sensitive bias toward the
//!   authenticated ASCON path.
//! - A per-file context owns the seeded randomness, the key provider, the
//!   shared-decoder state, and the proxy dispatcher; nothing outlives the
//!   file rewrite, so parallel drivers need no locking here.
//! - Reproducibility contract: identical `(master secret, package salt,
//!   file id, seed, source)` produces byte-identical output.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod exec;
pub mod extkeys;
pub mod registry;
pub mod strategies;

mod decoders;
mod mba;
mod names;
mod proxy;
mod rewrite;
mod tree;

pub use rewrite::{rewrite_file, rewrite_source, RewriteStats};
pub use tree::{any_literal_contains, literal_bytes};

use extkeys::ExternalKey;
use litkdf::KeyMaterialProvider;
use names::NameProvider;
use proc_macro2::Ident;
use proxy::ProxyDispatcher;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source text did not parse.
    #[error("parse: {0}")]
    Parse(#[from] syn::Error),
    /// A strategy name was registered twice.
    #[error("duplicate strategy: {0}")]
    DuplicateStrategy(String),
    /// A forced strategy override named an unregistered strategy.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// How aggressively byte literals are entangled with external keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtKeyProfile {
    /// 40% of eligible byte literals reference a key.
    Low,
    /// 60%.
    #[default]
    Normal,
    /// 80%.
    High,
}

impl ExtKeyProfile {
    /// Probability of rewriting an eligible byte literal.
    pub fn probability(self) -> f64 {
        match self {
            ExtKeyProfile::Low => 0.4,
            ExtKeyProfile::Normal => 0.6,
            ExtKeyProfile::High => 0.8,
        }
    }
}

/// Per-build rewriter options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seed of the per-file pseudorandom source.
    pub seed: u64,
    /// Skip entangling ASCON key/nonce/ciphertext literals with external
    /// keys; size-sensitive builds set this.
    pub disable_ascon_interleave: bool,
    /// External-key probability profile.
    pub ext_key_profile: ExtKeyProfile,
    /// Force every site onto one named strategy; test builds only.
    pub force_strategy: Option<String>,
}

impl Config {
    /// Options for a build seeded with `seed`, everything else default.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            disable_ascon_interleave: false,
            ext_key_profile: ExtKeyProfile::default(),
            force_strategy: None,
        }
    }
}

/// Shared-decoder bookkeeping: at most one decoder of each kind per file,
/// inserted only when something used it.
struct InlineHelper {
    func_name: Ident,
    used: bool,
}

/// Per-file obfuscation state handed to every strategy.
///
/// Owns the seeded rng, the name provider, the proxy dispatcher, the
/// shared-decoder flags, and the key provider. Dropped when the file
/// rewrite finalizes.
pub struct Context<'p> {
    rng: ChaCha20Rng,
    names: NameProvider,
    proxy: ProxyDispatcher,
    ascon_helper: InlineHelper,
    irreversible_helper: InlineHelper,
    provider: &'p mut dyn KeyMaterialProvider,
    config: Config,
}

impl<'p> Context<'p> {
    /// Build the context for one file rewrite.
    pub fn new(config: Config, provider: &'p mut dyn KeyMaterialProvider) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
        let mut names = NameProvider::new();
        let ascon_name = names.fresh(&mut rng, "f");
        let irrev_name = names.fresh(&mut rng, "f");
        Self {
            rng,
            names,
            proxy: ProxyDispatcher::new(),
            ascon_helper: InlineHelper { func_name: ascon_name, used: false },
            irreversible_helper: InlineHelper { func_name: irrev_name, used: false },
            provider,
            config,
        }
    }

    /// The seeded pseudorandom source.
    pub fn rng_mut(&mut self) -> &mut ChaCha20Rng {
        &mut self.rng
    }

    /// Fresh randomized identifier with a one-letter role tag.
    pub fn fresh_ident(&mut self, base: &str) -> Ident {
        self.names.fresh(&mut self.rng, base)
    }

    /// Fresh `(key, nonce)` pair from the key provider.
    pub fn next_literal_keys(&mut self) -> ([u8; 16], [u8; 16]) {
        self.provider.next_literal_keys()
    }

    /// Fresh irreversible-cipher material from the key provider.
    pub fn next_irreversible_material(&mut self, size: usize) -> Vec<u8> {
        self.provider.next_irreversible_material(size)
    }

    /// Name of the shared ASCON decoder; marks it as used.
    pub fn ascon_decoder(&mut self) -> Ident {
        self.ascon_helper.used = true;
        self.ascon_helper.func_name.clone()
    }

    /// Name of the shared irreversible decoder; marks it as used.
    pub fn irreversible_decoder(&mut self) -> Ident {
        self.irreversible_helper.used = true;
        self.irreversible_helper.func_name.clone()
    }

    /// Whether ASCON argument interleaving is disabled.
    pub fn disable_ascon_interleave(&self) -> bool {
        self.config.disable_ascon_interleave
    }

    /// Generate the 2–5 external keys for one site's lambda.
    pub fn new_ext_keys(&mut self) -> Vec<ExternalKey> {
        extkeys::rand_ext_keys(&mut self.rng, &mut self.names)
    }

    /// Entangle 2–11 bytes of `data` with external keys; returns the
    /// reversing statements for the emitter to splice after `target`.
    pub fn weave(
        &mut self,
        target: &Ident,
        data: &mut [u8],
        keys: &mut [ExternalKey],
    ) -> Vec<syn::Stmt> {
        extkeys::weave_into_bytes(&mut self.rng, target, data, keys)
    }

    /// Byte literal expression, entangled with a key byte per the
    /// configured probability profile.
    pub fn byte_lit(&mut self, value: u8, keys: &mut [ExternalKey]) -> syn::Expr {
        let p = self.config.ext_key_profile.probability();
        extkeys::byte_lit_with_ext_key(&mut self.rng, value, keys, p)
    }

    /// Route a `u32`-width constant through the proxy dispatcher with the
    /// low profile probability; `None` means "emit inline".
    pub fn maybe_proxy_u32(&mut self, value: u32) -> Option<syn::Expr> {
        self.proxy.maybe_dispatch(&mut self.rng, &mut self.names, value)
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn finalize_items(&mut self) -> Vec<syn::Item> {
        self.proxy.finalize()
    }
}

/// A named obfuscation strategy.
///
/// `obfuscate` turns the plaintext into a statement block that defines a
/// local `data` holding the restored bytes on every exit path. The block
/// may reference the external keys; every reference must bump the key's
/// `ref_count` so the closure parameters come out right.
pub trait Obfuscator: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;
    /// Emit the reconstruction block for `data`.
    fn obfuscate(
        &self,
        ctx: &mut Context<'_>,
        data: Vec<u8>,
        keys: &mut Vec<ExternalKey>,
    ) -> syn::Block;
}
