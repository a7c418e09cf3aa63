//! Strategy registry: named, weighted, insertion-ordered.
//!
//! The registry is the only process-wide state in the engine. It is
//! populated once at startup (built-in strategies, plus whatever a driver
//! registers before the first rewrite) and read-mostly afterwards; lookups
//! and picks take the read lock only.

use crate::{Error, Obfuscator};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Literal sizes above this use the linear-time selection pool.
pub const MAX_GENERAL_SIZE: usize = 2048;

struct Entry {
    name: &'static str,
    obfuscator: Arc<dyn Obfuscator>,
    weight: u32,
    linear: bool,
}

/// Insertion-ordered strategy table.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
    index: HashMap<&'static str, usize>,
}

/// Registration options.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Selection weight; higher is likelier.
    pub weight: u32,
    /// Member of the linear-time pool used for oversized literals.
    pub linear: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { weight: 1, linear: false }
    }
}

impl StrategyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own name. Duplicate names are a
    /// startup programming error and fail.
    pub fn register(&mut self, obfuscator: Arc<dyn Obfuscator>, opts: Options) -> Result<(), Error> {
        let name = obfuscator.name();
        if self.index.contains_key(name) {
            return Err(Error::DuplicateStrategy(name.to_string()));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry { name, obfuscator, weight: opts.weight, linear: opts.linear });
        Ok(())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// Look up a strategy by name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Obfuscator>> {
        self.index.get(name).map(|&i| Arc::clone(&self.entries[i].obfuscator))
    }

    fn weighted_pick(&self, rng: &mut ChaCha20Rng, linear_only: bool) -> Option<Arc<dyn Obfuscator>> {
        let pool: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| !linear_only || e.linear)
            .collect();
        let total: u32 = pool.iter().map(|e| e.weight).sum();
        if total == 0 {
            return None;
        }
        let mut roll = rng.gen_range(0..total);
        for entry in pool {
            if roll < entry.weight {
                return Some(Arc::clone(&entry.obfuscator));
            }
            roll -= entry.weight;
        }
        None
    }

    /// Weighted pick over every registered strategy.
    ///
    /// # Panics
    /// Panics on an empty registry; built-ins are installed before any
    /// rewrite runs.
    pub fn pick_general(&self, rng: &mut ChaCha20Rng) -> Arc<dyn Obfuscator> {
        self.weighted_pick(rng, false).expect("strategy registry is empty")
    }

    /// Weighted pick over the linear-time pool, falling back to the
    /// general pool when nothing is flagged linear.
    pub fn pick_linear(&self, rng: &mut ChaCha20Rng) -> Arc<dyn Obfuscator> {
        self.weighted_pick(rng, true)
            .unwrap_or_else(|| self.pick_general(rng))
    }

    /// Per-site selection policy.
    ///
    /// Small sites (≤ [`MAX_GENERAL_SIZE`]) take ASCON 60% of the time and
    /// any registered strategy otherwise; oversized sites take ASCON 70%
    /// of the time and a linear-time strategy otherwise.
    pub fn select(&self, rng: &mut ChaCha20Rng, len: usize) -> Arc<dyn Obfuscator> {
        let (ascon_bias, linear) = if len <= MAX_GENERAL_SIZE { (0.6, false) } else { (0.7, true) };
        if rng.gen_bool(ascon_bias) {
            if let Some(ascon) = self.by_name("ascon") {
                return ascon;
            }
        }
        if linear {
            self.pick_linear(rng)
        } else {
            self.pick_general(rng)
        }
    }
}

static GLOBAL: OnceLock<RwLock<StrategyRegistry>> = OnceLock::new();

/// Process-wide registry with the built-in strategies installed.
pub fn global() -> &'static RwLock<StrategyRegistry> {
    GLOBAL.get_or_init(|| {
        let mut registry = StrategyRegistry::new();
        crate::strategies::install_builtins(&mut registry)
            .expect("built-in strategy names are unique");
        RwLock::new(registry)
    })
}
