//! Built-in obfuscation strategies.
//!
//! Every strategy consumes the plaintext at build time and emits a
//! statement block that defines a local `data` holding the restored bytes.
//! The blocks only use the byte-oriented subset the reference evaluator
//! understands, so the test-suites can execute them without a compiler.

mod ascon;
mod custom_cipher;
mod irreversible;
mod seed;
mod shuffle;
mod simple;
mod split;
mod swap;

pub use ascon::AsconStrategy;
pub use custom_cipher::CustomCipher;
pub use irreversible::Irreversible;
pub use seed::Seed;
pub use shuffle::Shuffle;
pub use simple::Simple;
pub use split::Split;
pub use swap::Swap;

use crate::registry::{Options, StrategyRegistry};
use crate::Error;
use std::sync::Arc;

/// Register the eight built-in strategies with their weights; the
/// linear-time flag marks the ones whose emitted code stays O(n) for
/// oversized literals.
pub fn install_builtins(registry: &mut StrategyRegistry) -> Result<(), Error> {
    registry.register(Arc::new(Simple), Options { weight: 2, linear: true })?;
    registry.register(Arc::new(Swap), Options { weight: 1, linear: false })?;
    registry.register(Arc::new(Split), Options { weight: 1, linear: false })?;
    registry.register(Arc::new(Shuffle), Options { weight: 1, linear: false })?;
    registry.register(Arc::new(Seed), Options { weight: 1, linear: true })?;
    registry.register(Arc::new(CustomCipher), Options { weight: 2, linear: true })?;
    registry.register(Arc::new(AsconStrategy), Options { weight: 3, linear: false })?;
    registry.register(Arc::new(Irreversible), Options { weight: 1, linear: false })?;
    Ok(())
}

/// Degenerate block for zero-length plaintext; nothing to hide.
pub(crate) fn empty_data_block() -> syn::Block {
    syn::parse_quote!({
        let data: Vec<u8> = Vec::new();
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::exec::{Env, EvalError, Value};
    use crate::extkeys::ExternalKey;
    use crate::{Config, Context, Obfuscator};
    use litkdf::LiteralKeyProvider;

    /// Obfuscate `data`, then execute the emitted block in the reference
    /// evaluator with decoder natives bridged to the real cipher crates.
    pub(crate) fn roundtrip(
        obf: &dyn Obfuscator,
        data: &[u8],
        seed: u64,
    ) -> Result<Vec<u8>, EvalError> {
        let (block, keys, ascon_name, irrev_name) = emit(obf, data, seed, Config::new(seed));
        eval_emitted(&block, &keys, &ascon_name, &irrev_name)
    }

    /// Obfuscate `data` and return the emitted block plus context facts.
    pub(crate) fn emit(
        obf: &dyn Obfuscator,
        data: &[u8],
        seed: u64,
        config: Config,
    ) -> (syn::Block, Vec<ExternalKey>, String, String) {
        let mut provider = LiteralKeyProvider::new(b"test-master", b"test-salt", "test.rs");
        let mut ctx = Context::new(config, &mut provider);
        let mut keys = ctx.new_ext_keys();
        let block = obf.obfuscate(&mut ctx, data.to_vec(), &mut keys);
        let ascon_name = ctx.ascon_decoder().to_string();
        let irrev_name = ctx.irreversible_decoder().to_string();
        (block, keys, ascon_name, irrev_name)
    }

    /// Execute an emitted block and return the final value of `data`.
    pub(crate) fn eval_emitted(
        block: &syn::Block,
        keys: &[ExternalKey],
        ascon_name: &str,
        irrev_name: &str,
    ) -> Result<Vec<u8>, EvalError> {
        let mut env = Env::new();
        for key in keys {
            env.set(&key.name.to_string(), Value::Int(key.value));
        }
        env.register_native(ascon_name, |args| {
            let (Value::Bytes(k), Value::Bytes(n), Value::Bytes(c)) =
                (&args[0], &args[1], &args[2])
            else {
                return Err(EvalError::Type("ascon decoder arguments".into()));
            };
            Ok(Value::Opt(::ascon::decrypt(k, n, c).ok()))
        });
        env.register_native(irrev_name, |args| {
            let (Value::Bytes(c), Value::Words(ks), Value::Int(len)) =
                (&args[0], &args[1], &args[2])
            else {
                return Err(EvalError::Type("irreversible decoder arguments".into()));
            };
            Ok(Value::Bytes(::feistel::decrypt(c, ks, *len as usize)))
        });
        env.eval_block(block)?;
        match env.get("data") {
            Some(Value::Bytes(b)) => Ok(b.clone()),
            other => Err(EvalError::Type(format!("data is {other:?}"))),
        }
    }

    /// Standard corpus: empty, single byte, text, long binary.
    pub(crate) fn corpus() -> Vec<Vec<u8>> {
        let mut long = Vec::with_capacity(300);
        for i in 0..300u32 {
            long.push((i.wrapping_mul(31).wrapping_add(7) & 0xff) as u8);
        }
        vec![
            Vec::new(),
            vec![0x5a],
            b"hello, literal".to_vec(),
            long,
        ]
    }
}
