//! Tree traversal and site rewriting.
//!
//! Pre-order filtering skips const/static items (their initializers must
//! stay const-evaluable) and `let` bindings of linker-injected variables;
//! post-order substitution replaces every remaining literal site with an
//! immediately-invoked closure whose body is produced by a selected
//! strategy. Finalization appends the proxy-dispatch declarations and the
//! shared decoders, each at most once.

use crate::extkeys::{self, KeyWidth};
use crate::tree::{self, LiteralSite};
use crate::{decoders, registry, Config, Context, Error};
use litkdf::KeyMaterialProvider;
use proc_macro2::Span;
use quote::ToTokens;
use rand::Rng;
use std::collections::HashMap;
use syn::spanned::Spanned;
use syn::visit_mut::{self, VisitMut};
use syn::{parse_quote, Expr, Item, Stmt};
use tracing::debug;

/// What one file rewrite touched.
#[derive(Debug, Default, Clone)]
pub struct RewriteStats {
    /// String literal sites rewritten.
    pub strings: usize,
    /// Byte-string (`b"…"`) sites rewritten.
    pub byte_strings: usize,
    /// Byte-array sites rewritten.
    pub byte_arrays: usize,
    /// Referenced byte-array (`&[…]`) sites rewritten.
    pub byte_array_refs: usize,
    /// Name of the shared ASCON decoder, when one was inserted.
    pub ascon_decoder: Option<String>,
    /// Name of the shared irreversible decoder, when one was inserted.
    pub irreversible_decoder: Option<String>,
}

impl RewriteStats {
    /// Total rewritten sites.
    pub fn total(&self) -> usize {
        self.strings + self.byte_strings + self.byte_arrays + self.byte_array_refs
    }
}

/// Rewrite every obfuscatable literal in `file`.
///
/// `injected` maps fully qualified variable names (dot- or `::`-separated)
/// to their linker-provided values; bindings of those variables are left
/// untouched so the linker still finds the plain initializer.
pub fn rewrite_file(
    file: &mut syn::File,
    config: &Config,
    provider: &mut dyn KeyMaterialProvider,
    injected: &HashMap<String, String>,
) -> Result<RewriteStats, Error> {
    if let Some(name) = &config.force_strategy {
        let known = registry::global()
            .read()
            .expect("strategy registry lock poisoned")
            .by_name(name)
            .is_some();
        if !known {
            return Err(Error::UnknownStrategy(name.clone()));
        }
    }

    let _span = tracing::debug_span!("rewrite_file", seed = config.seed).entered();
    let mut ctx = Context::new(config.clone(), provider);
    let mut stats = RewriteStats::default();
    {
        let mut visitor = Rewriter { ctx: &mut ctx, injected, stats: &mut stats };
        visitor.visit_file_mut(file);
    }

    // Finalize: proxy tables first, then the shared decoders.
    file.items.extend(ctx.finalize_items());
    if ctx.ascon_helper.used {
        stats.ascon_decoder = Some(ctx.ascon_helper.func_name.to_string());
        let item = decoders::ascon_decoder_item(&mut ctx);
        file.items.push(item);
    }
    if ctx.irreversible_helper.used {
        stats.irreversible_decoder = Some(ctx.irreversible_helper.func_name.to_string());
        let item = decoders::irreversible_decoder_item(&mut ctx);
        file.items.push(item);
    }

    debug!(
        strings = stats.strings,
        byte_strings = stats.byte_strings,
        byte_arrays = stats.byte_arrays,
        byte_array_refs = stats.byte_array_refs,
        "file rewrite finalized"
    );
    Ok(stats)
}

/// Parse `source`, rewrite it, and render the transformed file.
pub fn rewrite_source(
    source: &str,
    config: &Config,
    provider: &mut dyn KeyMaterialProvider,
    injected: &HashMap<String, String>,
) -> Result<(String, RewriteStats), Error> {
    let mut file = syn::parse_file(source)?;
    let stats = rewrite_file(&mut file, config, provider, injected)?;
    Ok((file.to_token_stream().to_string(), stats))
}

struct Rewriter<'a, 'p> {
    ctx: &'a mut Context<'p>,
    injected: &'a HashMap<String, String>,
    stats: &'a mut RewriteStats,
}

impl Rewriter<'_, '_> {
    fn is_injected(&self, name: &str) -> bool {
        self.injected.keys().any(|key| {
            key == name
                || key.rsplit("::").next() == Some(name)
                || key.rsplit('.').next() == Some(name)
        })
    }

    /// Build the obfuscation lambda call for `data` with a size-selected
    /// strategy: `(|keys…| -> #ret { …block…; #tail })(args…)`.
    fn obfuscated_call(&mut self, data: Vec<u8>, ret: syn::Type, tail: Expr) -> Expr {
        let len = data.len();
        let mut keys = self.ctx.new_ext_keys();
        let strategy = match self.ctx.config().force_strategy.clone() {
            Some(name) => registry::global()
                .read()
                .expect("strategy registry lock poisoned")
                .by_name(&name)
                .expect("forced strategy was validated at entry"),
            None => registry::global()
                .read()
                .expect("strategy registry lock poisoned")
                .select(self.ctx.rng_mut(), len),
        };
        debug!(strategy = strategy.name(), len, "rewriting literal site");
        let block = strategy.obfuscate(self.ctx, data, &mut keys);
        let stmts = &block.stmts;

        let params = extkeys::closure_params(&keys);
        let args: Vec<Expr> = keys
            .iter()
            .map(|k| self.key_argument(k.width, k.value))
            .collect();
        parse_quote!((|#(#params),*| -> #ret { #(#stmts)* #tail })(#(#args),*))
    }

    /// Key argument expression: the plain literal, or a dispatched
    /// accessor for widths the proxy tables can hold.
    fn key_argument(&mut self, width: KeyWidth, value: u64) -> Expr {
        if width != KeyWidth::U64 {
            if let Some(call) = self.ctx.maybe_proxy_u32(value as u32) {
                let ty = width.type_token();
                return parse_quote!((#call as #ty));
            }
        }
        width.literal(value)
    }

    /// Constant used in emitted slice bounds, possibly proxy-dispatched.
    fn usize_const(&mut self, value: usize) -> Expr {
        if let Some(call) = self.ctx.maybe_proxy_u32(value as u32) {
            parse_quote!((#call as usize))
        } else {
            parse_quote!(#value)
        }
    }

    /// String site: junk-pad, obfuscate the padded slice, and convert the
    /// plaintext window back to a string behind a memoizing cell so the
    /// replacement has the literal's `&'static str` type.
    fn obfuscate_string(&mut self, value: &str) -> Expr {
        let plain = value.as_bytes();
        let junk_len = self.ctx.rng_mut().gen_range(2..=8usize);
        let mut junk = vec![0u8; junk_len];
        self.ctx.rng_mut().fill(junk.as_mut_slice());
        let split = self.ctx.rng_mut().gen_range(0..=junk_len);

        let mut padded = Vec::with_capacity(plain.len() + junk_len);
        padded.extend_from_slice(&junk[..split]);
        padded.extend_from_slice(plain);
        padded.extend_from_slice(&junk[split..]);

        let start = self.usize_const(split);
        let end = self.usize_const(split + plain.len());
        let tail: Expr =
            parse_quote!(String::from_utf8_lossy(&data[#start..#end]).into_owned());
        let call = self.obfuscated_call(padded, parse_quote!(String), tail);

        let cell = self.ctx.fresh_ident("g");
        parse_quote!(({
            static #cell: std::sync::OnceLock<String> = std::sync::OnceLock::new();
            #cell.get_or_init(|| #call).as_str()
        }))
    }

    /// Fixed-size array reconstruction tail: copy `data` into `[u8; N]`.
    fn array_tail(&mut self, n: usize) -> Expr {
        let out = self.ctx.fresh_ident("o");
        let i = self.ctx.fresh_ident("i");
        parse_quote!({
            let mut #out = [0u8; #n];
            let mut #i = 0usize;
            while #i < #n {
                #out[#i] = data[#i];
                #i += 1usize;
            }
            #out
        })
    }

    /// Byte-string and `&[…]` sites memoize a `[u8; N]`; the cell hands
    /// out the same `&'static [u8; N]` the original literal had.
    fn obfuscate_byte_ref(&mut self, bytes: Vec<u8>) -> Expr {
        let n = bytes.len();
        let tail = self.array_tail(n);
        let call = self.obfuscated_call(bytes, parse_quote!([u8; #n]), tail);
        let cell = self.ctx.fresh_ident("g");
        parse_quote!(({
            static #cell: std::sync::OnceLock<[u8; #n]> = std::sync::OnceLock::new();
            #cell.get_or_init(|| #call)
        }))
    }

    /// Plain array sites rebuild the value on every evaluation.
    fn obfuscate_byte_array(&mut self, bytes: Vec<u8>) -> Expr {
        let n = bytes.len();
        let tail = self.array_tail(n);
        let call = self.obfuscated_call(bytes, parse_quote!([u8; #n]), tail);
        parse_quote!((#call))
    }

    fn rewrite_site(&mut self, site: LiteralSite, span: Span) -> Expr {
        let replacement = match site {
            LiteralSite::Str(s) => {
                self.stats.strings += 1;
                self.obfuscate_string(&s)
            }
            LiteralSite::ByteStr(b) => {
                self.stats.byte_strings += 1;
                self.obfuscate_byte_ref(b)
            }
            LiteralSite::ByteArray(b) => {
                self.stats.byte_arrays += 1;
                self.obfuscate_byte_array(b)
            }
            LiteralSite::ByteArrayRef(b) => {
                self.stats.byte_array_refs += 1;
                self.obfuscate_byte_ref(b)
            }
        };
        // Reset the replacement onto the original site's span.
        syn::parse2(tree::respan(replacement.to_token_stream(), span))
            .expect("respanning does not change syntax")
    }
}

impl VisitMut for Rewriter<'_, '_> {
    fn visit_item_mut(&mut self, item: &mut Item) {
        match item {
            // Const and static initializers must stay compile-time
            // constant; a decoder call there would not compile. The same
            // holds for every expression inside a const fn body.
            Item::Const(_) | Item::Static(_) => {}
            Item::Fn(f) if f.sig.constness.is_some() => {}
            _ => visit_mut::visit_item_mut(self, item),
        }
    }

    fn visit_impl_item_mut(&mut self, item: &mut syn::ImplItem) {
        match item {
            syn::ImplItem::Const(_) => {}
            syn::ImplItem::Fn(f) if f.sig.constness.is_some() => {}
            _ => visit_mut::visit_impl_item_mut(self, item),
        }
    }

    fn visit_trait_item_mut(&mut self, item: &mut syn::TraitItem) {
        if matches!(item, syn::TraitItem::Const(_)) {
            return;
        }
        visit_mut::visit_trait_item_mut(self, item);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        if let Stmt::Local(local) = stmt {
            if let Some(name) = local_name(local) {
                if self.is_injected(&name) {
                    debug!(var = %name, "skipping linker-injected binding");
                    return;
                }
            }
        }
        visit_mut::visit_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        let span = expr.span();
        // Whole `&[…]` references are claimed pre-order so the inner
        // array is not rewritten on its own.
        if let Some(site) = tree::classify_reference(expr) {
            *expr = self.rewrite_site(site, span);
            return;
        }
        visit_mut::visit_expr_mut(self, expr);
        if let Some(site) = tree::classify(expr) {
            *expr = self.rewrite_site(site, span);
        }
    }
}

fn local_name(local: &syn::Local) -> Option<String> {
    fn ident_of(pat: &syn::Pat) -> Option<String> {
        match pat {
            syn::Pat::Ident(p) => Some(p.ident.to_string()),
            syn::Pat::Type(t) => ident_of(&t.pat),
            _ => None,
        }
    }
    ident_of(&local.pat)
}
