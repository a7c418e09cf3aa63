//! Thin syntax-tree layer: literal classification, compile-time byte
//! evaluation, and the node constructors shared by the emitters.
//!
//! This is the engine's only contact surface with `syn`; strategies build
//! their statement blocks through the helpers here so the emitted shapes
//! stay uniform (suffixed byte literals, `.to_vec()` slices, while loops).

use proc_macro2::{Group, Span, TokenStream, TokenTree};
use quote::quote;
use syn::{parse_quote, Expr, ExprArray, ExprLit, Lit};

/// A literal site the traversal decided to rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LiteralSite {
    /// A non-empty string literal.
    Str(String),
    /// A byte-string literal `b"…"` of the recorded length.
    ByteStr(Vec<u8>),
    /// A plain byte-array literal `[1u8, 2, 3]`.
    ByteArray(Vec<u8>),
    /// A referenced byte-array literal `&[1u8, 2, 3]`.
    ByteArrayRef(Vec<u8>),
}

/// Compile-time value of a byte-array expression.
///
/// Accepts arrays whose elements are all integer literals in `0..=255`
/// with at most the `u8` suffix, and requires at least one element to be
/// explicitly `u8`-suffixed so untyped integer arrays (which would default
/// to `i32`) are left alone. Anything else is not obfuscatable.
pub(crate) fn const_byte_elements(arr: &ExprArray) -> Option<Vec<u8>> {
    if arr.elems.is_empty() {
        return None;
    }
    let mut bytes = Vec::with_capacity(arr.elems.len());
    let mut saw_u8_suffix = false;
    for elem in &arr.elems {
        let Expr::Lit(ExprLit { lit: Lit::Int(int), .. }) = elem else {
            return None;
        };
        match int.suffix() {
            "u8" => saw_u8_suffix = true,
            "" => {}
            _ => return None,
        }
        let value: u64 = int.base10_parse().ok()?;
        if value > 255 {
            return None;
        }
        bytes.push(value as u8);
    }
    saw_u8_suffix.then_some(bytes)
}

/// Classify an expression as an obfuscatable literal site.
pub(crate) fn classify(expr: &Expr) -> Option<LiteralSite> {
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) if !s.value().is_empty() => {
            Some(LiteralSite::Str(s.value()))
        }
        Expr::Lit(ExprLit { lit: Lit::ByteStr(s), .. }) if !s.value().is_empty() => {
            Some(LiteralSite::ByteStr(s.value()))
        }
        Expr::Array(arr) => const_byte_elements(arr).map(LiteralSite::ByteArray),
        _ => None,
    }
}

/// Classify a `&[…]` reference around a byte array. Checked pre-order so
/// the whole reference is rewritten as one site instead of its inner array.
pub(crate) fn classify_reference(expr: &Expr) -> Option<LiteralSite> {
    let Expr::Reference(r) = expr else { return None };
    if r.mutability.is_some() {
        return None;
    }
    let Expr::Array(arr) = r.expr.as_ref() else { return None };
    const_byte_elements(arr).map(LiteralSite::ByteArrayRef)
}

/// `[1u8, 2u8, …]` array expression.
pub(crate) fn byte_array_expr(bytes: &[u8]) -> Expr {
    parse_quote!([#(#bytes),*])
}

/// `[1u8, 2u8, …].to_vec()` expression.
pub(crate) fn byte_vec_expr(bytes: &[u8]) -> Expr {
    let arr = byte_array_expr(bytes);
    parse_quote!(#arr.to_vec())
}

/// `[k0u64, k1u64, …]` array expression for subkey material.
pub(crate) fn u64_array_expr(words: &[u64]) -> Expr {
    parse_quote!([#(#words),*])
}

/// `[k0u32, k1u32, …]` array expression for round keys.
pub(crate) fn u32_array_expr(words: &[u32]) -> Expr {
    parse_quote!([#(#words),*])
}

/// Unsuffixed index literal, `u8`/`u16`/`u32` wide by data length.
pub(crate) fn index_lit(value: usize, data_len: usize) -> Expr {
    let lit = if data_len <= u8::MAX as usize {
        proc_macro2::Literal::u8_suffixed(value as u8)
    } else if data_len <= u16::MAX as usize {
        proc_macro2::Literal::u16_suffixed(value as u16)
    } else {
        proc_macro2::Literal::u32_suffixed(value as u32)
    };
    parse_quote!(#lit)
}

/// Re-span every token of `tokens` to `span`, recursively.
///
/// Replacement expressions carry the original literal's span so diagnostics
/// and comment anchoring in downstream tooling keep pointing at the site.
pub(crate) fn respan(tokens: TokenStream, span: Span) -> TokenStream {
    tokens
        .into_iter()
        .map(|tree| match tree {
            TokenTree::Group(g) => {
                let mut out = Group::new(g.delimiter(), respan(g.stream(), span));
                out.set_span(span);
                TokenTree::Group(out)
            }
            mut other => {
                other.set_span(span);
                other
            }
        })
        .collect()
}

/// Collect the bytes of every byte-array and byte-string literal in a
/// token stream. Test support: property checks assert the plaintext never
/// survives as a contiguous run inside any emitted literal.
pub fn literal_bytes(tokens: &TokenStream) -> Vec<Vec<u8>> {
    fn walk(tokens: TokenStream, out: &mut Vec<Vec<u8>>) {
        // Try to parse each bracket group as a byte array; otherwise recurse.
        for tree in tokens {
            if let TokenTree::Group(g) = tree {
                let inner = g.stream();
                if g.delimiter() == proc_macro2::Delimiter::Bracket {
                    if let Ok(arr) = syn::parse2::<ExprArray>(quote!([#inner])) {
                        if let Some(bytes) = const_byte_elements(&arr) {
                            out.push(bytes);
                            continue;
                        }
                    }
                }
                walk(inner, out);
            } else if let TokenTree::Literal(l) = tree {
                if let Ok(Lit::ByteStr(bs)) = syn::parse_str::<Lit>(&l.to_string()) {
                    out.push(bs.value());
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(tokens.clone(), out.as_mut());
    out
}

/// True when `needle` occurs as a contiguous run in any collected literal.
pub fn any_literal_contains(tokens: &TokenStream, needle: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    literal_bytes(tokens)
        .iter()
        .any(|lit| lit.windows(needle.len()).any(|w| w == needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        syn::parse_str(src).unwrap()
    }

    #[test]
    fn classifies_nonempty_strings_only() {
        assert_eq!(classify(&expr("\"hide\"")), Some(LiteralSite::Str("hide".into())));
        assert_eq!(classify(&expr("\"\"")), None);
    }

    #[test]
    fn classifies_byte_arrays_with_u8_suffix() {
        assert_eq!(
            classify(&expr("[1u8, 2, 3]")),
            Some(LiteralSite::ByteArray(vec![1, 2, 3]))
        );
        // Untyped and non-byte arrays stay untouched.
        assert_eq!(classify(&expr("[1, 2, 3]")), None);
        assert_eq!(classify(&expr("[1i32, 2, 3]")), None);
        assert_eq!(classify(&expr("[300u16, 2]")), None);
        // Non-constant element.
        assert_eq!(classify(&expr("[x as u8]")), None);
        assert_eq!(classify(&expr("[]")), None);
    }

    #[test]
    fn classifies_references_pre_order() {
        assert_eq!(
            classify_reference(&expr("&[4u8, 5]")),
            Some(LiteralSite::ByteArrayRef(vec![4, 5]))
        );
        assert_eq!(classify_reference(&expr("&mut [4u8, 5]")), None);
        assert_eq!(classify_reference(&expr("&[4, 5]")), None);
    }

    #[test]
    fn literal_scan_finds_embedded_plaintext() {
        let tokens = quote!({
            let a = [104u8, 105u8, 33u8].to_vec();
        });
        assert!(any_literal_contains(&tokens, b"hi!"));
        assert!(!any_literal_contains(&tokens, b"no"));
        assert!(!any_literal_contains(&tokens, b""));
    }
}
