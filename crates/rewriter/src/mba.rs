//! Mixed boolean-arithmetic rewriting of XOR.
//!
//! Emitted decoders never spell `a ^ b` the same way twice: each XOR is
//! randomly rendered through one of three algebraically equal forms. For
//! byte operands under wrapping arithmetic all three produce `a ^ b`
//! (`a + b = (a ^ b) + 2*(a & b)` over the integers).

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use syn::{parse_quote, Expr};

/// Number of interchangeable XOR renderings.
pub(crate) const VARIANTS: usize = 3;

/// Render `a ^ b` through variant `variant` (0..VARIANTS).
pub(crate) fn xor_variant(variant: usize, a: &Expr, b: &Expr) -> Expr {
    match variant {
        0 => parse_quote!((#a ^ #b)),
        1 => parse_quote!(((#a | #b) - (#a & #b))),
        _ => parse_quote!(((#a).wrapping_add(#b).wrapping_sub((#a & #b).wrapping_mul(2)))),
    }
}

/// Render `a ^ b` through a randomly chosen variant.
pub(crate) fn xor(rng: &mut ChaCha20Rng, a: &Expr, b: &Expr) -> Expr {
    xor_variant(rng.gen_range(0..VARIANTS), a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Env, Value};

    /// The arithmetic the three renderings perform, byte for byte.
    fn variant_value(variant: usize, a: u8, b: u8) -> u8 {
        match variant {
            0 => a ^ b,
            1 => (a | b) - (a & b),
            _ => a.wrapping_add(b).wrapping_sub((a & b).wrapping_mul(2)),
        }
    }

    #[test]
    fn all_variants_equal_xor_for_every_byte_pair() {
        for variant in 0..VARIANTS {
            for a in 0..=255u8 {
                for b in 0..=255u8 {
                    assert_eq!(
                        variant_value(variant, a, b),
                        a ^ b,
                        "variant {variant} diverges at ({a}, {b})"
                    );
                }
            }
        }
    }

    #[test]
    fn rendered_expressions_evaluate_like_the_arithmetic() {
        // Boundary-heavy sample, interpreted through the emitted forms.
        let samples = [0u8, 1, 2, 3, 0x55, 0x7f, 0x80, 0xaa, 0xfe, 0xff];
        for variant in 0..VARIANTS {
            for &a in &samples {
                for &b in &samples {
                    let ea: Expr = parse_quote!(#a);
                    let eb: Expr = parse_quote!(#b);
                    let expr = xor_variant(variant, &ea, &eb);
                    let mut env = Env::new();
                    let got = env.eval_expr(&expr).unwrap();
                    assert_eq!(
                        got,
                        Value::Int(u64::from(a ^ b)),
                        "variant {variant} rendering diverges at ({a}, {b})"
                    );
                }
            }
        }
    }
}
