//! Shared runtime decoders, emitted at most once per file.
//!
//! Each decoder is kept as a source template whose every identifier is a
//! placeholder; instantiation substitutes fresh random names and per-file
//! constants, then parses the result. The ASCON template mirrors the
//! `ascon` crate's decrypt path statement for statement (including the
//! padded partial-block semantics and the flat OR-of-XORs tag check); the
//! irreversible template mirrors `feistel::decrypt`.

use crate::Context;
use rand::Rng;
use syn::Item;

const ASCON_TEMPLATE: &str = r#"
fn __F__(__K__: &[u8], __N__: &[u8], __C__: &[u8]) -> Option<Vec<u8>> {
    if __K__.len() != 16 || __N__.len() != 16 || __C__.len() < 16 {
        return None;
    }
    let __BE__ = |b: &[u8], at: usize| -> u64 {
        let mut v = 0u64;
        let mut i = 0usize;
        while i < 8 {
            v = (v << 8) | (b[at + i] as u64);
            i += 1;
        }
        v
    };
    let __ROT__ = |x: u64, n: u32| -> u64 { (x >> n) | (x << (64u32 - n)) };
    let __PERM__ = |s: &mut [u64; 5], from: usize| {
        let mut r = from;
        while r < 12 {
            s[2] ^= (0xf0u64 - 16u64 * (r as u64)) + (r as u64);
            s[0] ^= s[4];
            s[4] ^= s[3];
            s[2] ^= s[1];
            let mut t = [0u64; 5];
            let mut i = 0usize;
            while i < 5 {
                t[i] = s[i];
                i += 1;
            }
            i = 0;
            while i < 5 {
                s[i] = t[i] ^ ((!t[(i + 1) % 5]) & t[(i + 2) % 5]);
                i += 1;
            }
            s[1] ^= s[0];
            s[0] ^= s[4];
            s[3] ^= s[2];
            s[2] = !s[2];
            s[0] ^= __ROT__(s[0], 19) ^ __ROT__(s[0], 28);
            s[1] ^= __ROT__(s[1], 61) ^ __ROT__(s[1], 39);
            s[2] ^= __ROT__(s[2], 1) ^ __ROT__(s[2], 6);
            s[3] ^= __ROT__(s[3], 10) ^ __ROT__(s[3], 17);
            s[4] ^= __ROT__(s[4], 7) ^ __ROT__(s[4], 41);
            r += 1;
        }
    };
    let __KA__ = __BE__(__K__, 0);
    let __KB__ = __BE__(__K__, 8);
    let mut __S__ = [
        __IVA__u64 ^ __IVB__u64,
        __KA__,
        __KB__,
        __BE__(__N__, 0),
        __BE__(__N__, 8),
    ];
    __PERM__(&mut __S__, 0);
    __S__[3] ^= __KA__;
    __S__[4] ^= __KB__;
    __S__[4] ^= 1u64;
    let __TL__ = __C__.len() - 16;
    let mut __P__: Vec<u8> = Vec::with_capacity(__TL__);
    let mut __O__ = 0usize;
    while __O__ + 8 <= __TL__ {
        let __CB__ = __BE__(__C__, __O__);
        let __PB__ = __CB__ ^ __S__[0];
        let mut __I__ = 0usize;
        while __I__ < 8 {
            __P__.push((__PB__ >> (56 - 8 * __I__)) as u8);
            __I__ += 1;
        }
        __S__[0] = __CB__;
        __PERM__(&mut __S__, 6);
        __O__ += 8;
    }
    let __R__ = __TL__ - __O__;
    let mut __LN__ = [0u8; 8];
    let mut __I__ = 0usize;
    while __I__ < 8 {
        __LN__[__I__] = (__S__[0] >> (56 - 8 * __I__)) as u8;
        __I__ += 1;
    }
    __I__ = 0;
    while __I__ < __R__ {
        __P__.push(__C__[__O__ + __I__] ^ __LN__[__I__]);
        __LN__[__I__] = __C__[__O__ + __I__];
        __I__ += 1;
    }
    __LN__[__R__] ^= 0x80;
    __S__[0] = 0;
    __I__ = 0;
    while __I__ < 8 {
        __S__[0] = (__S__[0] << 8) | (__LN__[__I__] as u64);
        __I__ += 1;
    }
    __S__[1] ^= __KA__;
    __S__[2] ^= __KB__;
    __PERM__(&mut __S__, 0);
    __S__[3] ^= __KA__;
    __S__[4] ^= __KB__;
    let mut __D__ = 0u8;
    __I__ = 0;
    while __I__ < 8 {
        __D__ |= __C__[__TL__ + __I__] ^ ((__S__[3] >> (56 - 8 * __I__)) as u8);
        __D__ |= __C__[__TL__ + 8 + __I__] ^ ((__S__[4] >> (56 - 8 * __I__)) as u8);
        __I__ += 1;
    }
    if __D__ == 0 {
        Some(__P__)
    } else {
        let mut __Z__ = 0usize;
        while __Z__ < __P__.len() {
            __P__[__Z__] = 0;
            __Z__ += 1;
        }
        None
    }
}
"#;

const IRREVERSIBLE_TEMPLATE: &str = r#"
fn __F__(__C__: &[u8], __W__: &[u64], __N__: usize) -> Vec<u8> {
    let __T__: [u8; 256] = [__INV__];
    let mut __B__: Vec<u8> = Vec::with_capacity(__C__.len());
    let mut __I__ = 0usize;
    while __I__ < __C__.len() {
        __B__.push(__T__[__C__[__I__] as usize]);
        __I__ += 1;
    }
    let __RF__ = |x: u64, k: u64| -> u64 {
        let t = x ^ k;
        let s = ((k & 63) | 1) as u32;
        (((t << s) | (t >> (64u32 - s))) ^ ((k << 17) | (k >> 47)))
            .wrapping_add(__RC__u64)
    };
    let mut __O__ = 0usize;
    while __O__ + 16 <= __B__.len() {
        let mut __L__ = 0u64;
        let mut __R__ = 0u64;
        let mut __J__ = 0usize;
        while __J__ < 8 {
            __L__ |= (__B__[__O__ + __J__] as u64) << (8 * __J__);
            __R__ |= (__B__[__O__ + 8 + __J__] as u64) << (8 * __J__);
            __J__ += 1;
        }
        let mut __K__ = __W__.len();
        while __K__ > 0 {
            __K__ -= 1;
            let __PL__ = __R__;
            __R__ = __L__ ^ __RF__(__PL__, __W__[__K__]);
            __L__ = __PL__;
        }
        __J__ = 0;
        while __J__ < 8 {
            __B__[__O__ + __J__] = (__L__ >> (8 * __J__)) as u8;
            __B__[__O__ + 8 + __J__] = (__R__ >> (8 * __J__)) as u8;
            __J__ += 1;
        }
        __O__ += 16;
    }
    __B__.truncate(__N__);
    __B__
}
"#;

fn instantiate(template: &str, substitutions: &[(&str, String)]) -> Item {
    let mut source = template.to_string();
    for (placeholder, replacement) in substitutions {
        source = source.replace(placeholder, replacement);
    }
    syn::parse_str(&source).expect("decoder template is well-formed")
}

/// Instantiate the shared ASCON decoder under the context's reserved name.
///
/// The initialization vector is split into two random halves so the raw
/// constant never appears in the output.
pub(crate) fn ascon_decoder_item(ctx: &mut Context<'_>) -> Item {
    let fname = ctx.ascon_helper.func_name.to_string();
    let iv_a: u64 = ctx.rng_mut().gen();
    let iv_b = iv_a ^ 0x8040_0c06_0000_0000u64;
    let mut subs = vec![
        ("__F__", fname),
        ("__IVA__", format!("{iv_a:#x}")),
        ("__IVB__", format!("{iv_b:#x}")),
    ];
    for placeholder in [
        "__KA__", "__KB__", "__BE__", "__ROT__", "__PERM__", "__S__", "__TL__", "__PB__",
        "__CB__", "__LN__", "__D__", "__Z__", "__P__", "__O__", "__I__", "__R__", "__K__",
        "__N__", "__C__",
    ] {
        subs.push((placeholder, ctx.fresh_ident("h").to_string()));
    }
    instantiate(ASCON_TEMPLATE, &subs)
}

/// Instantiate the shared irreversible decoder under the context's
/// reserved name, inlining the inverse S-box.
pub(crate) fn irreversible_decoder_item(ctx: &mut Context<'_>) -> Item {
    let fname = ctx.irreversible_helper.func_name.to_string();
    let inv = feistel::INV_SBOX
        .iter()
        .map(|b| format!("{b}u8"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut subs = vec![
        ("__F__", fname),
        ("__INV__", inv),
        ("__RC__", format!("{:#x}", 0x9e37_79b9_7f4a_7c15u64)),
    ];
    for placeholder in [
        "__RF__", "__PL__", "__B__", "__T__", "__L__", "__R__", "__J__", "__K__", "__O__",
        "__I__", "__W__", "__N__", "__C__",
    ] {
        subs.push((placeholder, ctx.fresh_ident("h").to_string()));
    }
    instantiate(IRREVERSIBLE_TEMPLATE, &subs)
}
