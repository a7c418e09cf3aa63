//! Linker-flag sanitizer.
//!
//! Build commands may inject variable values at link time with
//! `-ldflags "-X pkg.name=value"`. Those values must reach the linker, not
//! the literal obfuscator: if the rewriter encrypted the initializer, the
//! linker would overwrite the ciphertext and the decoder would corrupt it.
//! [`sanitize`] strips every injected value out of the argument list before
//! the build runs and hands the captured map to the rewriter so the affected
//! variables are left alone.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;

/// Map of fully qualified variable name to its injected plaintext value.
pub type InjectedVars = HashMap<String, String>;

/// Scan `args` for `-ldflags=<flags>` / `-ldflags <flags>` and blank every
/// `-X name=value` assignment inside them.
///
/// Returns the sanitized argument list (values replaced by the empty
/// string, everything else byte-for-byte intact) and the captured
/// assignments. Flag strings are split on whitespace; an `-X` with no
/// following assignment is passed through untouched.
pub fn sanitize(args: &[String]) -> (Vec<String>, InjectedVars) {
    let mut out = Vec::with_capacity(args.len());
    let mut captured = InjectedVars::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if let Some(flags) = arg.strip_prefix("-ldflags=") {
            out.push(format!("-ldflags={}", scrub_flags(flags, &mut captured)));
        } else if arg == "-ldflags" && i + 1 < args.len() {
            out.push(arg.clone());
            out.push(scrub_flags(&args[i + 1], &mut captured));
            i += 1;
        } else {
            out.push(arg.clone());
        }
        i += 1;
    }
    (out, captured)
}

fn scrub_flags(flags: &str, captured: &mut InjectedVars) -> String {
    let tokens: Vec<&str> = flags.split_whitespace().collect();
    let mut rebuilt: Vec<String> = Vec::with_capacity(tokens.len());

    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        if tok == "-X" && i + 1 < tokens.len() {
            rebuilt.push(tok.to_string());
            rebuilt.push(scrub_assignment(tokens[i + 1], captured));
            i += 1;
        } else if let Some(assign) = tok.strip_prefix("-X=") {
            rebuilt.push(format!("-X={}", scrub_assignment(assign, captured)));
        } else {
            rebuilt.push(tok.to_string());
        }
        i += 1;
    }
    rebuilt.join(" ")
}

fn scrub_assignment(assign: &str, captured: &mut InjectedVars) -> String {
    match assign.split_once('=') {
        Some((name, value)) => {
            captured.insert(name.to_string(), value.to_string());
            format!("{name}=")
        }
        None => assign.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn captures_equals_form() {
        let (out, vars) = sanitize(&strs(&["build", "-ldflags=-X main.version=1.2.3"]));
        assert_eq!(out, strs(&["build", "-ldflags=-X main.version="]));
        assert_eq!(vars.get("main.version").unwrap(), "1.2.3");
    }

    #[test]
    fn captures_separate_argument_form() {
        let (out, vars) = sanitize(&strs(&[
            "build",
            "-ldflags",
            "-s -w -X pkg.commit=deadbeef -X pkg.date=2024-01-01",
        ]));
        assert_eq!(
            out,
            strs(&["build", "-ldflags", "-s -w -X pkg.commit= -X pkg.date="])
        );
        assert_eq!(vars.get("pkg.commit").unwrap(), "deadbeef");
        assert_eq!(vars.get("pkg.date").unwrap(), "2024-01-01");
    }

    #[test]
    fn inline_x_equals_form() {
        let (out, vars) = sanitize(&strs(&["-ldflags=-X=app.secret=hunter2"]));
        assert_eq!(out, strs(&["-ldflags=-X=app.secret="]));
        assert_eq!(vars.get("app.secret").unwrap(), "hunter2");
    }

    #[test]
    fn untouched_without_assignments() {
        let args = strs(&["build", "-o", "out", "-ldflags=-s -w"]);
        let (out, vars) = sanitize(&args);
        assert_eq!(out, args);
        assert!(vars.is_empty());
    }

    #[test]
    fn value_may_contain_equals() {
        let (_, vars) = sanitize(&strs(&["-ldflags=-X a.b=c=d"]));
        assert_eq!(vars.get("a.b").unwrap(), "c=d");
    }

    #[test]
    fn trailing_dash_x_passes_through() {
        let (out, vars) = sanitize(&strs(&["-ldflags=-w -X"]));
        assert_eq!(out, strs(&["-ldflags=-w -X"]));
        assert!(vars.is_empty());
    }
}
