//! Reference evaluator for emitted code.
//!
//! The rewriter cannot compile the programs it produces inside its own test
//! suite, so this module interprets the byte-oriented subset of Rust the
//! emitters generate: `let` bindings, while loops, indexed assignment,
//! wrapping byte arithmetic, casts, closures called in place, and `match`
//! over decoder results. Shared decoders are bridged through registered
//! native functions backed by the real cipher crates.
//!
//! Integer semantics: values are untyped machine words; `wrapping_*` and
//! `rotate_*` follow `u8` semantics because the emitted subset only applies
//! them to bytes. Casts mask to the target width.

use std::collections::HashMap;
use std::rc::Rc;
use syn::{BinOp, Expr, Item, Lit, Pat, Stmt};

/// Runtime value of the emitted subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Untyped unsigned integer.
    Int(u64),
    /// Boolean.
    Bool(bool),
    /// Byte buffer (`Vec<u8>`, `[u8; N]`, byte slices).
    Bytes(Vec<u8>),
    /// Wide-word buffer (`[u16/u32/u64; N]`).
    Words(Vec<u64>),
    /// Decoder result (`Option<Vec<u8>>`).
    Opt(Option<Vec<u8>>),
    /// Owned string.
    Str(String),
    /// Statement result.
    Unit,
}

/// Evaluation failure.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EvalError {
    /// Construct outside the emitted subset.
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    /// Unknown variable or function.
    #[error("unknown name: {0}")]
    Unknown(String),
    /// Operand type mismatch.
    #[error("type error: {0}")]
    Type(String),
    /// Out-of-bounds index.
    #[error("index {0} out of bounds (len {1})")]
    OutOfBounds(u64, usize),
    /// Emitted code panicked (for example on authentication failure).
    #[error("panicked: {0}")]
    Panicked(String),
    /// Loop ran past the safety cap.
    #[error("runaway loop")]
    RunawayLoop,
}

type Native = Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>;

/// Interpreter environment: variables, native bridges, loaded items.
#[derive(Default)]
pub struct Env {
    vars: HashMap<String, Value>,
    natives: HashMap<String, Native>,
    fns: HashMap<String, syn::ItemFn>,
}

const LOOP_CAP: u64 = 50_000_000;

impl Env {
    /// Empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable.
    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Read a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Register a native function (decoder bridge).
    pub fn register_native(
        &mut self,
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) {
        self.natives.insert(name.to_string(), Rc::new(f));
    }

    /// Load file-level items: static arrays become variables, functions
    /// become callable.
    pub fn load_items(&mut self, items: &[Item]) -> Result<(), EvalError> {
        for item in items {
            match item {
                Item::Static(s) => {
                    let value = self.eval_expr(&s.expr)?;
                    self.vars.insert(s.ident.to_string(), value);
                }
                Item::Fn(f) => {
                    self.fns.insert(f.sig.ident.to_string(), f.clone());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Execute a block; returns the value of its tail expression.
    pub fn eval_block(&mut self, block: &syn::Block) -> Result<Value, EvalError> {
        let mut last = Value::Unit;
        for stmt in &block.stmts {
            last = self.eval_stmt(stmt)?;
        }
        Ok(last)
    }

    /// Locate and evaluate the obfuscation lambda call inside a rewritten
    /// site expression, skipping memoization wrappers.
    pub fn eval_site(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        fn find_lambda_call(expr: &Expr) -> Option<&syn::ExprCall> {
            if let Expr::Call(call) = expr {
                let mut func: &Expr = &call.func;
                while let Expr::Paren(p) = func {
                    func = &p.expr;
                }
                if matches!(func, Expr::Closure(_)) {
                    return Some(call);
                }
            }
            // Recurse over the handful of wrapper shapes sites use.
            match expr {
                Expr::Paren(p) => find_lambda_call(&p.expr),
                Expr::Block(b) => b.block.stmts.iter().find_map(|s| match s {
                    Stmt::Expr(e, _) => find_lambda_call(e),
                    _ => None,
                }),
                Expr::MethodCall(m) => find_lambda_call(&m.receiver)
                    .or_else(|| m.args.iter().find_map(find_lambda_call)),
                Expr::Call(c) => c.args.iter().find_map(find_lambda_call),
                Expr::Closure(c) => find_lambda_call(&c.body),
                Expr::Reference(r) => find_lambda_call(&r.expr),
                _ => None,
            }
        }
        let call = find_lambda_call(expr)
            .ok_or_else(|| EvalError::Unsupported("no lambda call in site".into()))?;
        self.eval_expr(&Expr::Call(call.clone()))
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Value, EvalError> {
        match stmt {
            Stmt::Local(local) => {
                let init = local
                    .init
                    .as_ref()
                    .ok_or_else(|| EvalError::Unsupported("let without initializer".into()))?;
                let value = self.eval_expr(&init.expr)?;
                let name = pat_ident(&local.pat)?;
                self.vars.insert(name, value);
                Ok(Value::Unit)
            }
            Stmt::Expr(expr, semi) => {
                let v = self.eval_expr(expr)?;
                Ok(if semi.is_some() { Value::Unit } else { v })
            }
            Stmt::Item(_) => Ok(Value::Unit),
            Stmt::Macro(m) => Err(macro_effect(&m.mac)),
        }
    }

    /// Evaluate a single expression of the emitted subset.
    #[allow(clippy::too_many_lines)]
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Lit(l) => eval_lit(&l.lit),
            Expr::Paren(p) => self.eval_expr(&p.expr),
            Expr::Reference(r) => self.eval_expr(&r.expr),
            Expr::Path(p) => {
                let name = path_ident(&p.path)
                    .ok_or_else(|| EvalError::Unsupported("qualified path value".into()))?;
                self.vars
                    .get(&name)
                    .cloned()
                    .ok_or(EvalError::Unknown(name))
            }
            Expr::Unary(u) => match (&u.op, self.eval_expr(&u.expr)?) {
                (syn::UnOp::Not(_), Value::Bool(b)) => Ok(Value::Bool(!b)),
                _ => Err(EvalError::Unsupported("unary operator".into())),
            },
            Expr::Cast(c) => {
                let v = self.eval_expr(&c.expr)?;
                let Value::Int(n) = v else {
                    return Err(EvalError::Type("cast of non-integer".into()));
                };
                let masked = match &*c.ty {
                    syn::Type::Path(tp) => match tp.path.segments.last().map(|s| s.ident.to_string()) {
                        Some(t) if t == "u8" => n & 0xff,
                        Some(t) if t == "u16" => n & 0xffff,
                        Some(t) if t == "u32" => n & 0xffff_ffff,
                        Some(t) if t == "u64" || t == "usize" => n,
                        other => {
                            return Err(EvalError::Unsupported(format!(
                                "cast target {other:?}"
                            )))
                        }
                    },
                    _ => return Err(EvalError::Unsupported("cast target".into())),
                };
                Ok(Value::Int(masked))
            }
            Expr::Array(arr) => self.eval_array(arr),
            Expr::Repeat(rep) => {
                let elem = int_of(self.eval_expr(&rep.expr)?)?;
                let len = int_of(self.eval_expr(&rep.len)?)?;
                Ok(Value::Bytes(vec![elem as u8; len as usize]))
            }
            Expr::Index(ix) => {
                let base = self.eval_expr(&ix.expr)?;
                match &*ix.index {
                    Expr::Range(range) => {
                        let Value::Bytes(bytes) = base else {
                            return Err(EvalError::Type("range index on non-bytes".into()));
                        };
                        let start = match &range.start {
                            Some(e) => int_of(self.eval_expr(e)?)? as usize,
                            None => 0,
                        };
                        let end = match &range.end {
                            Some(e) => int_of(self.eval_expr(e)?)? as usize,
                            None => bytes.len(),
                        };
                        if start > end || end > bytes.len() {
                            return Err(EvalError::OutOfBounds(end as u64, bytes.len()));
                        }
                        Ok(Value::Bytes(bytes[start..end].to_vec()))
                    }
                    index => {
                        let i = int_of(self.eval_expr(index)?)?;
                        match base {
                            Value::Bytes(b) => b
                                .get(i as usize)
                                .map(|&x| Value::Int(u64::from(x)))
                                .ok_or(EvalError::OutOfBounds(i, b.len())),
                            Value::Words(w) => w
                                .get(i as usize)
                                .copied()
                                .map(Value::Int)
                                .ok_or(EvalError::OutOfBounds(i, w.len())),
                            _ => Err(EvalError::Type("index on non-sequence".into())),
                        }
                    }
                }
            }
            Expr::Binary(bin) => self.eval_binary(bin),
            Expr::Assign(assign) => {
                let value = self.eval_expr(&assign.right)?;
                self.store(&assign.left, value)?;
                Ok(Value::Unit)
            }
            Expr::MethodCall(mc) => self.eval_method(mc),
            Expr::Call(call) => self.eval_call(call),
            Expr::If(ifx) => {
                let Value::Bool(cond) = self.eval_expr(&ifx.cond)? else {
                    return Err(EvalError::Type("non-boolean condition".into()));
                };
                if cond {
                    self.eval_block(&ifx.then_branch)
                } else if let Some((_, els)) = &ifx.else_branch {
                    self.eval_expr(els)
                } else {
                    Ok(Value::Unit)
                }
            }
            Expr::While(wh) => {
                let mut guard = 0u64;
                loop {
                    let Value::Bool(cond) = self.eval_expr(&wh.cond)? else {
                        return Err(EvalError::Type("non-boolean loop condition".into()));
                    };
                    if !cond {
                        break;
                    }
                    self.eval_block(&wh.body)?;
                    guard += 1;
                    if guard > LOOP_CAP {
                        return Err(EvalError::RunawayLoop);
                    }
                }
                Ok(Value::Unit)
            }
            Expr::Block(b) => self.eval_block(&b.block),
            Expr::Match(m) => self.eval_match(m),
            Expr::Macro(m) => Err(macro_effect(&m.mac)),
            other => Err(EvalError::Unsupported(format!(
                "expression kind {:?}",
                std::mem::discriminant(other)
            ))),
        }
    }

    fn eval_array(&mut self, arr: &syn::ExprArray) -> Result<Value, EvalError> {
        let wide = match arr.elems.first() {
            Some(Expr::Lit(l)) => match &l.lit {
                Lit::Int(i) => !matches!(i.suffix(), "u8" | ""),
                _ => false,
            },
            _ => false,
        };
        let mut words = Vec::with_capacity(arr.elems.len());
        for elem in &arr.elems {
            words.push(int_of(self.eval_expr(elem)?)?);
        }
        Ok(if wide {
            Value::Words(words)
        } else {
            Value::Bytes(words.into_iter().map(|w| w as u8).collect())
        })
    }

    fn eval_binary(&mut self, bin: &syn::ExprBinary) -> Result<Value, EvalError> {
        // Compound assignments mutate in place and yield unit.
        if let Some(apply) = compound_op(&bin.op) {
            let rhs = int_of(self.eval_expr(&bin.right)?)?;
            let current = int_of(self.eval_expr(&bin.left)?)?;
            self.store(&bin.left, Value::Int(apply(current, rhs)))?;
            return Ok(Value::Unit);
        }

        let lhs = self.eval_expr(&bin.left)?;
        // Short-circuit booleans.
        if matches!(bin.op, BinOp::And(_) | BinOp::Or(_)) {
            let Value::Bool(l) = lhs else {
                return Err(EvalError::Type("logical op on non-bool".into()));
            };
            return match (&bin.op, l) {
                (BinOp::And(_), false) => Ok(Value::Bool(false)),
                (BinOp::Or(_), true) => Ok(Value::Bool(true)),
                _ => self.eval_expr(&bin.right),
            };
        }
        let rhs = self.eval_expr(&bin.right)?;
        let (l, r) = (int_of(lhs)?, int_of(rhs)?);
        let v = match bin.op {
            BinOp::Add(_) => l.wrapping_add(r),
            BinOp::Sub(_) => l.wrapping_sub(r),
            BinOp::Mul(_) => l.wrapping_mul(r),
            BinOp::Div(_) => l.checked_div(r).ok_or(EvalError::Panicked("divide by zero".into()))?,
            BinOp::Rem(_) => l.checked_rem(r).ok_or(EvalError::Panicked("divide by zero".into()))?,
            BinOp::BitXor(_) => l ^ r,
            BinOp::BitAnd(_) => l & r,
            BinOp::BitOr(_) => l | r,
            BinOp::Shl(_) => l.wrapping_shl(r as u32),
            BinOp::Shr(_) => l.wrapping_shr(r as u32),
            BinOp::Eq(_) => return Ok(Value::Bool(l == r)),
            BinOp::Ne(_) => return Ok(Value::Bool(l != r)),
            BinOp::Lt(_) => return Ok(Value::Bool(l < r)),
            BinOp::Le(_) => return Ok(Value::Bool(l <= r)),
            BinOp::Gt(_) => return Ok(Value::Bool(l > r)),
            BinOp::Ge(_) => return Ok(Value::Bool(l >= r)),
            _ => return Err(EvalError::Unsupported("binary operator".into())),
        };
        Ok(Value::Int(v))
    }

    fn eval_method(&mut self, mc: &syn::ExprMethodCall) -> Result<Value, EvalError> {
        let method = mc.method.to_string();

        // In-place mutation: `ident.swap(a, b)`.
        if method == "swap" {
            let a = int_of(self.eval_expr(&mc.args[0])?)? as usize;
            let b = int_of(self.eval_expr(&mc.args[1])?)? as usize;
            let name = receiver_ident(&mc.receiver)?;
            let Some(Value::Bytes(bytes)) = self.vars.get_mut(&name) else {
                return Err(EvalError::Type("swap on non-bytes".into()));
            };
            if a >= bytes.len() || b >= bytes.len() {
                return Err(EvalError::OutOfBounds(a.max(b) as u64, bytes.len()));
            }
            bytes.swap(a, b);
            return Ok(Value::Unit);
        }

        let recv = self.eval_expr(&mc.receiver)?;
        match (method.as_str(), recv) {
            ("len", Value::Bytes(b)) => Ok(Value::Int(b.len() as u64)),
            ("len", Value::Words(w)) => Ok(Value::Int(w.len() as u64)),
            ("to_vec", Value::Bytes(b)) => Ok(Value::Bytes(b)),
            ("to_vec", Value::Words(w)) => Ok(Value::Words(w)),
            ("into_owned", Value::Str(s)) => Ok(Value::Str(s)),
            ("wrapping_add", Value::Int(n)) => {
                let r = int_of(self.eval_expr(&mc.args[0])?)?;
                Ok(Value::Int(u64::from((n as u8).wrapping_add(r as u8))))
            }
            ("wrapping_sub", Value::Int(n)) => {
                let r = int_of(self.eval_expr(&mc.args[0])?)?;
                Ok(Value::Int(u64::from((n as u8).wrapping_sub(r as u8))))
            }
            ("wrapping_mul", Value::Int(n)) => {
                let r = int_of(self.eval_expr(&mc.args[0])?)?;
                Ok(Value::Int(u64::from((n as u8).wrapping_mul(r as u8))))
            }
            ("rotate_left", Value::Int(n)) => {
                let r = int_of(self.eval_expr(&mc.args[0])?)?;
                Ok(Value::Int(u64::from((n as u8).rotate_left(r as u32))))
            }
            ("rotate_right", Value::Int(n)) => {
                let r = int_of(self.eval_expr(&mc.args[0])?)?;
                Ok(Value::Int(u64::from((n as u8).rotate_right(r as u32))))
            }
            (m, _) => Err(EvalError::Unsupported(format!("method {m}"))),
        }
    }

    fn eval_call(&mut self, call: &syn::ExprCall) -> Result<Value, EvalError> {
        let mut func: &Expr = &call.func;
        while let Expr::Paren(p) = func {
            func = &p.expr;
        }
        if let Expr::Closure(closure) = func {
            let mut args = Vec::with_capacity(call.args.len());
            for a in &call.args {
                args.push(self.eval_expr(a)?);
            }
            return self.call_closure(closure, args);
        }
        let Expr::Path(p) = func else {
            return Err(EvalError::Unsupported("call target".into()));
        };
        let full = p
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect::<Vec<_>>()
            .join("::");
        if full == "Vec::new" {
            return Ok(Value::Bytes(Vec::new()));
        }
        if full == "String::from_utf8_lossy" {
            let Value::Bytes(b) = self.eval_expr(&call.args[0])? else {
                return Err(EvalError::Type("from_utf8_lossy on non-bytes".into()));
            };
            return Ok(Value::Str(String::from_utf8_lossy(&b).into_owned()));
        }
        let mut args = Vec::with_capacity(call.args.len());
        for a in &call.args {
            args.push(self.eval_expr(a)?);
        }
        if let Some(native) = self.natives.get(&full).cloned() {
            return native(&args);
        }
        if let Some(f) = self.fns.get(&full).cloned() {
            return self.call_fn(&f, args);
        }
        Err(EvalError::Unknown(full))
    }

    fn call_closure(
        &mut self,
        closure: &syn::ExprClosure,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        for (pat, value) in closure.inputs.iter().zip(args) {
            bind_pat(self, pat, value)?;
        }
        self.eval_expr(&closure.body)
    }

    fn call_fn(&mut self, f: &syn::ItemFn, args: Vec<Value>) -> Result<Value, EvalError> {
        for (param, value) in f.sig.inputs.iter().zip(args) {
            let syn::FnArg::Typed(t) = param else {
                return Err(EvalError::Unsupported("self parameter".into()));
            };
            bind_pat(self, &t.pat, value)?;
        }
        self.eval_block(&f.block)
    }

    fn eval_match(&mut self, m: &syn::ExprMatch) -> Result<Value, EvalError> {
        let Value::Opt(opt) = self.eval_expr(&m.expr)? else {
            return Err(EvalError::Type("match on non-option".into()));
        };
        for arm in &m.arms {
            match (&arm.pat, &opt) {
                (Pat::TupleStruct(ts), Some(bytes))
                    if ts.path.segments.last().is_some_and(|s| s.ident == "Some") =>
                {
                    if let Some(Pat::Ident(binding)) = ts.elems.first() {
                        self.vars
                            .insert(binding.ident.to_string(), Value::Bytes(bytes.clone()));
                    }
                    return self.eval_expr(&arm.body);
                }
                (Pat::Path(pp), None)
                    if pp.path.segments.last().is_some_and(|s| s.ident == "None") =>
                {
                    return self.eval_expr(&arm.body);
                }
                _ => {}
            }
        }
        Err(EvalError::Unsupported("no matching arm".into()))
    }

    fn store(&mut self, place: &Expr, value: Value) -> Result<(), EvalError> {
        match place {
            Expr::Path(p) => {
                let name = path_ident(&p.path)
                    .ok_or_else(|| EvalError::Unsupported("qualified assignment".into()))?;
                self.vars.insert(name, value);
                Ok(())
            }
            Expr::Index(ix) => {
                let i = int_of(self.eval_expr(&ix.index)?)? as usize;
                let n = int_of(value)?;
                let name = receiver_ident(&ix.expr)?;
                match self.vars.get_mut(&name) {
                    Some(Value::Bytes(b)) if i < b.len() => {
                        b[i] = n as u8;
                        Ok(())
                    }
                    Some(Value::Words(w)) if i < w.len() => {
                        w[i] = n;
                        Ok(())
                    }
                    Some(Value::Bytes(b)) => Err(EvalError::OutOfBounds(i as u64, b.len())),
                    Some(Value::Words(w)) => Err(EvalError::OutOfBounds(i as u64, w.len())),
                    _ => Err(EvalError::Unknown(name)),
                }
            }
            _ => Err(EvalError::Unsupported("assignment target".into())),
        }
    }
}

fn bind_pat(env: &mut Env, pat: &Pat, value: Value) -> Result<(), EvalError> {
    match pat {
        Pat::Wild(_) => Ok(()),
        Pat::Ident(id) => {
            env.vars.insert(id.ident.to_string(), value);
            Ok(())
        }
        Pat::Type(t) => bind_pat(env, &t.pat, value),
        _ => Err(EvalError::Unsupported("parameter pattern".into())),
    }
}

fn pat_ident(pat: &Pat) -> Result<String, EvalError> {
    match pat {
        Pat::Ident(id) => Ok(id.ident.to_string()),
        Pat::Type(t) => pat_ident(&t.pat),
        _ => Err(EvalError::Unsupported("binding pattern".into())),
    }
}

fn path_ident(path: &syn::Path) -> Option<String> {
    if path.segments.len() == 1 {
        Some(path.segments[0].ident.to_string())
    } else {
        None
    }
}

fn receiver_ident(expr: &Expr) -> Result<String, EvalError> {
    match expr {
        Expr::Path(p) => path_ident(&p.path)
            .ok_or_else(|| EvalError::Unsupported("qualified receiver".into())),
        Expr::Paren(p) => receiver_ident(&p.expr),
        _ => Err(EvalError::Unsupported("computed receiver".into())),
    }
}

fn eval_lit(lit: &Lit) -> Result<Value, EvalError> {
    match lit {
        Lit::Int(i) => i
            .base10_parse::<u64>()
            .map(Value::Int)
            .map_err(|_| EvalError::Type("integer literal".into())),
        Lit::Bool(b) => Ok(Value::Bool(b.value)),
        Lit::Str(s) => Ok(Value::Str(s.value())),
        Lit::ByteStr(s) => Ok(Value::Bytes(s.value())),
        _ => Err(EvalError::Unsupported("literal kind".into())),
    }
}

fn macro_effect(mac: &syn::Macro) -> EvalError {
    if mac.path.segments.last().is_some_and(|s| s.ident == "panic") {
        let msg = syn::parse2::<syn::LitStr>(mac.tokens.clone())
            .map(|l| l.value())
            .unwrap_or_default();
        EvalError::Panicked(msg)
    } else {
        EvalError::Unsupported("macro".into())
    }
}

fn compound_op(op: &BinOp) -> Option<fn(u64, u64) -> u64> {
    match op {
        BinOp::AddAssign(_) => Some(|l, r| l.wrapping_add(r)),
        BinOp::SubAssign(_) => Some(|l, r| l.wrapping_sub(r)),
        BinOp::BitXorAssign(_) => Some(|l, r| l ^ r),
        BinOp::BitOrAssign(_) => Some(|l, r| l | r),
        BinOp::BitAndAssign(_) => Some(|l, r| l & r),
        _ => None,
    }
}

fn int_of(v: Value) -> Result<u64, EvalError> {
    match v {
        Value::Int(n) => Ok(n),
        other => Err(EvalError::Type(format!("expected integer, got {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn while_loop_and_index_assignment() {
        let block: syn::Block = parse_quote!({
            let mut data = [1u8, 2u8, 3u8].to_vec();
            let mut i = 0;
            while i < data.len() {
                data[i] = data[i] ^ 0xffu8;
                i += 1;
            }
        });
        let mut env = Env::new();
        env.eval_block(&block).unwrap();
        assert_eq!(env.get("data"), Some(&Value::Bytes(vec![254, 253, 252])));
    }

    #[test]
    fn closure_call_binds_params_and_wildcards() {
        let expr: Expr = parse_quote!((|k: u32, _: u64| -> u8 { (k >> 8u32) as u8 })(
            0x1234u32, 9u64
        ));
        let mut env = Env::new();
        assert_eq!(env.eval_expr(&expr).unwrap(), Value::Int(0x12));
    }

    #[test]
    fn match_on_native_decoder_result() {
        let expr: Expr = parse_quote!(match probe([1u8, 2u8].to_vec()) {
            Some(d) => d,
            None => panic!("literal authentication failed"),
        });
        let mut env = Env::new();
        env.register_native("probe", |args| {
            let Value::Bytes(b) = &args[0] else { panic!() };
            Ok(Value::Opt(Some(b.iter().rev().copied().collect())))
        });
        assert_eq!(env.eval_expr(&expr).unwrap(), Value::Bytes(vec![2, 1]));

        let mut env = Env::new();
        env.register_native("probe", |_| Ok(Value::Opt(None)));
        assert_eq!(
            env.eval_expr(&expr),
            Err(EvalError::Panicked("literal authentication failed".into()))
        );
    }

    #[test]
    fn loads_statics_and_functions() {
        let items: Vec<Item> = vec![
            parse_quote!(static TBL: [u32; 2] = [7u32, 9u32];),
            parse_quote!(fn pick(i: usize) -> u32 {
                TBL[i] ^ 1u32
            }),
        ];
        let mut env = Env::new();
        env.load_items(&items).unwrap();
        let expr: Expr = parse_quote!(pick(1usize));
        assert_eq!(env.eval_expr(&expr).unwrap(), Value::Int(8));
    }

    #[test]
    fn string_conversion_tail() {
        let block: syn::Block = parse_quote!({
            let data = [104u8, 105u8].to_vec();
            String::from_utf8_lossy(&data[0usize..2usize]).into_owned()
        });
        let mut env = Env::new();
        assert_eq!(env.eval_block(&block).unwrap(), Value::Str("hi".into()));
    }
}
