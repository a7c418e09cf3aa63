//! Generic sequential stage runner.
//!
//! A [`Pipeline`] threads one context value through named stages in
//! insertion order and short-circuits on the first error. The build driver
//! composes its per-file work (sanitize flags, rewrite literals, seal the
//! cache) out of stages; the stages themselves stay ignorant of each other.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use tracing::debug_span;

type Stage<C, E> = Box<dyn Fn(C) -> Result<C, E>>;

/// Ordered collection of named transformation stages over a context `C`.
pub struct Pipeline<C, E> {
    stages: Vec<(&'static str, Stage<C, E>)>,
}

impl<C, E> Default for Pipeline<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E> Pipeline<C, E> {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage; stages run in the order they were added.
    pub fn stage(mut self, name: &'static str, f: impl Fn(C) -> Result<C, E> + 'static) -> Self {
        self.stages.push((name, Box::new(f)));
        self
    }

    /// Names of the registered stages, in run order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(n, _)| *n).collect()
    }

    /// Run every stage over `ctx`, stopping at the first error.
    pub fn run(&self, mut ctx: C) -> Result<C, E> {
        for (name, stage) in &self.stages {
            let span = debug_span!("pipeline_stage", stage = name);
            let _guard = span.enter();
            ctx = stage(ctx)?;
        }
        Ok(ctx)
    }
}
