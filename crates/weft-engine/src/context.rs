//! Rendering context and the per-render frame.

use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::ExprError;
use crate::expr::Scope;

/// Name under which the output buffer is readable from expressions.
pub const OUTPUT_VAR: &str = "$res";

/// Name of the caller snapshot in a sub-template's context.
pub const PARENT_VAR: &str = "parentContext";

/// Variables and output buffer for one render pass.
///
/// Every render and every sub-template invocation gets its own context, so
/// concurrent renders on one engine never share mutable state.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    vars: Map<String, Value>,
    output: String,
}

impl RenderContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from caller-supplied variables.
    #[must_use]
    pub fn from_vars(vars: Map<String, Value>) -> Self {
        Self {
            vars,
            output: String::new(),
        }
    }

    /// Add a variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Variable value. `$res` reads the output rendered so far.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if name == OUTPUT_VAR {
            return Some(Value::String(self.output.clone()));
        }
        self.vars.get(name).cloned()
    }

    /// Bind a variable, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    /// Remove a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    /// All variables.
    #[must_use]
    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    /// Output rendered so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Consume the context, returning the output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.output
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.output.push_str(s);
    }
}

/// Context threaded through one template walk.
pub(crate) struct Frame<'e> {
    pub engine: &'e Engine,
    pub ctx: RenderContext,
    /// Sub-template nesting level (0 for the render entry point).
    pub depth: usize,
}

impl<'e> Frame<'e> {
    pub fn new(engine: &'e Engine, ctx: RenderContext, depth: usize) -> Self {
        Self { engine, ctx, depth }
    }

    pub fn strict(&self) -> bool {
        self.engine.options().strict
    }
}

impl Scope for Frame<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.ctx.get(name)
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.ctx.set(name, value);
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
        let engine = self.engine;
        match name {
            "executeTemplate" => engine.execute_template(self, &args),
            "invoke" => engine.invoke(&args),
            _ => engine.call_function(name, &args),
        }
    }
}
