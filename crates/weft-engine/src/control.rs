//! Control nodes: tags that steer rendering instead of emitting markup.
//!
//! Each control node declares its required attributes and a handler. The
//! interpreter checks that required attributes are present, then hands the
//! handler a [`ControlCall`] through which it resolves attributes, reads the
//! preceding conditional's outcome, processes children and touches the
//! context.
//!
//! Handlers return a [`Flow`]. `break` and `continue` are ordinary return
//! values that unwind to the nearest loop; they are never errors.
//!
//! # Built-in nodes
//!
//! | Tag | Required attributes |
//! |-----|---------------------|
//! | `if`, `else-if` | `test` |
//! | `else`, `break`, `continue` | |
//! | `for-each` | `data`, `loop-var`, `index-var` |
//! | `for` | `start`, `end`, `loop-var` |
//! | `set-var` | `name`, `expr` |
//! | `exe-script` | (optional `var`) |

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::context::Frame;
use crate::error::{ExprError, RenderError};
use crate::expr::{Evaluated, Scope, evaluate, execute, parse_expression, parse_script};
use crate::markup::Element;
use crate::value::ValueExt;

/// How processing of a node list ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// All nodes were processed.
    Completed,
    /// A `continue` was reached; skip to the next loop iteration.
    Continue,
    /// A `break` was reached; leave the nearest loop.
    Break,
}

/// Outcome of the conditional chain at a sibling position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainState {
    /// No `if` or `else-if` precedes this node.
    #[default]
    Unset,
    /// A branch of the chain has already fired.
    Success,
    /// Every branch so far evaluated false.
    Failure,
}

/// Control node handler.
pub type Handler = dyn Fn(&mut ControlCall<'_, '_>) -> Result<Flow, RenderError> + Send + Sync;

/// A control tag with its required attributes and handler.
pub struct ControlNode {
    name: String,
    required: Vec<String>,
    handler: Box<Handler>,
}

impl ControlNode {
    /// Create a control node.
    pub fn new<F>(name: impl Into<String>, required: &[&str], handler: F) -> Self
    where
        F: Fn(&mut ControlCall<'_, '_>) -> Result<Flow, RenderError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            required: required.iter().map(|&attr| attr.to_owned()).collect(),
            handler: Box::new(handler),
        }
    }

    /// Tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes that must be present.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub(crate) fn run(&self, call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
        (self.handler)(call)
    }
}

impl fmt::Debug for ControlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlNode")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Control nodes known to an engine, keyed by tag.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    nodes: HashMap<String, ControlNode>,
}

impl ControlRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in control node.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ControlNode::new("if", &["test"], if_node));
        registry.register(ControlNode::new("else-if", &["test"], else_if_node));
        registry.register(ControlNode::new("else", &[], else_node));
        registry.register(ControlNode::new(
            "for-each",
            &["data", "loop-var", "index-var"],
            for_each_node,
        ));
        registry.register(ControlNode::new(
            "for",
            &["start", "end", "loop-var"],
            for_node,
        ));
        registry.register(ControlNode::new("break", &[], |_| Ok(Flow::Break)));
        registry.register(ControlNode::new("continue", &[], |_| Ok(Flow::Continue)));
        registry.register(ControlNode::new("set-var", &["name", "expr"], set_var_node));
        registry.register(ControlNode::new("exe-script", &[], exe_script_node));
        registry
    }

    /// Register a control node, replacing any node with the same tag.
    pub fn register(&mut self, node: ControlNode) {
        self.nodes.insert(node.name.clone(), node);
    }

    /// Control node for a tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&ControlNode> {
        self.nodes.get(tag)
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Handle given to a control node handler for one invocation.
pub struct ControlCall<'a, 'e> {
    element: &'a Element,
    frame: &'a mut Frame<'e>,
    previous: ChainState,
    outcome: ChainState,
}

impl<'a, 'e> ControlCall<'a, 'e> {
    pub(crate) fn new(element: &'a Element, frame: &'a mut Frame<'e>, previous: ChainState) -> Self {
        Self {
            element,
            frame,
            previous,
            outcome: ChainState::Unset,
        }
    }

    /// The control element.
    #[must_use]
    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// Resolve an attribute, if present.
    pub fn attr(&mut self, name: &str) -> Result<Option<Evaluated>, RenderError> {
        let Some(attr) = self.element.attr(name) else {
            return Ok(None);
        };
        let strict = self.frame.strict();
        attr.interpolation()
            .resolve(&mut *self.frame, strict)
            .map(Some)
    }

    /// Resolve an attribute that must be present.
    pub fn required(&mut self, name: &str) -> Result<Evaluated, RenderError> {
        self.attr(name)?.ok_or_else(|| RenderError::MissingAttribute {
            tag: self.element.tag.clone(),
            attr: name.to_owned(),
        })
    }

    /// Resolve a required attribute to its string form.
    pub fn text(&mut self, name: &str) -> Result<String, RenderError> {
        self.required(name).map(|value| value.to_text())
    }

    /// Outcome of the preceding conditional sibling.
    #[must_use]
    pub fn previous(&self) -> ChainState {
        self.previous
    }

    /// Record this node's chain outcome for the next sibling.
    pub fn set_outcome(&mut self, outcome: ChainState) {
        self.outcome = outcome;
    }

    pub(crate) fn outcome(&self) -> ChainState {
        self.outcome
    }

    /// Render the element's children into the output.
    pub fn process_children(&mut self) -> Result<Flow, RenderError> {
        let engine = self.frame.engine;
        engine.process_nodes(&self.element.children, self.frame)
    }

    /// Read a context variable.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<Value> {
        self.frame.ctx.get(name)
    }

    /// Bind a context variable, returning the previous value.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.frame.ctx.set(name, value)
    }

    /// Remove a context variable.
    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.frame.ctx.remove(name)
    }

    /// Append raw markup to the output.
    pub fn push_output(&mut self, markup: &str) {
        self.frame.ctx.push_str(markup);
    }

    fn scope(&mut self) -> &mut dyn Scope {
        &mut *self.frame
    }
}

/// Wrap a script or expression failure, unwrapping nested render errors.
pub(crate) fn expression_error(expr: &str, err: ExprError) -> RenderError {
    match err {
        ExprError::Render(inner) => *inner,
        source => RenderError::Expression {
            expr: expr.trim().to_owned(),
            source,
        },
    }
}

fn if_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    if call.required("test")?.is_truthy() {
        call.set_outcome(ChainState::Success);
        call.process_children()
    } else {
        call.set_outcome(ChainState::Failure);
        Ok(Flow::Completed)
    }
}

fn else_if_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    match call.previous() {
        ChainState::Unset => Err(RenderError::UnmatchedChain("else-if".to_owned())),
        ChainState::Success => {
            call.set_outcome(ChainState::Success);
            Ok(Flow::Completed)
        }
        ChainState::Failure => if_node(call),
    }
}

fn else_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    match call.previous() {
        ChainState::Unset => Err(RenderError::UnmatchedChain("else".to_owned())),
        ChainState::Success => Ok(Flow::Completed),
        ChainState::Failure => call.process_children(),
    }
}

fn for_each_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    let data = call.required("data")?;
    let loop_var = call.text("loop-var")?;
    let index_var = call.text("index-var")?;

    let entries: Vec<Vec<Value>> = match data {
        Evaluated::Value(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| vec![item, Value::from(i)])
            .collect(),
        Evaluated::Value(Value::Object(map)) => map
            .into_iter()
            .map(|(key, item)| vec![item, Value::String(key)])
            .collect(),
        other => {
            let type_name = match &other {
                Evaluated::Value(value) => value.type_name(),
                Evaluated::Text(_) => "text",
            };
            tracing::warn!(
                data = call.element().attr_value("data").unwrap_or_default(),
                type_name,
                "for-each data is not a collection"
            );
            return Ok(Flow::Completed);
        }
    };

    run_loop(call, &[loop_var.as_str(), index_var.as_str()], entries)
}

fn for_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    let start = integer_attr(call, "start")?;
    let end = integer_attr(call, "end")?;
    let loop_var = call.text("loop-var")?;

    run_loop(call, &[loop_var.as_str()], (start..end).map(|i| vec![Value::from(i)]))
}

/// Run a loop whose iterations bind `names` to the given values.
///
/// The variables' previous values are restored when the loop ends.
fn run_loop(
    call: &mut ControlCall<'_, '_>,
    names: &[&str],
    iterations: impl IntoIterator<Item = Vec<Value>>,
) -> Result<Flow, RenderError> {
    let saved: Vec<Option<Value>> = names.iter().map(|name| call.var(name)).collect();
    let result = iterate(call, names, iterations);

    for (name, value) in names.iter().zip(saved) {
        match value {
            Some(value) => call.set_var(*name, value),
            None => call.remove_var(name),
        };
    }
    result.map(|()| Flow::Completed)
}

fn iterate(
    call: &mut ControlCall<'_, '_>,
    names: &[&str],
    iterations: impl IntoIterator<Item = Vec<Value>>,
) -> Result<(), RenderError> {
    for values in iterations {
        for (name, value) in names.iter().zip(values) {
            call.set_var(*name, value);
        }
        // `Continue` has already cut the iteration short.
        if call.process_children()? == Flow::Break {
            break;
        }
    }
    Ok(())
}

fn integer_attr(call: &mut ControlCall<'_, '_>, attr: &str) -> Result<i64, RenderError> {
    let value = call.required(attr)?;
    let parsed = match &value {
        Evaluated::Value(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(f64_to_i64)),
        Evaluated::Value(Value::String(s)) | Evaluated::Text(s) => s.trim().parse().ok(),
        Evaluated::Value(_) => None,
    };
    parsed.ok_or_else(|| RenderError::InvalidInteger {
        tag: call.element().tag.clone(),
        attr: attr.to_owned(),
        value: value.to_text(),
    })
}

#[allow(clippy::cast_possible_truncation)]
fn f64_to_i64(f: f64) -> i64 {
    f as i64
}

fn set_var_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    let name = call.text("name")?;
    check_var_name("set-var", &name)?;

    let element = call.element();
    let value = match element.attr("expr") {
        Some(attr) if attr.interpolation().is_literal() => {
            let expr = parse_expression(&attr.value)
                .map_err(|err| expression_error(&attr.value, err))?;
            evaluate(&expr, call.scope()).map_err(|err| expression_error(&attr.value, err))?
        }
        _ => call.required("expr")?.into_value(),
    };

    call.set_var(name, value);
    Ok(Flow::Completed)
}

fn exe_script_node(call: &mut ControlCall<'_, '_>) -> Result<Flow, RenderError> {
    let var = match call.attr("var")? {
        Some(var) => {
            let var = var.to_text();
            check_var_name("exe-script", &var)?;
            Some(var)
        }
        None => None,
    };

    let body = call.element().text_content();
    let script = parse_script(&body).map_err(|err| expression_error(&body, err))?;
    let result = execute(&script, call.scope()).map_err(|err| expression_error(&body, err))?;

    match var {
        Some(var) => {
            call.set_var(var, result);
        }
        None if result.is_null() => {}
        None => call.push_output(&result.render_to_string()),
    }
    Ok(Flow::Completed)
}

fn check_var_name(tag: &str, name: &str) -> Result<(), RenderError> {
    if name.starts_with('_') {
        Ok(())
    } else {
        Err(RenderError::InvalidVariableName {
            tag: tag.to_owned(),
            name: name.to_owned(),
        })
    }
}
