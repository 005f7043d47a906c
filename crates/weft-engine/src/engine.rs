//! Template interpreter.
//!
//! [`Engine`] walks a template's node tree against a [`RenderContext`],
//! dispatching control tags to their [`ControlNode`] handlers, expanding
//! custom element directives and emitting everything else as markup.
//!
//! The context is threaded explicitly through every recursive call; the
//! engine itself is immutable during rendering and can be shared across
//! threads.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::{Frame, PARENT_VAR, RenderContext};
use crate::control::{ChainState, ControlCall, ControlNode, ControlRegistry, Flow};
use crate::directive::{AttrDirective, Directive, DirectiveOutput};
use crate::error::{ExprError, LoadError, RenderError};
use crate::expr::{Escape, Script, execute};
use crate::markup::{Element, Node, Text};
use crate::source::DefinitionSource;
use crate::store::{LoadSummary, TemplateStore};
use crate::value::ValueExt;

/// Function callable from expressions by name.
pub type HostFunction = dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync;

/// Backend for `invoke(action, ...args)` in expressions and scripts.
pub trait ActionInvoker: Send + Sync {
    /// Run a named action.
    fn invoke(&self, action: &str, args: &[Value]) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

/// Receiver for rendered markup (for example a DOM insertion point).
pub trait RenderSink {
    /// Accept the output of a successful render.
    fn insert(&self, template: &str, html: &str);
}

/// Rendering behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fail on placeholder errors and null results instead of rendering empty.
    pub strict: bool,
    /// HTML-escape interpolated values in text and attributes. Off by
    /// default: values are trusted markup unless this is set.
    pub escape: bool,
    /// Maximum sub-template nesting.
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict: false,
            escape: false,
            max_depth: 64,
        }
    }
}

/// Template expansion engine.
///
/// # Example
///
/// ```
/// use weft_engine::{Engine, RenderContext};
/// use serde_json::json;
///
/// let engine = Engine::new();
/// engine
///     .register_template("greet", r#"<if test="${name}">Hi ${name}</if><else>Hi</else>"#)
///     .unwrap();
///
/// let ctx = RenderContext::new().with_var("name", json!("Ann"));
/// assert_eq!(engine.render("greet", ctx).unwrap(), "Hi Ann");
/// assert_eq!(engine.render("greet", RenderContext::new()).unwrap(), "Hi");
/// ```
pub struct Engine {
    store: TemplateStore,
    controls: ControlRegistry,
    functions: HashMap<String, Box<HostFunction>>,
    actions: Option<Arc<dyn ActionInvoker>>,
    options: EngineOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the built-in control nodes and an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: TemplateStore::new(),
            controls: ControlRegistry::builtin(),
            functions: HashMap::new(),
            actions: None,
            options: EngineOptions::default(),
        }
    }

    /// Add a definitions source for the lazy bulk-load.
    #[must_use]
    pub fn with_source(mut self, source: impl DefinitionSource + 'static) -> Self {
        self.store.add_source(Arc::new(source));
        self
    }

    /// Register a host function callable from expressions.
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
        self
    }

    /// Set the backend for `invoke(...)`.
    #[must_use]
    pub fn with_actions(mut self, invoker: Arc<dyn ActionInvoker>) -> Self {
        self.actions = Some(invoker);
        self
    }

    /// Set rendering options.
    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Add or replace a control node.
    #[must_use]
    pub fn with_control(mut self, node: ControlNode) -> Self {
        self.controls.register(node);
        self
    }

    /// Rendering options.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Template and directive store.
    #[must_use]
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Control node registry.
    #[must_use]
    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    /// Parse markup and register it as a template.
    pub fn register_template(&self, name: impl Into<String>, src: &str) -> Result<(), LoadError> {
        self.store.register_markup(name, src)
    }

    /// Load a definitions document (templates, directives, attribute directives).
    pub fn load_definitions(&self, src: &str) -> Result<LoadSummary, LoadError> {
        self.store.load_str(src)
    }

    /// Render a template.
    ///
    /// # Errors
    ///
    /// Every failure is returned as [`RenderError::TemplateFailed`] naming
    /// the template; [`RenderError::root_cause`] gives the underlying error.
    pub fn render(&self, name: &str, ctx: RenderContext) -> Result<String, RenderError> {
        self.render_frame(name, Frame::new(self, ctx, 0))
            .map(RenderContext::into_output)
    }

    /// Render a template and hand the result to a sink.
    pub fn render_into(
        &self,
        name: &str,
        ctx: RenderContext,
        sink: &dyn RenderSink,
    ) -> Result<String, RenderError> {
        let html = self.render(name, ctx)?;
        sink.insert(name, &html);
        Ok(html)
    }

    /// Expand a custom element directive.
    ///
    /// The render context is `host_scope` overlaid with `attrs`. Every
    /// declared-required attribute must be present in `attrs`. The
    /// post-script runs after rendering against the same context.
    pub fn instantiate(
        &self,
        tag: &str,
        attrs: Map<String, Value>,
        host_scope: Map<String, Value>,
    ) -> Result<DirectiveOutput, RenderError> {
        let directive = self
            .store
            .directive(tag)?
            .ok_or_else(|| RenderError::UnknownDirective(tag.to_owned()))?;
        self.instantiate_at(&directive, attrs, host_scope, 0)
    }

    /// Run an attribute directive for an element.
    ///
    /// The script sees `element` and `value` (the attribute's literal value)
    /// and can reach the action invoker through `invoke(...)`.
    pub fn apply_attribute(
        &self,
        name: &str,
        element: Value,
        value: Value,
    ) -> Result<Value, RenderError> {
        let directive = self
            .store
            .attr_directive(name)?
            .ok_or_else(|| RenderError::UnknownAttrDirective(name.to_owned()))?;
        self.run_attr_directive(&directive, element, value, 0)
    }

    fn render_frame<'e>(
        &'e self,
        name: &str,
        mut frame: Frame<'e>,
    ) -> Result<RenderContext, RenderError> {
        let depth = frame.depth;
        match self.walk(name, &mut frame) {
            Ok(()) => Ok(frame.ctx),
            Err(err) => {
                if depth == 0 {
                    tracing::error!(template = %name, error = %err, "Template processing failed");
                } else {
                    tracing::debug!(template = %name, depth, error = %err, "Sub-template failed");
                }
                Err(RenderError::TemplateFailed {
                    name: name.to_owned(),
                    source: Box::new(err),
                })
            }
        }
    }

    fn walk(&self, name: &str, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        if frame.depth > self.options.max_depth {
            return Err(RenderError::DepthExceeded(self.options.max_depth));
        }
        let template = self.store.lookup(name)?;
        match self.process_nodes(template.content(), frame)? {
            Flow::Completed => Ok(()),
            Flow::Break | Flow::Continue => Err(RenderError::LoopControlOutsideLoop),
        }
    }

    /// Process a sibling list, tracking the conditional chain across it.
    ///
    /// Whitespace-only text and comments leave the chain intact; any other
    /// node ends it.
    pub(crate) fn process_nodes(
        &self,
        nodes: &[Node],
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RenderError> {
        let mut chain = ChainState::Unset;

        for node in nodes {
            let flow = match node {
                Node::Comment(_) => continue,
                Node::Text(text) => {
                    self.emit_text(text, frame)?;
                    if !text.is_blank() {
                        chain = ChainState::Unset;
                    }
                    Flow::Completed
                }
                Node::Element(element) => {
                    if let Some(control) = self.controls.get(&element.tag) {
                        check_required(control, element)?;
                        let mut call = ControlCall::new(element, &mut *frame, chain);
                        let flow = control.run(&mut call)?;
                        chain = call.outcome();
                        flow
                    } else {
                        chain = ChainState::Unset;
                        self.process_element(element, frame)?
                    }
                }
            };

            if flow != Flow::Completed {
                return Ok(flow);
            }
        }

        Ok(Flow::Completed)
    }

    fn emit_text(&self, text: &Text, frame: &mut Frame<'_>) -> Result<(), RenderError> {
        if let Some(markup) = text.literal_markup() {
            frame.ctx.push_str(markup);
            return Ok(());
        }
        text.interpolation().render_streamed(
            frame,
            self.options.strict,
            Escape::Text,
            self.options.escape,
            |frame, piece| frame.ctx.push_str(piece),
        )
    }

    fn process_element(&self, element: &Element, frame: &mut Frame<'_>) -> Result<Flow, RenderError> {
        if let Some(directive) = self.store.directive(&element.tag)? {
            self.expand_directive(&directive, element, frame)?;
            return Ok(Flow::Completed);
        }

        frame.ctx.push_str("<");
        frame.ctx.push_str(&element.tag);
        for attr in &element.attrs {
            frame.ctx.push_str(" ");
            frame.ctx.push_str(&attr.name);
            frame.ctx.push_str("=\"");
            if let Some(markup) = attr.literal_markup() {
                frame.ctx.push_str(&markup.replace('"', "&quot;"));
            } else {
                attr.interpolation().render_streamed(
                    frame,
                    self.options.strict,
                    Escape::Attribute,
                    self.options.escape,
                    |frame, piece| frame.ctx.push_str(piece),
                )?;
            }
            frame.ctx.push_str("\"");
        }

        if element.is_void() {
            frame.ctx.push_str("/>");
            self.apply_attr_directives(element, frame.depth)?;
            return Ok(Flow::Completed);
        }

        frame.ctx.push_str(">");
        self.apply_attr_directives(element, frame.depth)?;

        // Close the tag even when a loop signal passes through.
        let flow = self.process_nodes(&element.children, frame)?;
        frame.ctx.push_str("</");
        frame.ctx.push_str(&element.tag);
        frame.ctx.push_str(">");
        Ok(flow)
    }

    fn expand_directive(
        &self,
        directive: &Directive,
        element: &Element,
        frame: &mut Frame<'_>,
    ) -> Result<(), RenderError> {
        let mut attrs = Map::new();
        for attr in &element.attrs {
            let value = attr
                .interpolation()
                .resolve(&mut *frame, self.options.strict)?;
            attrs.insert(attr.name.clone(), value.into_value());
        }

        let output =
            self.instantiate_at(directive, attrs, frame.ctx.vars().clone(), frame.depth + 1)?;
        frame.ctx.push_str(&output.html);
        Ok(())
    }

    fn instantiate_at(
        &self,
        directive: &Directive,
        attrs: Map<String, Value>,
        host_scope: Map<String, Value>,
        depth: usize,
    ) -> Result<DirectiveOutput, RenderError> {
        for required in &directive.required {
            if !attrs.contains_key(required) {
                return Err(RenderError::MissingDirectiveAttribute {
                    tag: directive.tag.clone(),
                    attr: required.clone(),
                });
            }
        }

        let mut vars = host_scope;
        vars.extend(attrs);
        let ctx = self.render_frame(
            &directive.tag,
            Frame::new(self, RenderContext::from_vars(vars), depth),
        )?;
        let html = ctx.output().to_owned();

        let mut frame = Frame::new(self, ctx, depth);
        let post_result = match &directive.post_script {
            Some(script) => run_script(script, &mut frame, &directive.name)?,
            None => Value::Null,
        };

        Ok(DirectiveOutput {
            html,
            post_result,
            context: frame.ctx,
        })
    }

    fn apply_attr_directives(&self, element: &Element, depth: usize) -> Result<(), RenderError> {
        if !self.store.directives().has_attr_directives() {
            return Ok(());
        }
        for attr in &element.attrs {
            if let Some(directive) = self.store.attr_directive(&attr.name)? {
                let value = Value::String(attr.value.clone());
                self.run_attr_directive(&directive, element_value(element), value, depth)?;
            }
        }
        Ok(())
    }

    fn run_attr_directive(
        &self,
        directive: &AttrDirective,
        element: Value,
        value: Value,
        depth: usize,
    ) -> Result<Value, RenderError> {
        let ctx = RenderContext::new()
            .with_var("element", element)
            .with_var("value", value);
        let mut frame = Frame::new(self, ctx, depth);
        run_script(&directive.script, &mut frame, &directive.name)
    }

    /// `executeTemplate(name[, vars])`: render a template in a child context
    /// and append its output to the caller's.
    pub(crate) fn execute_template(
        &self,
        frame: &mut Frame<'_>,
        args: &[Value],
    ) -> Result<Value, ExprError> {
        let Some(Value::String(name)) = args.first() else {
            return Err(ExprError::InvalidArguments {
                function: "executeTemplate".to_owned(),
                message: "expected a template name".to_owned(),
            });
        };
        let mut ctx = match args.get(1) {
            None | Some(Value::Null) => RenderContext::new(),
            Some(Value::Object(vars)) => RenderContext::from_vars(vars.clone()),
            Some(other) => {
                return Err(ExprError::InvalidArguments {
                    function: "executeTemplate".to_owned(),
                    message: format!("expected an object of variables, got {}", other.type_name()),
                });
            }
        };
        ctx.set(PARENT_VAR, Value::Object(frame.ctx.vars().clone()));

        let child = self.render_frame(name, Frame::new(self, ctx, frame.depth + 1))?;
        frame.ctx.push_str(child.output());
        Ok(Value::Null)
    }

    /// `invoke(action, ...args)` through the configured invoker.
    pub(crate) fn invoke(&self, args: &[Value]) -> Result<Value, ExprError> {
        let Some((Value::String(action), rest)) = args.split_first() else {
            return Err(ExprError::InvalidArguments {
                function: "invoke".to_owned(),
                message: "expected an action name".to_owned(),
            });
        };
        let invoker = self.actions.as_ref().ok_or(ExprError::NoActionInvoker)?;
        invoker
            .invoke(action, rest)
            .map_err(|err| ExprError::Action {
                action: action.clone(),
                message: err.to_string(),
            })
    }

    pub(crate) fn call_function(&self, name: &str, args: &[Value]) -> Result<Value, ExprError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ExprError::NotCallable(name.to_owned()))?;
        function(args)
    }
}

fn check_required(control: &ControlNode, element: &Element) -> Result<(), RenderError> {
    match control
        .required()
        .iter()
        .find(|attr| element.attr(attr).is_none())
    {
        Some(attr) => Err(RenderError::MissingAttribute {
            tag: element.tag.clone(),
            attr: attr.clone(),
        }),
        None => Ok(()),
    }
}

fn run_script(script: &Script, frame: &mut Frame<'_>, owner: &str) -> Result<Value, RenderError> {
    execute(script, frame).map_err(|err| match err {
        ExprError::Render(inner) => *inner,
        source => RenderError::Script {
            owner: owner.to_owned(),
            source,
        },
    })
}

/// `{tag, attrs}` view of an element for attribute directive scripts.
fn element_value(element: &Element) -> Value {
    let attrs: Map<String, Value> = element
        .attrs
        .iter()
        .map(|attr| (attr.name.clone(), Value::String(attr.value.clone())))
        .collect();
    let mut map = Map::new();
    map.insert("tag".to_owned(), Value::String(element.tag.clone()));
    map.insert("attrs".to_owned(), Value::Object(attrs));
    Value::Object(map)
}
