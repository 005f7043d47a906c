//! Markup template expansion engine.
//!
//! Templates are XML-ish markup fragments with embedded `${...}`
//! placeholders and control-flow tags (`if`, `else-if`, `else`,
//! `for-each`, `for`, `break`, `continue`, `set-var`, `exe-script`).
//! Definitions documents declare named templates, custom element
//! directives and attribute directives; an [`Engine`] loads them lazily
//! from its [`DefinitionSource`]s and renders templates against a
//! [`RenderContext`].
//!
//! # Architecture
//!
//! - [`expr`]: placeholder compiler and expression evaluator
//! - [`markup`]: XML reader producing the node tree
//! - [`TemplateStore`]: name-keyed templates with one-time bulk-load
//! - [`ControlRegistry`]: control tags and their handlers
//! - [`Engine`]: the tree-walking interpreter
//! - [`DirectiveRegistry`]: custom element and attribute directives
//!
//! # Example
//!
//! ```
//! use weft_engine::{Engine, RenderContext, StringSource};
//! use serde_json::json;
//!
//! let defs = r#"<definitions>
//!   <template name="list"><ul><for-each data="${items}" loop-var="it" index-var="i"><li>${i}: ${it}</li></for-each></ul></template>
//! </definitions>"#;
//!
//! let engine = Engine::new().with_source(StringSource::new("defs", defs));
//! let ctx = RenderContext::new().with_var("items", json!(["a", "b"]));
//!
//! let html = engine.render("list", ctx).unwrap();
//! assert_eq!(html, "<ul><li>0: a</li><li>1: b</li></ul>");
//! ```

mod context;
mod control;
mod definitions;
mod directive;
mod engine;
mod error;
pub mod expr;
pub mod markup;
mod source;
mod store;
mod value;

pub use context::{OUTPUT_VAR, PARENT_VAR, RenderContext};
pub use control::{ChainState, ControlCall, ControlNode, ControlRegistry, Flow, Handler};
pub use directive::{AttrDirective, Directive, DirectiveOutput, DirectiveRegistry, tag_name};
pub use engine::{ActionInvoker, Engine, EngineOptions, HostFunction, RenderSink};
pub use error::{ExprError, LoadError, RenderError};
pub use source::{DefinitionSource, FileSource, StringSource};
pub use store::{LoadSummary, Template, TemplateStore};
pub use value::{ValueExt, format_number, number};
