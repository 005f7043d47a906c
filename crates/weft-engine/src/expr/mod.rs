//! Expression micro-language.
//!
//! Placeholders (`${...}`) and script bodies are compiled into a small AST
//! and evaluated against an explicit [`Scope`]. There is no dynamic code
//! execution: identifiers resolve through the scope, calls go through the
//! scope's function table, and the only side effects are script
//! assignments to `_`-prefixed variables.
//!
//! # Example
//!
//! ```
//! use weft_engine::expr::{Evaluated, Interpolation, Scope};
//! use weft_engine::ExprError;
//! use serde_json::{Value, json};
//!
//! struct One;
//!
//! impl Scope for One {
//!     fn lookup(&self, name: &str) -> Option<Value> {
//!         (name == "n").then(|| json!(1))
//!     }
//!     fn assign(&mut self, _name: &str, _value: Value) {}
//!     fn call(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, ExprError> {
//!         Err(ExprError::NotCallable(name.to_owned()))
//!     }
//! }
//!
//! let typed = Interpolation::parse("${n + 1}").resolve(&mut One, false).unwrap();
//! assert_eq!(typed, Evaluated::Value(json!(2)));
//!
//! let text = Interpolation::parse("n is ${n}").resolve(&mut One, false).unwrap();
//! assert_eq!(text, Evaluated::Text("n is 1".to_owned()));
//! ```

mod ast;
mod eval;
mod interpolate;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, LogicalOp, Script, Stmt, UnaryOp};
pub use eval::{Scope, evaluate, execute};
pub(crate) use interpolate::Escape;
pub use interpolate::{Evaluated, Interpolation};
pub use parser::{MAX_NESTING, parse_expression, parse_script};
