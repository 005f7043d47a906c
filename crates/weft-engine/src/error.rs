//! Error types for template loading, expression evaluation and rendering.

use std::path::PathBuf;

/// Error raised while lexing, parsing or evaluating a single expression.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    /// Character that cannot start any token.
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset in the expression source.
        offset: usize,
    },

    /// String literal without a closing quote.
    #[error("unterminated string literal at offset {0}")]
    UnterminatedString(usize),

    /// Token that does not fit the grammar at this position.
    #[error("unexpected `{found}` at offset {offset}")]
    UnexpectedToken {
        /// Token text.
        found: String,
        /// Byte offset in the expression source.
        offset: usize,
    },

    /// Expression ended where more input was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Syntax error recorded when the placeholder was compiled.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Script assignment to a name without the `_` prefix.
    #[error("cannot assign to `{0}`: script variables must start with `_`")]
    InvalidAssignment(String),

    /// Property access on `null`.
    #[error("cannot read property `{0}` of null")]
    NullAccess(String),

    /// Call of something that is not a known function.
    #[error("`{0}` is not a function")]
    NotCallable(String),

    /// Method not supported by the receiver's type.
    #[error("unknown method `{method}` on {type_name}")]
    UnknownMethod {
        /// Method name.
        method: String,
        /// Receiver type name.
        type_name: &'static str,
    },

    /// Arguments rejected by a built-in or host function.
    #[error("invalid arguments to `{function}`: {message}")]
    InvalidArguments {
        /// Function or method name.
        function: String,
        /// What was wrong.
        message: String,
    },

    /// `invoke(...)` used on an engine without an action invoker.
    #[error("no action invoker is configured")]
    NoActionInvoker,

    /// The injected action invoker reported a failure.
    #[error("action `{action}` failed: {message}")]
    Action {
        /// Action name.
        action: String,
        /// Failure reported by the invoker.
        message: String,
    },

    /// A sub-template rendered through `executeTemplate` failed.
    #[error(transparent)]
    Render(Box<RenderError>),
}

/// Error loading template or directive definitions.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    /// XML parsing error.
    #[error("XML parse error")]
    Xml(#[from] quick_xml::Error),

    /// Encoding error during XML parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Document ended inside an element.
    #[error("unclosed element <{0}>")]
    UnclosedElement(String),

    /// Definitions file could not be read.
    #[error("failed to read definitions from {}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A bulk-load was triggered but no definition source is configured.
    #[error("no template definition sources are configured")]
    NoSources,

    /// Malformed `<template>`, `<directive>` or `<attr-directive>` entry.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// Script body that does not compile.
    #[error("invalid script in {owner}")]
    Script {
        /// Declaration that owns the script.
        owner: String,
        /// Compilation error.
        #[source]
        source: ExprError,
    },
}

/// Error raised while rendering a template.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template is registered under this name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// No custom element directive is registered for this tag.
    #[error("unknown directive <{0}>")]
    UnknownDirective(String),

    /// No attribute directive is registered under this name.
    #[error("unknown attribute directive `{0}`")]
    UnknownAttrDirective(String),

    /// Control tag without one of its required attributes.
    #[error("<{tag}> is missing required attribute `{attr}`")]
    MissingAttribute {
        /// Control tag name.
        tag: String,
        /// Missing attribute.
        attr: String,
    },

    /// Custom element directive instantiated without a declared-required attribute.
    #[error("directive <{tag}> requires attribute `{attr}`")]
    MissingDirectiveAttribute {
        /// Directive tag name.
        tag: String,
        /// Missing attribute.
        attr: String,
    },

    /// `else-if` or `else` with no preceding conditional.
    #[error("<{0}> used without matching <if>")]
    UnmatchedChain(String),

    /// `set-var` / `exe-script` target without the `_` prefix.
    #[error("<{tag}> variable `{name}` must start with `_`")]
    InvalidVariableName {
        /// Control tag name.
        tag: String,
        /// Rejected variable name.
        name: String,
    },

    /// `for` bound that is not an integer.
    #[error("<{tag}> attribute `{attr}` is not an integer: {value}")]
    InvalidInteger {
        /// Control tag name.
        tag: String,
        /// Attribute name.
        attr: String,
        /// Resolved value.
        value: String,
    },

    /// `break` or `continue` reached the template root.
    #[error("break/continue used outside of a loop")]
    LoopControlOutsideLoop,

    /// Expression failure promoted by strict mode or raised by a script.
    #[error("expression `{expr}` failed")]
    Expression {
        /// Expression source.
        expr: String,
        /// Evaluation error.
        #[source]
        source: ExprError,
    },

    /// Directive post-script or attribute directive script failed.
    #[error("script of {owner} failed")]
    Script {
        /// Directive that owns the script.
        owner: String,
        /// Evaluation error.
        #[source]
        source: ExprError,
    },

    /// Strict mode placeholder that produced no value.
    #[error("expression `{0}` produced no value")]
    MissingValue(String),

    /// Sub-template nesting deeper than the configured limit.
    #[error("template nesting exceeds {0} levels")]
    DepthExceeded(usize),

    /// Definitions could not be loaded on demand.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Uniform wrapper for any failure escaping a template render.
    #[error("template processing failed: {name}")]
    TemplateFailed {
        /// Template being rendered.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Innermost error, looking through [`RenderError::TemplateFailed`] wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &RenderError {
        match self {
            Self::TemplateFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<RenderError> for ExprError {
    fn from(err: RenderError) -> Self {
        Self::Render(Box::new(err))
    }
}
