//! `${...}` placeholder handling.
//!
//! Attribute values and text nodes are compiled once into an
//! [`Interpolation`]: literal runs interleaved with compiled placeholders.
//! At render time an interpolation either yields a typed value (the whole
//! string is a single placeholder) or a string with every placeholder
//! substituted. The distinction is carried by [`Evaluated`].
//!
//! A placeholder ending in `$` (`${name$}`) renders falsy results as the
//! empty string instead of `null`.

use serde_json::Value;

use super::ast::Expr;
use super::eval::{Scope, evaluate};
use super::parser::parse_expression;
use crate::error::{ExprError, RenderError};
use crate::markup::{escape_attr, escape_text};
use crate::value::ValueExt;

/// Result of resolving an interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    /// The source was exactly one placeholder; this is its typed result.
    Value(Value),
    /// The source mixed literal text and placeholders (or had none).
    Text(String),
}

impl Evaluated {
    /// Truthiness used by conditional control tags.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Value(value) => value.is_truthy(),
            Self::Text(text) => !text.is_empty(),
        }
    }

    /// String form of the result.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Value(value) => value.render_to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    /// Convert into a value; text becomes a string value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}

/// How literal text and substituted values are escaped on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escape {
    /// Raw substitution (control attribute resolution).
    None,
    /// Text node content.
    Text,
    /// Attribute value inside double quotes.
    Attribute,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone)]
struct Placeholder {
    source: String,
    coerce: bool,
    compiled: Result<Expr, String>,
}

impl Placeholder {
    fn compile(inner: &str) -> Self {
        let trimmed = inner.trim();
        let (body, coerce) = match trimmed.strip_suffix('$') {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };
        Self {
            source: body.to_owned(),
            coerce,
            compiled: parse_expression(body).map_err(|e| e.to_string()),
        }
    }

    /// Evaluate the placeholder. `Ok(None)` is a logged, recovered failure.
    fn evaluate(&self, scope: &mut dyn Scope, strict: bool) -> Result<Option<Value>, RenderError> {
        let result = match &self.compiled {
            Ok(expr) => evaluate(expr, scope),
            Err(message) => Err(ExprError::Syntax(message.clone())),
        };

        match result {
            Ok(Value::Null) if strict && !self.coerce => {
                Err(RenderError::MissingValue(self.source.clone()))
            }
            Ok(value) => Ok(Some(value)),
            Err(ExprError::Render(inner)) => Err(*inner),
            Err(source) if strict => Err(RenderError::Expression {
                expr: self.source.clone(),
                source,
            }),
            Err(error) => {
                tracing::warn!(expr = %self.source, error = %error, "Expression evaluation failed");
                Ok(None)
            }
        }
    }

    fn text(&self, value: Option<Value>) -> String {
        match value {
            Some(value) if !(self.coerce && !value.is_truthy()) => value.render_to_string(),
            _ => String::new(),
        }
    }
}

/// Compiled attribute value or text content.
#[derive(Debug, Clone, Default)]
pub struct Interpolation {
    segments: Vec<Segment>,
}

impl Interpolation {
    /// Compile raw (entity-decoded) text into literal and placeholder segments.
    ///
    /// A `${` with no closing brace is kept as literal text. Placeholders
    /// that fail to parse are kept too; they fail softly at render time.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(start) = rest.find("${") {
            let inner_start = start + 2;
            let Some(len) = closing_brace(&rest[inner_start..]) else {
                break;
            };
            literal.push_str(&rest[..start]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let inner = &rest[inner_start..inner_start + len];
            segments.push(Segment::Placeholder(Placeholder::compile(inner)));
            rest = &rest[inner_start + len + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// True when there are no placeholders.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// True when the source is empty or whitespace-only literal text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Literal(text) => text.trim().is_empty(),
            Segment::Placeholder(_) => false,
        })
    }

    /// Resolve to a typed value or an interpolated string.
    ///
    /// With `strict` set, a placeholder that fails or yields `null` aborts
    /// with an error naming the expression instead of rendering empty.
    pub fn resolve(&self, scope: &mut dyn Scope, strict: bool) -> Result<Evaluated, RenderError> {
        match self.segments.as_slice() {
            [] => Ok(Evaluated::Text(String::new())),
            [Segment::Placeholder(placeholder)] => {
                let value = placeholder.evaluate(scope, strict)?;
                Ok(Evaluated::Value(match value {
                    Some(value) if !(placeholder.coerce && !value.is_truthy()) => value,
                    _ if placeholder.coerce => Value::String(String::new()),
                    _ => Value::Null,
                }))
            }
            _ => self
                .render(scope, strict, Escape::None, false)
                .map(Evaluated::Text),
        }
    }

    /// Substitute every placeholder into a string.
    ///
    /// Literal runs are re-escaped for the output position; substituted
    /// values only when `escape_values` is set.
    pub(crate) fn render(
        &self,
        scope: &mut dyn Scope,
        strict: bool,
        escape: Escape,
        escape_values: bool,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            segment.render(scope, strict, escape, escape_values, &mut out)?;
        }
        Ok(out)
    }

    /// Like [`render`](Self::render), but hands each segment to `emit` as
    /// soon as it is ready, so output written by a placeholder lands between
    /// the segments around it.
    pub(crate) fn render_streamed<S: Scope>(
        &self,
        scope: &mut S,
        strict: bool,
        escape: Escape,
        escape_values: bool,
        mut emit: impl FnMut(&mut S, &str),
    ) -> Result<(), RenderError> {
        let mut piece = String::new();
        for segment in &self.segments {
            piece.clear();
            segment.render(&mut *scope, strict, escape, escape_values, &mut piece)?;
            emit(scope, &piece);
        }
        Ok(())
    }
}

impl Segment {
    fn render(
        &self,
        scope: &mut dyn Scope,
        strict: bool,
        escape: Escape,
        escape_values: bool,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match self {
            Self::Literal(text) => push_escaped(out, text, escape),
            Self::Placeholder(placeholder) => {
                let value = placeholder.evaluate(scope, strict)?;
                let text = placeholder.text(value);
                if escape_values {
                    push_escaped(out, &text, escape);
                } else {
                    out.push_str(&text);
                }
            }
        }
        Ok(())
    }
}

fn push_escaped(out: &mut String, text: &str, escape: Escape) {
    match escape {
        Escape::None => out.push_str(text),
        Escape::Text => escape_text(text, out),
        Escape::Attribute => escape_attr(text, out),
    }
}

/// Byte offset of the `}` closing a placeholder, skipping quoted strings.
fn closing_brace(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Default)]
    struct Vars(HashMap<String, Value>);

    impl Vars {
        fn with(mut self, name: &str, value: Value) -> Self {
            self.0.insert(name.to_owned(), value);
            self
        }
    }

    impl Scope for Vars {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }

        fn assign(&mut self, name: &str, value: Value) {
            self.0.insert(name.to_owned(), value);
        }

        fn call(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, ExprError> {
            Err(ExprError::NotCallable(name.to_owned()))
        }
    }

    #[test]
    fn test_whole_placeholder_is_typed() {
        let mut vars = Vars::default().with("items", json!(["a", "b"]));
        let result = Interpolation::parse("${items}").resolve(&mut vars, false);
        assert_eq!(result.unwrap(), Evaluated::Value(json!(["a", "b"])));
    }

    #[test]
    fn test_whitespace_makes_it_text() {
        let mut vars = Vars::default().with("n", json!(5));
        let result = Interpolation::parse(" ${n}").resolve(&mut vars, false);
        assert_eq!(result.unwrap(), Evaluated::Text(" 5".to_owned()));
    }

    #[test]
    fn test_mixed_interpolation() {
        let mut vars = Vars::default().with("i", json!(0)).with("it", json!("a"));
        let result = Interpolation::parse("${i}:${it} ").resolve(&mut vars, false);
        assert_eq!(result.unwrap(), Evaluated::Text("0:a ".to_owned()));
    }

    #[test]
    fn test_empty_source_is_empty_text() {
        let mut vars = Vars::default();
        let result = Interpolation::parse("").resolve(&mut vars, false);
        assert_eq!(result.unwrap(), Evaluated::Text(String::new()));
    }

    #[test]
    fn test_literal_text_unchanged() {
        let mut vars = Vars::default().with("x", json!(1));
        let interp = Interpolation::parse("plain $ text {x} $notaplaceholder");
        assert!(interp.is_literal());
        let text = interp.render(&mut vars, false, Escape::None, false).unwrap();
        assert_eq!(text, "plain $ text {x} $notaplaceholder");
    }

    #[test]
    fn test_unclosed_placeholder_is_literal() {
        let mut vars = Vars::default();
        let interp = Interpolation::parse("a ${b");
        assert!(interp.is_literal());
        assert_eq!(
            interp.render(&mut vars, false, Escape::None, false).unwrap(),
            "a ${b"
        );
    }

    #[test]
    fn test_null_renders_marker_without_sigil() {
        let mut vars = Vars::default();
        let text = Interpolation::parse("[${missing}]")
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "[null]");
    }

    #[test]
    fn test_sigil_coerces_falsy_to_empty() {
        let mut vars = Vars::default().with("zero", json!(0));
        let text = Interpolation::parse("[${missing$}|${zero$}]")
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "[|]");

        let whole = Interpolation::parse("${missing$}").resolve(&mut vars, false);
        assert_eq!(whole.unwrap(), Evaluated::Value(json!("")));
    }

    #[test]
    fn test_failed_placeholder_renders_empty() {
        let mut vars = Vars::default();
        let text = Interpolation::parse("a${nothing.field}b")
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "ab");

        let whole = Interpolation::parse("${nothing.field}").resolve(&mut vars, false);
        assert_eq!(whole.unwrap(), Evaluated::Value(Value::Null));
    }

    #[test]
    fn test_strict_mode_names_failed_expression() {
        let mut vars = Vars::default();
        let err = Interpolation::parse("${nothing.field}")
            .resolve(&mut vars, true)
            .unwrap_err();
        assert!(matches!(err, RenderError::Expression { ref expr, .. } if expr == "nothing.field"));
    }

    #[test]
    fn test_strict_mode_rejects_missing_value() {
        let mut vars = Vars::default();
        let err = Interpolation::parse("Hello ${name}")
            .render(&mut vars, true, Escape::None, false)
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingValue(ref expr) if expr == "name"));
    }

    #[test]
    fn test_syntax_error_is_soft() {
        let mut vars = Vars::default();
        let text = Interpolation::parse("x${a +}y")
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "xy");
    }

    #[test]
    fn test_quoted_brace_inside_placeholder() {
        let mut vars = Vars::default();
        let text = Interpolation::parse("${'}'}!")
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "}!");
    }

    #[test]
    fn test_escaping() {
        let mut vars = Vars::default().with("v", json!("<b> & \"q\""));
        let text = Interpolation::parse("a & ${v}")
            .render(&mut vars, false, Escape::Text, true)
            .unwrap();
        assert_eq!(text, "a &amp; &lt;b> &amp; \"q\"");

        let attr = Interpolation::parse("${v}")
            .render(&mut vars, false, Escape::Attribute, true)
            .unwrap();
        assert_eq!(attr, "<b> &amp; &quot;q&quot;");

        let raw = Interpolation::parse("${v}")
            .render(&mut vars, false, Escape::Text, false)
            .unwrap();
        assert_eq!(raw, "<b> & \"q\"");
    }

    #[test]
    fn test_blank_detection() {
        assert!(Interpolation::parse("  \n\t").is_blank());
        assert!(!Interpolation::parse(" x ").is_blank());
        assert!(!Interpolation::parse("${a}").is_blank());
    }

    #[test]
    fn test_evaluated_helpers() {
        assert!(Evaluated::Text("x".to_owned()).is_truthy());
        assert!(!Evaluated::Text(String::new()).is_truthy());
        assert!(!Evaluated::Value(json!(0)).is_truthy());
        assert_eq!(Evaluated::Value(json!(3)).to_text(), "3");
        assert_eq!(
            Evaluated::Text("t".to_owned()).into_value(),
            json!("t")
        );
    }

    /// Scope whose `mark()` function writes straight to the output.
    #[derive(Default)]
    struct Writer {
        out: String,
    }

    impl Scope for Writer {
        fn lookup(&self, _name: &str) -> Option<Value> {
            None
        }

        fn assign(&mut self, _name: &str, _value: Value) {}

        fn call(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, ExprError> {
            self.out.push_str("[mark]");
            Ok(json!(name))
        }
    }

    #[test]
    fn test_streamed_render_interleaves_side_output() {
        let mut writer = Writer::default();
        Interpolation::parse("a ${mark()} b")
            .render_streamed(&mut writer, false, Escape::Text, false, |w, piece| {
                w.out.push_str(piece);
            })
            .unwrap();
        assert_eq!(writer.out, "a [mark]mark b");
    }

    #[test]
    fn test_deeply_nested_placeholder_is_soft() {
        let mut vars = Vars::default();
        let src = format!("x${{{}1{}}}y", "(".repeat(5000), ")".repeat(5000));
        let text = Interpolation::parse(&src)
            .render(&mut vars, false, Escape::None, false)
            .unwrap();
        assert_eq!(text, "xy");
    }
}
