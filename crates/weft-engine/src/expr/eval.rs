//! Expression evaluator.
//!
//! Evaluates compiled expressions against a [`Scope`]. The scope is the
//! only way an expression can reach variables or call out to the host, so
//! evaluation never executes arbitrary code.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{BinaryOp, Expr, LogicalOp, Script, Stmt, UnaryOp};
use crate::error::ExprError;
use crate::value::{ValueExt, number};

/// Variables and callable functions visible to an expression.
pub trait Scope {
    /// Look up a variable. `None` means the name is unbound.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Bind a variable (used by script assignments).
    fn assign(&mut self, name: &str, value: Value);

    /// Call a named function with already-evaluated arguments.
    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ExprError>;
}

/// Evaluate an expression.
pub fn evaluate(expr: &Expr, scope: &mut dyn Scope) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Ident(name) => Ok(scope.lookup(name).unwrap_or(Value::Null)),
        Expr::Member { object, property } => {
            let target = evaluate(object, scope)?;
            member(&target, property)
        }
        Expr::Index { object, index } => {
            let target = evaluate(object, scope)?;
            let key = evaluate(index, scope)?;
            index_value(&target, &key)
        }
        Expr::Call { callee, args } => call(callee, args, scope),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, scope)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Neg => number(-value.to_number()),
            })
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            Ok(binary(*op, &left, &right))
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, scope)?;
            match (op, left.is_truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => evaluate(right, scope),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, scope)?.is_truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Sequence(items) => {
            let mut last = Value::Null;
            for item in items {
                last = evaluate(item, scope)?;
            }
            Ok(last)
        }
    }
}

/// Execute a script, returning the value of its last statement.
pub fn execute(script: &Script, scope: &mut dyn Scope) -> Result<Value, ExprError> {
    let mut last = Value::Null;
    for statement in &script.statements {
        last = match statement {
            Stmt::Assign { name, value } => {
                let value = evaluate(value, scope)?;
                scope.assign(name, value.clone());
                value
            }
            Stmt::Expr(expr) => evaluate(expr, scope)?,
        };
    }
    Ok(last)
}

fn member(target: &Value, property: &str) -> Result<Value, ExprError> {
    match target {
        Value::Null => Err(ExprError::NullAccess(property.to_owned())),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::from(items.len())),
        Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn index_value(target: &Value, key: &Value) -> Result<Value, ExprError> {
    let position = || {
        let n = key.to_number();
        (n.fract() == 0.0 && n >= 0.0).then_some(n as usize)
    };
    match target {
        Value::Null => Err(ExprError::NullAccess(key.render_to_string())),
        Value::Array(items) => Ok(match position() {
            Some(i) => items.get(i).cloned().unwrap_or(Value::Null),
            None => member(target, &key.render_to_string())?,
        }),
        Value::String(s) => Ok(match position() {
            Some(i) => s
                .chars()
                .nth(i)
                .map_or(Value::Null, |c| Value::String(c.to_string())),
            None => member(target, &key.render_to_string())?,
        }),
        _ => member(target, &key.render_to_string()),
    }
}

fn call(callee: &Expr, args: &[Expr], scope: &mut dyn Scope) -> Result<Value, ExprError> {
    match callee {
        Expr::Ident(name) => {
            let args = evaluate_args(args, scope)?;
            scope.call(name, args)
        }
        Expr::Member { object, property } => {
            let receiver = evaluate(object, scope)?;
            let args = evaluate_args(args, scope)?;
            method(&receiver, property, &args)
        }
        _ => Err(ExprError::NotCallable("expression".to_owned())),
    }
}

fn evaluate_args(args: &[Expr], scope: &mut dyn Scope) -> Result<Vec<Value>, ExprError> {
    args.iter().map(|arg| evaluate(arg, scope)).collect()
}

fn string_arg(method: &str, args: &[Value], idx: usize) -> Result<String, ExprError> {
    args.get(idx)
        .map(ValueExt::render_to_string)
        .ok_or_else(|| ExprError::InvalidArguments {
            function: method.to_owned(),
            message: format!("expected at least {} argument(s)", idx + 1),
        })
}

/// Built-in methods on strings and arrays.
#[allow(clippy::cast_possible_wrap)]
fn method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let index_result = |found: Option<usize>| found.map_or(Value::from(-1), Value::from);

    match (receiver, name) {
        (Value::Null, _) => Err(ExprError::NullAccess(name.to_owned())),
        (_, "toString") => Ok(Value::String(receiver.render_to_string())),
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_owned())),
        (Value::String(s), "includes") => Ok(Value::Bool(s.contains(&string_arg(name, args, 0)?))),
        (Value::String(s), "startsWith") => {
            Ok(Value::Bool(s.starts_with(&string_arg(name, args, 0)?)))
        }
        (Value::String(s), "endsWith") => Ok(Value::Bool(s.ends_with(&string_arg(name, args, 0)?))),
        (Value::String(s), "indexOf") => {
            let needle = string_arg(name, args, 0)?;
            Ok(index_result(
                s.find(&needle).map(|byte| s[..byte].chars().count()),
            ))
        }
        (Value::String(s), "split") => {
            let separator = string_arg(name, args, 0)?;
            let parts = if separator.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str())
                    .map(|part| Value::String(part.to_owned()))
                    .collect()
            };
            Ok(Value::Array(parts))
        }
        (Value::Array(items), "join") => {
            let separator = match args.first() {
                Some(value) => value.render_to_string(),
                None => ",".to_owned(),
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        other => other.render_to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        (Value::Array(items), "includes") => {
            let needle = args.first().unwrap_or(&Value::Null);
            Ok(Value::Bool(items.iter().any(|item| strict_equals(item, needle))))
        }
        (Value::Array(items), "indexOf") => {
            let needle = args.first().unwrap_or(&Value::Null);
            Ok(index_result(
                items.iter().position(|item| strict_equals(item, needle)),
            ))
        }
        _ => Err(ExprError::UnknownMethod {
            method: name.to_owned(),
            type_name: receiver.type_name(),
        }),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let concat = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
            if concat(left) || concat(right) {
                let mut out = left.render_to_string();
                out.push_str(&right.render_to_string());
                Value::String(out)
            } else {
                number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => number(left.to_number() - right.to_number()),
        BinaryOp::Mul => number(left.to_number() * right.to_number()),
        BinaryOp::Div => number(left.to_number() / right.to_number()),
        BinaryOp::Rem => number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_equals(left, right)),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    left.to_number().partial_cmp(&right.to_number())
}

#[allow(clippy::float_cmp)]
fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

#[allow(clippy::float_cmp)]
fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::String(_)) => {
            left.to_number() == right.to_number()
        }
        _ => strict_equals(left, right),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::parser::{parse_expression, parse_script};
    use serde_json::json;

    #[derive(Default)]
    struct MapScope {
        vars: HashMap<String, Value>,
    }

    impl MapScope {
        fn with(mut self, name: &str, value: Value) -> Self {
            self.vars.insert(name.to_owned(), value);
            self
        }
    }

    impl Scope for MapScope {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }

        fn assign(&mut self, name: &str, value: Value) {
            self.vars.insert(name.to_owned(), value);
        }

        fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
            match name {
                "double" => Ok(number(args.first().map_or(0.0, ValueExt::to_number) * 2.0)),
                _ => Err(ExprError::NotCallable(name.to_owned())),
            }
        }
    }

    fn eval(src: &str, scope: &mut MapScope) -> Result<Value, ExprError> {
        evaluate(&parse_expression(src).unwrap(), scope)
    }

    #[test]
    fn test_comparison() {
        let mut scope = MapScope::default().with("_x", json!(10));
        assert_eq!(eval("_x > 5", &mut scope).unwrap(), json!(true));
        assert_eq!(eval("_x <= 5", &mut scope).unwrap(), json!(false));
    }

    #[test]
    fn test_member_and_index() {
        let mut scope = MapScope::default().with(
            "user",
            json!({"name": "Ada", "tags": ["a", "b"], "meta": {"k": 1}}),
        );
        assert_eq!(eval("user.name", &mut scope).unwrap(), json!("Ada"));
        assert_eq!(eval("user.tags[1]", &mut scope).unwrap(), json!("b"));
        assert_eq!(eval("user['meta'].k", &mut scope).unwrap(), json!(1));
        assert_eq!(eval("user.tags.length", &mut scope).unwrap(), json!(2));
        assert_eq!(eval("user.missing", &mut scope).unwrap(), Value::Null);
        assert_eq!(eval("user.tags[9]", &mut scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_unbound_identifier_is_null() {
        let mut scope = MapScope::default();
        assert_eq!(eval("nothing", &mut scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_property_of_null_fails() {
        let mut scope = MapScope::default();
        assert!(matches!(
            eval("nothing.field", &mut scope),
            Err(ExprError::NullAccess(ref p)) if p == "field"
        ));
    }

    #[test]
    fn test_arithmetic_and_concat() {
        let mut scope = MapScope::default().with("n", json!(3));
        assert_eq!(eval("n * 2 + 1", &mut scope).unwrap(), json!(7));
        assert_eq!(eval("7 / 2", &mut scope).unwrap(), json!(3.5));
        assert_eq!(eval("7 % 4", &mut scope).unwrap(), json!(3));
        assert_eq!(eval("'n=' + n", &mut scope).unwrap(), json!("n=3"));
        assert_eq!(eval("-n", &mut scope).unwrap(), json!(-3));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let mut scope = MapScope::default().with("name", json!(""));
        assert_eq!(eval("name || 'anon'", &mut scope).unwrap(), json!("anon"));
        assert_eq!(eval("name && 'x'", &mut scope).unwrap(), json!(""));
        assert_eq!(eval("!name", &mut scope).unwrap(), json!(true));
    }

    #[test]
    fn test_logical_short_circuit_skips_errors() {
        let mut scope = MapScope::default();
        assert_eq!(
            eval("false && nothing.field", &mut scope).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_equality() {
        let mut scope = MapScope::default();
        assert_eq!(eval("1 == '1'", &mut scope).unwrap(), json!(true));
        assert_eq!(eval("1 === '1'", &mut scope).unwrap(), json!(false));
        assert_eq!(eval("2 === 2.0", &mut scope).unwrap(), json!(true));
        assert_eq!(eval("null == undefined", &mut scope).unwrap(), json!(true));
        assert_eq!(eval("null == 0", &mut scope).unwrap(), json!(false));
        assert_eq!(eval("'a' != 'b'", &mut scope).unwrap(), json!(true));
    }

    #[test]
    fn test_string_comparison() {
        let mut scope = MapScope::default();
        assert_eq!(eval("'abc' < 'abd'", &mut scope).unwrap(), json!(true));
        assert_eq!(eval("'x' > 1", &mut scope).unwrap(), json!(false));
    }

    #[test]
    fn test_conditional_expression() {
        let mut scope = MapScope::default().with("count", json!(1));
        assert_eq!(
            eval("count == 1 ? 'item' : 'items'", &mut scope).unwrap(),
            json!("item")
        );
    }

    #[test]
    fn test_methods() {
        let mut scope = MapScope::default()
            .with("name", json!("  Ada  "))
            .with("list", json!(["a", "b", "c"]));
        assert_eq!(eval("name.trim()", &mut scope).unwrap(), json!("Ada"));
        assert_eq!(
            eval("name.trim().toUpperCase()", &mut scope).unwrap(),
            json!("ADA")
        );
        assert_eq!(eval("list.join('-')", &mut scope).unwrap(), json!("a-b-c"));
        assert_eq!(eval("list.indexOf('c')", &mut scope).unwrap(), json!(2));
        assert_eq!(eval("list.includes('z')", &mut scope).unwrap(), json!(false));
        assert_eq!(
            eval("'a,b'.split(',')", &mut scope).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(eval("(12).toString()", &mut scope).unwrap(), json!("12"));
    }

    #[test]
    fn test_unknown_method() {
        let mut scope = MapScope::default().with("n", json!(1));
        assert!(matches!(
            eval("n.explode()", &mut scope),
            Err(ExprError::UnknownMethod { type_name: "number", .. })
        ));
    }

    #[test]
    fn test_scope_function_call() {
        let mut scope = MapScope::default();
        assert_eq!(eval("double(21)", &mut scope).unwrap(), json!(42));
        assert!(matches!(
            eval("missing()", &mut scope),
            Err(ExprError::NotCallable(_))
        ));
    }

    #[test]
    fn test_script_assigns_and_returns_last() {
        let mut scope = MapScope::default().with("base", json!(2));
        let script = parse_script("let _a = base * 10; _b = _a + 1; _b - _a").unwrap();
        let result = execute(&script, &mut scope).unwrap();
        assert_eq!(result, json!(1));
        assert_eq!(scope.vars.get("_a"), Some(&json!(20)));
        assert_eq!(scope.vars.get("_b"), Some(&json!(21)));
    }

    #[test]
    fn test_empty_script_is_null() {
        let mut scope = MapScope::default();
        let script = parse_script("").unwrap();
        assert_eq!(execute(&script, &mut scope).unwrap(), Value::Null);
    }
}
