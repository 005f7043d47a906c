//! Recursive descent parser for expressions and scripts.
//!
//! Precedence, lowest first: `,` then `?:`, `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, postfix.

use serde_json::Value;

use super::ast::{BinaryOp, Expr, LogicalOp, Script, Stmt, UnaryOp};
use super::lexer::{Spanned, Token, tokenize};
use crate::error::ExprError;
use crate::value::number;

/// Deepest expression tree the parser accepts, counting both operator
/// nesting and bracket nesting.
pub const MAX_NESTING: usize = 64;

/// Parse a single expression. Trailing tokens are an error.
pub fn parse_expression(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(tokenize(src)?);
    let (expr, _) = parser.sequence()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a `;`-separated script.
///
/// Assignment targets must start with `_` so script-set variables never
/// shadow input or reserved context fields.
pub fn parse_script(src: &str) -> Result<Script, ExprError> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut statements = Vec::new();

    loop {
        while parser.eat(&Token::Semicolon) {}
        if parser.at_end() {
            break;
        }
        statements.push(parser.statement()?);
        if !parser.at_end() && !parser.eat(&Token::Semicolon) {
            return Err(parser.unexpected());
        }
    }

    Ok(Script { statements })
}

/// A parsed subtree with its height.
type Parsed = (Expr, usize);

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Open `conditional`/`unary` frames.
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExprError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_end(&self) -> Result<(), ExprError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some(spanned) => ExprError::UnexpectedToken {
                found: spanned.token.describe(),
                offset: spanned.offset,
            },
            None => ExprError::UnexpectedEnd,
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Parsed, ExprError>,
    ) -> Result<Parsed, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep());
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn statement(&mut self) -> Result<Stmt, ExprError> {
        let is_let = matches!(self.peek(), Some(Token::Ident(kw)) if kw == "let");
        let target_at = usize::from(is_let);

        if let (Some(Token::Ident(name)), Some(Token::Assign)) =
            (self.peek_at(target_at), self.peek_at(target_at + 1))
        {
            let name = name.clone();
            if !name.starts_with('_') {
                return Err(ExprError::InvalidAssignment(name));
            }
            self.pos += target_at + 2;
            let (value, _) = self.conditional()?;
            return Ok(Stmt::Assign { name, value });
        }

        if is_let {
            self.pos += 1;
            return Err(self.unexpected());
        }

        Ok(Stmt::Expr(self.sequence()?.0))
    }

    fn sequence(&mut self) -> Result<Parsed, ExprError> {
        let first = self.conditional()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut height = first.1;
        let mut items = vec![first.0];
        while self.eat(&Token::Comma) {
            let (item, item_height) = self.conditional()?;
            height = height.max(item_height);
            items.push(item);
        }
        node(Expr::Sequence(items), height)
    }

    fn conditional(&mut self) -> Result<Parsed, ExprError> {
        self.nested(|p| {
            let (test, test_height) = p.logical_or()?;
            if !p.eat(&Token::Question) {
                return Ok((test, test_height));
            }
            let (consequent, consequent_height) = p.conditional()?;
            p.expect(&Token::Colon)?;
            let (alternate, alternate_height) = p.conditional()?;
            node(
                Expr::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                test_height.max(consequent_height).max(alternate_height),
            )
        })
    }

    fn logical_or(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.logical_and()?;
            left = logical(LogicalOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = logical(LogicalOp::And, left, right)?;
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.relational()?;
            left = binary(op, left, right)?;
        }
    }

    fn relational(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = binary(op, left, right)?;
        }
    }

    fn additive(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Parsed, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right)?;
        }
    }

    fn unary(&mut self) -> Result<Parsed, ExprError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let (operand, height) = self.nested(Self::unary)?;
        node(
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            height,
        )
    }

    fn postfix(&mut self) -> Result<Parsed, ExprError> {
        let (mut expr, mut height) = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(property)) => {
                            (expr, height) = node(
                                Expr::Member {
                                    object: Box::new(expr),
                                    property,
                                },
                                height,
                            )?;
                        }
                        Some(_) => {
                            self.pos -= 1;
                            return Err(self.unexpected());
                        }
                        None => return Err(ExprError::UnexpectedEnd),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let (index, index_height) = self.sequence()?;
                    self.expect(&Token::RBracket)?;
                    (expr, height) = node(
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        height.max(index_height),
                    )?;
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let (args, args_height) = self.arguments(&Token::RParen)?;
                    (expr, height) = node(
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        height.max(args_height),
                    )?;
                }
                _ => return Ok((expr, height)),
            }
        }
    }

    /// Comma-separated items up to `close`, which is consumed. Returns the
    /// items with the height of the tallest one.
    fn arguments(&mut self, close: &Token) -> Result<(Vec<Expr>, usize), ExprError> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.eat(close) {
            return Ok((args, height));
        }
        loop {
            let (arg, arg_height) = self.conditional()?;
            height = height.max(arg_height);
            args.push(arg);
            if self.eat(close) {
                return Ok((args, height));
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Parsed, ExprError> {
        let Some(token) = self.advance() else {
            return Err(ExprError::UnexpectedEnd);
        };
        let leaf = match token {
            Token::Number(n) => Expr::Literal(number(n)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            },
            Token::LParen => {
                let inner = self.sequence()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => {
                let (items, height) = self.arguments(&Token::RBracket)?;
                return node(Expr::Array(items), height);
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
        };
        Ok((leaf, 1))
    }
}

/// Wrap `expr` as a node one level above its tallest child.
fn node(expr: Expr, child_height: usize) -> Result<Parsed, ExprError> {
    let height = child_height + 1;
    if height > MAX_NESTING {
        return Err(too_deep());
    }
    Ok((expr, height))
}

fn too_deep() -> ExprError {
    ExprError::Syntax(format!(
        "expression nested deeper than {MAX_NESTING} levels"
    ))
}

fn binary(op: BinaryOp, (left, lh): Parsed, (right, rh): Parsed) -> Result<Parsed, ExprError> {
    node(
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        lh.max(rh),
    )
}

fn logical(op: LogicalOp, (left, lh): Parsed, (right, rh): Parsed) -> Result<Parsed, ExprError> {
    node(
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        lh.max(rh),
    )
}
