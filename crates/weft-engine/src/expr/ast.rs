//! Expression and script AST.

use serde_json::Value;

/// Compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value (`1`, `'text'`, `true`, `null`).
    Literal(Value),
    /// Array literal (`[a, b]`).
    Array(Vec<Expr>),
    /// Variable reference resolved against the rendering context.
    Ident(String),
    /// Property access (`object.property`).
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// Bracket indexing (`object[index]`).
    Index { object: Box<Expr>, index: Box<Expr> },
    /// Function or method call.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Prefix operator.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Arithmetic, comparison or equality operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuiting `&&` / `||`.
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `test ? consequent : alternate`.
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Comma sequence; evaluates to the last item.
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Script statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let _name = value` or `_name = value`.
    Assign { name: String, value: Expr },
    /// Bare expression.
    Expr(Expr),
}

/// Compiled script: `;`-separated statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Stmt>,
}

impl Script {
    /// True when the script has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
