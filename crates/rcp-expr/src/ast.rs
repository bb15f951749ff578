//! The expression AST produced by the parser and walked by the evaluator.

use rcp_core::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Ident(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// A whitelisted function call (§4.6.a): `length`, `empty`, `startsWith`,
    /// `endsWith`. No other callee name is ever produced by the parser.
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    And,
    Or,
    In,
    Add,
}

/// The fixed whitelist of callable functions (§4.6.a). Anything else is a
/// parse error, never an evaluation-time one — the grammar is total.
pub const FUNCTION_WHITELIST: &[&str] = &["length", "empty", "startsWith", "endsWith"];
