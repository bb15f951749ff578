//! The restricted `when`/`skip_if` expression language (spec §4.6.a):
//! tokenizer, recursive-descent parser, and total evaluator over a
//! resolved variable map.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod token;

pub use ast::{BinOp, Expr, UnOp, FUNCTION_WHITELIST};
pub use eval::{eval, eval_bool};
pub use parser::{parse, ParseError};
pub use token::{tokenize, LexError, Token};

use rcp_core::VariableMap;

/// Parse and evaluate `src` as a boolean in one call — the shape the
/// scheduler and parser both want for `when`/`skip_if`.
pub fn evaluate(src: &str, variables: &VariableMap) -> Result<bool, ParseError> {
    let expr = parse(src)?;
    Ok(eval_bool(&expr, variables))
}

/// Parse `src` purely for validation, discarding the AST (§4.1 "`when`
/// expressions parse under the restricted grammar").
pub fn validate(src: &str) -> Result<(), ParseError> {
    parse(src).map(|_| ())
}
