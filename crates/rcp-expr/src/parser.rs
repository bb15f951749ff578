//! Recursive-descent parser over the token stream, precedence climbing
//! from `||` (loosest) down through `&&`, equality, relational/`in`,
//! additive `+`, unary `!`, to primaries.

use rcp_core::Value;

use crate::ast::{BinOp, Expr, UnOp, FUNCTION_WHITELIST};
use crate::token::{tokenize, Token};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] crate::token::LexError),
    #[error("unexpected token {found}, expected {expected}")]
    Unexpected { found: Token, expected: String },
    #[error("unknown function '{0}' (only length, empty, startsWith, endsWith are allowed)")]
    UnknownFunction(String),
    #[error("trailing input after expression: {0}")]
    TrailingInput(Token),
}

pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    let tok = parser.peek().clone();
    if tok != Token::Eof {
        return Err(ParseError::TrailingInput(tok));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token, label: &str) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                found: self.peek().clone(),
                expected: label.to_string(),
            })
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::OrOr {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while *self.peek() == Token::AndAnd {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Gt => BinOp::Gt,
                Token::Lt => BinOp::Lt,
                Token::GtEq => BinOp::GtEq,
                Token::LtEq => BinOp::LtEq,
                Token::In => BinOp::In,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while *self.peek() == Token::Plus {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if *self.peek() == Token::Bang {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Bool(b) => Ok(Expr::Literal(Value::Bool(b))),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::String(s) => Ok(Expr::Literal(Value::String(s))),
            Token::LBracket => {
                let mut items = Vec::new();
                if *self.peek() != Token::RBracket {
                    items.push(self.parse_or()?);
                    while *self.peek() == Token::Comma {
                        self.advance();
                        items.push(self.parse_or()?);
                    }
                }
                self.expect(&Token::RBracket, "]")?;
                Ok(Expr::Array(items))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, ")")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if *self.peek() == Token::LParen {
                    self.advance();
                    if !FUNCTION_WHITELIST.contains(&name.as_str()) {
                        return Err(ParseError::UnknownFunction(name));
                    }
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        args.push(self.parse_or()?);
                        while *self.peek() == Token::Comma {
                            self.advance();
                            args.push(self.parse_or()?);
                        }
                    }
                    self.expect(&Token::RParen, ")")?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "an expression".to_string(),
            }),
        }
    }
}
