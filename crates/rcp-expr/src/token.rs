//! Tokenizer for the restricted `when`/`skip_if` grammar (spec §4.6.a).

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Bool(bool),
    Number(f64),
    String(String),
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    EqEq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    AndAnd,
    OrOr,
    Bang,
    In,
    Plus,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Bool(b) => write!(f, "{b}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::String(s) => write!(f, "{s:?}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::GtEq => write!(f, ">="),
            Token::LtEq => write!(f, "<="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::In => write!(f, "in"),
            Token::Plus => write!(f, "+"),
            Token::Eof => write!(f, "<eof>"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unexpected character '{0}' at offset {1}")]
pub struct LexError(pub char, pub usize);

pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(LexError(quote, i));
                }
                i += 1; // closing quote
                tokens.push(Token::String(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text.parse().map_err(|_| LexError(c, start))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let tok = match text.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "in" => Token::In,
                    _ => Token::Ident(text),
                };
                tokens.push(tok);
            }
            other => return Err(LexError(other, i)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_comparison_and_logical_operators() {
        let tokens = tokenize("a == 1 && b != \"x\"").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::EqEq,
                Token::Number(1.0),
                Token::AndAnd,
                Token::Ident("b".into()),
                Token::NotEq,
                Token::String("x".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(tokenize("a == @").is_err());
    }

    #[test]
    fn recognizes_in_keyword_distinct_from_identifier() {
        let tokens = tokenize("x in list").unwrap();
        assert_eq!(tokens[1], Token::In);
    }
}
