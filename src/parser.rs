//! Parser for grammar rules written as strings.
//!
//! A rule has a left-hand side, an arrow and one or two right-hand symbols:
//!
//! ```text
//! verb --> verb_qualifier verb
//! subject --> I
//! ```
//!
//! Symbols are separated by whitespace and may contain any other character,
//! so `do-not` and `a-lot` are single symbols.
//!
//! # Example
//!
//! ```rust
//! use rbn_rust::parser::{parse_production, Production};
//!
//! let rule = parse_production("S --> NP VP").unwrap();
//! assert_eq!(rule, Production::binary("S", "NP", "VP"));
//! ```

use std::fmt;
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;

/// Parser error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty rule")]
    Empty,
    #[error("expected '-->' after {0}")]
    MissingArrow(String),
    #[error("rule has no left-hand side")]
    MissingLhs,
    #[error("rule for {0} has no right-hand side")]
    MissingRhs(String),
    #[error("rule for {lhs} has {count} right-hand symbols, expected 1 or 2")]
    TooManySymbols { lhs: String, count: usize },
    #[error("unexpected '-->' in rule for {0}")]
    UnexpectedArrow(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A grammar production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Production {
    /// `lhs --> symbol`, emitting a terminal.
    Unary { lhs: String, symbol: String },
    /// `lhs --> left right`, splitting into two non-terminals.
    Binary {
        lhs: String,
        left: String,
        right: String,
    },
}

impl Production {
    pub fn unary(lhs: impl Into<String>, symbol: impl Into<String>) -> Self {
        Production::Unary {
            lhs: lhs.into(),
            symbol: symbol.into(),
        }
    }

    pub fn binary(
        lhs: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Production::Binary {
            lhs: lhs.into(),
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn lhs(&self) -> &str {
        match self {
            Production::Unary { lhs, .. } | Production::Binary { lhs, .. } => lhs,
        }
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Production::Unary { lhs, symbol } => write!(f, "{} --> {}", lhs, symbol),
            Production::Binary { lhs, left, right } => {
                write!(f, "{} --> {} {}", lhs, left, right)
            }
        }
    }
}

impl FromStr for Production {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        parse_production(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Symbol(&'a str),
    Arrow,
    Eof,
}

/// Lexer over whitespace-separated tokens.
struct Lexer<'a> {
    words: SplitWhitespace<'a>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Lexer {
            words: input.split_whitespace(),
        }
    }

    fn next_token(&mut self) -> Token<'a> {
        match self.words.next() {
            None => Token::Eof,
            Some("-->") => Token::Arrow,
            Some(word) => Token::Symbol(word),
        }
    }
}

/// Parser for a single rule.
struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Parser { lexer, current }
    }

    fn advance(&mut self) -> Token<'a> {
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    fn parse_production(&mut self) -> ParseResult<Production> {
        let lhs = match self.advance() {
            Token::Symbol(s) => s.to_string(),
            Token::Arrow => return Err(ParseError::MissingLhs),
            Token::Eof => return Err(ParseError::Empty),
        };

        if self.advance() != Token::Arrow {
            return Err(ParseError::MissingArrow(lhs));
        }

        let mut rhs = Vec::new();
        loop {
            match self.advance() {
                Token::Symbol(s) => rhs.push(s),
                Token::Arrow => return Err(ParseError::UnexpectedArrow(lhs)),
                Token::Eof => break,
            }
        }

        match rhs.as_slice() {
            [] => Err(ParseError::MissingRhs(lhs)),
            [symbol] => Ok(Production::unary(lhs, *symbol)),
            [left, right] => Ok(Production::binary(lhs, *left, *right)),
            _ => Err(ParseError::TooManySymbols {
                lhs,
                count: rhs.len(),
            }),
        }
    }
}

/// Parse a single rule from a string.
pub fn parse_production(input: &str) -> ParseResult<Production> {
    Parser::new(input).parse_production()
}
