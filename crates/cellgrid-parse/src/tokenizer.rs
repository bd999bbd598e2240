//! Formula tokenizer.
//!
//! Splits an expression into numbers, cell tokens, operators, and
//! parentheses. ASCII whitespace separates tokens and is dropped; anything
//! the grammar does not know is a `TokenizerError` carrying the byte offset.

use std::error::Error;
use std::fmt::{self, Display};

const OPERATOR_BYTES: &str = "+-*/()";

const fn build_operator_table() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = OPERATOR_BYTES.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static OPERATOR_TABLE: [bool; 256] = build_operator_table();

#[inline(always)]
fn is_operator_byte(c: u8) -> bool {
    OPERATOR_TABLE[c as usize]
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    Cell,
    Plus,
    Minus,
    Star,
    Slash,
    OpenParen,
    CloseParen,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token in a formula, with its source text and byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?}>", self.kind, self.text)
    }
}

/// A custom error type for the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError: {} at offset {}", self.message, self.pos)
    }
}

impl Error for TokenizerError {}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(formula: &'a str) -> Self {
        Self {
            input: formula.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizerError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.input.get(self.pos) {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if is_operator_byte(c) {
                let kind = match c {
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'(' => TokenKind::OpenParen,
                    _ => TokenKind::CloseParen,
                };
                tokens.push(Token::new(kind, (c as char).to_string(), self.pos));
                self.pos += 1;
            } else if c.is_ascii_digit() {
                tokens.push(self.read_number()?);
            } else if c.is_ascii_uppercase() {
                tokens.push(self.read_cell()?);
            } else {
                return Err(self.error(format!("unexpected character {:?}", c as char)));
            }
        }
        Ok(tokens)
    }

    /// `NUMBER := [0-9]+ ('.' [0-9]+)? (('e'|'E') ('+'|'-')? [0-9]+)?`
    fn read_number(&mut self) -> Result<Token, TokenizerError> {
        let start = self.pos;
        self.take_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.take_digits() == 0 {
                return Err(self.error("expected digits after decimal point".to_string()));
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.take_digits() == 0 {
                return Err(self.error("expected digits in exponent".to_string()));
            }
        }
        Ok(self.token_from(TokenKind::Number, start))
    }

    /// `CELL := [A-Z]+[0-9]+`
    fn read_cell(&mut self) -> Result<Token, TokenizerError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_uppercase()) {
            self.pos += 1;
        }
        if self.take_digits() == 0 {
            return Err(self.error("expected row digits after column letters".to_string()));
        }
        Ok(self.token_from(TokenKind::Cell, start))
    }

    fn take_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn token_from(&self, kind: TokenKind, start: usize) -> Token {
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .expect("token bytes are ASCII")
            .to_string();
        Token {
            kind,
            text,
            start,
        }
    }

    fn error(&self, message: String) -> TokenizerError {
        TokenizerError {
            message,
            pos: self.pos,
        }
    }
}

/// Tokenize a whole formula in one call.
pub fn tokenize(formula: &str) -> Result<Vec<Token>, TokenizerError> {
    Tokenizer::new(formula).tokenize()
}
