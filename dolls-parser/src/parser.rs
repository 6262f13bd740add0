//! Recursive descent parser with one token of lookahead.

mod expr;
mod stmt;

use crate::ast::Program;
use crate::lexer::{Token, TokenKind};
use dolls_source::{Position, SyntaxError};
use log::debug;

/// Deepest nesting of blocks and operands accepted before `Nesting too deep`.
pub const MAX_NESTING_DEPTH: usize = 1000;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub struct Parser {
    tokens: Vec<Token>,
    /// Index of the current token. Never moves past the trailing EOF token.
    read_ptr: usize,
    /// Current nesting of blocks and unary operands.
    depth: usize,
}

impl Parser {
    /// Create a parser over `tokens` as produced by [`crate::lexer::tokenize`].
    /// A missing trailing EOF token is supplied.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|token| token.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(0, |token| token.pos.line);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                pos: Position::new(line, 0),
            });
        }
        Self {
            tokens,
            read_ptr: 0,
            depth: 0,
        }
    }
}

impl Parser {
    /// Parses the whole token stream.
    pub fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let mut statements = Vec::new();
        while self.peek() != TokenKind::Eof {
            statements.push(self.parse_stmt()?);
        }
        debug!("parsed {} top level statements", statements.len());
        Ok(Program::new(statements))
    }
}

/// Parses a complete token stream into a [`Program`].
pub fn parse(tokens: Vec<Token>) -> Result<Program, SyntaxError> {
    Parser::new(tokens).parse_program()
}

/// Parse utilities
impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.read_ptr]
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    /// Consumes the current token, whatever it is.
    fn next_any(&mut self) -> Token {
        let token = self.tokens[self.read_ptr].clone();
        if self.read_ptr < self.tokens.len() - 1 {
            self.read_ptr += 1;
        }
        token
    }

    /// Predicate that tests whether the current token is of kind `kind` and eats it if yes as a side effect.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.next_any();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.peek() == kind {
            Ok(self.next_any())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(SyntaxError::new("Nesting too deep", self.current().pos));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || f(self));
        self.depth -= 1;
        result
    }

    /// Raises an unexpected token error at the current token.
    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => TokenKind::Eof.describe().to_string(),
            _ => format!("'{}'", token.text),
        };
        SyntaxError::new(format!("Expected {}, found {}", expected, found), token.pos)
    }
}
