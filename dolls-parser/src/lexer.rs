use std::fmt;

use dolls_source::{LexicalError, Position};
use log::trace;
use logos::Logos;

#[derive(Debug, Logos, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // arithmetics
    #[token("+")]
    Plus,
    #[token("-")]
    Minus, // NOTE: can also be unary
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[token("%")]
    Mod,

    // ordering and equality
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,

    // logic
    #[token("&")]
    And,
    /// Logical or, and the delimiter of a function's parameter list.
    #[token("|")]
    Bar,
    #[token("!")]
    Not,

    // assignment
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    ModAssign,

    // punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,

    // literals
    #[regex("[_a-zA-Z][_a-zA-Z0-9]*")]
    Id,
    #[regex(r"[0-9]+\.[0-9]+")]
    #[regex(r"[0-9]+(\.[0-9]+)?[eE][+-]?[0-9]+")]
    Float,
    #[regex("[0-9]+")]
    Int,
    /// Raw text keeps the quotes and the escaping backslashes.
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    Str,

    // keywords, remapped from `Id` after matching
    Nil,
    False,
    True,
    If,
    Elif,
    Else,
    While,

    // misc
    #[regex(r"[ \t\r\f]+", logos::skip)]
    #[regex(r"#[^\n]*", logos::skip)] // line comments
    #[error]
    Error,

    /// Appended by [`tokenize`] after the last line.
    Eof,
}

impl TokenKind {
    /// Returns the keyword spelled `ident`, if any.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        match ident {
            "nil" => Some(TokenKind::Nil),
            "false" => Some(TokenKind::False),
            "true" => Some(TokenKind::True),
            "if" => Some(TokenKind::If),
            "elif" => Some(TokenKind::Elif),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            _ => None,
        }
    }

    /// How the token kind is named in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Mul => "'*'",
            TokenKind::Div => "'/'",
            TokenKind::Mod => "'%'",
            TokenKind::Lt => "'<'",
            TokenKind::Le => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::Ge => "'>='",
            TokenKind::Eq => "'=='",
            TokenKind::Ne => "'!='",
            TokenKind::And => "'&'",
            TokenKind::Bar => "'|'",
            TokenKind::Not => "'!'",
            TokenKind::Assign => "'='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::MulAssign => "'*='",
            TokenKind::DivAssign => "'/='",
            TokenKind::ModAssign => "'%='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Id => "identifier",
            TokenKind::Float => "float literal",
            TokenKind::Int => "integer literal",
            TokenKind::Str => "string literal",
            TokenKind::Nil => "'nil'",
            TokenKind::False => "'false'",
            TokenKind::True => "'true'",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A lexeme with its kind and the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({}:{}){:?}: {}]",
            self.pos.line, self.pos.column, self.kind, self.text
        )
    }
}

/// Converts source text into tokens, line by line.
/// The result always ends with a single [`TokenKind::Eof`] token placed at
/// `(line_count, 0)`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    let mut tokens = Vec::new();
    let mut line_count = 0;

    for (index, line) in source.split('\n').enumerate() {
        let line_no = index + 1;
        line_count = line_no;

        let mut lexer = TokenKind::lexer(line);
        while let Some(kind) = lexer.next() {
            let span = lexer.span();
            let text = lexer.slice();
            let pos = Position::new(line_no, line[..span.start].chars().count() + 1);

            let kind = match kind {
                TokenKind::Error => {
                    let message = if text.starts_with('"') {
                        "Unterminated string literal".to_string()
                    } else {
                        format!("'{}'", text.chars().next().unwrap_or(' '))
                    };
                    return Err(LexicalError::new(message, pos));
                }
                TokenKind::Id => TokenKind::keyword(text).unwrap_or(TokenKind::Id),
                kind => kind,
            };

            let token = Token {
                kind,
                text: text.to_string(),
                pos,
            };
            trace!("lexed {}", token);
            tokens.push(token);
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        pos: Position::new(line_count, 0),
    });
    Ok(tokens)
}
