use crate::Position;
use thiserror::Error;

/// A source position that matches no token pattern.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexical Error at {position}: {message}")]
pub struct LexicalError {
    pub message: String,
    pub position: Position,
}

impl LexicalError {
    pub fn new(message: impl ToString, position: Position) -> Self {
        Self {
            message: message.to_string(),
            position,
        }
    }
}

/// Represents a syntax error: the token stream violates the grammar.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax Error at {position}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub position: Position,
}

impl SyntaxError {
    /// Create a new syntax error with the specified `message` and `position`.
    pub fn new(message: impl ToString, position: Position) -> Self {
        Self {
            message: message.to_string(),
            position,
        }
    }
}

/// An error raised while evaluating a program.
///
/// Value coercions create it without a position; the evaluator stamps the
/// position of the innermost node being evaluated with [`RuntimeError::at`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Runtime Error at {position}: {message}")]
pub struct RuntimeError {
    pub message: String,
    pub position: Position,
}

impl RuntimeError {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
            position: Position::NONE,
        }
    }

    /// Sets the position unless one is already set.
    pub fn at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = position;
        }
        self
    }
}

/// Unwinds an evaluation. Native functions return it so that a re-entrant
/// call can carry a cancellation back out without disguising it as an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Abort {
    Error(RuntimeError),
    Cancelled,
    /// An internal invariant was violated. Never caused by user input.
    Fatal(String),
}

impl Abort {
    /// Stamps `position` onto a positionless runtime error.
    pub fn at(self, position: Position) -> Self {
        match self {
            Abort::Error(err) => Abort::Error(err.at(position)),
            other => other,
        }
    }
}

impl From<RuntimeError> for Abort {
    fn from(err: RuntimeError) -> Self {
        Abort::Error(err)
    }
}

/// Everything that can stop `execute`, ordered by phase.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// The host asked the evaluation to stop. This is not a failure of the script.
    #[error("Execution cancelled")]
    Cancelled,
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl EvalError {
    /// Position of the offending source, if the error has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            EvalError::Lexical(err) => Some(err.position),
            EvalError::Syntax(err) => Some(err.position),
            EvalError::Runtime(err) => Some(err.position),
            EvalError::Cancelled | EvalError::Fatal(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EvalError::Cancelled)
    }
}

impl From<Abort> for EvalError {
    fn from(abort: Abort) -> Self {
        match abort {
            Abort::Error(err) => EvalError::Runtime(err),
            Abort::Cancelled => EvalError::Cancelled,
            Abort::Fatal(message) => EvalError::Fatal(message),
        }
    }
}
