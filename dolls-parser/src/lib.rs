pub mod lexer;
pub mod parser;
pub mod printer;

pub use dolls_value::ast;

use dolls_source::EvalError;

/// Lexes and parses `source`.
pub fn parse_source(source: &str) -> Result<ast::Program, EvalError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse(tokens)?)
}
