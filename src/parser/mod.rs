pub mod classify;
pub mod default;

use crate::ast::Ast;
use crate::lexer::Token;
use crate::parser::default::DefaultParser;

pub trait Parser {
    /// Builds the tree for one input line. Malformed input is reported through
    /// `Ast::syntax_error`, never by panicking.
    fn parse(&mut self) -> Ast;
}

pub fn parse(tokens: &[Token]) -> Ast {
    DefaultParser::new(tokens).parse()
}
