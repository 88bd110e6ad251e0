//! Token predicates. Only unquoted operator tokens classify as operators;
//! quoted text reaches the parser as a word whatever it spells.

use crate::lexer::Token;

pub fn is_pipe(token: &Token) -> bool {
    matches!(token, Token::Operator("|"))
}

pub fn is_redirection(token: &Token) -> bool {
    matches!(token, Token::Operator("<" | ">" | ">>" | "<<"))
}

pub fn is_operator(token: &Token) -> bool {
    is_pipe(token) || is_redirection(token)
}

pub fn is_group_opener(token: &Token) -> bool {
    matches!(token, Token::Operator("("))
}

pub fn is_group_closer(token: &Token) -> bool {
    matches!(token, Token::Operator(")"))
}

/// A token that can be part of a command's word list.
pub fn is_word(token: &Token) -> bool {
    matches!(token, Token::Word(_))
}
