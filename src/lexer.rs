//! Splits a raw input line into word and operator tokens, handling quotes and
//! `$` expansion along the way.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::shell::ShellState;

/// One lexed token. Text that came from quotes is always a `Word`, even when
/// it spells an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Operator(&'static str),
}

impl Token {
    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(text) => text,
            Token::Operator(op) => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unclosed quote `{0}'")]
    UnclosedQuote(char),
}

pub struct Lexer<'a> {
    shell: &'a ShellState,
}

/// Word being accumulated. `quoted` records whether any quote contributed to
/// it, so `""` still yields a token while an empty `$UNSET` does not.
#[derive(Default)]
struct Word {
    buf: String,
    quoted: bool,
    started: bool,
}

impl Word {
    fn push(&mut self, ch: char) {
        self.buf.push(ch);
        self.started = true;
    }

    fn push_str(&mut self, s: &str) {
        self.buf.push_str(s);
        self.started = true;
    }

    fn flush(&mut self, tokens: &mut Vec<Token>) {
        if !self.buf.is_empty() || self.quoted {
            tokens.push(Token::Word(std::mem::take(&mut self.buf)));
        }
        *self = Word::default();
    }
}

impl<'a> Lexer<'a> {
    pub fn new(shell: &'a ShellState) -> Self {
        Lexer { shell }
    }

    pub fn tokenize(&self, line: &str) -> Result<Vec<Token>, LexError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut chars = line.chars().peekable();
        let mut word = Word::default();

        while let Some(&ch) = chars.peek() {
            // Heredoc delimiters are compared raw, so they skip expansion.
            let expand = tokens.last() != Some(&Token::Operator("<<"));
            match ch {
                ' ' | '\t' | '\n' => {
                    word.flush(&mut tokens);
                    chars.next();
                }
                '|' | '(' | ')' => {
                    word.flush(&mut tokens);
                    chars.next();
                    tokens.push(Token::Operator(match ch {
                        '|' => "|",
                        '(' => "(",
                        _ => ")",
                    }));
                }
                '<' | '>' => {
                    word.flush(&mut tokens);
                    chars.next();
                    let doubled = chars.next_if_eq(&ch).is_some();
                    tokens.push(Token::Operator(match (ch, doubled) {
                        ('<', false) => "<",
                        ('<', true) => "<<",
                        (_, false) => ">",
                        (_, true) => ">>",
                    }));
                }
                '\'' => {
                    chars.next();
                    word.quoted = true;
                    word.started = true;
                    self.read_quoted(&mut chars, &mut word, '\'', false)?;
                }
                '"' => {
                    chars.next();
                    word.quoted = true;
                    word.started = true;
                    self.read_quoted(&mut chars, &mut word, '"', expand)?;
                }
                '$' if expand => {
                    chars.next();
                    self.expand_variable(&mut chars, &mut word);
                }
                '~' if !word.started && expand => {
                    chars.next();
                    match chars.peek() {
                        None | Some('/' | ' ' | '\t' | '\n' | '|' | '<' | '>' | '(' | ')') => {
                            word.push_str(self.shell.env.get("HOME").unwrap_or("~"));
                        }
                        Some(_) => word.push('~'),
                    }
                }
                _ => {
                    word.push(ch);
                    chars.next();
                }
            }
        }
        word.flush(&mut tokens);
        Ok(tokens)
    }

    fn read_quoted(
        &self,
        chars: &mut Peekable<Chars<'_>>,
        word: &mut Word,
        quote: char,
        expand: bool,
    ) -> Result<(), LexError> {
        while let Some(ch) = chars.next() {
            if ch == quote {
                return Ok(());
            }
            if ch == '$' && expand {
                self.expand_variable(chars, word);
            } else {
                word.push(ch);
            }
        }
        Err(LexError::UnclosedQuote(quote))
    }

    /// Expands the name after a `$` that has already been consumed.
    fn expand_variable(&self, chars: &mut Peekable<Chars<'_>>, word: &mut Word) {
        match chars.peek() {
            Some('?') => {
                chars.next();
                word.push_str(&self.shell.exit_status.to_string());
            }
            Some(&c) if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c != '_' && !c.is_ascii_alphanumeric() {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if let Some(value) = self.shell.env.get(&name) {
                    word.push_str(value);
                }
            }
            _ => word.push('$'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn shell() -> ShellState {
        let mut env = Environment::default();
        env.set("HOME", "/home/user");
        env.set("NAME", "world");
        env.set("SPACED", "a b");
        let mut shell = ShellState::new(env);
        shell.exit_status = 42;
        shell
    }

    fn lex(src: &str) -> Vec<String> {
        Lexer::new(&shell())
            .tokenize(src)
            .unwrap()
            .iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_words_and_operators() {
        assert_eq!(lex("ls -l|wc>out"), vec!["ls", "-l", "|", "wc", ">", "out"]);
        assert_eq!(lex("cat<<EOF >>log"), vec!["cat", "<<", "EOF", ">>", "log"]);
        assert_eq!(lex("(echo hi)"), vec!["(", "echo", "hi", ")"]);
        assert!(lex("   \t ").is_empty());
    }

    #[test]
    fn test_quotes() {
        assert_eq!(lex("echo 'a | b' \"c  d\""), vec!["echo", "a | b", "c  d"]);
        assert_eq!(lex("echo \"\" x"), vec!["echo", "", "x"]);
        assert_eq!(lex("echo ab'cd'\"ef\""), vec!["echo", "abcdef"]);
    }

    #[test]
    fn test_variable_expansion() {
        assert_eq!(lex("echo $NAME"), vec!["echo", "world"]);
        assert_eq!(lex("echo \"hi $NAME!\""), vec!["echo", "hi world!"]);
        assert_eq!(lex("echo '$NAME'"), vec!["echo", "$NAME"]);
        assert_eq!(lex("echo $?"), vec!["echo", "42"]);
        assert_eq!(lex("echo $ x$"), vec!["echo", "$", "x$"]);
        assert_eq!(lex("echo \"$SPACED\""), vec!["echo", "a b"]);
    }

    #[test]
    fn test_unset_variable_drops_word() {
        assert_eq!(lex("echo $MISSING end"), vec!["echo", "end"]);
        assert_eq!(lex("echo \"$MISSING\""), vec!["echo", ""]);
    }

    #[test]
    fn test_tilde() {
        assert_eq!(lex("cd ~"), vec!["cd", "/home/user"]);
        assert_eq!(lex("ls ~/src"), vec!["ls", "/home/user/src"]);
        assert_eq!(lex("echo a~ ~x '~'"), vec!["echo", "a~", "~x", "~"]);
    }

    #[test]
    fn test_heredoc_delimiter_is_raw() {
        assert_eq!(lex("cat << $NAME"), vec!["cat", "<<", "$NAME"]);
        assert_eq!(lex("cat << \"$NAME\""), vec!["cat", "<<", "$NAME"]);
    }

    #[test]
    fn test_quoted_operators_are_words() {
        let tokens = Lexer::new(&shell()).tokenize("echo '>' \"|\" x>>y '(' )").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("echo".into()),
                Token::Word(">".into()),
                Token::Word("|".into()),
                Token::Word("x".into()),
                Token::Operator(">>"),
                Token::Word("y".into()),
                Token::Word("(".into()),
                Token::Operator(")"),
            ]
        );
    }

    #[test]
    fn test_unclosed_quote() {
        let err = Lexer::new(&shell()).tokenize("echo \"abc").unwrap_err();
        assert_eq!(err, LexError::UnclosedQuote('"'));
        let err = Lexer::new(&shell()).tokenize("echo 'abc").unwrap_err();
        assert_eq!(err, LexError::UnclosedQuote('\''));
    }
}
