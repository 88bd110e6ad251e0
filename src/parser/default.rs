use crate::ast::{Ast, CommandNode, Node, RedirectKind, SyntaxError};
use crate::lexer::Token;
use crate::parser::Parser;
use crate::parser::classify;

/// Single-pass parser over a token slice.
///
/// Each step looks at the token under the cursor and dispatches to one
/// handler; the loop stops at the end of input or at the first syntax error.
pub struct DefaultParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ast: Ast,
}

impl<'a> Parser for DefaultParser<'a> {
    fn parse(&mut self) -> Ast {
        if self.tokens.is_empty() {
            self.ast.fail(SyntaxError::Empty, None);
        }
        while self.pos < self.tokens.len() && self.ast.is_ok() {
            self.step();
        }
        std::mem::take(&mut self.ast)
    }
}

impl<'a> DefaultParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        DefaultParser {
            tokens,
            pos: 0,
            ast: Ast::new(),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_next(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos + 1)
    }

    fn step(&mut self) {
        let Some(token) = self.peek() else {
            return;
        };
        if classify::is_group_opener(token) {
            if let Some(group) = self.parse_group() {
                self.attach(group);
            }
        } else if classify::is_group_closer(token) {
            self.ast.fail(SyntaxError::UnexpectedToken, Some(token.as_str()));
        } else if classify::is_pipe(token) {
            self.parse_pipe();
        } else if classify::is_redirection(token) {
            self.parse_redirection();
        } else if self.focus_is_command() {
            self.parse_argument(token.as_str());
        } else {
            self.parse_command();
        }
    }

    /// True when the most recently attached unit is a command that can take
    /// more arguments.
    fn focus_is_command(&self) -> bool {
        self.ast
            .root
            .as_ref()
            .is_some_and(|root| root.last().focus().as_command().is_some())
    }

    fn attach(&mut self, node: Node) {
        match self.ast.root.as_mut() {
            Some(root) => root.append(node),
            None => self.ast.root = Some(node),
        }
    }

    fn take_words(&mut self) -> Vec<String> {
        let mut words = Vec::new();
        while let Some(token) = self.peek().filter(|t| classify::is_word(t)) {
            words.push(token.as_str().to_string());
            self.pos += 1;
        }
        words
    }

    fn parse_command(&mut self) {
        if let Some(command) = CommandNode::from_words(self.take_words()) {
            self.attach(Node::command(command));
        }
    }

    fn parse_argument(&mut self, token: &str) {
        if let Some(command) = self
            .ast
            .root
            .as_mut()
            .and_then(|root| root.last_mut().focus_mut().as_command_mut())
        {
            command.push_arg(token);
        }
        self.pos += 1;
    }

    /// Parses `( ... )` starting at the cursor into a subshell node.
    fn parse_group(&mut self) -> Option<Node> {
        let tokens = self.tokens;
        let open = self.pos;
        let Some(close) = matching_close(tokens, open) else {
            self.ast.fail(SyntaxError::UnclosedSubshell, None);
            return None;
        };
        self.pos = close + 1;

        let inner = &tokens[open + 1..close];
        if inner.is_empty() {
            self.ast.fail(SyntaxError::UnexpectedToken, Some(tokens[close].as_str()));
            return None;
        }
        let sub = DefaultParser::new(inner).parse();
        if !sub.is_ok() {
            self.ast.fail(sub.syntax_error, sub.error_token.as_deref());
            return None;
        }
        sub.root.map(Node::subshell)
    }

    fn parse_pipe(&mut self) {
        if self.ast.root.is_none() {
            self.ast.fail(SyntaxError::MissingCommand, Some("|"));
            return;
        }
        self.pos += 1;
        match self.peek() {
            None => {
                self.ast.fail(SyntaxError::MissingCommand, None);
                return;
            }
            Some(token) if classify::is_operator(token) => {
                self.ast.fail(SyntaxError::MissingCommand, Some(token.as_str()));
                return;
            }
            Some(_) => {}
        }
        let Some(stage) = self.parse_stage() else {
            return;
        };
        if let Some(root) = self.ast.root.as_mut() {
            root.last_mut().fold_pipe(stage);
        }
    }

    /// Right-hand side of a pipe: a command or group plus the redirections
    /// written directly after it.
    fn parse_stage(&mut self) -> Option<Node> {
        let token = self.peek()?;
        let mut stage = if classify::is_group_opener(token) {
            self.parse_group()?
        } else {
            match CommandNode::from_words(self.take_words()) {
                Some(command) => Node::command(command),
                None => {
                    self.ast.fail(SyntaxError::UnexpectedToken, Some(token.as_str()));
                    return None;
                }
            }
        };
        while self.peek().is_some_and(classify::is_redirection) {
            let (kind, target) = self.redirection_target()?;
            stage.wrap_redirection(kind, target);
        }
        Some(stage)
    }

    /// Validates the operator under the cursor and its target, consuming both.
    fn redirection_target(&mut self) -> Option<(RedirectKind, String)> {
        let kind = RedirectKind::from_token(self.peek()?.as_str())?;
        match self.peek_next() {
            None => {
                self.ast.fail(SyntaxError::UnexpectedToken, None);
                None
            }
            Some(target) if !classify::is_word(target) => {
                self.ast.fail(SyntaxError::UnexpectedToken, Some(target.as_str()));
                None
            }
            Some(target) => {
                self.pos += 2;
                Some((kind, target.as_str().to_string()))
            }
        }
    }

    fn parse_redirection(&mut self) {
        if self.ast.root.is_none() {
            let op = self.peek().map(Token::as_str);
            self.ast.fail(SyntaxError::UnexpectedToken, op);
            return;
        }
        let Some((kind, target)) = self.redirection_target() else {
            return;
        };
        if let Some(root) = self.ast.root.as_mut() {
            root.last_mut().stage_mut().wrap_redirection(kind, target);
        }
    }
}

/// Index of the `)` matching the `(` at `open`, counting nesting depth.
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if classify::is_group_opener(token) {
            depth += 1;
        } else if classify::is_group_closer(token) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
