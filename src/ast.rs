//! Command tree produced by the parser and consumed by the executor.
//!
//! Ownership is strictly parent to child. The parser navigates the tree it is
//! building through short-lived `&mut` borrows (see [`Node::last_mut`] and
//! [`Node::focus_mut`]) instead of storing back-pointers.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Input,
    Output,
    Append,
    Heredoc,
}

impl RedirectKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectKind::Input),
            ">" => Some(RedirectKind::Output),
            ">>" => Some(RedirectKind::Append),
            "<<" => Some(RedirectKind::Heredoc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RedirectKind::Input => "<",
            RedirectKind::Output => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Heredoc => "<<",
        }
    }
}

/// A simple command. `args[0]` is always a copy of `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandNode {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandNode {
    /// Builds a command from its words; `None` when there are no words.
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        let name = words.first()?.clone();
        Some(CommandNode { name, args: words })
    }

    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Command(CommandNode),
    Pipe {
        left: Box<Node>,
        right: Box<Node>,
    },
    Redirection {
        kind: RedirectKind,
        target: String,
        child: Box<Node>,
    },
    Subshell {
        child: Box<Node>,
    },
}

/// A tree node plus an optional list sibling.
///
/// `next` is only populated for top-level units (and the top-level units of a
/// subshell body). Nested pipe operands and redirection children never carry
/// siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub next: Option<Box<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node { kind, next: None }
    }

    pub fn command(command: CommandNode) -> Self {
        Node::new(NodeKind::Command(command))
    }

    pub fn pipe(left: Node, right: Node) -> Self {
        Node::new(NodeKind::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn redirection(kind: RedirectKind, target: impl Into<String>, child: Node) -> Self {
        Node::new(NodeKind::Redirection {
            kind,
            target: target.into(),
            child: Box::new(child),
        })
    }

    pub fn subshell(child: Node) -> Self {
        Node::new(NodeKind::Subshell {
            child: Box::new(child),
        })
    }

    pub fn as_command(&self) -> Option<&CommandNode> {
        match &self.kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        }
    }

    pub fn as_command_mut(&mut self) -> Option<&mut CommandNode> {
        match &mut self.kind {
            NodeKind::Command(command) => Some(command),
            _ => None,
        }
    }

    /// Iterates over this node and every sibling linked through `next`.
    pub fn siblings(&self) -> Siblings<'_> {
        Siblings { current: Some(self) }
    }

    pub fn last(&self) -> &Node {
        let mut node = self;
        while let Some(next) = node.next.as_deref() {
            node = next;
        }
        node
    }

    pub fn last_mut(&mut self) -> &mut Node {
        match self.next {
            Some(ref mut next) => next.last_mut(),
            None => self,
        }
    }

    /// Links `node` at the end of the sibling list.
    pub fn append(&mut self, node: Node) {
        self.last_mut().next = Some(Box::new(node));
    }

    /// The node a following redirection applies to: the right-most pipeline
    /// stage, or the node itself outside a pipe.
    pub fn stage_mut(&mut self) -> &mut Node {
        match self.kind {
            NodeKind::Pipe { ref mut right, .. } => right.stage_mut(),
            _ => self,
        }
    }

    /// The innermost unit reached through pipe right-hand sides and
    /// redirection children: a command or a subshell.
    pub fn focus(&self) -> &Node {
        match &self.kind {
            NodeKind::Pipe { right, .. } => right.focus(),
            NodeKind::Redirection { child, .. } => child.focus(),
            _ => self,
        }
    }

    pub fn focus_mut(&mut self) -> &mut Node {
        match self.kind {
            NodeKind::Pipe { ref mut right, .. } => right.focus_mut(),
            NodeKind::Redirection { ref mut child, .. } => child.focus_mut(),
            _ => self,
        }
    }

    /// Moves the payload out, leaving an empty command in its place.
    pub fn take_kind(&mut self) -> NodeKind {
        std::mem::replace(&mut self.kind, NodeKind::Command(CommandNode::default()))
    }

    /// Wraps the current payload in a redirection; the sibling link stays on
    /// the outer node.
    pub fn wrap_redirection(&mut self, kind: RedirectKind, target: impl Into<String>) {
        let inner = Node::new(self.take_kind());
        self.kind = NodeKind::Redirection {
            kind,
            target: target.into(),
            child: Box::new(inner),
        };
    }

    /// Replaces the payload with `Pipe(<old payload>, right)`.
    pub fn fold_pipe(&mut self, right: Node) {
        let left = Node::new(self.take_kind());
        self.kind = NodeKind::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        };
    }
}

pub struct Siblings<'a> {
    current: Option<&'a Node>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.next.as_deref();
        Some(node)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.siblings().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            match &node.kind {
                NodeKind::Command(command) => write!(f, "Command({})", command.args.join(" "))?,
                NodeKind::Pipe { left, right } => write!(f, "Pipe({left}, {right})")?,
                NodeKind::Redirection {
                    kind,
                    target,
                    child,
                } => write!(f, "Redirect({} {target}, {child})", kind.as_str())?,
                NodeKind::Subshell { child } => write!(f, "Subshell({child})")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyntaxError {
    #[default]
    Ok,
    Empty,
    UnexpectedToken,
    MissingOperator,
    MissingCommand,
    UnclosedQuote,
    UnclosedSubshell,
    CommandNotFound,
}

impl SyntaxError {
    pub fn is_ok(self) -> bool {
        self == SyntaxError::Ok
    }

    /// Human-readable diagnostic. `token` is the offending token, if any.
    pub fn message(self, token: Option<&str>) -> Option<String> {
        let msg = match self {
            SyntaxError::Ok => return None,
            SyntaxError::Empty => "syntax error: empty command".to_string(),
            SyntaxError::UnexpectedToken => {
                format!("syntax error near unexpected token `{}'", token.unwrap_or("newline"))
            }
            SyntaxError::MissingOperator => "syntax error: missing operator".to_string(),
            SyntaxError::MissingCommand => {
                format!("syntax error near unexpected token `{}'", token.unwrap_or("|"))
            }
            SyntaxError::UnclosedQuote => "syntax error: unclosed quote".to_string(),
            SyntaxError::UnclosedSubshell => "syntax error: unclosed subshell".to_string(),
            SyntaxError::CommandNotFound => token.unwrap_or_default().to_string(),
        };
        Some(msg)
    }
}

/// The parse result for one input line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ast {
    pub root: Option<Node>,
    pub syntax_error: SyntaxError,
    pub error_token: Option<String>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn is_ok(&self) -> bool {
        self.syntax_error.is_ok()
    }

    /// Records a syntax error. Only the first error of a parse is kept.
    pub fn fail(&mut self, error: SyntaxError, token: Option<&str>) {
        if self.is_ok() {
            self.syntax_error = error;
            self.error_token = token.map(str::to_string);
        }
    }

    pub fn diagnostic(&self) -> Option<String> {
        self.syntax_error.message(self.error_token.as_deref())
    }

    /// Drops the whole tree and resets the error state. Safe to call any
    /// number of times.
    pub fn clear(&mut self) {
        self.root = None;
        self.syntax_error = SyntaxError::Ok;
        self.error_token = None;
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.root, self.diagnostic()) {
            (_, Some(msg)) => write!(f, "<{msg}>"),
            (Some(root), None) => write!(f, "{root}"),
            (None, None) => write!(f, "<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(words: &[&str]) -> Node {
        Node::command(CommandNode::from_words(words.iter().map(|w| w.to_string()).collect()).unwrap())
    }

    #[test]
    fn test_command_args_start_with_name() {
        let node = cmd(&["ls", "-l"]);
        let command = node.as_command().unwrap();
        assert_eq!(command.name, "ls");
        assert_eq!(command.args, vec!["ls", "-l"]);
        assert!(CommandNode::from_words(Vec::new()).is_none());
    }

    #[test]
    fn test_wrap_redirection_keeps_sibling_outside() {
        let mut node = cmd(&["a"]);
        node.append(cmd(&["b"]));
        node.wrap_redirection(RedirectKind::Output, "out");
        match &node.kind {
            NodeKind::Redirection { child, target, .. } => {
                assert_eq!(target, "out");
                assert!(child.next.is_none());
                assert_eq!(child.as_command().unwrap().name, "a");
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(node.siblings().count(), 2);
    }

    #[test]
    fn test_focus_descends_pipes_and_redirections() {
        let mut node = Node::pipe(cmd(&["a"]), Node::redirection(RedirectKind::Input, "f", cmd(&["b"])));
        assert_eq!(node.focus().as_command().unwrap().name, "b");
        node.focus_mut().as_command_mut().unwrap().push_arg("x");
        assert_eq!(node.focus().as_command().unwrap().args, vec!["b", "x"]);

        let sub = Node::subshell(cmd(&["c"]));
        assert!(matches!(sub.focus().kind, NodeKind::Subshell { .. }));
    }

    #[test]
    fn test_fold_pipe_is_left_associative() {
        let mut node = cmd(&["a"]);
        node.fold_pipe(cmd(&["b"]));
        node.fold_pipe(cmd(&["c"]));
        assert_eq!(node, Node::pipe(Node::pipe(cmd(&["a"]), cmd(&["b"])), cmd(&["c"])));
        assert_eq!(node.to_string(), "Pipe(Pipe(Command(a), Command(b)), Command(c))");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut ast = Ast::new();
        ast.root = Some(Node::subshell(cmd(&["echo", "hi"])));
        ast.fail(SyntaxError::UnexpectedToken, Some(")"));
        ast.clear();
        ast.clear();
        assert_eq!(ast, Ast::new());

        let mut empty = Ast::new();
        empty.clear();
        assert!(empty.root.is_none());
    }

    #[test]
    fn test_first_error_wins() {
        let mut ast = Ast::new();
        ast.fail(SyntaxError::MissingCommand, None);
        ast.fail(SyntaxError::UnexpectedToken, Some(">"));
        assert_eq!(ast.syntax_error, SyntaxError::MissingCommand);
        assert_eq!(ast.diagnostic().unwrap(), "syntax error near unexpected token `|'");
    }

    #[test]
    fn test_messages() {
        assert_eq!(SyntaxError::Ok.message(None), None);
        assert_eq!(
            SyntaxError::UnexpectedToken.message(None).unwrap(),
            "syntax error near unexpected token `newline'"
        );
        assert_eq!(
            SyntaxError::UnclosedSubshell.message(None).unwrap(),
            "syntax error: unclosed subshell"
        );
        assert_eq!(SyntaxError::CommandNotFound.message(Some("foo")).unwrap(), "foo");
    }
}
