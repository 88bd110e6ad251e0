use crate::environment::Environment;

/// Shell-wide mutable state, passed explicitly to the lexer, the executor and
/// the builtins.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub env: Environment,
    /// Status of the most recent top-level command, read back through `$?`.
    pub exit_status: i32,
    exit_request: Option<i32>,
}

impl ShellState {
    pub fn new(env: Environment) -> Self {
        ShellState {
            env,
            exit_status: 0,
            exit_request: None,
        }
    }

    /// Asks the main loop to terminate with `code` once the current command
    /// finishes.
    pub fn request_exit(&mut self, code: i32) {
        self.exit_request = Some(code);
    }

    pub fn exit_requested(&self) -> Option<i32> {
        self.exit_request
    }
}
