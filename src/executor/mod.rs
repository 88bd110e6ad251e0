pub mod builtin;
mod default_executor;
pub mod heredoc;
pub mod path_resolver;
pub mod process;
pub mod redirect;
pub mod stage;

pub use default_executor::DefaultExecutor;

use crate::ast::Ast;
use crate::error::ExecError;
use crate::io::LineReader;
use crate::shell::ShellState;

pub trait Executor {
    /// Runs every top-level unit of `ast` and blocks until all of their
    /// processes have been reaped. `input` supplies heredoc bodies.
    ///
    /// Returns the final exit status, which is also stored in
    /// `shell.exit_status`.
    fn execute(
        &mut self,
        ast: &Ast,
        shell: &mut ShellState,
        input: &mut dyn LineReader,
    ) -> Result<i32, ExecError>;
}
