use std::collections::HashMap;
use std::io::{self, Write};

use crate::error::{ExecError, describe_io};
use crate::executor::builtin::commands::{
    CdCommand,
    EchoCommand,
    EnvCommand,
    ExitCommand,
    ExportCommand,
    PwdCommand,
    UnsetCommand,
};
use crate::executor::stage::Scope;
use crate::shell::ShellState;

/// What a builtin runs against: the shell state (or a scratch copy of it),
/// the sink its standard output goes to, and whether it runs isolated.
pub struct BuiltinContext<'a> {
    pub shell: &'a mut ShellState,
    pub out: &'a mut dyn Write,
    pub scope: Scope,
}

pub trait BuiltinCommand {
    fn name(&self) -> &'static str;
    /// `args[0]` is the command name. Diagnostics go to stderr; an `Err` is a
    /// failed write to `ctx.out`.
    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32>;
}

pub struct BuiltinManager {
    commands: HashMap<&'static str, Box<dyn BuiltinCommand>>,
}

impl Default for BuiltinManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinManager {
    pub fn new() -> Self {
        let mut mgr = BuiltinManager {
            commands: HashMap::new(),
        };
        mgr.register(Box::new(EchoCommand));
        mgr.register(Box::new(CdCommand));
        mgr.register(Box::new(PwdCommand));
        mgr.register(Box::new(ExportCommand));
        mgr.register(Box::new(UnsetCommand));
        mgr.register(Box::new(EnvCommand));
        mgr.register(Box::new(ExitCommand));
        mgr
    }

    pub fn register(&mut self, cmd: Box<dyn BuiltinCommand>) {
        self.commands.insert(cmd.name(), cmd);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn execute(
        &self,
        name: &str,
        args: &[String],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<i32, ExecError> {
        let Some(cmd) = self.commands.get(name) else {
            return Err(ExecError::NoSuchBuiltin(name.to_string()));
        };
        match cmd.run(args, ctx).and_then(|code| ctx.out.flush().map(|_| code)) {
            Ok(code) => Ok(code),
            Err(e) => {
                eprintln!("minish: {name}: write error: {}", describe_io(&e));
                Ok(1)
            }
        }
    }
}
