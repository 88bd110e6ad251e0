use std::fs::File;
use std::io::{self, Seek, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

use log::{debug, warn};
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::{Pid, close};

use crate::ast::{Ast, CommandNode, Node, NodeKind};
use crate::error::ExecError;
use crate::executor::Executor;
use crate::executor::builtin::{BuiltinContext, BuiltinManager};
use crate::executor::path_resolver::PathResolver;
use crate::executor::process::{self, ExecRequest};
use crate::executor::redirect::RedirectChain;
use crate::executor::stage::{Output, Scope, Stage, StageIo, Status, Stream};
use crate::io::LineReader;
use crate::shell::ShellState;
use crate::signals::IgnoreGuard;

pub struct DefaultExecutor {
    builtins: BuiltinManager,
}

impl Default for DefaultExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultExecutor {
    pub fn new() -> Self {
        DefaultExecutor {
            builtins: BuiltinManager::new(),
        }
    }
}

impl Executor for DefaultExecutor {
    fn execute(
        &mut self,
        ast: &Ast,
        shell: &mut ShellState,
        input: &mut dyn LineReader,
    ) -> Result<i32, ExecError> {
        let Some(root) = ast.root.as_ref() else {
            return Ok(shell.exit_status);
        };
        Walker::new(shell, input, &self.builtins).run_sequence(root)
    }
}

/// One walk over a tree. Every child forked during the current top-level
/// unit is recorded in `children` and reaped before the unit returns.
struct Walker<'a> {
    shell: &'a mut ShellState,
    input: &'a mut dyn LineReader,
    builtins: &'a BuiltinManager,
    children: Vec<Pid>,
}

impl<'a> Walker<'a> {
    fn new(
        shell: &'a mut ShellState,
        input: &'a mut dyn LineReader,
        builtins: &'a BuiltinManager,
    ) -> Self {
        Walker {
            shell,
            input,
            builtins,
            children: Vec::new(),
        }
    }

    fn run_sequence(&mut self, first: &Node) -> Result<i32, ExecError> {
        for unit in first.siblings() {
            let status = self.run_unit(unit)?;
            self.shell.exit_status = status;
            if let Some(code) = self.shell.exit_requested() {
                return Ok(code);
            }
        }
        Ok(self.shell.exit_status)
    }

    fn run_unit(&mut self, node: &Node) -> Result<i32, ExecError> {
        let _signals = IgnoreGuard::enter().map_err(ExecError::sys("sigaction"))?;
        let stage = match self.run(node, StageIo::terminal()) {
            Ok(stage) => stage,
            Err(e) => {
                self.reap(Status::Done(1));
                return Err(e);
            }
        };
        Ok(self.reap(stage.status))
    }

    fn run(&mut self, node: &Node, io: StageIo<'_>) -> Result<Stage, ExecError> {
        let result = match &node.kind {
            NodeKind::Command(command) => self.run_command(command, io),
            NodeKind::Pipe { left, right } => self.run_pipe(left, right, io),
            NodeKind::Redirection { .. } => self.run_redirection(node, io),
            NodeKind::Subshell { child } => self.run_subshell(child, io),
        };
        match result {
            Err(err) if err.is_stage_local() => {
                if err.is_reported() {
                    eprintln!("minish: {err}");
                }
                Ok(Stage::done(err.exit_code()))
            }
            other => other,
        }
    }

    fn run_pipe(&mut self, left: &Node, right: &Node, io: StageIo<'_>) -> Result<Stage, ExecError> {
        let upstream = self.run(
            left,
            StageIo {
                stdin: io.stdin,
                stdout: Output::Capture,
                scope: Scope::Isolated,
            },
        )?;
        // A stage whose output went elsewhere leaves nothing to read.
        let feed = match upstream.output {
            Stream::Readable(fd) => fd,
            Stream::Delivered => process::empty_stream()?,
        };
        let downstream = self.run(
            right,
            StageIo {
                stdin: Some(feed.as_fd()),
                stdout: io.stdout,
                scope: Scope::Isolated,
            },
        )?;
        drop(feed);
        Ok(downstream)
    }

    fn run_redirection(&mut self, node: &Node, io: StageIo<'_>) -> Result<Stage, ExecError> {
        let chain = RedirectChain::collect(node);
        let prepared = chain.prepare(&mut *self.input)?;
        let stdin = prepared.stdin.as_ref().map(|fd| fd.as_fd()).or(io.stdin);
        let stdout = prepared
            .stdout
            .as_ref()
            .map_or(io.stdout, |fd| Output::File(fd.as_fd()));
        self.run(
            chain.target,
            StageIo {
                stdin,
                stdout,
                scope: io.scope,
            },
        )
    }

    fn run_command(&mut self, command: &CommandNode, io: StageIo<'_>) -> Result<Stage, ExecError> {
        if self.builtins.is_builtin(&command.name) {
            return self.run_builtin(command, io);
        }
        let path = PathResolver::new(self.shell.env.get("PATH")).resolve(&command.name)?;
        let request = ExecRequest::new(&path, &command.args, &self.shell.env.to_array())?;

        let capture = match io.stdout {
            Output::Capture => Some(process::pipe()?),
            _ => None,
        };
        let stdin = io.stdin.map(|fd| fd.as_raw_fd());
        let stdout = stdout_target(io.stdout, capture.as_ref());
        let pid = process::fork_child(|| {
            if let Err(e) = process::bind_stdio(stdin, stdout) {
                eprintln!("minish: {}: {}", command.name, e.desc());
                return 1;
            }
            request.exec()
        })?;
        debug!("spawned {} ({}) as {pid}", command.name, path.display());
        self.children.push(pid);
        Ok(Stage {
            output: into_stream(capture),
            status: Status::Pending(pid),
        })
    }

    /// Builtins run in this process whatever their position. Captured output
    /// goes to an anonymous file so a large write cannot block on a pipe
    /// nobody is reading yet.
    fn run_builtin(&mut self, command: &CommandNode, io: StageIo<'_>) -> Result<Stage, ExecError> {
        match io.stdout {
            Output::Inherit => {
                let mut out = io::stdout();
                let code = self.invoke(command, &mut out, io.scope)?;
                Ok(Stage::done(code))
            }
            Output::File(fd) => {
                let mut out = File::from(fd.try_clone_to_owned()?);
                let code = self.invoke(command, &mut out, io.scope)?;
                Ok(Stage::done(code))
            }
            Output::Capture => {
                let mut out = tempfile::tempfile()?;
                let code = self.invoke(command, &mut out, io.scope)?;
                out.rewind()?;
                Ok(Stage {
                    output: Stream::Readable(out.into()),
                    status: Status::Done(code),
                })
            }
        }
    }

    fn invoke(&mut self, command: &CommandNode, out: &mut dyn Write, scope: Scope) -> Result<i32, ExecError> {
        let builtins = self.builtins;
        let mut scratch;
        let shell = match scope {
            Scope::Shell => &mut *self.shell,
            Scope::Isolated => {
                scratch = self.shell.clone();
                &mut scratch
            }
        };
        let mut ctx = BuiltinContext { shell, out, scope };
        builtins.execute(&command.name, &command.args, &mut ctx)
    }

    /// Subshells always fork, so nothing they change reaches this process.
    fn run_subshell(&mut self, body: &Node, io: StageIo<'_>) -> Result<Stage, ExecError> {
        let capture = match io.stdout {
            Output::Capture => Some(process::pipe()?),
            _ => None,
        };
        let stdin = io.stdin.map(|fd| fd.as_raw_fd());
        let stdout = stdout_target(io.stdout, capture.as_ref());
        let own_reader = capture.as_ref().map(|(read, _)| read.as_raw_fd());

        let builtins = self.builtins;
        let shell = &mut *self.shell;
        let input = &mut *self.input;
        let pid = process::fork_child(|| {
            // Holding our own read end would keep writers from seeing EPIPE.
            if let Some(fd) = own_reader {
                let _ = close(fd);
            }
            if let Err(e) = process::bind_stdio(stdin, stdout) {
                eprintln!("minish: subshell: {}", e.desc());
                return 1;
            }
            match Walker::new(shell, input, builtins).run_sequence(body) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Execution error: {e}");
                    1
                }
            }
        })?;
        debug!("spawned subshell as {pid}");
        self.children.push(pid);
        Ok(Stage {
            output: into_stream(capture),
            status: Status::Pending(pid),
        })
    }

    /// Waits for every recorded child and returns the status of `last`.
    fn reap(&mut self, last: Status) -> i32 {
        let mut code = match last {
            Status::Done(code) => code,
            Status::Pending(_) => 1,
        };
        let mut signalled = None;
        for pid in std::mem::take(&mut self.children) {
            let status = match process::wait(pid) {
                Ok(status) => status,
                Err(e) => {
                    warn!("could not reap {pid}: {e}");
                    continue;
                }
            };
            debug!("reaped {pid}: {status:?}");
            if last == Status::Pending(pid) {
                code = process::status_code(status);
            }
            if let WaitStatus::Signaled(_, signal @ (Signal::SIGINT | Signal::SIGQUIT), _) = status {
                signalled = Some(signal);
            }
        }
        match signalled {
            Some(Signal::SIGQUIT) => eprintln!("Quit"),
            Some(_) => eprintln!(),
            None => {}
        }
        code
    }
}

fn stdout_target(output: Output<'_>, capture: Option<&(OwnedFd, OwnedFd)>) -> Option<RawFd> {
    match (output, capture) {
        (_, Some((_, write))) => Some(write.as_raw_fd()),
        (Output::File(fd), None) => Some(fd.as_raw_fd()),
        _ => None,
    }
}

/// Closes the write end of a capture pipe and hands back the read end.
fn into_stream(capture: Option<(OwnedFd, OwnedFd)>) -> Stream {
    match capture {
        Some((read, _write)) => Stream::Readable(read),
        None => Stream::Delivered,
    }
}
