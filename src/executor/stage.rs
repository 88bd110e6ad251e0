//! Per-stage plumbing threaded through the tree walk.
//!
//! These replace per-node `fd_in`/`fd_out`/`is_pipe` fields: the tree stays
//! immutable during execution and each call receives its wiring explicitly.

use std::os::fd::{BorrowedFd, OwnedFd};

use nix::unistd::Pid;

/// Where a stage's standard output goes.
#[derive(Debug, Clone, Copy)]
pub enum Output<'fd> {
    /// The shell's own stdout.
    Inherit,
    /// Into a fresh readable stream handed back to the caller.
    Capture,
    /// Into an already open descriptor, such as a redirection target.
    File(BorrowedFd<'fd>),
}

/// Whether a stage may change shell-wide state. Pipeline stages and
/// subshells run `Isolated`: builtins there see a scratch copy of the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Shell,
    Isolated,
}

#[derive(Debug, Clone, Copy)]
pub struct StageIo<'fd> {
    pub stdin: Option<BorrowedFd<'fd>>,
    pub stdout: Output<'fd>,
    pub scope: Scope,
}

impl StageIo<'static> {
    pub fn terminal() -> Self {
        StageIo {
            stdin: None,
            stdout: Output::Inherit,
            scope: Scope::Shell,
        }
    }
}

/// What downstream should read from.
#[derive(Debug)]
pub enum Stream {
    /// Output already went to its final destination.
    Delivered,
    Readable(OwnedFd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done(i32),
    /// A forked child that has not been reaped yet.
    Pending(Pid),
}

#[derive(Debug)]
pub struct Stage {
    pub output: Stream,
    pub status: Status,
}

impl Stage {
    pub fn done(code: i32) -> Self {
        Stage {
            output: Stream::Delivered,
            status: Status::Done(code),
        }
    }
}
