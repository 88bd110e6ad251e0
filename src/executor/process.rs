//! fork/exec/pipe/wait helpers.

use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execve, fork};

use crate::error::ExecError;
use crate::signals;

/// Creates a pipe whose ends are both close-on-exec.
pub fn pipe() -> Result<(OwnedFd, OwnedFd), ExecError> {
    let (read, write) = nix::unistd::pipe().map_err(ExecError::sys("pipe"))?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(ExecError::sys("fcntl"))?;
    }
    Ok((read, write))
}

/// A stream that is immediately at end-of-file.
pub fn empty_stream() -> Result<OwnedFd, ExecError> {
    let (read, _write) = pipe()?;
    Ok(read)
}

/// Forks; the child runs `body` and exits with its return value.
pub fn fork_child<F: FnOnce() -> i32>(body: F) -> Result<Pid, ExecError> {
    // Anything still buffered would be written twice.
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    match unsafe { fork() }.map_err(ExecError::sys("fork"))? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            signals::reset_to_default();
            let code = body();
            let _ = io::stdout().flush();
            std::process::exit(code)
        }
    }
}

/// Points fd 0 and fd 1 at the given descriptors. Used in children only.
pub fn bind_stdio(stdin: Option<RawFd>, stdout: Option<RawFd>) -> nix::Result<()> {
    if let Some(fd) = stdin.filter(|fd| *fd != libc::STDIN_FILENO) {
        dup2(fd, libc::STDIN_FILENO)?;
    }
    if let Some(fd) = stdout.filter(|fd| *fd != libc::STDOUT_FILENO) {
        dup2(fd, libc::STDOUT_FILENO)?;
    }
    Ok(())
}

pub fn wait(pid: Pid) -> Result<WaitStatus, ExecError> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            other => return other.map_err(ExecError::sys("waitpid")),
        }
    }
}

/// Shell status for a reaped child: its exit code, or 128 + signal number.
pub fn status_code(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => 1,
    }
}

/// Everything `execve` needs, converted before forking so the child does no
/// fallible work besides the call itself.
#[derive(Debug)]
pub struct ExecRequest {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

fn c_strings(items: &[String]) -> Result<Vec<CString>, ExecError> {
    items
        .iter()
        .map(|s| CString::new(s.as_str()).map_err(|_| ExecError::InvalidArgument(s.clone())))
        .collect()
}

impl ExecRequest {
    pub fn new(path: &Path, args: &[String], env: &[String]) -> Result<Self, ExecError> {
        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ExecError::InvalidArgument(path.display().to_string()))?;
        Ok(ExecRequest {
            path,
            argv: c_strings(args)?,
            envp: c_strings(env)?,
        })
    }

    /// Replaces the process image. Returns only on failure, with the status
    /// the child should exit with.
    pub fn exec(&self) -> i32 {
        let errno = match execve(&self.path, self.argv.as_slice(), self.envp.as_slice()) {
            Ok(never) => match never {},
            Err(errno) => errno,
        };
        let name = self.argv.first().map(|a| a.to_string_lossy()).unwrap_or_default();
        eprintln!("minish: {name}: {}", errno.desc());
        exec_failure_code(errno)
    }
}

fn exec_failure_code(errno: Errno) -> i32 {
    match errno {
        Errno::ENOENT => 127,
        Errno::EACCES | Errno::EISDIR | Errno::ENOEXEC => 126,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn test_status_code() {
        let pid = Pid::from_raw(4242);
        assert_eq!(status_code(WaitStatus::Exited(pid, 0)), 0);
        assert_eq!(status_code(WaitStatus::Exited(pid, 3)), 3);
        assert_eq!(status_code(WaitStatus::Signaled(pid, Signal::SIGINT, false)), 130);
        assert_eq!(status_code(WaitStatus::Signaled(pid, Signal::SIGQUIT, true)), 131);
    }

    #[test]
    fn test_pipe_is_close_on_exec() {
        let (read, write) = pipe().unwrap();
        for fd in [&read, &write] {
            let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).unwrap();
            assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        }
    }

    #[test]
    fn test_empty_stream_reads_eof() {
        use std::fs::File;
        use std::io::Read;
        let mut file = File::from(empty_stream().unwrap());
        let mut buf = Vec::new();
        assert_eq!(file.read_to_end(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_exec_request_rejects_nul() {
        let err = ExecRequest::new(Path::new("/bin/echo"), &["echo".into(), "a\0b".into()], &[]).unwrap_err();
        assert!(matches!(err, ExecError::InvalidArgument(arg) if arg == "a\0b"));
        assert!(ExecRequest::new(Path::new("/bin/echo"), &["echo".into()], &["A=1".into()]).is_ok());
    }

    #[test]
    fn test_exec_failure_codes() {
        assert_eq!(exec_failure_code(Errno::ENOENT), 127);
        assert_eq!(exec_failure_code(Errno::EACCES), 126);
        assert_eq!(exec_failure_code(Errno::E2BIG), 1);
    }
}
