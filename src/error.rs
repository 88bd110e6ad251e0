use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("{0}: No such file or directory")]
    NoSuchFile(String),
    #[error("{0}: Is a directory")]
    IsDirectory(String),
    #[error("{0}: Permission denied")]
    PermissionDenied(String),
    #[error("{path}: {reason}")]
    Redirect { path: String, reason: String },
    #[error("here-document aborted")]
    HeredocAborted,
    #[error("{0}: argument contains a NUL byte")]
    InvalidArgument(String),
    #[error("no such builtin command: {0}")]
    NoSuchBuiltin(String),
    #[error("{call}: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: nix::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExecError {
    /// Wraps a failed system call, e.g. `.map_err(ExecError::sys("fork"))`.
    pub fn sys(call: &'static str) -> impl FnOnce(nix::Error) -> ExecError {
        move |source| ExecError::Sys { call, source }
    }

    pub fn redirect(path: &str, err: &io::Error) -> ExecError {
        ExecError::Redirect {
            path: path.to_string(),
            reason: describe_io(err),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::CommandNotFound(_) | ExecError::NoSuchFile(_) => 127,
            ExecError::IsDirectory(_) | ExecError::PermissionDenied(_) => 126,
            ExecError::HeredocAborted => 130,
            _ => 1,
        }
    }

    /// Failures that end only the stage they occur in. Anything else aborts
    /// the whole input line.
    pub fn is_stage_local(&self) -> bool {
        !matches!(self, ExecError::Sys { .. } | ExecError::Io(_))
    }

    /// Whether the failure warrants a diagnostic line of its own.
    pub fn is_reported(&self) -> bool {
        !matches!(self, ExecError::HeredocAborted)
    }
}

/// The strerror-style text for an I/O error, without Rust's `(os error N)`
/// suffix.
pub fn describe_io(err: &io::Error) -> String {
    let text = err.to_string();
    match text.split_once(" (os error ") {
        Some((reason, _)) => reason.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExecError::CommandNotFound("x".into()).exit_code(), 127);
        assert_eq!(ExecError::NoSuchFile("./x".into()).exit_code(), 127);
        assert_eq!(ExecError::IsDirectory("/tmp".into()).exit_code(), 126);
        assert_eq!(ExecError::PermissionDenied("./x".into()).exit_code(), 126);
        assert_eq!(ExecError::HeredocAborted.exit_code(), 130);
        assert_eq!(ExecError::sys("fork")(nix::Error::EAGAIN).exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ExecError::CommandNotFound("nonexistent_cmd_xyz".into()).to_string(),
            "nonexistent_cmd_xyz: command not found"
        );
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(
            ExecError::redirect("missing.txt", &err).to_string(),
            "missing.txt: No such file or directory"
        );
    }

    #[test]
    fn test_locality() {
        assert!(ExecError::CommandNotFound("x".into()).is_stage_local());
        assert!(ExecError::HeredocAborted.is_stage_local());
        assert!(!ExecError::HeredocAborted.is_reported());
        assert!(!ExecError::sys("pipe")(nix::Error::EMFILE).is_stage_local());
        assert!(!ExecError::Io(io::Error::other("boom")).is_stage_local());
    }
}
