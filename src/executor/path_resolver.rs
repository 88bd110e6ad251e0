use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{AccessFlags, access};

use crate::error::ExecError;

/// Locates the executable for a command name.
pub struct PathResolver<'a> {
    search_path: Option<&'a str>,
}

impl<'a> PathResolver<'a> {
    /// `search_path` is the value of `PATH`, if set.
    pub fn new(search_path: Option<&'a str>) -> Self {
        PathResolver { search_path }
    }

    pub fn resolve(&self, command: &str) -> Result<PathBuf, ExecError> {
        if command.contains('/') {
            return check_explicit(command);
        }
        let Some(paths) = self.search_path else {
            return Err(ExecError::CommandNotFound(command.to_string()));
        };
        paths
            .split(':')
            .map(|dir| Path::new(if dir.is_empty() { "." } else { dir }).join(command))
            .find(|candidate| is_executable_file(candidate))
            .ok_or_else(|| ExecError::CommandNotFound(command.to_string()))
    }
}

/// A path given with a slash is used as is, but must exist, must not be a
/// directory, and must be executable.
fn check_explicit(command: &str) -> Result<PathBuf, ExecError> {
    let path = Path::new(command);
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Err(ExecError::NoSuchFile(command.to_string())),
    };
    if metadata.is_dir() {
        return Err(ExecError::IsDirectory(command.to_string()));
    }
    if access(path, AccessFlags::X_OK).is_err() {
        return Err(ExecError::PermissionDenied(command.to_string()));
    }
    Ok(path.to_path_buf())
}

fn is_executable_file(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}
