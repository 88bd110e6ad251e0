use std::fs::{File, OpenOptions};
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;

use crate::ast::{Node, NodeKind, RedirectKind};
use crate::error::ExecError;
use crate::executor::heredoc;
use crate::io::LineReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect<'n> {
    pub kind: RedirectKind,
    pub target: &'n str,
}

/// A run of nested redirection nodes flattened into source order, plus the
/// node they apply to.
#[derive(Debug)]
pub struct RedirectChain<'n> {
    pub redirects: Vec<Redirect<'n>>,
    pub target: &'n Node,
}

/// Descriptors opened for one chain. They stay open until the stage they
/// feed has been started, and close when this is dropped.
#[derive(Debug, Default)]
pub struct Prepared {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
}

impl<'n> RedirectChain<'n> {
    pub fn collect(node: &'n Node) -> Self {
        let mut redirects = Vec::new();
        let mut current = node;
        while let NodeKind::Redirection {
            kind,
            target,
            child,
        } = &current.kind
        {
            redirects.push(Redirect { kind: *kind, target });
            current = &**child;
        }
        // The outermost node is the last one written.
        redirects.reverse();
        RedirectChain {
            redirects,
            target: current,
        }
    }

    /// Opens every target left to right. The last input and the last output
    /// win; earlier output files are still created and truncated.
    pub fn prepare(&self, input: &mut dyn LineReader) -> Result<Prepared, ExecError> {
        let mut prepared = Prepared::default();
        for redirect in &self.redirects {
            match redirect.kind {
                RedirectKind::Input => {
                    let file = File::open(redirect.target)
                        .map_err(|e| ExecError::redirect(redirect.target, &e))?;
                    prepared.stdin = Some(file.into());
                }
                RedirectKind::Heredoc => {
                    prepared.stdin = Some(heredoc::collect(redirect.target, input)?);
                }
                RedirectKind::Output | RedirectKind::Append => {
                    let file = open_output(redirect.target, redirect.kind == RedirectKind::Append)
                        .map_err(|e| ExecError::redirect(redirect.target, &e))?;
                    prepared.stdout = Some(file.into());
                }
            }
        }
        Ok(prepared)
    }
}

fn open_output(path: &str, append: bool) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(path)
}
