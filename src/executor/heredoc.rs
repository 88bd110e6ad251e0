//! Here-document collection.
//!
//! A forked child reads lines until the delimiter and writes them into a data
//! pipe. If it is interrupted or hits end of input it writes one byte into a
//! separate flag pipe instead. The shell blocks on the flag pipe, so it never
//! has to do file I/O from a signal handler.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use log::debug;
use nix::unistd::close;

use crate::error::ExecError;
use crate::executor::process;
use crate::io::{LineReader, ReadOutcome};

const PROMPT: &str = "> ";

/// Collects a here-document and returns the read end holding its body.
pub fn collect(delimiter: &str, input: &mut dyn LineReader) -> Result<OwnedFd, ExecError> {
    let (data_read, data_write) = process::pipe()?;
    let (flag_read, flag_write) = process::pipe()?;

    let pid = process::fork_child(|| {
        let _ = close(data_read.as_raw_fd());
        let _ = close(flag_read.as_raw_fd());
        let status = match data_write.try_clone() {
            Ok(fd) => read_body(delimiter, input, File::from(fd)),
            Err(_) => Err(()),
        };
        match status {
            Ok(()) => 0,
            Err(()) => {
                if let Ok(fd) = flag_write.try_clone() {
                    let _ = File::from(fd).write_all(b"1");
                }
                1
            }
        }
    })?;

    drop(data_write);
    drop(flag_write);

    let mut flag = File::from(flag_read);
    let mut byte = [0u8; 1];
    let flagged = matches!(flag.read(&mut byte), Ok(n) if n > 0);
    let status = process::status_code(process::wait(pid)?);
    debug!("heredoc `{delimiter}' collector {pid} finished with {status}");

    if flagged || status != 0 {
        return Err(ExecError::HeredocAborted);
    }
    Ok(data_read)
}

fn read_body(delimiter: &str, input: &mut dyn LineReader, mut data: File) -> Result<(), ()> {
    loop {
        match input.read_line(PROMPT) {
            Ok(ReadOutcome::Line(line)) if line == delimiter => return Ok(()),
            Ok(ReadOutcome::Line(line)) => writeln!(data, "{line}").map_err(|_| ())?,
            Ok(ReadOutcome::Interrupted | ReadOutcome::Eof) | Err(_) => return Err(()),
        }
    }
}
