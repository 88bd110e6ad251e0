//! Line sources for the main loop and for heredoc collection.

use std::io;
use std::path::PathBuf;

use log::warn;
use nix::errno::Errno;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};

use crate::signals;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C while reading; the partial line is discarded.
    Interrupted,
    Eof,
}

pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadOutcome>;

    fn add_history(&mut self, _line: &str) {}

    fn save_history(&mut self) {}

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Terminal input through rustyline, with persistent history.
pub struct InteractiveReader {
    editor: DefaultEditor,
    history_file: Option<PathBuf>,
}

impl InteractiveReader {
    pub fn new(history_file: Option<PathBuf>, history_max: usize) -> anyhow::Result<Self> {
        let config = Config::builder()
            .max_history_size(history_max)?
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(config)?;
        if let Some(path) = history_file.as_deref().filter(|p| p.exists()) {
            if let Err(e) = editor.load_history(path) {
                warn!("could not load history from {}: {e}", path.display());
            }
        }
        Ok(InteractiveReader {
            editor,
            history_file,
        })
    }
}

impl LineReader for InteractiveReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn add_history(&mut self, line: &str) {
        if !line.trim().is_empty() {
            let _ = self.editor.add_history_entry(line);
        }
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                warn!("could not save history to {}: {e}", path.display());
            }
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// Reads standard input one byte at a time.
///
/// Nothing is buffered past the newline, so a forked heredoc collector and
/// the shell can take turns reading the same descriptor.
#[derive(Debug, Default)]
pub struct PipedReader;

impl PipedReader {
    pub fn new() -> Self {
        PipedReader
    }
}

impl LineReader for PipedReader {
    fn read_line(&mut self, _prompt: &str) -> io::Result<ReadOutcome> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match nix::unistd::read(libc::STDIN_FILENO, &mut byte) {
                Ok(0) if line.is_empty() => return Ok(ReadOutcome::Eof),
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(Errno::EINTR) if signals::take_interrupt() => return Ok(ReadOutcome::Interrupted),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReadOutcome::Line(String::from_utf8_lossy(&line).into_owned()))
    }
}
