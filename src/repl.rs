use std::io::{self, Write};

use log::debug;

use crate::ast::{Ast, SyntaxError};
use crate::executor::{DefaultExecutor, Executor};
use crate::io::{LineReader, ReadOutcome};
use crate::lexer::Lexer;
use crate::parser;
use crate::shell::ShellState;
use crate::signals;

/// Status for a syntax error, including an unclosed quote.
const SYNTAX_ERROR_STATUS: i32 = 2;
/// Status after Ctrl-C cancels the current line.
const INTERRUPTED_STATUS: i32 = 130;

pub struct Repl<R: LineReader> {
    reader: R,
    executor: DefaultExecutor,
    shell: ShellState,
    prompt: String,
    out: Box<dyn Write>,
}

impl<R: LineReader> Repl<R> {
    pub fn new(reader: R, shell: ShellState, prompt: impl Into<String>) -> Self {
        Repl {
            reader,
            executor: DefaultExecutor::new(),
            shell,
            prompt: prompt.into(),
            out: Box::new(io::stdout()),
        }
    }

    /// Sends the shell's own stdout messages somewhere other than fd 1.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn shell(&self) -> &ShellState {
        &self.shell
    }

    /// Reads and runs lines until end of input or `exit`. Returns the status
    /// the process should exit with.
    pub fn run(&mut self) -> i32 {
        loop {
            signals::clear_interrupt();
            let prompt = if self.reader.is_interactive() { self.prompt.as_str() } else { "" };
            match self.reader.read_line(prompt) {
                Ok(ReadOutcome::Line(line)) => {
                    if signals::take_interrupt() {
                        self.shell.exit_status = INTERRUPTED_STATUS;
                        continue;
                    }
                    self.reader.add_history(&line);
                    self.eval(&line);
                    if let Some(code) = self.shell.exit_requested() {
                        return self.quit(code);
                    }
                }
                Ok(ReadOutcome::Interrupted) => self.shell.exit_status = INTERRUPTED_STATUS,
                Ok(ReadOutcome::Eof) => return self.quit(self.shell.exit_status),
                Err(e) => {
                    eprintln!("minish: read error: {e}");
                    return self.quit(1);
                }
            }
        }
    }

    /// Runs `script` as if each of its lines had been typed in turn.
    pub fn run_script(&mut self, script: &str) -> i32 {
        self.eval(script);
        match self.shell.exit_requested() {
            Some(code) => code,
            None => self.shell.exit_status,
        }
    }

    /// Handles one chunk of input. Embedded newlines separate lines, each
    /// of which is tokenized, parsed and executed on its own.
    pub fn eval(&mut self, input: &str) {
        for line in input.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            self.eval_line(line);
            if self.shell.exit_requested().is_some() {
                break;
            }
        }
    }

    fn eval_line(&mut self, line: &str) {
        let mut ast = match Lexer::new(&self.shell).tokenize(line) {
            Ok(tokens) if tokens.is_empty() => return,
            Ok(tokens) => parser::parse(&tokens),
            Err(e) => {
                debug!("lexer: {e}");
                let mut ast = Ast::new();
                ast.fail(SyntaxError::UnclosedQuote, None);
                ast
            }
        };
        if let Some(msg) = ast.diagnostic() {
            eprintln!("Parser error: {msg}");
            self.shell.exit_status = SYNTAX_ERROR_STATUS;
            return;
        }
        debug!("parsed: {ast}");

        if let Err(e) = self.executor.execute(&ast, &mut self.shell, &mut self.reader) {
            eprintln!("Execution error: {e}");
            self.shell.exit_status = 1;
        }
        ast.clear();
    }

    fn quit(&mut self, code: i32) -> i32 {
        if self.reader.is_interactive() {
            let _ = writeln!(self.out, "exit").and_then(|()| self.out.flush());
        }
        self.reader.save_history();
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Feeds canned lines; never forks because every test line stays in
    /// builtins or fails before execution.
    struct Script {
        lines: VecDeque<ReadOutcome>,
        history: Vec<String>,
        interactive: bool,
    }

    impl Script {
        fn new(lines: &[&str]) -> Self {
            Script {
                lines: lines.iter().map(|l| ReadOutcome::Line(l.to_string())).collect(),
                history: Vec::new(),
                interactive: false,
            }
        }
    }

    impl LineReader for Script {
        fn read_line(&mut self, _prompt: &str) -> io::Result<ReadOutcome> {
            Ok(self.lines.pop_front().unwrap_or(ReadOutcome::Eof))
        }

        fn add_history(&mut self, line: &str) {
            self.history.push(line.to_string());
        }

        fn is_interactive(&self) -> bool {
            self.interactive
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn repl(lines: &[&str]) -> Repl<Script> {
        Repl::new(Script::new(lines), ShellState::new(Environment::default()), "$ ")
    }

    #[test]
    fn test_syntax_errors_set_status_two() {
        let mut r = repl(&["echo 'open", "export A=1 |"]);
        assert_eq!(r.run(), 2);
        assert!(!r.shell().env.contains("A"));
    }

    #[test]
    fn test_exit_stops_the_loop() {
        let mut r = repl(&["export A=1", "exit 4", "export B=2"]);
        assert_eq!(r.run(), 4);
        assert_eq!(r.shell().env.get("A"), Some("1"));
        assert!(!r.shell().env.contains("B"));
        assert_eq!(r.reader.history, vec!["export A=1", "exit 4"]);
    }

    #[test]
    fn test_interactive_exit_announces_on_stdout() {
        let buf = SharedBuf::default();
        let mut r = repl(&["exit 3"]).with_output(Box::new(buf.clone()));
        r.reader.interactive = true;
        assert_eq!(r.run(), 3);
        assert_eq!(buf.0.borrow().as_slice(), b"exit\n");

        let buf = SharedBuf::default();
        let mut r = repl(&["exit 3"]).with_output(Box::new(buf.clone()));
        assert_eq!(r.run(), 3);
        assert!(buf.0.borrow().is_empty());
    }

    #[test]
    fn test_interrupted_read_sets_status() {
        let mut r = repl(&[]);
        r.reader.lines.push_back(ReadOutcome::Interrupted);
        assert_eq!(r.run(), 130);
    }

    #[test]
    fn test_script_lines_run_in_order() {
        let mut r = repl(&[]);
        assert_eq!(r.run_script("export A=1\n\nexport B=$A\nexit 9\nexport C=3"), 9);
        assert_eq!(r.shell().env.get("B"), Some("1"));
        assert!(!r.shell().env.contains("C"));
    }
}
