use std::io;
use std::path::PathBuf;

use crate::environment::is_valid_identifier;
use crate::error::describe_io;
use crate::executor::builtin::manager::{BuiltinCommand, BuiltinContext};
use crate::executor::stage::Scope;

/// Arguments after the command name.
fn operands(args: &[String]) -> &[String] {
    args.get(1..).unwrap_or_default()
}

pub struct EchoCommand;

impl BuiltinCommand for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        let mut words = operands(args);
        let mut newline = true;
        while let Some((first, rest)) = words.split_first() {
            if !is_no_newline_flag(first) {
                break;
            }
            newline = false;
            words = rest;
        }
        write!(ctx.out, "{}", words.join(" "))?;
        if newline {
            writeln!(ctx.out)?;
        }
        Ok(0)
    }
}

/// `-n`, `-nn`, ... but not `-` or `-na`.
fn is_no_newline_flag(word: &str) -> bool {
    word.strip_prefix('-')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c == 'n'))
}

pub struct CdCommand;

impl BuiltinCommand for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        let operands = operands(args);
        if operands.len() > 1 {
            eprintln!("minish: cd: too many arguments");
            return Ok(1);
        }
        let (target, announce) = match operands.first().map(String::as_str) {
            None => match ctx.shell.env.get("HOME") {
                Some(home) => (home.to_string(), false),
                None => {
                    eprintln!("minish: cd: HOME not set");
                    return Ok(1);
                }
            },
            Some("-") => match ctx.shell.env.get("OLDPWD") {
                Some(dir) => (dir.to_string(), true),
                None => {
                    eprintln!("minish: cd: OLDPWD not set");
                    return Ok(1);
                }
            },
            Some(dir) => (dir.to_string(), false),
        };

        // An isolated cd would only change a copy of the shell, so check the
        // target and leave the working directory alone.
        if ctx.scope == Scope::Isolated {
            return match std::fs::read_dir(&target) {
                Ok(_) => {
                    if announce {
                        writeln!(ctx.out, "{target}")?;
                    }
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("minish: cd: {target}: {}", describe_io(&e));
                    Ok(1)
                }
            };
        }

        let previous = std::env::current_dir()
            .ok()
            .or_else(|| ctx.shell.env.get("PWD").map(PathBuf::from));
        if let Err(e) = std::env::set_current_dir(&target) {
            eprintln!("minish: cd: {target}: {}", describe_io(&e));
            return Ok(1);
        }
        if let Some(previous) = previous {
            ctx.shell.env.set("OLDPWD", &previous.to_string_lossy());
        }
        let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from(&target));
        ctx.shell.env.set("PWD", &current.to_string_lossy());
        if announce {
            writeln!(ctx.out, "{}", current.display())?;
        }
        Ok(0)
    }
}

pub struct PwdCommand;

impl BuiltinCommand for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn run(&self, _args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        match std::env::current_dir() {
            Ok(dir) => {
                writeln!(ctx.out, "{}", dir.display())?;
                Ok(0)
            }
            Err(e) => {
                eprintln!("minish: pwd: {}", describe_io(&e));
                Ok(1)
            }
        }
    }
}

pub struct ExportCommand;

impl BuiltinCommand for ExportCommand {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        let operands = operands(args);
        if operands.is_empty() {
            for (key, value) in ctx.shell.env.entries() {
                match value {
                    Some(value) => writeln!(ctx.out, "declare -x {key}='{value}'")?,
                    None => writeln!(ctx.out, "declare -x {key}")?,
                }
            }
            return Ok(0);
        }

        let mut status = 0;
        for arg in operands {
            let (name, value) = match arg.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (arg.as_str(), None),
            };
            if !is_valid_identifier(name) {
                eprintln!("minish: export: '{arg}': not a valid identifier");
                status = 1;
                continue;
            }
            match value {
                Some(value) => ctx.shell.env.set(name, value),
                None => ctx.shell.env.declare(name),
            }
        }
        Ok(status)
    }
}

pub struct UnsetCommand;

impl BuiltinCommand for UnsetCommand {
    fn name(&self) -> &'static str {
        "unset"
    }

    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        for name in operands(args) {
            ctx.shell.env.remove(name);
        }
        Ok(0)
    }
}

pub struct EnvCommand;

impl BuiltinCommand for EnvCommand {
    fn name(&self) -> &'static str {
        "env"
    }

    fn run(&self, _args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        for entry in ctx.shell.env.to_array() {
            writeln!(ctx.out, "{entry}")?;
        }
        Ok(0)
    }
}

pub struct ExitCommand;

impl BuiltinCommand for ExitCommand {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn run(&self, args: &[String], ctx: &mut BuiltinContext<'_>) -> io::Result<i32> {
        let operands = operands(args);
        let code = match operands {
            [] => ctx.shell.exit_status,
            [_, _, ..] => {
                eprintln!("minish: exit: too many arguments");
                1
            }
            [arg] => parse_exit_code(arg).unwrap_or_else(|| {
                eprintln!("minish: exit: {arg}: numeric argument required");
                2
            }),
        };
        ctx.shell.request_exit(code);
        Ok(code)
    }
}

/// Parses an `exit` operand, wrapping it into 0..=255.
fn parse_exit_code(arg: &str) -> Option<i32> {
    let n: i64 = arg.trim().parse().ok()?;
    Some((n & 0xff) as i32)
}
