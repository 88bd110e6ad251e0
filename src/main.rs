use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, debug};
use simplelog::WriteLogger;

use minish::config::{Config, ConfigLoader, expand_home};
use minish::environment::Environment;
use minish::io::{InteractiveReader, PipedReader};
use minish::repl::Repl;
use minish::shell::ShellState;
use minish::signals;

/// A small POSIX-like shell.
#[derive(Parser, Debug)]
#[command(name = "minish", version, about)]
struct Cli {
    /// Run COMMAND and exit with its status.
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Read configuration from PATH instead of ~/.minishrc.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let Some(path) = &config.log_file else {
        return Ok(());
    };
    if config.log_level == LevelFilter::Off {
        return Ok(());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    WriteLogger::init(config.log_level, simplelog::Config::default(), file)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut env = Environment::from_os();
    let home = env.get("HOME").map(str::to_string);
    let config = ConfigLoader::load(cli.config.as_deref(), home.as_deref()).context("failed to load configuration")?;
    init_logging(&config)?;
    debug!("configuration: {config:?}");

    for (name, value) in &config.env_vars {
        env.set(name, value);
    }
    env.increment_shlvl();
    signals::install_interactive().context("failed to install signal handlers")?;
    let shell = ShellState::new(env);

    let status = if let Some(script) = cli.command {
        Repl::new(PipedReader::new(), shell, "").run_script(&script)
    } else if std::io::stdin().is_terminal() {
        let history = expand_home(&config.history_file, home.as_deref());
        let reader = InteractiveReader::new(Some(history), config.history_max)?;
        Repl::new(reader, shell, config.prompt).run()
    } else {
        Repl::new(PipedReader::new(), shell, config.prompt).run()
    };

    std::process::exit(status)
}
