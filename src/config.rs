use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
    pub history_file: String,
    pub history_max: usize,
    pub log_file: Option<PathBuf>,
    pub log_level: LevelFilter,
    pub env_vars: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn default_config() -> Config {
        Config {
            prompt: "minish$ ".to_string(),
            history_file: "~/.minish_history".to_string(),
            history_max: 500,
            log_file: None,
            log_level: LevelFilter::Warn,
            env_vars: HashMap::new(),
        }
    }

    /// The explicit path if given, else `$HOME/.minishrc` when it exists,
    /// else the defaults.
    pub fn load(explicit: Option<&Path>, home: Option<&str>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match home.map(|home| Path::new(home).join(".minishrc")) {
            Some(rc) if rc.is_file() => Self::load_from_file(rc),
            _ => Ok(Self::default_config()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let src = fs::read_to_string(path)?;
        Self::load_from_str(&src)
    }

    pub fn load_from_str(src: &str) -> Result<Config, ConfigError> {
        let mut config = Self::default_config();

        for (lineno, line) in src.lines().enumerate() {
            let lineno = lineno + 1;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse(format!("Line {lineno}: No '=' found: {line}")));
            };
            // Values are taken verbatim so a prompt can end in a space.
            let key = key.trim();

            match key {
                "prompt" => config.prompt = value.to_string(),
                "history_file" => config.history_file = value.trim().to_string(),
                "history_max" => {
                    config.history_max = value.trim().parse().map_err(|_| {
                        ConfigError::Parse(format!("Line {lineno}: Invalid usize: {line}"))
                    })?;
                }
                "log_file" => config.log_file = Some(PathBuf::from(value.trim())),
                "log_level" => {
                    config.log_level = value.trim().parse().map_err(|_| {
                        ConfigError::Parse(format!("Line {lineno}: Invalid log level: {line}"))
                    })?;
                }
                k if k.starts_with("env.") => {
                    let var = k.trim_start_matches("env.").to_string();
                    config.env_vars.insert(var, value.to_string());
                }
                _ => return Err(ConfigError::Parse(format!("Line {lineno}: Unknown key: {key}"))),
            }
        }
        Ok(config)
    }
}

/// Replaces a leading `~` with `home`.
pub fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            PathBuf::from(format!("{home}{rest}"))
        }
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::load_from_str("").unwrap();
        assert_eq!(config.prompt, "minish$ ");
        assert_eq!(config.history_file, "~/.minish_history");
        assert_eq!(config.history_max, 500);
        assert_eq!(config.log_file, None);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert!(config.env_vars.is_empty());
    }

    #[test]
    fn test_keys() {
        let src = concat!(
            "# comment\n",
            "\n",
            "prompt=> \n",
            "history_max = 42\n",
            "log_file=/tmp/minish.log\n",
            "log_level=debug\n",
            "env.EDITOR=vi\n",
        );
        let config = ConfigLoader::load_from_str(src).unwrap();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.history_max, 42);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/minish.log")));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.env_vars.get("EDITOR").map(String::as_str), Some("vi"));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = ConfigLoader::load_from_str("prompt=x\nbogus").unwrap_err();
        assert_eq!(err.to_string(), "Parse error: Line 2: No '=' found: bogus");

        let err = ConfigLoader::load_from_str("colour=red").unwrap_err();
        assert_eq!(err.to_string(), "Parse error: Line 1: Unknown key: colour");

        assert!(ConfigLoader::load_from_str("history_max=lots").is_err());
        assert!(ConfigLoader::load_from_str("log_level=loud").is_err());
    }

    #[test]
    fn test_load_prefers_explicit_then_rc() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().display().to_string();

        let config = ConfigLoader::load(None, Some(&home)).unwrap();
        assert_eq!(config.prompt, "minish$ ");

        std::fs::write(dir.path().join(".minishrc"), "prompt=rc$ \n").unwrap();
        assert_eq!(ConfigLoader::load(None, Some(&home)).unwrap().prompt, "rc$ ");

        let explicit = dir.path().join("other");
        std::fs::write(&explicit, "prompt=other$ \n").unwrap();
        let config = ConfigLoader::load(Some(&explicit), Some(&home)).unwrap();
        assert_eq!(config.prompt, "other$ ");

        let missing = dir.path().join("missing");
        assert!(matches!(
            ConfigLoader::load(Some(&missing), Some(&home)),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("~/.h", Some("/home/u")), PathBuf::from("/home/u/.h"));
        assert_eq!(expand_home("~", Some("/home/u")), PathBuf::from("/home/u"));
        assert_eq!(expand_home("~x/.h", Some("/home/u")), PathBuf::from("~x/.h"));
        assert_eq!(expand_home("~/.h", None), PathBuf::from("~/.h"));
        assert_eq!(expand_home("/abs", Some("/home/u")), PathBuf::from("/abs"));
    }
}
