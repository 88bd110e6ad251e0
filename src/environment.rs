use std::collections::HashMap;

/// Search path for a shell started with an empty environment.
pub const DEFAULT_PATH: &str =
    "/bin:/sbin:/usr/bin:/usr/sbin:/usr/local/bin:/usr/local/sbin:/opt/bin:/opt/sbin";
const DEFAULT_TERM: &str = "xterm-256color";

/// Shell variables. A name declared through `export NAME` exists without a
/// value and is not passed to child processes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: HashMap<String, Option<String>>,
}

impl Environment {
    /// Imports the variables of the current process. Names or values that
    /// are not valid UTF-8 are skipped.
    pub fn from_os() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Builds the environment from inherited variables. When nothing is
    /// inherited, `PATH`, `PWD` and `TERM` get default values; `SHLVL` is
    /// left to [`Environment::increment_shlvl`].
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env = Environment::default();
        for (k, v) in vars {
            env.vars.insert(k, Some(v));
        }
        if env.vars.is_empty() {
            env.add_defaults();
        }
        env
    }

    fn add_defaults(&mut self) {
        self.set("PATH", DEFAULT_PATH);
        if let Ok(cwd) = std::env::current_dir() {
            self.set("PWD", &cwd.to_string_lossy());
        }
        self.set("TERM", DEFAULT_TERM);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), Some(value.to_string()));
    }

    /// Declares `key` without a value, keeping any existing value.
    pub fn declare(&mut self, key: &str) {
        self.vars.entry(key.to_string()).or_insert(None);
    }

    pub fn remove(&mut self, key: &str) {
        self.vars.remove(key);
    }

    /// All variables sorted by name.
    pub fn entries(&self) -> Vec<(&str, Option<&str>)> {
        let mut entries: Vec<_> = self
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// `KEY=VALUE` strings for every variable that has a value, for `execve`.
    pub fn to_array(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| format!("{k}={v}")))
            .collect()
    }

    pub fn increment_shlvl(&mut self) {
        let level = self
            .get("SHLVL")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .map_or(1, |n| n + 1);
        self.set("SHLVL", &level.to_string());
    }
}

/// Whether `name` can be used as a variable name.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_os_includes_os_env() {
        let env = Environment::from_os();
        // At least one OS env var should exist
        assert!(!env.vars.is_empty());
    }

    #[test]
    fn test_empty_inheritance_gets_defaults() {
        let mut env = Environment::from_vars(Vec::new());
        assert_eq!(env.get("PATH"), Some(DEFAULT_PATH));
        assert_eq!(env.get("TERM"), Some("xterm-256color"));
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(env.get("PWD"), Some(cwd.to_string_lossy().as_ref()));
        assert!(!env.contains("SHLVL"));
        env.increment_shlvl();
        assert_eq!(env.get("SHLVL"), Some("1"));
    }

    #[test]
    fn test_inherited_variables_suppress_defaults() {
        let env = Environment::from_vars(vec![("HOME".to_string(), "/home/u".to_string())]);
        assert_eq!(env.get("HOME"), Some("/home/u"));
        assert!(!env.contains("PATH"));
        assert!(!env.contains("TERM"));
    }

    #[test]
    fn test_set_and_get() {
        let mut env = Environment::default();
        env.set("FOO", "bar");
        assert_eq!(env.get("FOO"), Some("bar"));
        env.set("FOO", "baz");
        assert_eq!(env.get("FOO"), Some("baz"));
    }

    #[test]
    fn test_remove() {
        let mut env = Environment::default();
        env.set("FOO", "bar");
        env.remove("FOO");
        assert_eq!(env.get("FOO"), None);
        assert!(!env.contains("FOO"));
    }

    #[test]
    fn test_declare_without_value() {
        let mut env = Environment::default();
        env.declare("EMPTY");
        assert!(env.contains("EMPTY"));
        assert_eq!(env.get("EMPTY"), None);

        env.set("KEEP", "1");
        env.declare("KEEP");
        assert_eq!(env.get("KEEP"), Some("1"));
    }

    #[test]
    fn test_to_array_is_sorted_and_skips_declared() {
        let mut env = Environment::default();
        env.set("B", "2");
        env.set("A", "1");
        env.declare("C");
        assert_eq!(env.to_array(), vec!["A=1", "B=2"]);
        assert_eq!(env.entries(), vec![("A", Some("1")), ("B", Some("2")), ("C", None)]);
    }

    #[test]
    fn test_increment_shlvl() {
        let mut env = Environment::default();
        env.increment_shlvl();
        assert_eq!(env.get("SHLVL"), Some("1"));
        env.increment_shlvl();
        assert_eq!(env.get("SHLVL"), Some("2"));
        env.set("SHLVL", "garbage");
        env.increment_shlvl();
        assert_eq!(env.get("SHLVL"), Some("1"));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("PATH"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1x"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier(""));
    }
}
