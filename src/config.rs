//! Configuration file management for hostscheck.
//!
//! This module handles loading, parsing, and merging configuration from TOML files
//! and command-line arguments. Settings can be specified in multiple places with
//! clear precedence rules.
//!
//! # Configuration Precedence
//!
//! 1. Default values (lowest priority)
//! 2. Configuration file (specified with --config)
//! 3. Command-line arguments (highest priority)
//!
//! # Example Configuration File
//!
//! ```toml
//! path = "/etc/hosts"
//! timeout = 5
//! threads = 2
//! port = 443
//! output = "text"
//! exit_code = 1
//! debug = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::report::OutputFormat;

/// Hosts file checked when no path is configured.
#[cfg(windows)]
pub const DEFAULT_HOSTS_PATH: &str = "C:/Windows/System32/drivers/etc/hosts";
#[cfg(not(windows))]
pub const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_THREADS: usize = 2;
pub const DEFAULT_PORT: u16 = 443;
/// Upper bound on concurrent probes.
pub const MAX_THREADS: usize = 4096;

/// Main configuration structure for hostscheck.
///
/// All fields are optional to support partial configuration and merging.
/// Missing values are filled in by defaults or overridden by CLI arguments.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Hosts file to check
    pub path: Option<PathBuf>,
    /// Per-phase probe timeout in seconds
    pub timeout: Option<u64>,
    /// Maximum number of concurrent probes
    pub threads: Option<usize>,
    /// TLS port to dial on every address
    pub port: Option<u16>,
    /// Output format: text, json
    pub output: Option<OutputFormat>,
    /// Exit code to use when at least one mismatch is found
    pub exit_code: Option<i32>,
    /// Enable verbose logging
    pub debug: Option<bool>,
}

/// Fully resolved settings for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub path: PathBuf,
    pub timeout: Duration,
    pub threads: usize,
    pub port: u16,
    pub output: OutputFormat,
    pub exit_code: i32,
    pub debug: bool,
}

impl Default for Config {
    /// Creates a configuration with every value set to its default.
    ///
    /// - `path`: `/etc/hosts` (`C:/Windows/System32/drivers/etc/hosts` on Windows)
    /// - `timeout`: 5 seconds
    /// - `threads`: 2
    /// - `port`: 443
    /// - `output`: text
    /// - `exit_code`: 0 (don't fail on mismatches)
    /// - `debug`: false
    fn default() -> Self {
        Config {
            path: Some(PathBuf::from(DEFAULT_HOSTS_PATH)),
            timeout: Some(DEFAULT_TIMEOUT_SECS),
            threads: Some(DEFAULT_THREADS),
            port: Some(DEFAULT_PORT),
            output: Some(OutputFormat::Text),
            exit_code: Some(0),
            debug: Some(false),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully parsed configuration
    /// * `Err(ConfigError::Io)` - File could not be read
    /// * `Err(ConfigError::Parse)` - File contains invalid TOML
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use hostscheck::config::Config;
    /// let config = Config::from_file("hostscheck.toml")?;
    /// # Ok::<(), hostscheck::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Merges this configuration with another, prioritizing the other's values.
    ///
    /// For each field, if `other` has a value (Some), it overrides this
    /// config's value. If the `other` value is None, keeps the current value.
    ///
    /// # Example
    ///
    /// ```
    /// # use hostscheck::config::Config;
    /// let cli = Config { threads: Some(8), ..Config::empty() };
    /// let merged = Config::default().merge_with(cli);
    /// assert_eq!(merged.threads, Some(8));
    /// assert_eq!(merged.timeout, Some(5));
    /// ```
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.threads.is_some() {
            self.threads = other.threads;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
        self
    }

    /// A configuration with nothing set, useful as the CLI layer before merging.
    pub fn empty() -> Self {
        Config {
            path: None,
            timeout: None,
            threads: None,
            port: None,
            output: None,
            exit_code: None,
            debug: None,
        }
    }

    /// Resolves the merged configuration into concrete run settings.
    ///
    /// Unset values fall back to their defaults. Returns
    /// `ConfigError::Validation` for a zero timeout, port 0, or a thread
    /// count outside `1..=MAX_THREADS`.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let config = Config::default().merge_with(self);

        let timeout = config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(ConfigError::Validation(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        let threads = config.threads.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(ConfigError::Validation(
                "threads must be at least 1".to_string(),
            ));
        }
        if threads > MAX_THREADS {
            return Err(ConfigError::Validation(format!(
                "threads must be at most {}",
                MAX_THREADS
            )));
        }
        let port = config.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::Validation("port must not be 0".to_string()));
        }

        Ok(Settings {
            path: config
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HOSTS_PATH)),
            timeout: Duration::from_secs(timeout),
            threads,
            port,
            output: config.output.unwrap_or_default(),
            exit_code: config.exit_code.unwrap_or(0),
            debug: config.debug.unwrap_or(false),
        })
    }

    /// Generates an example configuration file in TOML format.
    ///
    /// # Example
    ///
    /// ```
    /// # use hostscheck::config::Config;
    /// let example = Config::example_toml();
    /// assert!(example.contains("threads"));
    /// ```
    pub fn example_toml() -> String {
        let example = Config {
            path: Some(PathBuf::from(DEFAULT_HOSTS_PATH)),
            timeout: Some(3),
            threads: Some(8),
            port: Some(DEFAULT_PORT),
            output: Some(OutputFormat::Json),
            exit_code: Some(1),
            debug: Some(false),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Validation error (out-of-range values)
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            path = "/tmp/hosts"
            timeout = 3
            threads = 16
            port = 8443
            output = "json"
            exit_code = 1
            debug = true
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.path, Some(PathBuf::from("/tmp/hosts")));
        assert_eq!(config.timeout, Some(3));
        assert_eq!(config.threads, Some(16));
        assert_eq!(config.port, Some(8443));
        assert_eq!(config.output, Some(OutputFormat::Json));
        assert_eq!(config.exit_code, Some(1));
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_partial_toml_leaves_rest_unset() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"threads = 4\n").unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.timeout, None);
        assert_eq!(config.path, None);
    }

    #[test]
    fn test_config_merge() {
        let base_config = Config {
            path: Some(PathBuf::from("/base/hosts")),
            timeout: Some(5),
            threads: Some(2),
            port: Some(443),
            output: Some(OutputFormat::Text),
            exit_code: Some(0),
            debug: Some(false),
        };

        let override_config = Config {
            path: None,
            timeout: Some(1),
            threads: None,
            port: None,
            output: Some(OutputFormat::Json),
            exit_code: None,
            debug: Some(true),
        };

        let merged = base_config.merge_with(override_config);

        assert_eq!(merged.path, Some(PathBuf::from("/base/hosts"))); // From base
        assert_eq!(merged.timeout, Some(1)); // Overridden
        assert_eq!(merged.threads, Some(2)); // From base
        assert_eq!(merged.output, Some(OutputFormat::Json)); // Overridden
        assert_eq!(merged.debug, Some(true)); // Overridden
    }

    #[test]
    fn test_config_default() {
        let settings = Config::empty().resolve().unwrap();

        assert_eq!(settings.path, PathBuf::from(DEFAULT_HOSTS_PATH));
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.threads, 2);
        assert_eq!(settings.port, 443);
        assert_eq!(settings.output, OutputFormat::Text);
        assert_eq!(settings.exit_code, 0);
        assert!(!settings.debug);
    }

    #[test]
    fn test_resolve_rejects_zero_threads() {
        let config = Config {
            threads: Some(0),
            ..Config::empty()
        };
        match config.resolve() {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("threads")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_huge_threads() {
        let config = Config {
            threads: Some(usize::MAX),
            ..Config::empty()
        };
        match config.resolve() {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("at most")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }

        let at_limit = Config {
            threads: Some(MAX_THREADS),
            ..Config::empty()
        };
        assert_eq!(at_limit.resolve().unwrap().threads, MAX_THREADS);
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let config = Config {
            timeout: Some(0),
            ..Config::empty()
        };
        assert!(matches!(config.resolve(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"threads = [invalid toml").unwrap();

        let result = Config::from_file(temp_file.path());

        match result.unwrap_err() {
            ConfigError::Parse(_) => {} // Expected
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_output_is_parse_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"output = \"table\"\n").unwrap();

        assert!(matches!(
            Config::from_file(temp_file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_example_toml_generation() {
        let example = Config::example_toml();

        let parsed: Config = toml::from_str(&example).unwrap();

        assert_eq!(parsed.threads, Some(8));
        assert_eq!(parsed.output, Some(OutputFormat::Json));
        assert!(parsed.resolve().is_ok());
    }
}
