//! Runtime configuration
//!
//! Only the driver is configurable; the site topology is fixed.

use crate::cli::Cli;
use crate::error::CliError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Transcript format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Framed operation echoes and one line per event
    Text,
    /// One JSON event per line
    Json,
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transcript path; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Transcript format
    #[serde(default = "default_format")]
    pub format: Format,
    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Print a metrics snapshot after the run
    #[serde(default)]
    pub metrics: bool,
    /// Copy the transcript to stdout when writing to a file
    #[serde(default)]
    pub echo: bool,
}

fn default_format() -> Format {
    Format::Text
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: None,
            format: default_format(),
            log_level: default_log_level(),
            metrics: false,
            echo: false,
        }
    }
}

impl Config {
    /// Load a TOML config file
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML config text
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Let command-line flags override file values
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(output) = &cli.output {
            self.output = Some(output.clone());
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        self.metrics |= cli.metrics;
        self.echo |= cli.echo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.format, Format::Text);
        assert_eq!(config.log_level, "warn");
        assert!(config.output.is_none());
        assert!(!config.metrics);
    }

    #[test]
    fn test_config_partial_file() {
        let config = Config::from_toml("format = \"json\"\nmetrics = true\n").unwrap();
        assert_eq!(config.format, Format::Json);
        assert!(config.metrics);
        assert_eq!(config.log_level, "warn");
        assert!(!config.echo);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            output: Some(PathBuf::from("out.txt")),
            echo: true,
            ..Config::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_config_invalid() {
        let err = Config::from_toml("format = \"yaml\"").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = Config::from_toml("format = \"json\"\nlog_level = \"info\"\n").unwrap();
        let cli = Cli::parse_from(["tickdb", "--format", "text", "--echo"]);
        config.apply(&cli);
        assert_eq!(config.format, Format::Text);
        assert_eq!(config.log_level, "info");
        assert!(config.echo);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/tickdb.toml")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
