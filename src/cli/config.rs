use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoding of the rows a script runs over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// A single JSON array of values.
    #[default]
    Json,
    /// Comma-separated rows with a header line.
    Csv,
}

/// Rendering of a script result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Compact JSON on one line.
    #[default]
    Json,
    /// Indented JSON.
    Pretty,
    /// One compact JSON value per line for list results.
    Lines,
}

/// Settings read from `quarry.toml`; command-line flags take precedence.
#[derive(Debug, Clone, Default)]
pub struct QuarryConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl QuarryConfig {
    /// Loads `explicit`, or the default location when `None`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let data = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self { path: None, data })
    }

    /// The file the configuration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Input format, defaulting to JSON.
    pub fn input_format(&self) -> InputFormat {
        self.data.input.format.unwrap_or_default()
    }

    /// Output format, defaulting to compact JSON.
    pub fn output_format(&self) -> OutputFormat {
        self.data.output.format.unwrap_or_default()
    }

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &str {
        self.data.log_filter.as_deref().unwrap_or("warn")
    }

    /// Whether evaluation counters should be collected and reported.
    pub fn profile(&self) -> bool {
        self.data.profile.unwrap_or(false)
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    input: InputSection,
    #[serde(default)]
    output: OutputSection,
    #[serde(default)]
    log_filter: Option<String>,
    #[serde(default)]
    profile: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct InputSection {
    format: Option<InputFormat>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct OutputSection {
    format: Option<OutputFormat>,
}

/// Failure to load `quarry.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// `<config dir>/quarry/quarry.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("quarry").join("quarry.toml"))
}
