//! Run settings.
//!
//! [`Settings`] is built once from the command line (or the `INPUT_*`
//! variables the hosting platform sets for action inputs) and never changes
//! afterwards. [`RunContext`] adds the environment snapshot and job metadata
//! that templates can reference.

mod context;

pub use context::{JobContext, RunContext};

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::logging::LogLevel;
use std::path::PathBuf;
use std::str::FromStr;

/// Default separator between the keys of a flattened path.
pub const DEFAULT_SEPARATOR: &str = "_";

/// How input documents are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    /// Decide from the file suffix.
    #[default]
    Auto,
    Yaml,
    Json,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Auto => "auto",
            InputType::Yaml => "yaml",
            InputType::Json => "json",
        }
    }
}

impl FromStr for InputType {
    type Err = Error;

    /// `auto` (or empty) and `json` are recognised; anything else reads as YAML.
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_lowercase().as_str() {
            "auto" | "" => InputType::Auto,
            "json" => InputType::Json,
            _ => InputType::Yaml,
        })
    }
}

/// Which sinks receive the flattened tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkConfig {
    /// Export every key into the step environment.
    pub set_env: bool,
    /// Publish every key as a step output.
    pub set_output: bool,
    /// Print `KEY=value` lines to stdout.
    pub set_print: bool,
    /// Mirror the tree into this YAML file.
    pub yaml: Option<PathBuf>,
    /// Mirror the tree into this JSON file.
    pub json: Option<PathBuf>,
    /// Write a reusable job definition declaring every output.
    pub generate_job: bool,
}

/// Logging settings, kept for the template context and the job stub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    /// Log file; `None` logs to stdout.
    pub file: Option<String>,
}

/// Everything a run needs to know, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Files or URLs in merge order.
    pub files: Vec<String>,
    pub input_type: InputType,
    pub separator: String,
    /// Access token appended to remote URLs.
    pub token: Option<String>,
    pub sinks: SinkConfig,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            input_type: InputType::Auto,
            separator: DEFAULT_SEPARATOR.to_string(),
            token: None,
            sinks: SinkConfig::default(),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Validate the command line into settings.
    ///
    /// Fails with [`Error::Configuration`] on an unknown log level and with
    /// [`Error::MissingInput`] when no file is given.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let level: LogLevel = cli.loglevel.as_deref().unwrap_or_default().parse()?;
        let log = LogSettings {
            level,
            file: non_empty(cli.logfile.as_deref()),
        };

        let files = parse_file_list(cli.files.as_deref().unwrap_or_default());
        if files.is_empty() {
            return Err(Error::MissingInput);
        }

        let separator = match cli.separator.as_deref() {
            None | Some("") => DEFAULT_SEPARATOR.to_string(),
            Some(sep) => sep.to_string(),
        };

        Ok(Self {
            files,
            input_type: cli.input_type.as_deref().unwrap_or_default().parse()?,
            separator,
            token: non_empty(cli.token.as_deref()),
            sinks: SinkConfig {
                set_env: cli.set_env,
                set_output: cli.set_output,
                set_print: cli.set_print,
                yaml: non_empty(cli.yaml.as_deref()).map(PathBuf::from),
                json: non_empty(cli.json.as_deref()).map(PathBuf::from),
                generate_job: cli.generate_job,
            },
            log,
        })
    }
}

/// Split the comma separated `files` input, dropping blank entries.
pub fn parse_file_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
