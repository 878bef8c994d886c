//! Step output and step environment sinks.
//!
//! The emitter only sees [`StepSink`]. [`GithubSink`] speaks the hosting
//! platform's file command protocol; [`MemorySink`] records calls for tests.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, trace};
use uuid::Uuid;

/// Environment variable naming the step output file.
pub const OUTPUT_FILE_VAR: &str = "GITHUB_OUTPUT";
/// Environment variable naming the step environment file.
pub const ENV_FILE_VAR: &str = "GITHUB_ENV";

/// Capability to publish values to the invoking CI step.
pub trait StepSink {
    /// Publish `value` as step output `key`.
    fn set_output(&mut self, key: &str, value: &str) -> Result<()>;

    /// Export `value` as environment variable `key` for later steps.
    fn set_env(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Writes outputs and environment variables the way GitHub Actions expects.
///
/// With `GITHUB_OUTPUT` / `GITHUB_ENV` set, every value is appended to that
/// file as a heredoc record. Without them, the legacy `::set-output` and
/// `::set-env` workflow commands are printed to stdout.
#[derive(Debug, Clone, Default)]
pub struct GithubSink {
    output_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl GithubSink {
    pub fn new(output_file: Option<PathBuf>, env_file: Option<PathBuf>) -> Self {
        Self {
            output_file,
            env_file,
        }
    }

    /// Locate the command files from an environment snapshot.
    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        let file = |name: &str| {
            env.get(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self::new(file(OUTPUT_FILE_VAR), file(ENV_FILE_VAR))
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Log the step output file at trace level.
    pub fn trace_output_file(&self) {
        let Some(path) = &self.output_file else {
            error!("Could not get {}, failed to dump outputs", OUTPUT_FILE_VAR);
            return;
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                trace!(file = %path.display(), output = %content, "Content of {}", OUTPUT_FILE_VAR)
            }
            Err(err) => error!(file = %path.display(), error = %err, "Failed to read file"),
        }
    }
}

impl StepSink for GithubSink {
    fn set_output(&mut self, key: &str, value: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => append_record(path, "step-output", key, value),
            None => print_command("set-output", key, value),
        }
    }

    fn set_env(&mut self, key: &str, value: &str) -> Result<()> {
        match &self.env_file {
            Some(path) => append_record(path, "step-env", key, value),
            None => print_command("set-env", key, value),
        }
    }
}

/// Format a `KEY<<DELIM` heredoc record.
pub fn file_record(key: &str, value: &str, delimiter: &str) -> String {
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

fn append_record(path: &Path, sink: &'static str, key: &str, value: &str) -> Result<()> {
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    let record = file_record(key, value, &delimiter);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(record.as_bytes()))
        .map_err(|e| Error::sink_io(sink, path, e))
}

/// Format a legacy `::command name=KEY::VALUE` line.
pub fn workflow_command(command: &str, key: &str, value: &str) -> String {
    format!(
        "::{} name={}::{}",
        command,
        escape_property(key),
        escape_data(value)
    )
}

fn print_command(command: &str, key: &str, value: &str) -> Result<()> {
    let line = workflow_command(command, key, value);
    writeln!(std::io::stdout().lock(), "{}", line).map_err(|e| Error::sink_io("stdout", "-", e))
}

fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

/// In-memory sink recording every call in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub outputs: Vec<(String, String)>,
    pub env: Vec<(String, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value published as output `key`.
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Last value exported as environment variable `key`.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl StepSink for MemorySink {
    fn set_output(&mut self, key: &str, value: &str) -> Result<()> {
        self.outputs.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn set_env(&mut self, key: &str, value: &str) -> Result<()> {
        self.env.push((key.to_string(), value.to_string()));
        Ok(())
    }
}
