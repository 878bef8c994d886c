//! Emission engine: walks the merged tree and feeds every active sink.
//!
//! Per flattened key the sinks are written in a fixed order: step environment,
//! step output, console, YAML mirror. The JSON mirror and the job stub are
//! produced once the walk is done.

mod job;
mod mirror;
mod sinks;

pub use job::{JOB_STUB_FILE, OutputRegistry, render_job_stub, write_job_stub};
pub use mirror::{INDENT, YamlMirror, write_json_mirror};
pub use sinks::{
    ENV_FILE_VAR, GithubSink, MemorySink, OUTPUT_FILE_VAR, StepSink, file_record,
    workflow_command,
};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::sanitize::sanitize;
use crate::value::{ConfigValue, Mapping};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// What a run produced besides the step writes.
#[derive(Debug, Default)]
pub struct Emission {
    /// Flattened keys, filled when job stub generation is on.
    pub registry: OutputRegistry,
    pub yaml_written: bool,
    pub json_written: bool,
}

/// Flattens a merged tree into the configured sinks.
pub struct Emitter<'a> {
    settings: &'a Settings,
    step: &'a mut dyn StepSink,
    console: Box<dyn Write + 'a>,
    ansi: bool,
    job_stub_path: PathBuf,
}

impl<'a> Emitter<'a> {
    /// Emitter printing to stdout and writing the job stub to the working
    /// directory.
    pub fn new(settings: &'a Settings, step: &'a mut dyn StepSink) -> Self {
        Self {
            settings,
            step,
            console: Box::new(std::io::stdout()),
            ansi: false,
            job_stub_path: PathBuf::from(JOB_STUB_FILE),
        }
    }

    pub fn with_console(mut self, console: impl Write + 'a) -> Self {
        self.console = Box::new(console);
        self
    }

    /// Color top-level section headers on the console.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_job_stub_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.job_stub_path = path.into();
        self
    }

    /// Emit `tree` to every active sink.
    ///
    /// Step sink and console failures abort the run. Mirror failures are
    /// logged and only disable that mirror.
    pub fn emit(&mut self, tree: &Mapping) -> Result<Emission> {
        let settings = self.settings;
        let sinks = &settings.sinks;
        let mut walk = Walk {
            yaml: sinks.yaml.as_deref().and_then(YamlMirror::create),
            registry: OutputRegistry::new(),
        };
        self.walk(&mut walk, tree, 0, "")?;

        let mut emission = Emission {
            yaml_written: walk.yaml.map(YamlMirror::finish).unwrap_or(false),
            registry: walk.registry,
            json_written: false,
        };

        if let Some(path) = &sinks.json {
            match write_json_mirror(path, tree) {
                Ok(()) => emission.json_written = true,
                Err(err) if !err.is_fatal() => {
                    warn!(error = %err, "Can't write json file, skipping json output")
                }
                Err(err) => return Err(err),
            }
        }

        if sinks.generate_job {
            write_job_stub(&self.job_stub_path, settings, &emission.registry)?;
            debug!(file = %self.job_stub_path.display(), outputs = emission.registry.len(), "Job stub written");
        }
        Ok(emission)
    }

    fn walk(&mut self, state: &mut Walk, map: &Mapping, depth: usize, prefix: &str) -> Result<()> {
        for (key, value) in map {
            match value {
                ConfigValue::Mapping(child) => {
                    if depth == 0 && self.settings.sinks.set_print {
                        self.section_header(key)?;
                    }
                    if let Some(yaml) = state.yaml.as_mut() {
                        if child.is_empty() {
                            yaml.empty_mapping(depth, key);
                        } else {
                            yaml.mapping_header(depth, key);
                        }
                    }
                    let prefix = format!("{}{}{}", prefix, key, self.settings.separator);
                    self.walk(state, child, depth + 1, &prefix)?;
                }
                ConfigValue::Sequence(items) => {
                    let text = join_lines(items);
                    let flat = sanitize(&format!("{}{}", prefix, key));
                    self.leaf(state, &flat, &text)?;
                    if let Some(yaml) = state.yaml.as_mut() {
                        yaml.sequence(depth, key, items);
                    }
                }
                scalar => {
                    let text = scalar.to_string();
                    let flat = sanitize(&format!("{}{}", prefix, key));
                    self.leaf(state, &flat, &text)?;
                    if let Some(yaml) = state.yaml.as_mut() {
                        yaml.scalar(depth, key, scalar);
                    }
                }
            }
        }
        Ok(())
    }

    /// Environment, step output and console for one flattened key.
    fn leaf(&mut self, state: &mut Walk, flat: &str, text: &str) -> Result<()> {
        let sinks = &self.settings.sinks;
        debug!(key = %flat, value = %text, "Emitting");
        if sinks.set_env {
            self.step.set_env(flat, text)?;
        }
        if sinks.set_output {
            self.step.set_output(flat, text)?;
        }
        if sinks.set_print {
            writeln!(self.console, "{}={}", flat, text)
                .map_err(|e| Error::sink_io("console", "-", e))?;
        }
        if sinks.generate_job {
            if state.registry.contains_key(flat) {
                warn!(key = %flat, "Duplicate output key, keeping the first value");
            } else {
                state.registry.insert(flat.to_string(), text.to_string());
            }
        }
        Ok(())
    }

    fn section_header(&mut self, key: &str) -> Result<()> {
        let line = if self.ansi {
            format!("\x1b[35m{}\x1b[0m", key)
        } else {
            key.to_string()
        };
        writeln!(self.console, "{}", line).map_err(|e| Error::sink_io("console", "-", e))
    }
}

/// Mutable state of one walk over the tree.
struct Walk {
    yaml: Option<YamlMirror>,
    registry: OutputRegistry,
}

/// Sequence elements, one per line. Empty elements keep their line.
fn join_lines(items: &[ConfigValue]) -> String {
    items
        .iter()
        .map(ConfigValue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
