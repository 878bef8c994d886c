//! Error types for loading and emitting test plans.

use std::path::PathBuf;

/// Everything that can go wrong during a run.
///
/// Loading failures are fatal and abort the run before any sink is written.
/// [`Error::SinkIo`] is the only recoverable kind: the emitter logs it and
/// disables the affected mirror file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No input documents were configured.
    #[error("mandatory parameter 'files' is not defined")]
    MissingInput,

    /// The document could not be read from disk or fetched over HTTP.
    #[error("source {location} is unavailable: {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// The document is not a valid template or references an unknown field.
    #[error("template {name}: {message}")]
    Template { name: String, message: String },

    /// The rendered document is not valid YAML/JSON, or its type can't be determined.
    #[error("failed to parse {location}: {message}")]
    Parse { location: String, message: String },

    /// A mirror or job-stub file could not be created or written.
    #[error("failed to write {sink} file {}: {source}", path.display())]
    SinkIo {
        sink: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A setting has an unsupported value.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    pub fn source_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn template(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn parse(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn sink_io(sink: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SinkIo {
            sink,
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SinkIo { .. })
    }
}

/// Result type for load and emit operations.
pub type Result<T> = std::result::Result<T, Error>;
