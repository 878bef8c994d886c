//! Mirror files re-serializing the merged tree.
//!
//! The YAML mirror is written line by line while the emitter walks the
//! tree. The JSON mirror is written in one go from the finished tree. A mirror
//! that can't be created or written is disabled; the run goes on.

use crate::error::{Error, Result};
use crate::value::{ConfigValue, Mapping, Number};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One nesting level in the YAML mirror.
pub const INDENT: &str = "  ";

/// YAML mirror file, written incrementally.
pub struct YamlMirror {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl YamlMirror {
    /// Create the file and write the document marker.
    ///
    /// Returns `None`, after logging a warning, if the file can't be created.
    pub fn create(path: &Path) -> Option<Self> {
        let file = match File::create(path) {
            Ok(file) => file,
            Err(err) => {
                let err = Error::sink_io("yaml", path, err);
                warn!(error = %err, "Can't open yaml file, skipping yaml output");
                return None;
            }
        };
        let mut mirror = Self {
            path: path.to_path_buf(),
            out: Some(BufWriter::new(file)),
        };
        mirror.line(format_args!("---"));
        Some(mirror)
    }

    /// `key:` opening a nested mapping.
    pub fn mapping_header(&mut self, depth: usize, key: &str) {
        self.line(format_args!("{}{}:", indent(depth), yaml_key(key)));
    }

    /// `key: {}` for a mapping without entries.
    pub fn empty_mapping(&mut self, depth: usize, key: &str) {
        self.line(format_args!("{}{}: {{}}", indent(depth), yaml_key(key)));
    }

    /// A scalar entry. Multi-line strings become literal block scalars.
    pub fn scalar(&mut self, depth: usize, key: &str, value: &ConfigValue) {
        let pad = indent(depth);
        let key = yaml_key(key);
        match value {
            ConfigValue::String(s) if s.contains('\n') && !s.chars().any(needs_escape) => {
                let block = format!("{}{}{}", pad, INDENT, INDENT);
                let (header, body) = block_scalar(s);
                self.line(format_args!("{}{}: {}", pad, key, header));
                for line in body.split('\n') {
                    if line.is_empty() {
                        self.line(format_args!(""));
                    } else {
                        self.line(format_args!("{}{}", block, line));
                    }
                }
            }
            other => self.line(format_args!("{}{}: {}", pad, key, inline_value(other))),
        }
    }

    /// A block sequence under its own header.
    pub fn sequence(&mut self, depth: usize, key: &str, items: &[ConfigValue]) {
        let pad = indent(depth);
        let key = yaml_key(key);
        if items.is_empty() {
            self.line(format_args!("{}{}: []", pad, key));
            return;
        }
        self.line(format_args!("{}{}:", pad, key));
        for item in items {
            self.line(format_args!("{}{}- {}", pad, INDENT, inline_value(item)));
        }
    }

    /// Flush the file. Returns whether the mirror was written completely.
    pub fn finish(mut self) -> bool {
        let Some(mut out) = self.out.take() else {
            return false;
        };
        match out.flush() {
            Ok(()) => true,
            Err(err) => {
                let err = Error::sink_io("yaml", &self.path, err);
                warn!(error = %err, "Can't write yaml file, skipping yaml output");
                false
            }
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        if let Err(err) = writeln!(out, "{}", args) {
            let err = Error::sink_io("yaml", &self.path, err);
            warn!(error = %err, "Can't write yaml file, skipping yaml output");
            self.out = None;
        }
    }
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

/// Keys are written plain when that is unambiguous, quoted otherwise.
fn yaml_key(key: &str) -> String {
    let plain = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));
    if plain {
        key.to_string()
    } else {
        quoted(key)
    }
}

fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Characters a single-quoted or block scalar can't carry verbatim: control
/// characters, Unicode line breaks and the non-characters YAML rejects.
fn needs_escape(c: char) -> bool {
    match c {
        '\n' | '\t' => false,
        '\u{2028}' | '\u{2029}' | '\u{feff}' | '\u{fffe}' | '\u{ffff}' => true,
        c => c.is_control(),
    }
}

/// Single quotes when the text survives them, escaped double quotes otherwise.
fn quoted(s: &str) -> String {
    if s.contains('\n') || s.chars().any(needs_escape) {
        double_quoted(s)
    } else {
        single_quoted(s)
    }
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if needs_escape(c) => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A value on the same line as its key or sequence dash.
fn inline_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Null => "null".to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::Number(n) => yaml_number(n),
        ConfigValue::String(s) => quoted(s),
        // Flow collections in JSON syntax are valid YAML.
        ConfigValue::Sequence(_) | ConfigValue::Mapping(_) => value.to_string(),
    }
}

fn yaml_number(n: &Number) -> String {
    match n {
        Number::Float(f) if f.is_nan() => ".nan".to_string(),
        Number::Float(f) if f.is_infinite() && *f > 0.0 => ".inf".to_string(),
        Number::Float(f) if f.is_infinite() => "-.inf".to_string(),
        other => other.to_string(),
    }
}

/// Block scalar header and body for a multi-line string.
///
/// The chomping indicator preserves trailing newlines exactly. A body of
/// blank lines only needs keep, since clip would drop it entirely. Content
/// that starts with a space gets an explicit indentation indicator.
fn block_scalar(s: &str) -> (String, &str) {
    let (body, chomp) = match s.strip_suffix('\n') {
        Some(rest) if rest.ends_with('\n') || rest.is_empty() => (rest, "+"),
        Some(rest) => (rest, ""),
        None => (s, "-"),
    };
    let leading_space = body
        .split('\n')
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with(' '));
    let indicator = if leading_space { "4" } else { "" };
    (format!("|{}{}", indicator, chomp), body)
}

/// Write the whole tree as JSON, pretty-printed with 4-space indentation.
pub fn write_json_mirror(path: &Path, tree: &Mapping) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::sink_io("json", path, e))?;
    let mut writer = BufWriter::new(file);
    let mut ser =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    tree.serialize(&mut ser)
        .map_err(|e| Error::sink_io("json", path, e.into()))?;
    writer.flush().map_err(|e| Error::sink_io("json", path, e))
}
