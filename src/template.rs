//! Text templating of input documents.
//!
//! Documents may reference run settings and ambient data with
//! `{{ .Field.Path }}` actions before they are parsed:
//!
//! ```yaml
//! repository: '{{ .Github.Repository }}'
//! path: '{{ .Env.PATH }}'
//! separator: '{{ .Separator }}'
//! ```
//!
//! Supported actions are field paths, string literals (`{{ "{{" }}`,
//! `` {{ `raw` }} ``) and comments (`{{/* … */}}`). A leading `{{- ` or a
//! trailing ` -}}` trims the whitespace around the action.
//!
//! A missing key below `.Env` or `.Github.Event` renders as an empty string;
//! any other unknown field is an execution error. Lists render as
//! `[a b]` and objects as `map[k:v]`.

use crate::config::{JobContext, RunContext};
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level names available to templates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext<'a> {
    pub files: &'a [String],
    pub input_type: &'static str,
    pub separator: &'a str,
    pub set_output: bool,
    pub set_env: bool,
    pub set_print: bool,
    pub generate_job: bool,
    pub yaml_name: String,
    pub json_name: String,
    pub log_level: &'static str,
    pub log_file: &'a str,
    pub env: &'a BTreeMap<String, String>,
    pub github: &'a JobContext,
}

impl<'a> TemplateContext<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        let settings = &ctx.settings;
        let path_name = |p: &Option<std::path::PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        Self {
            files: &settings.files,
            input_type: settings.input_type.as_str(),
            separator: &settings.separator,
            set_output: settings.sinks.set_output,
            set_env: settings.sinks.set_env,
            set_print: settings.sinks.set_print,
            generate_job: settings.sinks.generate_job,
            yaml_name: path_name(&settings.sinks.yaml),
            json_name: path_name(&settings.sinks.json),
            log_level: settings.log.level.as_str(),
            log_file: settings.log.file.as_deref().unwrap_or_default(),
            env: &ctx.env,
            github: &ctx.github,
        }
    }

    /// Serialize into the lookup tree used while rendering.
    pub fn to_data(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| Error::template("context", format!("can't build template data: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Field { path: Vec<String>, line: usize },
    Literal(String),
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source`. `name` identifies the template in errors.
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut rest = source;
        let mut line = 1;
        let mut trim_next = false;

        while let Some(start) = rest.find("{{") {
            let mut text = &rest[..start];
            line += text.matches('\n').count();
            if trim_next {
                text = text.trim_start();
            }

            let after = &rest[start + 2..];
            let end = find_close(after)
                .ok_or_else(|| Error::template(name, format!("line {}: unclosed action", line)))?;
            let mut action = &after[..end];

            let trim_left = action
                .strip_prefix('-')
                .is_some_and(|r| r.starts_with(char::is_whitespace));
            let trim_right = action
                .strip_suffix('-')
                .is_some_and(|r| r.ends_with(char::is_whitespace));
            if trim_left {
                text = text.trim_end();
                action = &action[1..];
            }
            if trim_right {
                action = &action[..action.len() - 1];
            }

            if !text.is_empty() {
                nodes.push(Node::Text(text.to_string()));
            }
            if let Some(node) = parse_action(name, action.trim(), line)? {
                nodes.push(node);
            }

            line += action.matches('\n').count();
            rest = &after[end + 2..];
            trim_next = trim_right;
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        if !tail.is_empty() {
            nodes.push(Node::Text(tail.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    /// Render against `data`, usually [`TemplateContext::to_data`].
    pub fn render(&self, data: &Value) -> Result<String> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) | Node::Literal(text) => out.push_str(text),
                Node::Field { path, line } => {
                    if let Some(value) = lookup(&self.name, data, path, *line)? {
                        push_value(&mut out, value);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Byte offset of the `}}` closing an action, skipping quoted literals.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn parse_action(name: &str, action: &str, line: usize) -> Result<Option<Node>> {
    if action.starts_with("/*") && action.ends_with("*/") {
        return Ok(None);
    }
    if let Some(path) = action.strip_prefix('.') {
        if path.is_empty() {
            return Ok(Some(Node::Field {
                path: Vec::new(),
                line,
            }));
        }
        let segments: Vec<String> = path.split('.').map(String::from).collect();
        let valid = segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_'));
        if !valid {
            return Err(Error::template(
                name,
                format!("line {}: bad field path .{}", line, path),
            ));
        }
        return Ok(Some(Node::Field {
            path: segments,
            line,
        }));
    }
    if action.len() >= 2 && action.starts_with('"') && action.ends_with('"') {
        let literal: String = serde_json::from_str(action).map_err(|e| {
            Error::template(name, format!("line {}: bad string literal: {}", line, e))
        })?;
        return Ok(Some(Node::Literal(literal)));
    }
    if action.len() >= 2 && action.starts_with('`') && action.ends_with('`') {
        return Ok(Some(Node::Literal(action[1..action.len() - 1].to_string())));
    }
    if action.is_empty() {
        return Err(Error::template(name, format!("line {}: missing value for command", line)));
    }
    Err(Error::template(
        name,
        format!("line {}: unsupported action {:?}", line, action),
    ))
}

/// Whether missing keys below `path` render empty instead of failing.
fn is_open_map(path: &[String]) -> bool {
    match path {
        [first, ..] if first == "Env" => true,
        [first, second, ..] => first == "Github" && second == "Event",
        _ => false,
    }
}

fn lookup<'v>(name: &str, data: &'v Value, path: &[String], line: usize) -> Result<Option<&'v Value>> {
    let mut node = data;
    for (i, segment) in path.iter().enumerate() {
        node = match node {
            Value::Object(map) => match map.get(segment) {
                Some(value) => value,
                None if is_open_map(&path[..i]) => return Ok(None),
                None => {
                    return Err(Error::template(
                        name,
                        format!("line {}: can't evaluate field {}", line, path[..=i].join(".")),
                    ));
                }
            },
            Value::Null => return Ok(None),
            _ => {
                return Err(Error::template(
                    name,
                    format!(
                        "line {}: can't evaluate field {} in a scalar value",
                        line, segment
                    ),
                ));
            }
        };
    }
    Ok(Some(node))
}

fn push_value(out: &mut String, value: &Value) {
    if !value.is_null() {
        push_formatted(out, value);
    }
}

/// Text form of a value as test plans expect it: lists as `[a b]`, objects as
/// `map[k:v]` with sorted keys, nested nulls as `<nil>`.
fn push_formatted(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(&b.to_string()),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                push_formatted(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push_str("map[");
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                push_formatted(out, item);
            }
            out.push(']');
        }
    }
}
