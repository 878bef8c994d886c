//! Document loading: acquire, render as a template, parse, merge.
//!
//! Documents are processed strictly in the configured order because later
//! documents override earlier ones. The first failure aborts the whole load;
//! no partially merged tree is ever returned.

use crate::config::{InputType, RunContext};
use crate::error::{Error, Result};
use crate::merge::deep_merge;
use crate::source::Location;
use crate::template::{Template, TemplateContext};
use crate::value::{ConfigValue, Mapping};
use serde_json::Value;
use tracing::{Level, debug, error, trace};

/// Suffixes read as JSON when the input type is `auto`.
const JSON_SUFFIXES: &[&str] = &["json", "jso", "jsn", "js"];
/// Suffixes read as YAML when the input type is `auto`.
const YAML_SUFFIXES: &[&str] = &["yaml", "yml"];

/// Resolve the concrete format of a document.
///
/// With [`InputType::Auto`] the suffix decides; a missing or unknown suffix
/// is a parse error.
pub fn detect_input_type(location: &Location, configured: InputType) -> Result<InputType> {
    if configured != InputType::Auto {
        return Ok(configured);
    }
    let suffix = location.suffix().unwrap_or_default();
    if JSON_SUFFIXES.contains(&suffix.as_str()) {
        Ok(InputType::Json)
    } else if YAML_SUFFIXES.contains(&suffix.as_str()) {
        Ok(InputType::Yaml)
    } else {
        error!(file = %location, suffix = %suffix, "Can't determine file type");
        Err(Error::parse(
            location.to_string(),
            format!("unknown file suffix '{}', can't use input type 'auto'", suffix),
        ))
    }
}

/// Parse rendered document text into a mapping.
///
/// An empty document yields an empty mapping. YAML merge keys (`<<`) are
/// resolved before conversion.
pub fn parse_document(text: &str, input_type: InputType, location: &str) -> Result<Mapping> {
    let value = match input_type {
        InputType::Json => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                error!(file = location, error = %e, "Could not unmarshal json");
                Error::parse(location, e)
            })?;
            ConfigValue::from(json)
        }
        InputType::Yaml | InputType::Auto => {
            let mut yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
                error!(file = location, error = %e, "Could not unmarshal yaml");
                Error::parse(location, e)
            })?;
            yaml.apply_merge().map_err(|e| Error::parse(location, e))?;
            ConfigValue::from(yaml)
        }
    };

    match value {
        ConfigValue::Mapping(map) => Ok(map),
        ConfigValue::Null => Ok(Mapping::new()),
        other => Err(Error::parse(
            location,
            format!("top-level value is a {}, expected a mapping", other.kind()),
        )),
    }
}

/// Loads the documents of one run.
pub struct Loader<'a> {
    ctx: &'a RunContext,
    data: Value,
}

impl<'a> Loader<'a> {
    pub fn new(ctx: &'a RunContext) -> Result<Self> {
        let data = TemplateContext::new(ctx).to_data()?;
        Ok(Self { ctx, data })
    }

    /// Load one input entry into a document.
    pub async fn load_document(&self, raw: &str) -> Result<Mapping> {
        let location = Location::parse(raw);
        debug!(file = %location, "Load file");

        let input_type = detect_input_type(&location, self.ctx.settings.input_type)?;
        let source = location.fetch(self.ctx.settings.token.as_deref()).await?;

        let name = location.name();
        let rendered = Template::parse(&name, &source)
            .and_then(|template| template.render(&self.data))
            .inspect_err(|e| error!(file = %location, error = %e, "Failed to render template"))?;
        trace!(raw = %source, parsed = %rendered, "Parsed file");

        parse_document(&rendered, input_type, &location.to_string())
    }

    /// Load every configured document and fold them into one tree.
    pub async fn load_all(&self) -> Result<Mapping> {
        let files = &self.ctx.settings.files;
        if files.is_empty() {
            return Err(Error::MissingInput);
        }

        let mut tree = Mapping::new();
        for file in files {
            let document = self.load_document(file).await?;
            tree = deep_merge(&tree, &document);
            if tracing::enabled!(Level::TRACE) {
                let dump = serde_json::to_string(&tree).unwrap_or_default();
                trace!(file = %file, tree = %dump, "Merged document");
            }
        }
        Ok(tree)
    }
}
