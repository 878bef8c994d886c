//! Per-run context: settings plus the ambient state templates can read.

use super::Settings;
use crate::error::{Error, Result};
use crate::value::ConfigValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use tracing::debug;

/// Metadata about the invoking workflow job, read from `GITHUB_*` variables.
///
/// Field names follow the template names used by existing test plans,
/// e.g. `{{ .Github.Repository }}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobContext {
    pub action: String,
    pub action_path: String,
    pub action_repository: String,
    pub actions: bool,
    pub actor: String,
    #[serde(rename = "APIURL")]
    pub api_url: String,
    pub base_ref: String,
    pub env: String,
    pub event_name: String,
    pub event_path: String,
    #[serde(rename = "GraphqlURL")]
    pub graphql_url: String,
    pub head_ref: String,
    pub job: String,
    pub path: String,
    #[serde(rename = "Ref")]
    pub git_ref: String,
    pub ref_name: String,
    pub ref_protected: bool,
    pub ref_type: String,
    pub repository: String,
    pub repository_owner: String,
    pub retention_days: i64,
    pub run_attempt: i64,
    #[serde(rename = "RunID")]
    pub run_id: i64,
    pub run_number: i64,
    #[serde(rename = "ServerURL")]
    pub server_url: String,
    #[serde(rename = "SHA")]
    pub sha: String,
    pub step_summary: String,
    pub workflow: String,
    pub workspace: String,
    /// Parsed webhook payload from `GITHUB_EVENT_PATH`.
    pub event: ConfigValue,
}

impl JobContext {
    /// Build the job context from an environment snapshot.
    ///
    /// A missing event payload file leaves `event` empty; an unreadable or
    /// malformed one is a configuration error.
    pub fn from_env(env: &BTreeMap<String, String>) -> Result<Self> {
        let var = |name: &str| env.get(name).cloned().unwrap_or_default();
        let num = |name: &str| var(name).parse::<i64>().unwrap_or(0);
        let flag = |name: &str| var(name).eq_ignore_ascii_case("true");

        let mut ctx = Self {
            action: var("GITHUB_ACTION"),
            action_path: var("GITHUB_ACTION_PATH"),
            action_repository: var("GITHUB_ACTION_REPOSITORY"),
            actions: flag("GITHUB_ACTIONS"),
            actor: var("GITHUB_ACTOR"),
            api_url: env
                .get("GITHUB_API_URL")
                .cloned()
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            base_ref: var("GITHUB_BASE_REF"),
            env: var("GITHUB_ENV"),
            event_name: var("GITHUB_EVENT_NAME"),
            event_path: var("GITHUB_EVENT_PATH"),
            graphql_url: env
                .get("GITHUB_GRAPHQL_URL")
                .cloned()
                .unwrap_or_else(|| "https://api.github.com/graphql".to_string()),
            head_ref: var("GITHUB_HEAD_REF"),
            job: var("GITHUB_JOB"),
            path: var("GITHUB_PATH"),
            git_ref: var("GITHUB_REF"),
            ref_name: var("GITHUB_REF_NAME"),
            ref_protected: flag("GITHUB_REF_PROTECTED"),
            ref_type: var("GITHUB_REF_TYPE"),
            repository: var("GITHUB_REPOSITORY"),
            repository_owner: var("GITHUB_REPOSITORY_OWNER"),
            retention_days: num("GITHUB_RETENTION_DAYS"),
            run_attempt: num("GITHUB_RUN_ATTEMPT"),
            run_id: num("GITHUB_RUN_ID"),
            run_number: num("GITHUB_RUN_NUMBER"),
            server_url: env
                .get("GITHUB_SERVER_URL")
                .cloned()
                .unwrap_or_else(|| "https://github.com".to_string()),
            sha: var("GITHUB_SHA"),
            step_summary: var("GITHUB_STEP_SUMMARY"),
            workflow: var("GITHUB_WORKFLOW"),
            workspace: var("GITHUB_WORKSPACE"),
            event: ConfigValue::Null,
        };

        if !ctx.event_path.is_empty() {
            ctx.event = read_event(&ctx.event_path)?;
        }
        Ok(ctx)
    }
}

fn read_event(path: &str) -> Result<ConfigValue> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(file = path, "Event payload not found");
            return Ok(ConfigValue::Null);
        }
        Err(err) => {
            return Err(Error::Configuration(format!(
                "can't read event payload {}: {}",
                path, err
            )));
        }
    };
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|err| {
        Error::Configuration(format!("can't parse event payload {}: {}", path, err))
    })?;
    Ok(ConfigValue::from(json))
}

/// State shared by the loader and the emitter for one run.
///
/// Created once at startup; nothing in it changes while documents are
/// loaded and emitted.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: Settings,
    /// Snapshot of the process environment.
    pub env: BTreeMap<String, String>,
    pub github: JobContext,
}

impl RunContext {
    /// Capture the current process environment.
    pub fn capture(settings: Settings) -> Result<Self> {
        Self::with_env(settings, std::env::vars().collect())
    }

    /// Build a context from an explicit environment snapshot.
    pub fn with_env(settings: Settings, env: BTreeMap<String, String>) -> Result<Self> {
        let github = JobContext::from_env(&env)?;
        Ok(Self {
            settings,
            env,
            github,
        })
    }
}
