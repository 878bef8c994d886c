//! CLI definitions for load-testplan
//!
//! Every argument can also be supplied through the `INPUT_<NAME>` variable the
//! hosting platform sets for an action input, so the binary runs unchanged
//! as a workflow step or from a shell.

use clap::{ArgAction, Parser};

/// Merge templated YAML/JSON test plans and publish them as step outputs,
/// environment variables and mirror files
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Comma separated list of files or URLs, loaded and merged in order
    #[arg(long, env = "INPUT_FILES", value_name = "LIST")]
    pub files: Option<String>,

    /// Input format: auto (from file suffix), yaml or json
    #[arg(long, env = "INPUT_INPUT_TYPE", value_name = "TYPE")]
    pub input_type: Option<String>,

    /// Separator between nested keys in flattened names (default: _)
    #[arg(long, env = "INPUT_SEPARATOR")]
    pub separator: Option<String>,

    /// Publish every key as a step output
    #[arg(long, env = "INPUT_SET_OUTPUT", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    pub set_output: bool,

    /// Export every key into the step environment
    #[arg(long, env = "INPUT_SET_ENV", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    pub set_env: bool,

    /// Print KEY=value lines to stdout
    #[arg(long, env = "INPUT_SET_PRINT", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    pub set_print: bool,

    /// Write job_load_testplan.yml declaring all outputs
    #[arg(long, env = "INPUT_GENERATE_JOB", default_value = "false", action = ArgAction::Set, value_parser = parse_flag)]
    pub generate_job: bool,

    /// Mirror the merged tree into this YAML file
    #[arg(long, env = "INPUT_YAML", value_name = "FILE")]
    pub yaml: Option<String>,

    /// Mirror the merged tree into this JSON file
    #[arg(long, env = "INPUT_JSON", value_name = "FILE")]
    pub json: Option<String>,

    /// Log level: TRACE, DEBUG, INFO, WARN (default), ERROR, FATAL or PANIC
    #[arg(long, env = "INPUT_LOGLEVEL", value_name = "LEVEL")]
    pub loglevel: Option<String>,

    /// Log file; empty or - logs to stdout
    #[arg(long, env = "INPUT_LOGFILE", value_name = "FILE")]
    pub logfile: Option<String>,

    /// Token appended to remote URLs as the `token` query parameter
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Action inputs are strings; only `true` (any case) switches a flag on.
fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Ok(true));
        assert_eq!(parse_flag("True"), Ok(true));
        assert_eq!(parse_flag(" TRUE "), Ok(true));
        assert_eq!(parse_flag("false"), Ok(false));
        assert_eq!(parse_flag("yes"), Ok(false));
        assert_eq!(parse_flag(""), Ok(false));
    }

    #[test]
    fn test_flags_default_off() {
        let cli = Cli::try_parse_from(["load-testplan", "--files", "a.yaml"]).unwrap();
        assert_eq!(cli.files.as_deref(), Some("a.yaml"));
        assert!(!cli.set_output);
        assert!(!cli.set_env);
        assert!(!cli.set_print);
        assert!(!cli.generate_job);
    }

    #[test]
    fn test_flags_take_values() {
        let cli = Cli::try_parse_from([
            "load-testplan",
            "--set-output",
            "true",
            "--set-print",
            "no",
        ])
        .unwrap();
        assert!(cli.set_output);
        assert!(!cli.set_print);
    }
}
