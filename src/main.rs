//! load-testplan
//!
//! Runs as a workflow step: every input arrives as an `INPUT_<NAME>`
//! variable, outputs go to the files named by `GITHUB_OUTPUT` and `GITHUB_ENV`.

use anyhow::Result;
use clap::Parser;
use load_testplan::cli::Cli;
use load_testplan::config::{RunContext, Settings};
use load_testplan::emit::{Emitter, GithubSink};
use load_testplan::loader::Loader;
use load_testplan::logging;
use std::io::IsTerminal;
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::from_cli(&cli)?;
    logging::init(settings.log.level, settings.log.file.as_deref())?;
    debug!(files = ?settings.files, separator = %settings.separator, "Configuration loaded");

    if let Err(err) = run(settings).await {
        error!(error = %err, "load-testplan failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let ctx = RunContext::capture(settings)?;
    let tree = Loader::new(&ctx)?.load_all().await?;
    info!(files = ctx.settings.files.len(), keys = tree.len(), "Test plan loaded");

    let mut step = GithubSink::from_env(&ctx.env);
    let emission = Emitter::new(&ctx.settings, &mut step)
        .with_ansi(std::io::stdout().is_terminal())
        .emit(&tree)?;
    debug!(
        yaml = emission.yaml_written,
        json = emission.json_written,
        outputs = emission.registry.len(),
        "Emission finished"
    );

    if ctx.settings.log.level.is_trace() && ctx.settings.sinks.set_output {
        step.trace_output_file();
    }
    Ok(())
}
