//! Binary entry point for the `rsw-infra` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rsw_infra::{
    ConfigError, Configuration, ManifestEngine, ManifestError, StackError, StackManifest,
    StackOrchestrator,
};

mod cli;
#[cfg(test)]
mod test_helpers;

use cli::Cli;

const PROJECT: &str = "rsw-infra";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("stack declaration failed: {0}")]
    Stack(#[from] StackError<ManifestError>),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("failed to write manifest: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let exit_code = match run(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = Configuration::load()?;
    let manifest = declare(&config).await?;
    emit(&manifest, cli.manifest.as_deref(), io::stdout())
}

async fn declare(config: &Configuration) -> Result<StackManifest, CliError> {
    let orchestrator = StackOrchestrator::new(ManifestEngine::new(PROJECT));
    let outcome = orchestrator.declare(config).await?;
    let manifest = orchestrator.into_engine().into_manifest()?;
    let order = manifest.apply_order()?;
    info!(
        resources = order.len(),
        outputs = outcome.outputs.len(),
        run_id = %manifest.run_id,
        "manifest ready"
    );
    Ok(manifest)
}

fn emit(
    manifest: &StackManifest,
    path: Option<&Utf8Path>,
    mut stdout: impl Write,
) -> Result<(), CliError> {
    if let Some(target) = path {
        manifest.write_to(target)?;
        info!(path = %target, "wrote manifest");
    } else {
        writeln!(stdout, "{}", manifest.to_json()?)?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
