//! Command-line interface definitions for the `rsw-infra` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `rsw-infra` binary.
///
/// Configuration comes from `RSW_EMAIL`, `RSW_PUBLIC_KEY` or
/// `rsw-infra.toml`; the command itself takes no required arguments.
#[derive(Debug, Parser)]
#[command(
    name = "rsw-infra",
    about = "Declare the RStudio Workbench AWS stack and publish its outputs"
)]
pub(crate) struct Cli {
    /// Write the desired-state manifest to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub(crate) manifest: Option<Utf8PathBuf>,
}
