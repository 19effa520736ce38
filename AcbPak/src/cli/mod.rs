//! AcbPak CLI - unpack and repack ACB cue sheets
//!
//! One positional argument: an `.acb` file unpacks into its sibling
//! directory, a directory packs back into its sibling container.

pub mod commands;
pub mod progress;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::error::Error;

#[derive(Parser)]
#[command(name = "acbpak")]
#[command(about = "Unpack and repack CRI ACB/AWB audio cue sheets", long_about = None)]
#[command(version)]
struct Cli {
    /// An .acb file to unpack, or a previously-unpacked directory to repack
    input: PathBuf,

    /// Override the payload copy buffer size, in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Override the extraction worker thread count (0 = automatic)
    #[arg(long)]
    threads: Option<usize>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Run the AcbPak CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(buffer_size) = cli.buffer_size {
        settings.buffer_size = buffer_size;
    }
    if let Some(threads) = cli.threads {
        settings.max_threads = threads;
    }

    if cli.input.is_file() && has_acb_extension(&cli.input) {
        commands::extract::execute(&cli.input, settings, cli.quiet)?;
    } else if cli.input.is_dir() {
        commands::pack::execute(&cli.input, settings, cli.quiet)?;
    } else {
        return Err(Error::UnrecognizedInput { path: cli.input }.into());
    }

    Ok(())
}

fn has_acb_extension(path: &std::path::Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("acb"))
}
