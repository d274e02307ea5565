use anyhow::Result;
use blobcdn_core::{DEFAULT_CONTAINER, DEFAULT_JOBS, DEFAULT_OUTPUT};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::config::HookBuilder;
use std::path::PathBuf;

mod handlers;
mod logging;

/// blobcdn - upload images to blob storage and record their public URLs
#[derive(Parser, Debug)]
#[command(name = "blobcdn")]
#[command(version)]
#[command(about = "Bulk-upload images listed in a manifest to a blob container", long_about = None)]
pub struct Cli {
    /// Manifest of local paths (--type txt) or a single image (--type image)
    #[arg(long)]
    source: PathBuf,

    /// Kind of source
    #[arg(long = "type", value_enum, ignore_case = true)]
    source_type: SourceType,

    /// Base directory for manifest paths that do not exist as given
    #[arg(long)]
    root: Option<PathBuf>,

    /// Target container
    #[arg(long = "container_name", default_value = DEFAULT_CONTAINER)]
    container_name: String,

    /// Upload through a worker pool (true/false)
    #[arg(long, default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    parallel: bool,

    /// Worker pool size
    #[arg(long = "n_jobs", default_value_t = DEFAULT_JOBS)]
    n_jobs: usize,

    /// Output manifest of verified URLs (overwritten)
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Log file, appended to on every run
    #[arg(long = "log-file", default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Configuration file (default: ~/.config/blobcdn/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip manifest entries whose file is missing instead of aborting
    #[arg(long)]
    skip_missing: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
    /// Text file, one path per line
    Txt,
    /// A single image file
    Image,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    if let Err(e) = HookBuilder::default().install() {
        eprintln!("Warning: Failed to install error handler: {}", e);
    }

    let cli = Cli::parse();

    logging::init(&cli.log_file)?;

    handlers::handle_upload(cli).await
}
