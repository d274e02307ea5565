//! Command handlers for blobcdn CLI

use crate::{Cli, SourceType};
use anyhow::{Context, Result};
use blobcdn_core::{
    load_config, read_manifest, run_batch, write_url_list, BatchOptions, BatchReport,
    BlobStorageClient, ManifestKind, MissingFilePolicy, StorageConfig, UploadStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{Table, Tabled};
use tracing::{error, info};

const STATUSES: [UploadStatus; 6] = [
    UploadStatus::Created,
    UploadStatus::Conflict,
    UploadStatus::NotFound,
    UploadStatus::Unauthorized,
    UploadStatus::Unverified,
    UploadStatus::Failed,
];

/// Handle a manifest upload run
pub async fn handle_upload(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let storage = StorageConfig::load(&config.storage).map_err(|e| {
        error!("{}", e);
        e
    })?;
    let client = BlobStorageClient::new(storage, config.upload)?;

    let kind = match cli.source_type {
        SourceType::Txt => ManifestKind::Txt,
        SourceType::Image => ManifestKind::Image,
    };
    let entries = read_manifest(&cli.source, kind)
        .with_context(|| format!("Failed to read source {}", cli.source.display()))?;

    let missing = if cli.skip_missing {
        MissingFilePolicy::Skip
    } else {
        MissingFilePolicy::Abort
    };
    let options = BatchOptions::new(cli.container_name)
        .with_root(cli.root)
        .with_parallel(cli.parallel)
        .with_jobs(cli.n_jobs)
        .with_missing(missing);
    options.validate()?;

    info!(
        source = %cli.source.display(),
        kind = kind.as_str(),
        entries = entries.len(),
        container = %options.container,
        parallel = options.parallel,
        jobs = options.jobs,
        "Starting upload"
    );
    println!(
        "Uploading {} file(s) to '{}'...",
        entries.len(),
        options.container
    );

    let progress = ProgressBar::new(entries.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("  {spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let report = run_batch(&client, &entries, &options, |item| {
        progress.set_message(item.entry.clone());
        progress.inc(1);
    })
    .await;
    progress.finish_and_clear();
    let report = report?;

    write_url_list(&cli.output, &report.verified_urls)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    print_summary(&report);
    println!();
    println!(
        "  ✅ {} URL(s) written to {}",
        report.verified_urls.len(),
        cli.output.display()
    );
    info!(
        urls = report.verified_urls.len(),
        output = %cli.output.display(),
        "Upload finished"
    );

    Ok(())
}

/// Print status counts and any skipped entries
fn print_summary(report: &BatchReport) {
    #[derive(Tabled)]
    struct StatusRow {
        status: String,
        files: usize,
    }

    let mut rows: Vec<StatusRow> = STATUSES
        .iter()
        .map(|status| StatusRow {
            status: status.to_string(),
            files: report.count(*status),
        })
        .filter(|row| row.files > 0)
        .collect();

    let missing: Vec<_> = report.missing().collect();
    if !missing.is_empty() {
        rows.push(StatusRow {
            status: "missing file".to_string(),
            files: missing.len(),
        });
    }

    if rows.is_empty() {
        println!("  No files processed");
        return;
    }

    println!();
    println!("{}", Table::new(rows));

    if !missing.is_empty() {
        println!();
        println!("  ⚠️  Skipped entries:");
        for item in missing {
            println!("    line {}: {}", item.index + 1, item.entry);
        }
    }
}
