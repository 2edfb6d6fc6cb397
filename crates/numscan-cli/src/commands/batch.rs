//! Batch command - extract numbers from many files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, warn};

use numscan_core::number::rules::TemplateSpec;
use numscan_core::source::SUPPORTED_EXTENSIONS;
use numscan_core::{DocumentExtractor, DocumentKind, DocumentTextSource};

use super::extract::Report;
use super::{OutputFormat, PipelineArgs};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files, e.g. "scans/*.pdf"
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Write one result file per input into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for per-file results and the printed listing
    #[arg(short = 't', long, value_enum, default_value = "text")]
    output_format: OutputFormat,

    /// Also write a summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
#[derive(Serialize)]
struct FileResult {
    path: PathBuf,
    #[serde(flatten)]
    report: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let (config, pipeline) = super::prepare(&args.pipeline, config_path)?;
    let template = args.pipeline.template(&config);

    let needs_ocr = !args.pipeline.text_only
        && files
            .iter()
            .any(|p| !matches!(DocumentKind::from_path(p), Ok(DocumentKind::Text)));
    let extractor = DocumentExtractor::new(super::text_source(&config, needs_ocr), pipeline);

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        match process_file(&extractor, &path, &template) {
            Ok(report) => results.push(FileResult {
                path,
                report: Some(report),
                error: None,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if !args.continue_on_error {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
                warn!("Failed to process {}: {}", path.display(), error_msg);
                results.push(FileResult {
                    path,
                    report: None,
                    error: Some(error_msg),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Some(ref output_dir) = args.output_dir {
        write_outputs(output_dir, &results, args.output_format)?;
    }

    if let Some(ref summary_path) = args.summary {
        write_summary(summary_path, &results)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Csv => print!("{}", summary_csv(&results)?),
        OutputFormat::Text => print_listing(&results),
    }

    let found = results
        .iter()
        .filter(|r| r.report.as_ref().is_some_and(|report| report.found))
        .count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} with a match, {} without, {} failed",
        style(found).green(),
        results.len() - found - failed,
        style(failed).red()
    );

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn process_file(
    extractor: &DocumentExtractor<DocumentTextSource>,
    path: &Path,
    template: &TemplateSpec,
) -> anyhow::Result<Report> {
    let results = extractor.extract_file(path, template)?;
    debug!("{}: {} match(es)", path.display(), results.len());
    Ok(Report::from_results(&results))
}

fn write_outputs(
    output_dir: &Path,
    results: &[FileResult],
    format: OutputFormat,
) -> anyhow::Result<()> {
    for result in results {
        let Some(report) = &result.report else {
            continue;
        };

        let output_name = result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");

        let (extension, content) = match format {
            OutputFormat::Json => ("json", serde_json::to_string_pretty(report)?),
            OutputFormat::Csv => ("csv", summary_csv(std::slice::from_ref(result))?),
            OutputFormat::Text => ("txt", listing_line(result)),
        };

        let output_path = output_dir.join(format!("{}.{}", output_name, extension));
        fs::write(&output_path, content)?;
        debug!("Wrote output to {}", output_path.display());
    }
    Ok(())
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    fs::write(path, summary_csv(results)?)?;
    Ok(())
}

fn summary_csv(results: &[FileResult]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "file",
        "found",
        "number",
        "matches",
        "rejected",
        "duplicates_removed",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let path = result.path.display().to_string();
        match &result.report {
            Some(report) => wtr.write_record([
                path,
                report.found.to_string(),
                report.number.clone().unwrap_or_default(),
                report.matches.join(";"),
                report.rejected.len().to_string(),
                report.duplicates_removed.to_string(),
                report.processing_time_ms.to_string(),
                String::new(),
            ])?,
            None => wtr.write_record([
                path,
                "false".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                result.error.clone().unwrap_or_default(),
            ])?,
        }
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn listing_line(result: &FileResult) -> String {
    match (&result.report, &result.error) {
        (Some(report), _) if report.found => report.matches.join(", "),
        (Some(report), _) => report.message.clone().unwrap_or_default(),
        (None, Some(error)) => format!("error: {}", error),
        (None, None) => String::new(),
    }
}

fn print_listing(results: &[FileResult]) {
    for result in results {
        let marker = match &result.report {
            Some(report) if report.found => style("✓").green(),
            Some(_) => style("·").dim(),
            None => style("✗").red(),
        };
        println!(
            "{} {}: {}",
            marker,
            result.path.display(),
            listing_line(result)
        );
    }
}
