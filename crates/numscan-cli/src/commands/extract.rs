//! Extract command - find template-shaped numbers in a single file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use numscan_core::number::rules::Rejected;
use numscan_core::{DocumentExtractor, DocumentKind, ResultSet, TextSource};

use super::{OutputFormat, PipelineArgs};

/// Message reported when a document was read but nothing matched.
pub const NO_MATCH_MESSAGE: &str = "No matching number found";

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF, image or text)
    #[arg(required = true)]
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short = 't', long, value_enum, default_value = "json")]
    output_format: OutputFormat,
}

/// Answer for one document.
#[derive(Debug, Serialize)]
pub struct Report {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejected>,
    pub duplicates_removed: usize,
    pub processing_time_ms: u64,
}

impl Report {
    pub fn from_results(results: &ResultSet) -> Self {
        let number = results.first().map(|m| m.text.clone());
        Self {
            found: number.is_some(),
            format: number.as_ref().map(|_| results.template.text.clone()),
            message: number.is_none().then(|| NO_MATCH_MESSAGE.to_string()),
            number,
            matches: results.values().into_iter().map(str::to_string).collect(),
            rejected: results.rejected.clone(),
            duplicates_removed: results.duplicates_removed,
            processing_time_ms: results.processing_time_ms,
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let kind = DocumentKind::from_path(&args.input)?;
    let (config, pipeline) = super::prepare(&args.pipeline, config_path)?;
    let template = args.pipeline.template(&config);

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    let needs_ocr = kind != DocumentKind::Text && !args.pipeline.text_only;
    if needs_ocr {
        pb.set_message("Loading OCR models...");
    }
    let extractor = DocumentExtractor::new(super::text_source(&config, needs_ocr), pipeline);
    if needs_ocr && !extractor.source().capabilities().ocr {
        pb.println(format!(
            "{} OCR models not loaded, scanned pages cannot be read",
            style("⚠").yellow()
        ));
    }

    pb.set_message("Extracting...");
    let results = extractor.extract_file(&args.input, &template)?;
    pb.finish_and_clear();

    info!(
        "Found {} match(es) in {:?}",
        results.len(),
        start.elapsed()
    );

    let report = Report::from_results(&results);
    let output = format_report(&report, args.output_format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_report(report: &Report, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(report: &Report) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "number"])?;
    for (i, number) in report.matches.iter().enumerate() {
        wtr.write_record([(i + 1).to_string(), number.clone()])?;
    }
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data.trim_end().to_string())
}

fn format_text(report: &Report) -> String {
    let mut out = String::new();

    match &report.number {
        Some(number) => {
            out.push_str(&format!("Number: {}\n", number));
            if let Some(format) = &report.format {
                out.push_str(&format!("Format: {}\n", format));
            }
            if report.matches.len() > 1 {
                out.push_str("\nAll matches:\n");
                for number in &report.matches {
                    out.push_str(&format!("  - {}\n", number));
                }
            }
        }
        None => {
            out.push_str(report.message.as_deref().unwrap_or(NO_MATCH_MESSAGE));
            out.push('\n');
        }
    }

    if !report.rejected.is_empty() {
        out.push_str("\nRejected:\n");
        for rejected in &report.rejected {
            out.push_str(&format!("  - {}\n", rejected));
        }
    }
    if report.duplicates_removed > 0 {
        out.push_str(&format!(
            "\nDuplicates removed: {}\n",
            report.duplicates_removed
        ));
    }

    out.trim_end().to_string()
}
