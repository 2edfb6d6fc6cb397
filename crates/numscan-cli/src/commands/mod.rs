//! Subcommands and the settings they share.

pub mod batch;
pub mod config;
pub mod extract;
pub mod models;

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use tracing::debug;

use numscan_core::number::rules::{DigitGrouping, TemplateMode, TemplateSpec, WhitespaceMode};
use numscan_core::source::DocumentTextSource;
use numscan_core::{ExtractionPipeline, ExtractionPolicy, NumscanConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// `###-##-####` style, one placeholder per digit
    Placeholder,
    /// `6-3-4` style, digit counts per group
    GroupLengths,
}

impl From<ModeArg> for TemplateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Placeholder => TemplateMode::Placeholder,
            ModeArg::GroupLengths => TemplateMode::GroupLengths,
        }
    }
}

/// Template and pipeline flags shared by `extract` and `batch`.
///
/// Every flag overrides the matching configuration value when given.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Number template, e.g. "###-##-####" or "6-3-4"
    #[arg(short, long, required = true)]
    pub format: String,

    /// Template convention (default from config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Return every match instead of the first
    #[arg(long)]
    pub all: bool,

    /// Validate matches against the identifier grammar
    #[arg(long)]
    pub validate: bool,

    /// Identifier grammar used with --validate, e.g. "5..6-2..3-2"
    #[arg(long)]
    pub grammar: Option<String>,

    /// Require whitespace where the template has it
    #[arg(long)]
    pub strict: bool,

    /// Keep whitespace between digits instead of joining them
    #[arg(long)]
    pub preserve_spacing: bool,

    /// Map letters OCR confuses with digits (O, I, Z, S, B, ...) to digits
    #[arg(long)]
    pub remap: bool,

    /// Similarity at or above which matches are duplicates
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Keep near-duplicate matches
    #[arg(long)]
    pub no_dedupe: bool,

    /// Model directory for OCR
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Skip OCR and use only PDF text layers and text files
    #[arg(long)]
    pub text_only: bool,
}

impl PipelineArgs {
    /// Fold the flags into `config`.
    pub fn apply(&self, config: &mut NumscanConfig) {
        if let Some(mode) = self.mode {
            config.template.mode = mode.into();
        }
        if self.all {
            config.extraction.policy = ExtractionPolicy::All;
        }
        if self.validate {
            config.extraction.validate = true;
        }
        if let Some(grammar) = &self.grammar {
            config.extraction.grammar = grammar.clone();
        }
        if self.strict {
            config.template.whitespace = WhitespaceMode::Strict;
        }
        if self.preserve_spacing {
            config.normalization.digit_grouping = DigitGrouping::Preserve;
        }
        if self.remap {
            config.normalization.remap_confusables = true;
        }
        if let Some(threshold) = self.threshold {
            config.extraction.duplicate_threshold = threshold;
        }
        if self.no_dedupe {
            config.extraction.dedupe = false;
        }
        if let Some(model_dir) = &self.model_dir {
            config.models.model_dir = model_dir.clone();
        }
    }

    pub fn template(&self, config: &NumscanConfig) -> TemplateSpec {
        TemplateSpec {
            mode: config.template.mode,
            text: self.format.clone(),
        }
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("numscan")
        .join("config.json")
}

/// Configuration file path: the `--config` flag or the default location.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration for a run.
///
/// An explicit `--config` file must exist; the default file is optional.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<NumscanConfig> {
    let config = match config_path {
        Some(path) => NumscanConfig::from_file(Path::new(path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Loading config from {}", path.display());
                NumscanConfig::from_file(&path)?
            } else {
                NumscanConfig::default()
            }
        }
    };
    Ok(config)
}

/// Resolve configuration, flags and model directory into a ready pipeline.
pub fn prepare(
    args: &PipelineArgs,
    config_file: Option<&str>,
) -> anyhow::Result<(NumscanConfig, ExtractionPipeline)> {
    let mut config = load_config(config_file)?;
    args.apply(&mut config);

    if args.model_dir.is_none() && !config.models.model_dir.exists() {
        config.models.model_dir = models::get_variant_dir(models::get_active_variant());
    }

    config.validate()?;
    let pipeline = ExtractionPipeline::new(config.pipeline_config())?;
    Ok((config, pipeline))
}

/// Build the text source, loading OCR models only when they can be used.
pub fn text_source(config: &NumscanConfig, needs_ocr: bool) -> DocumentTextSource {
    if needs_ocr {
        DocumentTextSource::from_config(config)
    } else {
        DocumentTextSource::new().with_pdf_config(config.pdf.clone())
    }
}
