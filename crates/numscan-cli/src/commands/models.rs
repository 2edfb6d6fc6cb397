//! Models command - download and manage the OCR models used for scans.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use numscan_core::NumscanConfig;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List available model variants
    List,

    /// Download models
    Download(DownloadArgs),

    /// Check model status
    Status(VariantFilter),

    /// Remove downloaded models
    Clean(CleanArgs),

    /// Set the active model variant
    Use {
        /// Variant to set as active
        #[arg(value_enum)]
        variant: ModelVariant,
    },

    /// Print the model directory of a variant
    Path(VariantFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    /// Mobile models - smaller, faster (~12MB)
    Mobile,
    /// Server models - better detection on dense scans (~92MB)
    Server,
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelVariant::Mobile => write!(f, "mobile"),
            ModelVariant::Server => write!(f, "server"),
        }
    }
}

#[derive(Args)]
struct DownloadArgs {
    /// Model variant to download
    #[arg(short, long, value_enum, default_value = "mobile")]
    variant: ModelVariant,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,

    /// Host to download from, laid out as <url>/<variant>/<file>
    /// (default from models.download_url in config)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct VariantFilter {
    /// Specific variant only
    #[arg(short, long, value_enum)]
    variant: Option<ModelVariant>,
}

#[derive(Args)]
struct CleanArgs {
    /// Clean specific variant only
    #[arg(short, long, value_enum)]
    variant: Option<ModelVariant>,

    /// Clean all variants
    #[arg(long)]
    all: bool,
}

/// One downloadable model file.
struct ModelFile {
    filename: &'static str,
    size_bytes: u64,
    description: &'static str,
}

impl ModelVariant {
    const ALL: [ModelVariant; 2] = [ModelVariant::Mobile, ModelVariant::Server];

    /// Files making up the variant. Names match the `models` config defaults.
    fn files(self) -> [ModelFile; 3] {
        let (det_size, det_description) = match self {
            ModelVariant::Mobile => (4_500_000, "PP-OCRv3 mobile text detection"),
            ModelVariant::Server => (84_000_000, "PP-OCRv5 server text detection"),
        };
        [
            ModelFile {
                filename: "det.onnx",
                size_bytes: det_size,
                description: det_description,
            },
            ModelFile {
                filename: "latin_rec.onnx",
                size_bytes: 7_500_000,
                description: "Latin text recognition",
            },
            ModelFile {
                filename: "latin_dict.txt",
                size_bytes: 2_000,
                description: "Latin character dictionary",
            },
        ]
    }

    fn total_size(self) -> u64 {
        self.files().iter().map(|f| f.size_bytes).sum()
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("numscan")
}

/// Get the model directory for a specific variant
pub fn get_variant_dir(variant: ModelVariant) -> PathBuf {
    data_dir().join("models").join(variant.to_string())
}

/// Get the active variant, mobile unless set otherwise
pub fn get_active_variant() -> ModelVariant {
    match fs::read_to_string(data_dir().join("active_variant")) {
        Ok(content) if content.trim() == "server" => ModelVariant::Server,
        _ => ModelVariant::Mobile,
    }
}

fn set_active_variant(variant: ModelVariant) -> anyhow::Result<()> {
    let dir = data_dir();
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("active_variant"), variant.to_string())?;
    Ok(())
}

/// A model file counts as present when it is at least half its expected size.
fn is_complete(path: &Path, model: &ModelFile) -> bool {
    fs::metadata(path)
        .map(|m| m.len() > model.size_bytes / 2)
        .unwrap_or(false)
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List => list_models(),
        ModelsCommand::Download(download_args) => {
            let config = super::load_config(config_path)?;
            let base_url = download_url(download_args.base_url.as_deref(), &config)?;
            download_models(download_args, &base_url).await
        }
        ModelsCommand::Status(filter) => check_status(filter.variant),
        ModelsCommand::Clean(clean_args) => clean_models(clean_args),
        ModelsCommand::Use { variant } => use_variant(variant),
        ModelsCommand::Path(filter) => {
            let variant = filter.variant.unwrap_or_else(get_active_variant);
            println!("{}", get_variant_dir(variant).display());
            Ok(())
        }
    }
}

fn list_models() -> anyhow::Result<()> {
    println!("{}", style("Available Model Variants").bold());
    println!();

    let active = get_active_variant();

    for variant in ModelVariant::ALL {
        let active_marker = if variant == active { " (active)" } else { "" };

        println!(
            "{} {}{}",
            style(format!("▸ {}", variant)).bold().cyan(),
            format_size(variant.total_size()),
            style(active_marker).green().bold()
        );
        for model in variant.files() {
            println!(
                "    {:<20} {:>10}  {}",
                model.filename,
                format_size(model.size_bytes),
                model.description
            );
        }
        println!();
    }

    println!("Commands:");
    println!("  numscan models download -v mobile    Download mobile models");
    println!("  numscan models download -v server    Download server models");
    println!("  numscan models use <variant>         Switch active variant");

    Ok(())
}

fn use_variant(variant: ModelVariant) -> anyhow::Result<()> {
    let dir = get_variant_dir(variant);
    let missing = variant
        .files()
        .iter()
        .any(|model| !is_complete(&dir.join(model.filename), model));

    if missing {
        println!(
            "{} {} models not downloaded yet.",
            style("⚠").yellow(),
            variant
        );
        println!("Run: numscan models download -v {}", variant);
        return Ok(());
    }

    set_active_variant(variant)?;
    println!(
        "{} Switched to {} models",
        style("✓").green(),
        style(variant.to_string()).cyan().bold()
    );

    Ok(())
}

/// Download host: the `--base-url` flag, then `models.download_url`.
fn download_url(flag: Option<&str>, config: &NumscanConfig) -> anyhow::Result<String> {
    flag.or(config.models.download_url.as_deref())
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No model download URL. Pass --base-url or run \
                 'numscan config set models.download_url <url>'"
            )
        })
}

async fn download_models(args: DownloadArgs, base_url: &str) -> anyhow::Result<()> {
    let variant = args.variant;
    let output_dir = args.output.unwrap_or_else(|| get_variant_dir(variant));
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Downloading {} models to {}",
        style("ℹ").blue(),
        style(variant.to_string()).cyan().bold(),
        output_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("numscan-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let bar_style = ProgressStyle::default_bar()
        .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
        .progress_chars("=>-");

    let mut downloaded = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for model in variant.files() {
        let path = output_dir.join(model.filename);

        if !args.force && is_complete(&path, &model) {
            println!(
                "  {} {} (already exists)",
                style("✓").green(),
                model.filename
            );
            skipped += 1;
            continue;
        }

        let url = format!("{}/{}/{}", base_url, variant, model.filename);
        debug!("Fetching {}", url);

        let pb = multi_progress.add(ProgressBar::new(model.size_bytes));
        pb.set_style(bar_style.clone());
        pb.set_message(model.filename.to_string());

        match download_file(&client, &url, &path, &pb).await {
            Ok(()) => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), model.filename));
                downloaded += 1;
            }
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), model.filename, e));
                failed += 1;
            }
        }
    }

    println!();

    if failed == 0 {
        println!(
            "{} {} models ready ({} downloaded, {} already present)",
            style("✓").green().bold(),
            variant,
            downloaded,
            skipped
        );
        if get_active_variant() != variant {
            println!(
                "{} To use these models, run: numscan models use {}",
                style("ℹ").blue(),
                variant
            );
        }
    } else {
        println!(
            "{} Download completed with errors: {} downloaded, {} skipped, {} failed",
            style("⚠").yellow().bold(),
            downloaded,
            skipped,
            failed
        );
        println!("Retry with: numscan models download -v {} --force", variant);
    }

    println!();
    check_status(Some(variant))
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Write to a temp file, rename once complete
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
        pb.set_position(written);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

fn check_status(variant: Option<ModelVariant>) -> anyhow::Result<()> {
    let active = get_active_variant();

    println!("{}", style("Model Status").bold());
    println!("Active variant: {}", style(active.to_string()).cyan().bold());
    println!();

    let variants = match variant {
        Some(v) => vec![v],
        None => ModelVariant::ALL.to_vec(),
    };

    for variant in variants {
        let model_dir = get_variant_dir(variant);
        let active_marker = if variant == active {
            style(" ◀ active").green().to_string()
        } else {
            String::new()
        };

        println!(
            "{} {}{}",
            style(format!("▸ {}", variant)).bold(),
            model_dir.display(),
            active_marker
        );

        let mut ready = true;
        for model in variant.files() {
            let path = model_dir.join(model.filename);
            let (status, detail) = match fs::metadata(&path) {
                Ok(metadata) if metadata.len() > model.size_bytes / 2 => {
                    (style("✓").green(), format_size(metadata.len()))
                }
                Ok(metadata) => {
                    ready = false;
                    (
                        style("⚠").yellow(),
                        format!("{} (incomplete?)", format_size(metadata.len())),
                    )
                }
                Err(_) => {
                    ready = false;
                    (style("✗").red(), "missing".to_string())
                }
            };
            println!("    {} {:<25} {:>10}", status, model.filename, detail);
        }

        if ready {
            println!("    {} Ready", style("✓").green());
        } else {
            println!(
                "    {} Run 'numscan models download -v {}' to download",
                style("⚠").yellow(),
                variant
            );
        }
        println!();
    }

    Ok(())
}

fn clean_models(args: CleanArgs) -> anyhow::Result<()> {
    let variants = match (args.all, args.variant) {
        (true, _) => ModelVariant::ALL.to_vec(),
        (false, Some(v)) => vec![v],
        (false, None) => {
            println!(
                "{} Specify --all to remove all models or -v <variant> for a specific variant",
                style("ℹ").blue()
            );
            return Ok(());
        }
    };

    let mut removed = 0;
    let mut freed: u64 = 0;

    for variant in variants {
        let model_dir = get_variant_dir(variant);
        if !model_dir.exists() {
            continue;
        }

        println!("{} Cleaning {} models...", style("⚠").yellow(), variant);

        for model in variant.files() {
            let path = model_dir.join(model.filename);
            if let Ok(metadata) = fs::metadata(&path) {
                fs::remove_file(&path)?;
                removed += 1;
                freed += metadata.len();
                println!("  {} Removed {}", style("✓").green(), model.filename);
            }
        }

        // Leftovers from interrupted downloads
        if let Ok(entries) = fs::read_dir(&model_dir) {
            for path in entries.flatten().map(|e| e.path()) {
                if path.extension().is_some_and(|e| e == "tmp") {
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    if removed > 0 {
        println!();
        println!(
            "{} Removed {} files, freed {}",
            style("✓").green(),
            removed,
            format_size(freed)
        );
    } else {
        println!("{} No model files to remove.", style("ℹ").blue());
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
