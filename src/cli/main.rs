//! Background removal CLI
//!
//! Loads one image, runs the model once and writes one result per requested
//! tolerance.

use super::config::CliConfigBuilder;
use crate::{
    processor::BackgroundRemover,
    services::{
        ConsoleProgressReporter, ImageIOService, ProgressReporter, ProgressUpdate,
        ProcessingStage,
    },
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::ProcessingMode,
    OutputFormat,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Tolerance used when none is given on the command line
pub const DEFAULT_TOLERANCE: i32 = 50;

/// Process exit code for a run stopped by Ctrl-C (128 + SIGINT)
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// The run was cancelled before every output was written
#[derive(Debug, thiserror::Error)]
#[error("Interrupted while {0}")]
pub struct Interrupted(String);

/// Whether `err` comes from a Ctrl-C cancellation
#[must_use]
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Interrupted>().is_some()
}

fn interrupted(during: String) -> anyhow::Error {
    warn!("Cancelled while {during}");
    Interrupted(during).into()
}

/// Neural background removal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "glazier-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image
    #[arg(value_name = "INPUT", required_unless_present = "show_providers")]
    pub input: Option<PathBuf>,

    /// Segmentation model (.onnx)
    #[arg(short, long, value_name = "MODEL", required_unless_present = "show_providers")]
    pub model: Option<PathBuf>,

    /// Output file [default: <INPUT>_nobg.<FORMAT> next to the input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Mask threshold; repeat to write one result per tolerance without re-running the model
    #[arg(short, long = "tolerance", value_name = "N", default_values_t = [DEFAULT_TOLERANCE], allow_negative_numbers = true)]
    pub tolerances: Vec<i32>,

    /// Inference backend
    #[arg(short, long, value_enum)]
    pub backend: Option<CliBackend>,

    /// Execution provider for the ONNX backend
    #[arg(short, long, value_enum)]
    pub execution_provider: Option<CliExecutionProvider>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Processing mode; `auto` keeps the detected one
    #[arg(long, value_enum, default_value_t = CliMode::Auto)]
    pub mode: CliMode,

    /// Sharpen the result
    #[arg(long)]
    pub sharpen: bool,

    /// Boost saturation of the result
    #[arg(long)]
    pub saturate: bool,

    /// Gaussian kernel size used to pre-smooth the mask (0 disables)
    #[arg(long, value_name = "SIZE")]
    pub smoothing_kernel: Option<u32>,

    /// Model input size as WIDTHxHEIGHT or a single edge length
    #[arg(long, value_name = "SIZE", value_parser = parse_model_size)]
    pub model_size: Option<(u32, u32)>,

    /// Also write the upscaled mask
    #[arg(long, value_name = "PATH")]
    pub mask_output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Onnx,
    Tract,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExecutionProvider {
    Auto,
    Cpu,
    Cuda,
    Coreml,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliMode {
    Auto,
    None,
    Portrait,
    Landscape,
    LowLight,
    HighKey,
}

impl CliMode {
    /// Mode to force, or `None` to keep the detected one
    #[must_use]
    pub fn forced_mode(self) -> Option<ProcessingMode> {
        match self {
            CliMode::Auto => None,
            CliMode::None => Some(ProcessingMode::None),
            CliMode::Portrait => Some(ProcessingMode::Portrait),
            CliMode::Landscape => Some(ProcessingMode::Landscape),
            CliMode::LowLight => Some(ProcessingMode::LowLight),
            CliMode::HighKey => Some(ProcessingMode::HighKey),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Bmp,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

fn parse_model_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid model size '{value}': {e}"))
    };
    match value.split_once(['x', 'X']) {
        Some((width, height)) => Ok((parse(width)?, parse(height)?)),
        None => {
            let edge = parse(value)?;
            Ok((edge, edge))
        },
    }
}

/// Shows pipeline stages on an indicatif spinner
struct SpinnerReporter {
    bar: ProgressBar,
}

impl SpinnerReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("Invalid progress template")?,
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Ok(Self { bar })
    }
}

impl ProgressReporter for SpinnerReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar
            .set_message(format!("[{}%] {}", update.progress, update.description));
    }

    fn report_completion(&self, total_ms: u64) {
        self.bar.set_message(format!("Done in {total_ms}ms"));
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .println(format!("Error during {}: {}", stage.description(), error));
    }
}

impl Drop for SpinnerReporter {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format.into())
        .init()
        .context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let input = cli.input.clone().context("An input image is required")?;
    let model = cli.model.clone().context("A model path is required")?;
    let format = config.output_format;

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c_token.cancel();
        }
    });

    let reporter: Arc<dyn ProgressReporter> = if cli.verbose == 0 {
        Arc::new(SpinnerReporter::new()?)
    } else {
        Arc::new(ConsoleProgressReporter::new(cli.verbose > 1))
    };

    let start_time = Instant::now();
    let model_span = spans::model_loading(&model, &config.backend_type.to_string());
    let model_path = model.clone();
    let mut remover =
        tokio::task::spawn_blocking(move || BackgroundRemover::from_model_path(model_path, config))
            .instrument(model_span)
            .await
            .context("Model loading task failed")?
            .with_context(|| format!("Failed to load model {}", model.display()))?
            .with_progress_reporter(reporter);

    let file_span = spans::file_processing(&input);

    let Some(detected) = remover
        .load_source_image_async(input.clone(), token.clone())
        .instrument(file_span.clone())
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?
    else {
        return Err(interrupted(format!("loading {}", input.display())));
    };
    info!("Detected processing mode: {detected}");

    if let Some(forced) = cli.mode.forced_mode() {
        info!("Using processing mode: {forced}");
        remover.set_processing_mode(forced);
    }

    let multiple = cli.tolerances.len() > 1;
    for &tolerance in &cli.tolerances {
        let Some(result) = remover
            .remove_background_async(tolerance, token.clone())
            .instrument(file_span.clone())
            .await
            .context("Background removal failed")?
        else {
            return Err(interrupted(format!("processing tolerance {tolerance}")));
        };

        let output_path = output_path_for(&cli, &input, tolerance, multiple, format);
        ImageIOService::save(&result, &output_path, format)
            .with_context(|| format!("Failed to save {}", output_path.display()))?;
        info!("Saved {}", output_path.display());

        if let (Some(mask_output), Some(mask)) = (&cli.mask_output, remover.current_mask()) {
            let mask_path = suffixed(mask_output, tolerance, multiple);
            ImageIOService::save(mask, &mask_path, format)
                .with_context(|| format!("Failed to save mask {}", mask_path.display()))?;
            info!("Saved mask {}", mask_path.display());
        }
    }

    info!(
        "Processed {} in {:.2}s",
        input.display(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Output path for one tolerance
///
/// An explicit `--output` is used as is for a single tolerance and suffixed
/// with `_t<N>` when several are written.
pub fn output_path_for(
    cli: &Cli,
    input: &Path,
    tolerance: i32,
    multiple: bool,
    format: OutputFormat,
) -> PathBuf {
    match &cli.output {
        Some(output) => suffixed(output, tolerance, multiple),
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            let name = if multiple {
                format!("{stem}_nobg_t{tolerance}.{}", format.extension())
            } else {
                format!("{stem}_nobg.{}", format.extension())
            };
            input.with_file_name(name)
        },
    }
}

fn suffixed(path: &Path, tolerance: i32, multiple: bool) -> PathBuf {
    if !multiple {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_t{tolerance}.{ext}"),
        None => format!("{stem}_t{tolerance}"),
    };
    path.with_file_name(name)
}

fn show_provider_diagnostics() {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    #[cfg(feature = "onnx")]
    {
        println!("\nONNX Runtime execution providers:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "available" } else { "not available" };
            println!("  {name}: {status} - {description}");
        }
    }

    #[cfg(feature = "tract")]
    {
        println!("\nTract execution providers:");
        for (name, available, description) in crate::backends::TractBackend::list_providers() {
            let status = if available { "available" } else { "not available" };
            println!("  {name}: {status} - {description}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("glazier-bgremove").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["photo.jpg", "--model", "u2net.onnx"]);
        assert_eq!(cli.tolerances, vec![DEFAULT_TOLERANCE]);
        assert_eq!(cli.mode, CliMode::Auto);
        assert!(cli.backend.is_none());
        assert!(!cli.sharpen);
    }

    #[test]
    fn test_repeated_tolerances() {
        let cli = parse(&["photo.jpg", "-m", "u2net.onnx", "-t", "30", "-t", "90"]);
        assert_eq!(cli.tolerances, vec![30, 90]);
    }

    #[test]
    fn test_model_is_required_unless_listing_providers() {
        assert!(Cli::try_parse_from(["glazier-bgremove", "photo.jpg"]).is_err());
        assert!(Cli::try_parse_from(["glazier-bgremove", "--show-providers"]).is_ok());
    }

    #[test]
    fn test_mode_values_are_kebab_case() {
        let cli = parse(&["photo.jpg", "-m", "u2net.onnx", "--mode", "low-light"]);
        assert_eq!(cli.mode.forced_mode(), Some(ProcessingMode::LowLight));
        assert_eq!(CliMode::Auto.forced_mode(), None);
    }

    #[test]
    fn test_cancellation_is_distinguishable_from_failure() {
        let err = interrupted("loading photo.jpg".to_string());
        assert!(is_interrupted(&err));
        assert_eq!(err.to_string(), "Interrupted while loading photo.jpg");

        assert!(!is_interrupted(&anyhow::anyhow!("Failed to load model")));
    }

    #[test]
    fn test_model_size_parser() {
        assert_eq!(parse_model_size("320"), Ok((320, 320)));
        assert_eq!(parse_model_size("512x384"), Ok((512, 384)));
        assert!(parse_model_size("wide").is_err());
    }

    #[test]
    fn test_output_paths() {
        let cli = parse(&["dir/photo.jpg", "-m", "u2net.onnx"]);
        let input = Path::new("dir/photo.jpg");

        assert_eq!(
            output_path_for(&cli, input, 50, false, OutputFormat::Png),
            PathBuf::from("dir/photo_nobg.png")
        );
        assert_eq!(
            output_path_for(&cli, input, 90, true, OutputFormat::Bmp),
            PathBuf::from("dir/photo_nobg_t90.bmp")
        );

        let cli = parse(&["photo.jpg", "-m", "u2net.onnx", "-o", "out/cut.png"]);
        assert_eq!(
            output_path_for(&cli, input, 50, false, OutputFormat::Png),
            PathBuf::from("out/cut.png")
        );
        assert_eq!(
            output_path_for(&cli, input, 70, true, OutputFormat::Png),
            PathBuf::from("out/cut_t70.png")
        );
    }
}
