//! Conversion of CLI arguments into a `RemoverConfig`

use crate::cli::main_impl::{Cli, CliBackend, CliExecutionProvider, CliOutputFormat};
use crate::config::{BackendType, ExecutionProvider, OutputFormat, RemoverConfig};
use anyhow::{bail, Context, Result};

/// Convert CLI arguments to a `RemoverConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration, starting from `--config` when given
    ///
    /// Flags given on the command line override values from the file.
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemoverConfig> {
        let mut config = match &cli.config {
            Some(path) => RemoverConfig::from_json_file(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?,
            None => RemoverConfig::default(),
        };

        if let Some(backend) = cli.backend {
            config.backend_type = match backend {
                CliBackend::Onnx => BackendType::Onnx,
                CliBackend::Tract => BackendType::Tract,
            };
        }
        if let Some(provider) = cli.execution_provider {
            config.execution_provider = match provider {
                CliExecutionProvider::Auto => ExecutionProvider::Auto,
                CliExecutionProvider::Cpu => ExecutionProvider::Cpu,
                CliExecutionProvider::Cuda => ExecutionProvider::Cuda,
                CliExecutionProvider::Coreml => ExecutionProvider::CoreMl,
            };
        }
        if let Some(threads) = cli.threads {
            config.intra_threads = threads;
            config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        }
        if let Some((width, height)) = cli.model_size {
            config.model_width = width;
            config.model_height = height;
        }
        if let Some(size) = cli.smoothing_kernel {
            config.edge_smoothing_kernel_size = size;
        }
        if let Some(format) = cli.format {
            config.output_format = match format {
                CliOutputFormat::Png => OutputFormat::Png,
                CliOutputFormat::Bmp => OutputFormat::Bmp,
            };
        }
        config.sharpen_edges |= cli.sharpen;
        config.enhance_saturation |= cli.saturate;

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Check the arguments that do not end up in the configuration
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(input) = &cli.input {
            if !input.exists() {
                bail!("Input file does not exist: {}", input.display());
            }
        }
        if let Some(model) = &cli.model {
            if !model.exists() {
                bail!("Model file does not exist: {}", model.display());
            }
        }
        if cli.tolerances.is_empty() {
            bail!("At least one tolerance is required");
        }
        if let Some(threads) = cli.threads {
            let cores = std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1);
            if threads > cores * 4 {
                log::warn!("{threads} threads requested on a machine with {cores} cores");
            }
        }
        Ok(())
    }
}
