//! Conversion of CLI arguments into processor and server configuration

use crate::cli::main_impl::{ModelArgs, ProcessArgs};
#[cfg(feature = "server")]
use crate::cli::main_impl::ServeArgs;
#[cfg(feature = "server")]
use crate::config::ServerConfig;
use crate::config::{ProcessorConfig, ProcessorConfigBuilder};
use anyhow::{Context, Result};

/// Convert CLI arguments to [`ProcessorConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Profile defaults with the shared model overrides applied
    fn model_builder(args: &ModelArgs, verbose: u8) -> ProcessorConfigBuilder {
        let mut builder = ProcessorConfigBuilder::from_profile(args.profile)
            .execution_provider(args.execution_provider.into())
            .intra_threads(args.threads)
            .debug(verbose >= 2);

        if let Some(extractor) = args.extractor {
            builder = builder.extractor(extractor.into());
        }
        if let Some(model_name) = &args.model_name {
            builder = builder.model_name(model_name.clone());
        }
        if args.model.is_some() {
            builder = builder.model_path(args.model.clone());
        }
        builder
    }

    /// Build the configuration for `bottle-studio process`
    pub(crate) fn from_process_args(args: &ProcessArgs, verbose: u8) -> Result<ProcessorConfig> {
        let mut builder = Self::model_builder(&args.model, verbose).straighten(!args.no_straighten);

        if let Some(format) = args.format {
            builder = builder.output_format(format.into());
        }
        if let Some(height) = args.max_input_height {
            builder = builder.max_input_height(Some(height));
        }
        if let Some(quality) = args.webp_quality {
            builder = builder.webp_quality(quality);
        }

        builder.build().context("Invalid processing configuration")
    }

    /// Build processor and server configuration for `bottle-studio serve`
    #[cfg(feature = "server")]
    pub(crate) fn from_serve_args(args: &ServeArgs, verbose: u8) -> Result<(ProcessorConfig, ServerConfig)> {
        let config = Self::model_builder(&args.model, verbose)
            .eager_model_load(args.eager)
            .build()
            .context("Invalid processing configuration")?;

        if args.max_upload_bytes == 0 {
            anyhow::bail!("--max-upload-bytes must be greater than zero");
        }
        let server = ServerConfig {
            bind_address: args.bind.clone(),
            max_upload_bytes: args.max_upload_bytes,
        };
        Ok((config, server))
    }
}
