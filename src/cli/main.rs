//! Bottle Studio CLI
//!
//! `serve` runs the HTTP service, `process` converts photos on disk.

use super::config::CliConfigBuilder;
use crate::{
    config::{ExecutionProvider, ExtractorKind, OutputFormat, Profile},
    processor::BottleProcessor,
    services::{ImageIOService, OutputFormatHandler},
    tracing_config::{init_cli_tracing, spans, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Suffix appended to the stem of every written file
const OUTPUT_SUFFIX: &str = "_studio";

/// Product-photo pipeline for bottles
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bottle-studio")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve `GET /` and `POST /process-bottle/` over HTTP
    #[cfg(feature = "server")]
    Serve(ServeArgs),
    /// Process image files or directories
    Process(ProcessArgs),
    /// Show available extractors and execution providers
    Providers,
}

/// Model and profile options shared by all processing commands
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Deployment profile (standard, lean, high-res)
    #[arg(short, long, default_value = "standard")]
    pub profile: Profile,

    /// Subject extractor [default: onnx when compiled in, else passthrough]
    #[arg(long, value_enum)]
    pub extractor: Option<CliExtractor>,

    /// Path to the segmentation model file
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Model name looked up in the model directory [default: from profile]
    #[arg(long)]
    pub model_name: Option<String>,

    /// Execution provider for the ONNX extractor
    #[arg(short, long, value_enum, default_value_t = CliExecutionProvider::Auto)]
    pub execution_provider: CliExecutionProvider,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,
}

#[cfg(feature = "server")]
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Load the model before accepting requests
    #[arg(long)]
    pub eager: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file (single input) or directory
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Output format [default: from profile]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// WebP quality (0-100) [default: 95]
    #[arg(long)]
    pub webp_quality: Option<u8>,

    /// Cap on the input height before extraction [default: from profile]
    #[arg(long)]
    pub max_input_height: Option<u32>,

    /// Skip tilt correction
    #[arg(long)]
    pub no_straighten: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExtractor {
    Onnx,
    Passthrough,
}

impl From<CliExtractor> for ExtractorKind {
    fn from(kind: CliExtractor) -> Self {
        match kind {
            CliExtractor::Onnx => Self::Onnx,
            CliExtractor::Passthrough => Self::Passthrough,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliExecutionProvider {
    Auto,
    Cpu,
    Cuda,
    Coreml,
}

impl From<CliExecutionProvider> for ExecutionProvider {
    fn from(provider: CliExecutionProvider) -> Self {
        match provider {
            CliExecutionProvider::Auto => Self::Auto,
            CliExecutionProvider::Cpu => Self::Cpu,
            CliExecutionProvider::Cuda => Self::Cuda,
            CliExecutionProvider::Coreml => Self::CoreMl,
        }
    }
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
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

/// Main entry point for the CLI application
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing subscriber")?;

    match cli.command {
        #[cfg(feature = "server")]
        Command::Serve(args) => serve(&args, cli.verbose).await,
        Command::Process(args) => process(&args, cli.verbose),
        Command::Providers => {
            show_provider_diagnostics();
            Ok(())
        },
    }
}

#[cfg(feature = "server")]
async fn serve(args: &ServeArgs, verbose: u8) -> Result<()> {
    let (config, server_config) = CliConfigBuilder::from_serve_args(args, verbose)?;
    info!(
        "Starting bottle studio service: profile={}, extractor={}, eager={}",
        config.profile, config.extractor, config.eager_model_load
    );

    let processor = BottleProcessor::new(config).context("Failed to create bottle processor")?;
    crate::server::serve(processor, server_config).await
}

fn process(args: &ProcessArgs, verbose: u8) -> Result<()> {
    let config = CliConfigBuilder::from_process_args(args, verbose)?;
    let files = collect_input_files(&args.inputs, args.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let output_dir = prepare_output_dir(args.output.as_deref(), files.len())?;
    let single_output = if output_dir.is_none() {
        args.output.clone()
    } else {
        None
    };

    info!(
        "Processing {} file(s): profile={}, format={}",
        files.len(),
        config.profile,
        config.output_format
    );
    let profile = config.profile.to_string();
    let format = config.output_format;
    let mut processor = BottleProcessor::new(config).context("Failed to create bottle processor")?;

    let _batch_span = spans::batch_processing(files.len(), &profile).entered();
    let progress = (files.len() > 1).then(|| create_progress_bar(files.len() as u64));
    let batch_start = Instant::now();
    let mut failed = 0usize;

    for input in &files {
        let _file_span = spans::file_processing(input).entered();
        if let Some(pb) = &progress {
            pb.set_message(input.display().to_string());
        }

        let output_path = single_output
            .clone()
            .unwrap_or_else(|| output_path_for(input, output_dir.as_deref(), format));

        let outcome = processor
            .process_file(input)
            .and_then(|result| result.save(&output_path).map(|()| result));

        match outcome {
            Ok(result) => {
                info!(
                    "{} -> {} ({}, crop {}, orientation {})",
                    input.display(),
                    output_path.display(),
                    result.timing_summary(),
                    result.crop.label(),
                    result.orientation.label()
                );
            },
            Err(e) => {
                failed += 1;
                error!("Failed to process {}: {e}", input.display());
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    let succeeded = files.len() - failed;
    info!(
        "Processed {succeeded} image(s), {failed} failed in {:.2}s",
        batch_start.elapsed().as_secs_f64()
    );

    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) failed to process", files.len());
    }
    Ok(())
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn show_provider_diagnostics() {
    let factory = crate::processor::DefaultExtractorFactory;
    println!("Extractors:");
    for kind in crate::processor::ExtractorFactory::available_extractors(&factory) {
        println!("  {kind}");
    }

    #[cfg(feature = "onnx")]
    {
        println!("ONNX Runtime execution providers:");
        for (name, available) in crate::backends::OnnxExtractor::list_providers() {
            let status = if available { "available" } else { "not available" };
            println!("  {name:<8} {status}");
        }
    }
}

/// Expand inputs into a sorted list of supported image files
fn collect_input_files(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in inputs {
        if path.is_file() {
            if ImageIOService::is_supported_format(path) {
                files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(path, recursive)?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn find_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if entry.file_type().is_file() && ImageIOService::is_supported_format(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Directory receiving outputs, when the output argument names one
fn prepare_output_dir(output: Option<&Path>, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };

    if output.is_dir() {
        return Ok(Some(output.to_path_buf()));
    }
    if file_count == 1 {
        return Ok(None);
    }
    if output.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output.display()
        );
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;
    Ok(Some(output.to_path_buf()))
}

/// `<stem>_studio.<ext>` in `output_dir`, or next to the input
fn output_path_for(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let file_name = format!(
        "{stem}{OUTPUT_SUFFIX}.{}",
        OutputFormatHandler::get_extension(format)
    );
    let dir = output_dir.unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")));
    dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_output_path_next_to_input() {
        let path = output_path_for(Path::new("/photos/bottle.jpg"), None, OutputFormat::Png);
        assert_eq!(path, PathBuf::from("/photos/bottle_studio.png"));
    }

    #[test]
    fn test_output_path_in_directory() {
        let path = output_path_for(
            Path::new("/photos/bottle.jpg"),
            Some(Path::new("/out")),
            OutputFormat::WebP,
        );
        assert_eq!(path, PathBuf::from("/out/bottle_studio.webp"));
    }

    #[test]
    fn test_collect_input_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("b.png"));
        write_png(&dir.path().join("a.png"));
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_png(&nested.join("c.png"));

        let flat = collect_input_files(&[dir.path().to_path_buf()], false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.png"), dir.path().join("b.png")]);

        let deep = collect_input_files(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&nested.join("c.png")));
    }

    #[test]
    fn test_collect_input_files_missing_path() {
        let dir = tempdir().unwrap();
        assert!(collect_input_files(&[dir.path().join("absent.png")], false).is_err());
    }

    #[test]
    fn test_prepare_output_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out");

        assert_eq!(prepare_output_dir(None, 3).unwrap(), None);
        assert_eq!(prepare_output_dir(Some(&target), 1).unwrap(), None);
        assert_eq!(prepare_output_dir(Some(&target), 2).unwrap(), Some(target.clone()));
        assert!(target.is_dir());

        let file = dir.path().join("file.png");
        write_png(&file);
        assert!(prepare_output_dir(Some(&file), 2).is_err());
    }

    #[test]
    fn test_process_command_writes_outputs() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("one.png"));
        write_png(&dir.path().join("two.png"));
        let out = dir.path().join("out");

        let cli = Cli::try_parse_from([
            "bottle-studio",
            "process",
            dir.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--extractor",
            "passthrough",
        ])
        .unwrap();
        let Command::Process(args) = cli.command else {
            panic!("expected process command");
        };
        process(&args, 0).unwrap();

        for name in ["one_studio.png", "two_studio.png"] {
            let written = image::open(out.join(name)).unwrap();
            assert_eq!(written.width(), 555);
            assert_eq!(written.height(), 555);
        }
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["bottle-studio", "-vv", "process", "a.png", "--format", "webp"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Process(args) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.format, Some(CliOutputFormat::Webp));
        assert_eq!(args.model.profile, Profile::Standard);

        assert!(Cli::try_parse_from(["bottle-studio", "process"]).is_err());
        assert!(Cli::try_parse_from(["bottle-studio", "process", "a.png", "--profile", "huge"]).is_err());
    }
}
