//! annoflow CLI - export image-annotation datapoints to JSON
//!
//! Reads datapoints from a JSON array or NDJSON file and writes them either as one
//! JSONL file or as one JSON file per datapoint, optionally splitting embedded images
//! into PNG side files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use annoflow_core::{try_export_datapoints, DatapointStream, ExportConfig};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "annoflow",
    author,
    version,
    about = "Streaming exporter for image-annotation datapoints",
    long_about = "Export datapoints to a single JSONL file or to one JSON file per datapoint, \
                  with optional extraction of embedded images into PNG files."
)]
struct Cli {
    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export datapoints to JSONL or per-datapoint JSON files
    ///
    /// Options left unset on the command line keep their config-file value.
    Export(ExportArgs),
    /// Manage the export config file (init, show, path)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input file with datapoints (JSON array or NDJSON)
    #[arg(long = "in", value_name = "PATH")]
    input: PathBuf,

    /// Output directory
    #[arg(long = "out", value_name = "DIR")]
    output: PathBuf,

    /// TOML config file (default: ~/.annoflow/export.toml if present)
    #[arg(long, value_name = "PATH", env = "ANNOFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Write one JSON file per datapoint instead of a single JSONL file
    #[arg(long)]
    single_files: bool,

    /// Write a single JSONL file, overriding `single_files = true` in the config
    #[arg(long, conflicts_with = "single_files")]
    aggregate: bool,

    /// Name of the JSONL file (aggregate mode)
    #[arg(long, value_name = "NAME")]
    file_name: Option<String>,

    /// Stop after this many datapoints
    #[arg(long, value_name = "N")]
    max_datapoints: Option<usize>,

    /// Keep the image payload embedded in the JSON output
    #[arg(long)]
    save_image: bool,

    /// Write images to <out>/image/<name>.png instead of embedding them
    #[arg(long, conflicts_with = "save_image")]
    extract_images: bool,

    /// Drop the image payload, overriding image settings in the config
    #[arg(long, conflicts_with_all = ["save_image", "extract_images"])]
    no_image: bool,

    /// Drop image attributes nested in annotations
    #[arg(long)]
    highest_hierarchy_only: bool,

    /// Print the export summary as JSON
    #[arg(long)]
    summary_json: bool,

    /// Disable the progress spinner
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    no_progress: bool,
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Export(args) => run_export(args, cli.quiet)?,
        Commands::Config(args) => config::run_config(args)?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

/// Applies command-line flags over the config file.
fn resolve_config(args: &ExportArgs, quiet: bool) -> Result<ExportConfig> {
    let mut config = config::load_base_config(args.config.as_deref())?;

    if args.single_files {
        config.single_files = true;
    }
    if args.aggregate {
        config.single_files = false;
    }
    if let Some(name) = &args.file_name {
        config.file_name = Some(name.clone());
    }
    if let Some(max) = args.max_datapoints {
        config.max_datapoints = Some(max);
    }
    if args.save_image {
        config.save_image = true;
        config.save_image_in_json = true;
    }
    if args.extract_images {
        config.save_image = true;
        config.save_image_in_json = false;
    }
    if args.no_image {
        config.save_image = false;
        config.save_image_in_json = true;
    }
    if args.highest_hierarchy_only {
        config.highest_hierarchy_only = true;
    }
    config.show_progress = !(quiet || args.no_progress || args.summary_json);

    Ok(config)
}

fn run_export(args: ExportArgs, quiet: bool) -> Result<()> {
    let config = resolve_config(&args, quiet)?;

    info!(
        "exporting {:?} -> {:?} (single_files: {}, max: {:?})",
        args.input, args.output, config.single_files, config.max_datapoints
    );

    let stream = DatapointStream::from_path(&args.input)
        .with_context(|| format!("failed to open {:?}", args.input))?;
    let summary = try_export_datapoints(stream, &args.output, &config)
        .context("failed to export datapoints")?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Exported {} datapoint(s) and {} image(s) to {}",
            summary.documents_written,
            summary.images_written,
            args.output.display()
        );
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
