use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use annoflow_core::ExportConfig;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a default export config file
    Init(InitArgs),
    /// Print the effective export config as TOML
    Show(ShowArgs),
    /// Show config file path
    Path,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Config file to create (default: ~/.annoflow/export.toml)
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Config file to read (default: ~/.annoflow/export.toml if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Show(args) => run_show(args),
        ConfigCommands::Path => {
            println!("{}", ExportConfig::default_path().display());
            Ok(())
        }
    }
}

/// Loads the explicit config file, else the default one if it exists, else built-in defaults.
pub fn load_base_config(explicit: Option<&Path>) -> Result<ExportConfig> {
    if let Some(path) = explicit {
        return ExportConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path));
    }

    let default_path = ExportConfig::default_path();
    if default_path.exists() {
        ExportConfig::load(&default_path)
            .with_context(|| format!("failed to load config {:?}", default_path))
    } else {
        Ok(ExportConfig::default())
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = args.path.unwrap_or_else(ExportConfig::default_path);

    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {:?}\n\nUse --force to overwrite",
            config_path
        ));
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = ExportConfig {
        file_name: Some("datapoints.jsonl".to_string()),
        ..Default::default()
    };
    std::fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

    println!("Wrote {}", config_path.display());
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let config = load_base_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
