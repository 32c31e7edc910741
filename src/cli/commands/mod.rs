//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod download;
mod merge;
mod regions;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use osrm_prep::config::{load_settings_with_options, LoadOptions};
use osrm_prep::regions::RegionSet;
use osrm_prep::services::merge::{MergeStep, DEFAULT_COMBINED_NAME};

#[derive(Parser)]
#[command(name = "osrm-prep")]
#[command(about = "Download US state extracts and prepare OSRM routing data")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory receiving the processed graph files (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for downloads and intermediate files (overrides config file)
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Download and process every region of a set, skipping finished ones
    Download {
        /// Region set to process
        #[arg(short, long, value_enum, default_value = "all")]
        set: RegionSet,
        /// Process only these region codes (overrides --set)
        #[arg(short, long = "region", value_name = "CODE")]
        regions: Vec<String>,
        /// Disable the download progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Build the combined dataset from the processed region graphs
    Merge {
        /// Name of the combined dataset
        #[arg(short, long, default_value = DEFAULT_COMBINED_NAME)]
        name: String,
        /// Region code whose files seed the combined dataset
        #[arg(short, long, value_name = "CODE")]
        template: Option<String>,
        /// Toolchain step run on the combined graph
        #[arg(long, value_enum, default_value = "customize")]
        step: MergeStep,
    },

    /// List the regions of a set
    Regions {
        /// Region set to list
        #[arg(short, long, value_enum, default_value = "all")]
        set: RegionSet,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    })
    .await?;

    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }
    if let Some(scratch_dir) = cli.scratch_dir {
        settings.scratch_dir = scratch_dir;
    }

    match cli.command {
        Commands::Download {
            set,
            regions,
            no_progress,
        } => download::cmd_download(&settings, set, &regions, !no_progress).await,
        Commands::Merge {
            name,
            template,
            step,
        } => {
            merge::cmd_merge(&settings, name, template, step).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Regions { set } => {
            regions::cmd_regions(&settings, set);
            Ok(ExitCode::SUCCESS)
        }
    }
}
