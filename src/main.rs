use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use amv::manifest::load_and_validate_manifest;
use amv::viewer::{run_view, ViewArgs};

#[derive(Debug, Parser)]
#[command(name = "amv")]
#[command(about = "ASCII Model Viewer")]
#[command(version = option_env!("AMV_GIT_HASH").unwrap_or(env!("CARGO_PKG_VERSION")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a scene manifest in the interactive viewer.
    View {
        manifest: PathBuf,
        /// Start with the idle animation off.
        #[arg(long = "no-animate")]
        no_animate: bool,
    },
    /// Validate a scene manifest and its referenced assets.
    Check { manifest: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            manifest,
            no_animate,
        } => run_view(&manifest, ViewArgs { no_animate }),
        Commands::Check { manifest } => run_check(&manifest),
    }
}

fn run_check(manifest_path: &Path) -> Result<()> {
    let manifest = load_and_validate_manifest(manifest_path)?;

    println!(
        "OK: {} (model {}, pattern {}, animation {})",
        manifest_path.display(),
        manifest.model.path.display(),
        manifest.pattern.path.display(),
        if manifest.animate { "on" } else { "off" }
    );
    if let Some(name) = &manifest.name {
        println!("Scene: {name}");
    }
    Ok(())
}
