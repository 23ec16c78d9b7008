mod cart;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pocket_bridge::bridge_map;
use pocket_bridge::emit::lua::generated_section;

/// Emberware Pocket build tasks
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Emberware Pocket tracker build and development tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the generated bridge section (decoders + constants)
    Gen {
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Cart management (assemble, inspect)
    Cart {
        #[command(subcommand)]
        command: cart::CartCommand,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Gen { output } => generate(output),
        Commands::Cart { command } => cart::execute(command),
    }
}

fn generate(output: Option<PathBuf>) -> Result<()> {
    let map = bridge_map().context("Failed to compute the bridge memory map")?;
    let section = generated_section(&map).context("Failed to generate the bridge section")?;

    match output {
        Some(path) => {
            std::fs::write(&path, &section)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Generated bridge section: {}", path.display());
        }
        None => print!("{section}"),
    }
    Ok(())
}

/// Workspace root (parent of the xtask crate)
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("xtask has a parent directory")
        .to_path_buf()
}
