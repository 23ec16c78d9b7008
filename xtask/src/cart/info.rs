//! Inspect Emberware Pocket cart files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use pocket_bridge::cart::{Cart, ChunkType};

use super::assemble::CartManifest;

/// Arguments for inspecting a cart
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Path to the cart file (.ewp)
    pub cart_file: PathBuf,
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    inspect_cart(&args.cart_file)
}

fn inspect_cart(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read cart file: {}", path.display()))?;
    let cart = Cart::from_bytes(&bytes)
        .with_context(|| format!("Failed to parse cart: {}", path.display()))?;

    println!("═══════════════════════════════════════════════════════════");
    println!("Emberware Pocket cart: {}", path.display());
    println!("═══════════════════════════════════════════════════════════");
    println!();

    if let Some(meta) = cart.find(ChunkType::Meta) {
        if let Ok(manifest) =
            toml::from_str::<CartManifest>(&String::from_utf8_lossy(&meta.data))
        {
            println!("CART INFORMATION");
            println!("───────────────────────────────────────────────────────────");
            println!("  Title:       {}", manifest.title);
            println!("  Author:      {}", manifest.author);
            println!("  Version:     {}", manifest.version);
            if !manifest.description.is_empty() {
                println!("  Description: {}", manifest.description);
            }
            println!();
        }
    }

    println!("CHUNKS");
    println!("───────────────────────────────────────────────────────────");
    for (i, chunk) in cart.chunks.iter().enumerate() {
        let name = match chunk.chunk_type {
            ChunkType::Code => "Code (runtime source)",
            ChunkType::Meta => "Meta (manifest)",
        };
        println!("  [{}] {:<24} {:>7} bytes", i, name, chunk.data.len());
    }

    println!();
    println!("  Total: {} bytes", bytes.len());
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}
