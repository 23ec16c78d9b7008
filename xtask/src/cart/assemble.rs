//! Assemble Emberware Pocket cart (.ewp) files
//!
//! Splices the generated bridge section (decoders, memory map, protocol
//! constants) into the hand-written runtime template between its marker
//! lines, then packages the result with the cart manifest into the chunked
//! cart container. Any failure aborts before the output file is touched;
//! a partially written cart is worse than no cart.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Deserialize;

use pocket_bridge::bridge_map;
use pocket_bridge::cart::{Cart, ChunkType};
use pocket_bridge::emit::lua::generated_section;

/// Opening marker line in the runtime template
pub const MARKER_BEGIN: &str = "-- <BRIDGE:GENERATED>";
/// Closing marker line in the runtime template
pub const MARKER_END: &str = "-- </BRIDGE:GENERATED>";

/// Arguments for assembling a Pocket cart
#[derive(Debug, Args)]
pub struct AssembleArgs {
    /// Runtime template (defaults to runtime/player.lua)
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Cart manifest (defaults to cart.toml)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output cart file path (.ewp)
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

/// Cart manifest (cart.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct CartManifest {
    /// Display title
    pub title: String,
    /// Author/studio name
    pub author: String,
    /// Semantic version (e.g., "1.0.0")
    pub version: String,
    /// Optional description
    #[serde(default)]
    pub description: String,
}

impl CartManifest {
    /// Validate required fields
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            bail!("Cart title cannot be empty");
        }
        if self.author.is_empty() {
            bail!("Cart author cannot be empty");
        }
        if self.version.is_empty() {
            bail!("Cart version cannot be empty");
        }
        Ok(())
    }
}

/// Execute the assemble command
pub fn execute(args: AssembleArgs) -> Result<()> {
    let root = crate::project_root();
    let template_path = args.template.unwrap_or_else(|| root.join("runtime/player.lua"));
    let manifest_path = args.manifest.unwrap_or_else(|| root.join("cart.toml"));

    println!("Assembling Pocket cart: {}", args.output.display());

    // 1. Read and validate the manifest
    let manifest_text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read manifest: {}", manifest_path.display()))?;
    let manifest: CartManifest = toml::from_str(&manifest_text)
        .with_context(|| format!("Failed to parse manifest: {}", manifest_path.display()))?;
    manifest.validate()?;
    println!("  ✓ Manifest: {} v{}", manifest.title, manifest.version);

    // 2. Read the runtime template
    let template = std::fs::read_to_string(&template_path)
        .with_context(|| format!("Failed to read template: {}", template_path.display()))?;

    // 3. Generate the bridge section and splice it in
    let map = bridge_map().context("Failed to compute the bridge memory map")?;
    let section = generated_section(&map).context("Failed to generate the bridge section")?;
    let code = splice(&template, &section)
        .with_context(|| format!("Failed to splice template: {}", template_path.display()))?;
    println!(
        "  ✓ Runtime spliced ({} bytes, {} generated)",
        code.len(),
        section.len()
    );

    // 4. Package the cart
    let mut cart = Cart::new();
    cart.push(ChunkType::Code, code.into_bytes());
    cart.push(ChunkType::Meta, manifest_text.into_bytes());
    let bytes = cart.to_bytes().context("Failed to serialize cart")?;

    // 5. Write only after everything above succeeded
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write cart: {}", args.output.display()))?;
    println!("  ✓ Cart written ({} bytes)", bytes.len());

    Ok(())
}

/// Replace the section between the marker lines with `section`.
///
/// The marker lines themselves stay in place, so an assembled cart can be
/// re-spliced. Exactly one marker pair must be present.
pub fn splice(template: &str, section: &str) -> Result<String> {
    let occurrences = |needle: &str| template.matches(needle).count();
    if occurrences(MARKER_BEGIN) != 1 || occurrences(MARKER_END) != 1 {
        bail!(
            "template must contain exactly one '{}' / '{}' pair",
            MARKER_BEGIN,
            MARKER_END
        );
    }

    let begin = template.find(MARKER_BEGIN).unwrap() + MARKER_BEGIN.len();
    let end = template.find(MARKER_END).unwrap();
    if end < begin {
        bail!("'{}' appears before '{}'", MARKER_END, MARKER_BEGIN);
    }

    let mut out = String::with_capacity(template.len() + section.len());
    out.push_str(&template[..begin]);
    out.push('\n');
    out.push_str(section);
    out.push_str(&template[end..]);
    Ok(out)
}
