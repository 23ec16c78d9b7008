//! Pocket cart management commands
//!
//! This module provides CLI commands for assembling and inspecting
//! Emberware Pocket cart files (.ewp).

pub mod assemble;
pub mod info;

use anyhow::Result;
use clap::Subcommand;

/// Cart management subcommands
#[derive(Debug, Subcommand)]
pub enum CartCommand {
    /// Assemble an Emberware Pocket cart (.ewp) from the runtime template
    Assemble(assemble::AssembleArgs),

    /// Display cart chunks and metadata
    Info(info::InfoArgs),
}

/// Execute a cart command
pub fn execute(cmd: CartCommand) -> Result<()> {
    match cmd {
        CartCommand::Assemble(args) => assemble::execute(args),
        CartCommand::Info(args) => info::execute(args),
    }
}
