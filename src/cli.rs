//! Command line driver.
//!
//! `map` rewrites a model file, `back-map` replays engine diagnostics for a
//! model against its mapping, and `query` rewrites a query bar formula.
//! Diagnostics are read and written as wire lines.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{debug, info};

use crate::config::load_config;
use crate::errors::MapperError;
use crate::mappers::MapperRegistry;
use crate::orchestrator::Orchestrator;

pub mod output;

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "uppaal-mapper",
    version,
    about = "Rewrites extended models and queries for the model-checking engine."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Map a model and print it. Diagnostics go to stderr.
    Map {
        /// The model file to map.
        model: PathBuf,
        /// Write the mapped model here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Map a model, then map engine diagnostics on the result back to it.
    BackMap {
        /// The model file the diagnostics belong to.
        model: PathBuf,
        /// Engine diagnostics, one wire line each.
        diagnostics: PathBuf,
    },
    /// Map a query bar formula and print it.
    Query {
        /// The formula as typed.
        text: String,
    },
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

pub fn run(args: &Args) -> Result<(), MapperError> {
    let config = load_config(args.config.as_deref())?;
    let registry = MapperRegistry::with_builtins();
    let mut orchestrator = Orchestrator::from_config(&config, &registry)?;
    debug!(mappers:? = config.mappers; "Built orchestrator");

    match &args.command {
        Command::Map { model, output } => {
            let text = fs::read_to_string(model)?;
            let mapped = orchestrator.map_model(&text)?;
            output::write_text(&mapped.text, output.as_deref())?;
            output::write_diagnostics(&mut io::stderr().lock(), &mapped.diagnostics)?;
            info!(diagnostics = mapped.diagnostics.len(); "Mapped model");
        }
        Command::BackMap { model, diagnostics } => {
            let text = fs::read_to_string(model)?;
            orchestrator.map_model(&text)?;
            let engine = output::read_diagnostics(&fs::read_to_string(diagnostics)?)?;
            let mapped: Vec<_> = engine.iter().filter_map(|d| orchestrator.back_map(d)).collect();
            info!(received = engine.len(), kept = mapped.len(); "Back-mapped diagnostics");
            output::write_diagnostics(&mut io::stdout().lock(), &mapped)?;
        }
        Command::Query { text } => {
            let mapped = orchestrator.map_query(text)?;
            writeln!(io::stdout().lock(), "{}", mapped.text)?;
            output::write_diagnostics(&mut io::stderr().lock(), &mapped.diagnostics)?;
        }
    }
    Ok(())
}
