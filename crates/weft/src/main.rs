//! weft CLI - markup template expansion.
//!
//! Provides commands for:
//! - `render`: Render a named template to HTML
//! - `directive`: Expand a custom element directive
//! - `check`: Load every definitions source and report what it declares

mod commands;
mod error;
mod output;

use std::error::Error as _;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, DirectiveArgs, RenderArgs};
use output::Output;

/// weft - Markup template expansion engine.
#[derive(Parser)]
#[command(name = "weft", version, about)]
struct Cli {
    /// Enable verbose output (definition loading and render logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template.
    Render(RenderArgs),
    /// Expand a custom element directive.
    Directive(DirectiveArgs),
    /// Load all definitions and report their contents.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Render(args) => args.execute(),
        Commands::Directive(args) => args.execute(),
        Commands::Check(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        let mut source = err.source();
        while let Some(cause) = source {
            output.error(&format!("  caused by: {cause}"));
            source = cause.source();
        }
        std::process::exit(1);
    }
}
