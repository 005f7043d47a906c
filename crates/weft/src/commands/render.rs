//! `weft render` command implementation.

use std::path::PathBuf;

use clap::Args;
use weft_engine::RenderContext;

use super::{EngineArgs, VarsArgs, build_engine};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Name of the template to render.
    template: String,

    /// Write the HTML to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    vars: VarsArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, definitions or rendering fail.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.engine.load_config()?;
        let engine = build_engine(&config);
        let ctx = RenderContext::from_vars(self.vars.collect()?);

        let html = engine.render(&self.template, ctx)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, &html)?;
                output.success(&format!(
                    "Rendered {} to {}",
                    self.template,
                    path.display()
                ));
            }
            None => output.emit(&html)?,
        }

        Ok(())
    }
}
