//! `weft directive` command implementation.

use clap::Args;
use serde_json::{Map, Value};
use weft_engine::tag_name;

use super::{EngineArgs, VarsArgs, build_engine, parse_assignment};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the directive command.
#[derive(Args)]
pub(crate) struct DirectiveArgs {
    /// Directive tag (`user-card`) or declared name (`UserCard`).
    tag: String,

    /// Directive attribute as `name=value`; the value is parsed as JSON, else taken as a string.
    #[arg(long = "attr", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    attrs: Vec<(String, Value)>,

    #[command(flatten)]
    vars: VarsArgs,

    #[command(flatten)]
    engine: EngineArgs,
}

impl DirectiveArgs {
    /// Execute the directive command.
    ///
    /// Host variables come from `--vars`/`--var`; attributes overlay them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directive is unknown or fails to render.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.engine.load_config()?;
        let engine = build_engine(&config);
        let host_scope = self.vars.collect()?;
        let attrs: Map<String, Value> = self.attrs.into_iter().collect();

        let result = engine.instantiate(&tag_name(&self.tag), attrs, host_scope)?;

        output.emit(&result.html)?;
        if !result.post_result.is_null() {
            output.info(&format!("post-script result: {}", result.post_result));
        }

        Ok(())
    }
}
