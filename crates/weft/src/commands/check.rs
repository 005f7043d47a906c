//! `weft check` command implementation.

use clap::Args;

use super::{EngineArgs, build_engine};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// List every loaded template and directive.
    #[arg(short, long)]
    list: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if no definitions are configured or one fails to load.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.engine.load_config()?;
        let definitions = &config.templates_resolved.definitions;
        if definitions.is_empty() {
            output.warning("No definitions configured.");
            output.info("\nAdd the following to your weft.toml:");
            output.info("\n[templates]");
            output.info(r#"definitions = ["templates.xml"]"#);
            output.info("\nor pass one with --definitions <FILE>.");
            return Err(CliError::Validation(
                "no definitions configured".to_owned(),
            ));
        }

        for path in definitions {
            output.info(&format!("Definitions: {}", path.display()));
        }

        let engine = build_engine(&config);
        let store = engine.store();
        let summary = store.preload()?;

        output.success(&format!(
            "Loaded {} templates, {} directives, {} attribute directives",
            summary.templates, summary.directives, summary.attr_directives
        ));

        if self.list {
            print_section(&output, "Templates", &store.names());
            print_section(&output, "Directives", &store.directives().tags());
            print_section(
                &output,
                "Attribute directives",
                &store.directives().attr_names(),
            );
        }

        Ok(())
    }
}

fn print_section(output: &Output, title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    output.highlight(&format!("\n{title}:"));
    for name in names {
        output.info(&format!("  {name}"));
    }
}
