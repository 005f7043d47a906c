//! CLI command implementations.

pub(crate) mod check;
pub(crate) mod directive;
pub(crate) mod render;

pub(crate) use check::CheckArgs;
pub(crate) use directive::DirectiveArgs;
pub(crate) use render::RenderArgs;

use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::{Map, Value};
use weft_config::{CliSettings, Config};
use weft_engine::{Engine, EngineOptions, FileSource};

use crate::error::CliError;

/// Configuration and engine options shared by all commands.
#[derive(Args)]
pub(crate) struct EngineArgs {
    /// Path to configuration file (default: auto-discover weft.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Definitions file to load in addition to the configured ones.
    #[arg(short = 'd', long = "definitions", value_name = "FILE")]
    definitions: Vec<PathBuf>,

    /// Fail on missing values instead of rendering them as empty.
    #[arg(long)]
    strict: bool,

    /// HTML-escape interpolated values.
    #[arg(long)]
    escape: bool,

    /// Maximum sub-template nesting depth (overrides config).
    #[arg(long)]
    max_depth: Option<usize>,
}

impl EngineArgs {
    /// Load the configuration with CLI overrides applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = self.cli_settings();
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            definitions: (!self.definitions.is_empty()).then(|| self.definitions.clone()),
            strict: self.strict.then_some(true),
            escape: self.escape.then_some(true),
            max_depth: self.max_depth,
        }
    }
}

/// Build an engine reading definitions from the configured files.
pub(crate) fn build_engine(config: &Config) -> Engine {
    let options = EngineOptions {
        strict: config.render.strict,
        escape: config.render.escape,
        max_depth: config.render.max_depth,
    };
    let mut engine = Engine::new().with_options(options);
    for path in &config.templates_resolved.definitions {
        tracing::debug!(path = %path.display(), "Adding definitions source");
        engine = engine.with_source(FileSource::new(path));
    }
    engine
}

/// Template variables given on the command line.
#[derive(Args)]
pub(crate) struct VarsArgs {
    /// JSON file holding an object of variables.
    #[arg(long, value_name = "FILE")]
    vars: Option<PathBuf>,

    /// Variable as `name=value`; the value is parsed as JSON, else taken as a string.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    var: Vec<(String, Value)>,
}

impl VarsArgs {
    /// Collect variables: the file first, then `--var` assignments on top.
    pub(crate) fn collect(&self) -> Result<Map<String, Value>, CliError> {
        let mut vars = match &self.vars {
            Some(path) => read_json_object(path)?,
            None => Map::new(),
        };
        for (name, value) in &self.var {
            vars.insert(name.clone(), value.clone());
        }
        Ok(vars)
    }
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, CliError> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|source| CliError::Json {
        path: path.display().to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::Validation(format!(
            "{} must contain a JSON object",
            path.display()
        ))),
    }
}

/// Parse `name=value`, reading the value as JSON when it parses.
pub(crate) fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in `{s}`"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((name.to_owned(), value))
}
