mod build;
mod plan;
mod vars;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use bakery_lib::config::{BakeConfig, load_config};
use bakery_lib::vars::env_overrides;

pub use build::{BuildArgs, cmd_build};
pub use plan::cmd_plan;
pub use vars::cmd_vars;

/// Where the configuration comes from and how variables are overridden.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
  /// Configuration file, JSON or YAML
  #[arg(short, long, global = true, default_value = "bake.yaml")]
  pub file: PathBuf,

  /// Override a variable (repeatable)
  #[arg(long = "set", value_name = "NAME=VALUE", global = true, value_parser = parse_assignment)]
  pub set: Vec<(String, String)>,

  /// Ignore variable overrides from the process environment
  #[arg(long, global = true)]
  pub no_env: bool,
}

impl ConfigArgs {
  /// Load the configuration and collect variable overrides.
  ///
  /// `--set` wins over the process environment.
  pub fn load(&self) -> Result<(BakeConfig, BTreeMap<String, String>)> {
    let config =
      load_config(&self.file).with_context(|| format!("Failed to load configuration: {}", self.file.display()))?;

    let mut overrides = if self.no_env {
      BTreeMap::new()
    } else {
      env_overrides(&config.variables)
    };
    for (name, value) in &self.set {
      debug!(variable = %name, "override from command line");
      overrides.insert(name.clone(), value.clone());
    }

    Ok((config, overrides))
  }
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
    _ => Err(format!("expected NAME=VALUE, got '{s}'")),
  }
}
