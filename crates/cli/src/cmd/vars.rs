//! Implementation of the `bake vars` command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use bakery_lib::vars::{RunClock, VarEnv};

use super::ConfigArgs;
use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Serialize)]
struct VarOutput<'a> {
  name: &'a str,
  value: Option<&'a str>,
}

pub fn cmd_vars(args: &ConfigArgs, output: OutputFormat) -> Result<ExitCode> {
  let (config, overrides) = args.load()?;
  let env = VarEnv::resolve(&config.variables, &overrides, &RunClock::system())
    .context("Failed to resolve variables")?;

  if output.is_json() {
    let vars: Vec<VarOutput> = env.iter().map(|(name, value)| VarOutput { name, value }).collect();
    print_json(&vars)?;
    return Ok(ExitCode::SUCCESS);
  }

  for (name, value) in env.iter() {
    print_stat(name, value.unwrap_or("(unset)"));
  }
  Ok(ExitCode::SUCCESS)
}
