//! Implementation of the `bake plan` command.
//!
//! Resolves the configuration and prints the jobs batch by batch without
//! building anything.

use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use bakery_lib::resolve::{JobRecord, RecordContext, ResolveOptions, resolve};

use super::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_stat, symbols};

#[derive(Serialize)]
struct PlanOutput {
  variables: BTreeMap<String, String>,
  batches: Vec<Vec<JobRecord>>,
}

pub fn cmd_plan(args: &ConfigArgs, targets: &[String], output: OutputFormat) -> Result<ExitCode> {
  let (config, overrides) = args.load()?;
  let options = ResolveOptions {
    overrides,
    targets: targets.to_vec(),
    now: None,
  };
  let plan = resolve(&config, &options).context("Failed to resolve build plan")?;

  let batches: Vec<Vec<JobRecord>> = plan
    .batches
    .iter()
    .map(|batch| batch.iter().map(|id| plan.record(*id)).collect())
    .collect();

  if output.is_json() {
    print_json(&PlanOutput {
      variables: plan.variables.to_map(),
      batches,
    })?;
    return Ok(ExitCode::SUCCESS);
  }

  for (idx, batch) in batches.iter().enumerate() {
    println!(
      "{}",
      format!("Batch {idx}").if_supports_color(Stream::Stdout, |s| s.bold())
    );
    for job in batch {
      print_job(job);
    }
  }

  println!();
  print_info(&format!("{} job(s) in {} batch(es)", plan.len(), batches.len()));
  Ok(ExitCode::SUCCESS)
}

fn print_job(job: &JobRecord) {
  println!("  {} {}", symbols::INFO, job.name);
  match &job.stage {
    Some(stage) => print_stat("  dockerfile", &format!("{} (stage {stage})", job.dockerfile)),
    None => print_stat("  dockerfile", &job.dockerfile),
  }
  print_stat("  context", &job.context);
  for (alias, source) in &job.contexts {
    let source = match source {
      RecordContext::External { source } => source.clone(),
      RecordContext::Job { name, .. } => format!("{} {name}", symbols::ARROW),
    };
    print_stat(&format!("  context {alias}"), &source);
  }
  if !job.tags.is_empty() {
    print_stat("  tags", &job.tags.join(", "));
  }
  if !job.platforms.is_empty() {
    print_stat("  platforms", &job.platforms.join(", "));
  }
}
