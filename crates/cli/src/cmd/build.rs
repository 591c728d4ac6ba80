//! Implementation of the `bake build` command.
//!
//! Resolves the configuration, then hands each job to the build invoker
//! batch by batch. Ctrl-C cancels the run.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use bakery_lib::execute::{BuildInvoker, DockerInvoker, DryRunInvoker, ExecuteConfig, RunStatus, execute_plan};
use bakery_lib::resolve::{ResolveOptions, resolve};

use super::ConfigArgs;
use crate::output::{OutputFormat, print_info, print_json, print_job_status, print_success, print_warning};

/// Options of `bake build` besides the target selection.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
  pub jobs: Option<usize>,
  pub keep_going: bool,
  pub push: bool,
  pub dry_run: bool,
}

/// Process exit code for the overall outcome of a run.
pub fn exit_code(status: RunStatus) -> ExitCode {
  match status {
    RunStatus::Succeeded => ExitCode::SUCCESS,
    RunStatus::Skipped => ExitCode::from(2),
    RunStatus::Cancelled => ExitCode::from(130),
    RunStatus::Failed => ExitCode::FAILURE,
  }
}

pub fn cmd_build(args: &ConfigArgs, targets: &[String], build: &BuildArgs, output: OutputFormat) -> Result<ExitCode> {
  let (config, overrides) = args.load()?;
  let options = ResolveOptions {
    overrides,
    targets: targets.to_vec(),
    now: None,
  };
  let plan = resolve(&config, &options).context("Failed to resolve build plan")?;

  let invoker: Arc<dyn BuildInvoker> = if build.dry_run {
    Arc::new(DryRunInvoker)
  } else {
    Arc::new(DockerInvoker {
      push: build.push,
      ..DockerInvoker::default()
    })
  };

  let mut execute = ExecuteConfig {
    keep_going: build.keep_going,
    ..ExecuteConfig::default()
  };
  if let Some(jobs) = build.jobs {
    execute.parallelism = jobs.max(1);
  }

  if !output.is_json() {
    print_info(&format!(
      "Building {} job(s) in {} batch(es)",
      plan.len(),
      plan.batches.len()
    ));
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let cancel = CancellationToken::new();
  let on_signal = cancel.clone();
  rt.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling run");
      on_signal.cancel();
    }
  });

  let report = rt.block_on(execute_plan(&plan, invoker, &execute, cancel));

  if output.is_json() {
    print_json(&report)?;
    return Ok(exit_code(report.status()));
  }

  for job in &report.jobs {
    print_job_status(&job.name, &job.status, job.duration);
  }

  println!();
  let summary = format!(
    "{} succeeded, {} failed, {} skipped, {} cancelled",
    report.succeeded(),
    report.failed(),
    report.skipped(),
    report.cancelled()
  );
  if report.is_success() {
    print_success(&summary);
  } else {
    print_warning(&summary);
  }

  Ok(exit_code(report.status()))
}
