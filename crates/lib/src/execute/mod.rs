//! Plan execution.
//!
//! This module runs a [`BuildPlan`] through a [`BuildInvoker`]. It handles:
//! - Batch ordering (a batch starts only after the previous one finished)
//! - Bounded parallelism within a batch
//! - Skipping jobs whose dependencies failed
//! - Cancellation

pub mod docker;
pub mod invoker;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::resolve::{BuildPlan, JobId};

pub use docker::DockerInvoker;
pub use invoker::{BuildInvoker, DryRunInvoker};
pub use types::{ExecuteConfig, InvokeError, JobOutcome, JobStatus, RunReport, RunStatus};

/// Execute every job of a plan, batch by batch.
///
/// A job whose dependency did not succeed is skipped and never handed to
/// the invoker. Without `keep_going`, the batch in which a job fails is
/// allowed to finish and no later batch is started. Once `cancel` fires, no
/// further job starts and running jobs receive a child token.
pub async fn execute_plan(
  plan: &BuildPlan,
  invoker: Arc<dyn BuildInvoker>,
  config: &ExecuteConfig,
  cancel: CancellationToken,
) -> RunReport {
  info!(
    jobs = plan.len(),
    batches = plan.batches.len(),
    parallelism = config.parallelism,
    "starting build execution"
  );

  let mut statuses: Vec<Option<JobStatus>> = vec![None; plan.len()];
  let mut durations = vec![None; plan.len()];
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let mut halted = false;

  for (batch_idx, batch) in plan.batches.iter().enumerate() {
    if cancel.is_cancelled() {
      warn!(batch = batch_idx, "run cancelled, not starting batch");
      for id in batch {
        statuses[id.0] = Some(JobStatus::Cancelled);
      }
      continue;
    }

    let mut ready = Vec::new();
    for &id in batch {
      match blocked_by(plan, &statuses, id) {
        Some(Blocked::Failed(failed)) => {
          warn!(
            job = %plan.job(id).name,
            failed_dep = %failed,
            "skipping job due to failed dependency"
          );
          statuses[id.0] = Some(JobStatus::Skipped {
            failed_dependency: failed,
          });
        }
        Some(Blocked::NotStarted) => statuses[id.0] = Some(JobStatus::NotStarted),
        None if halted => statuses[id.0] = Some(JobStatus::NotStarted),
        None => ready.push(id),
      }
    }

    if ready.is_empty() {
      continue;
    }

    debug!(batch = batch_idx, jobs = ready.len(), "executing batch");
    for (id, status, duration) in execute_batch(plan, &ready, &invoker, semaphore.clone(), &cancel).await {
      let name = &plan.job(id).name;
      match &status {
        JobStatus::Succeeded => info!(job = %name, "build succeeded"),
        JobStatus::Failed { error } => error!(job = %name, error = %error, "build failed"),
        JobStatus::Cancelled => warn!(job = %name, "build cancelled"),
        JobStatus::Skipped { .. } | JobStatus::NotStarted => {}
      }
      statuses[id.0] = Some(status);
      durations[id.0] = duration;
    }

    let batch_failed = ready
      .iter()
      .any(|id| matches!(statuses[id.0], Some(JobStatus::Failed { .. })));
    if batch_failed && !config.keep_going && !halted {
      warn!(batch = batch_idx, "build failed, not starting later batches");
      halted = true;
    }
  }

  let jobs = plan
    .jobs
    .iter()
    .enumerate()
    .map(|(i, job)| JobOutcome {
      name: job.name.clone(),
      batch: plan.batch_of(JobId(i)).unwrap_or_default(),
      status: statuses[i].take().unwrap_or(JobStatus::NotStarted),
      duration: durations[i],
    })
    .collect();
  let report = RunReport { jobs };

  info!(
    succeeded = report.succeeded(),
    failed = report.failed(),
    skipped = report.skipped(),
    cancelled = report.cancelled(),
    "build execution complete"
  );
  report
}

/// Why a job cannot run.
enum Blocked {
  /// A dependency failed, named by the job that originally failed.
  Failed(String),
  /// A dependency was never started.
  NotStarted,
}

/// The reason `id` cannot run, if any. A failed dependency takes precedence
/// over one that was never started.
fn blocked_by(plan: &BuildPlan, statuses: &[Option<JobStatus>], id: JobId) -> Option<Blocked> {
  let mut not_started = false;
  for dep in &plan.job(id).depends_on {
    match &statuses[dep.0] {
      Some(JobStatus::Succeeded) => {}
      Some(JobStatus::Skipped { failed_dependency }) => return Some(Blocked::Failed(failed_dependency.clone())),
      Some(JobStatus::Failed { .. } | JobStatus::Cancelled) => return Some(Blocked::Failed(plan.job(*dep).name.clone())),
      // Dependencies always sit in an earlier batch, so a missing status
      // means the dependency was never started.
      Some(JobStatus::NotStarted) | None => not_started = true,
    }
  }
  not_started.then_some(Blocked::NotStarted)
}

type BatchResult = (JobId, JobStatus, Option<std::time::Duration>);

/// Run one batch of jobs in parallel.
async fn execute_batch(
  plan: &BuildPlan,
  ready: &[JobId],
  invoker: &Arc<dyn BuildInvoker>,
  semaphore: Arc<Semaphore>,
  cancel: &CancellationToken,
) -> Vec<BatchResult> {
  let mut join_set = JoinSet::new();
  let mut tasks = HashMap::new();

  for &id in ready {
    let record = plan.record(id);
    let invoker = invoker.clone();
    let semaphore = semaphore.clone();
    let cancel = cancel.clone();

    let handle = join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire().await else {
        return (id, JobStatus::Cancelled, None);
      };
      if cancel.is_cancelled() {
        return (id, JobStatus::Cancelled, None);
      }

      debug!(job = %record.name, "invoking build");
      let started = Instant::now();
      let status = match invoker.invoke(&record, cancel.child_token()).await {
        Ok(()) => JobStatus::Succeeded,
        Err(InvokeError::Cancelled) => JobStatus::Cancelled,
        Err(e) => JobStatus::Failed { error: e.to_string() },
      };
      (id, status, Some(started.elapsed()))
    });
    tasks.insert(handle.id(), id);
  }

  let mut results = Vec::with_capacity(ready.len());
  while let Some(joined) = join_set.join_next_with_id().await {
    match joined {
      Ok((_, result)) => results.push(result),
      Err(e) => {
        error!(error = %e, "build task panicked");
        if let Some(&id) = tasks.get(&e.id()) {
          results.push((
            id,
            JobStatus::Failed {
              error: format!("build task panicked: {e}"),
            },
            None,
          ));
        }
      }
    }
  }

  results
}
