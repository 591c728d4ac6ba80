//! Types for plan execution.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors a build invoker can report for one job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
  /// The build ran and failed.
  #[error("build command failed with exit code {code:?}: {cmd}")]
  Failed { cmd: String, code: Option<i32> },

  /// The build was interrupted by cancellation.
  #[error("build cancelled")]
  Cancelled,

  /// The build could not be started.
  #[error("io error: {0}")]
  Io(String),

  /// The invoker cannot express this job.
  #[error("unsupported job: {0}")]
  Unsupported(String),
}

impl From<std::io::Error> for InvokeError {
  fn from(e: std::io::Error) -> Self {
    InvokeError::Io(e.to_string())
  }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
  Succeeded,
  Failed {
    error: String,
  },
  /// Not run because a dependency failed (directly or transitively).
  Skipped {
    failed_dependency: String,
  },
  /// Not run because the run halted after a failed batch, or because a
  /// dependency was not run.
  NotStarted,
  Cancelled,
}

impl JobStatus {
  pub fn is_success(&self) -> bool {
    matches!(self, JobStatus::Succeeded)
  }

  fn severity(&self) -> RunStatus {
    match self {
      JobStatus::Succeeded => RunStatus::Succeeded,
      JobStatus::Skipped { .. } | JobStatus::NotStarted => RunStatus::Skipped,
      JobStatus::Cancelled => RunStatus::Cancelled,
      JobStatus::Failed { .. } => RunStatus::Failed,
    }
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      JobStatus::Succeeded => write!(f, "succeeded"),
      JobStatus::Failed { error } => write!(f, "failed: {error}"),
      JobStatus::Skipped { failed_dependency } => write!(f, "skipped (dependency {failed_dependency} failed)"),
      JobStatus::NotStarted => write!(f, "not started"),
      JobStatus::Cancelled => write!(f, "cancelled"),
    }
  }
}

/// Overall outcome of a run: the worst job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Succeeded,
  Skipped,
  Cancelled,
  Failed,
}

/// Result of one job in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
  pub name: String,
  pub batch: usize,
  #[serde(flatten)]
  pub status: JobStatus,
  /// Wall time of the invocation, when the job was started.
  #[serde(skip_serializing_if = "Option::is_none", with = "duration_secs")]
  pub duration: Option<Duration>,
}

/// Result of executing a whole plan.
///
/// Jobs appear in plan order, one entry per job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
  pub jobs: Vec<JobOutcome>,
}

impl RunReport {
  pub fn status(&self) -> RunStatus {
    self
      .jobs
      .iter()
      .map(|j| j.status.severity())
      .max()
      .unwrap_or(RunStatus::Succeeded)
  }

  pub fn is_success(&self) -> bool {
    self.status() == RunStatus::Succeeded
  }

  pub fn get(&self, name: &str) -> Option<&JobOutcome> {
    self.jobs.iter().find(|j| j.name == name)
  }

  pub fn succeeded(&self) -> usize {
    self.count(JobStatus::is_success)
  }

  pub fn failed(&self) -> usize {
    self.count(|s| matches!(s, JobStatus::Failed { .. }))
  }

  /// Skipped and not started jobs.
  pub fn skipped(&self) -> usize {
    self.count(|s| matches!(s, JobStatus::Skipped { .. } | JobStatus::NotStarted))
  }

  pub fn cancelled(&self) -> usize {
    self.count(|s| matches!(s, JobStatus::Cancelled))
  }

  fn count(&self, pred: impl Fn(&JobStatus) -> bool) -> usize {
    self.jobs.iter().filter(|j| pred(&j.status)).count()
  }
}

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of jobs to run at once within a batch.
  pub parallelism: usize,

  /// Keep starting later batches after a failure. Jobs depending on a
  /// failed job are still skipped.
  pub keep_going: bool,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      keep_going: false,
    }
  }
}

fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

mod duration_secs {
  use std::time::Duration;

  use serde::Serializer;

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => serializer.serialize_f64(d.as_secs_f64()),
      None => serializer.serialize_none(),
    }
  }
}
