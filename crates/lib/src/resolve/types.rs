//! Types for resolved build plans.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::tags::TagSet;
use crate::template::TemplateError;
use crate::vars::{VarEnv, VarError};

/// Position of a job in [`BuildPlan::jobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// A resolved auxiliary build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSource {
  /// The output of another job in the same plan.
  Job(JobId),
  /// Anything else (an image reference, a path, a URL), passed through as is.
  External(String),
}

/// A fully resolved, self-contained build job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
  pub name: String,
  /// The target this job was expanded from.
  pub target: String,
  /// Axis values of this job's matrix combination, in axis order.
  pub matrix: IndexMap<String, String>,
  pub dockerfile: String,
  pub context: String,
  pub contexts: BTreeMap<String, ContextSource>,
  /// Build stage inside the dockerfile.
  pub stage: Option<String>,
  pub tags: TagSet,
  pub args: BTreeMap<String, String>,
  pub platforms: Vec<String>,
  /// Jobs whose output this job consumes, ascending.
  pub depends_on: Vec<JobId>,
}

/// The outcome of resolution: jobs plus their execution batches.
#[derive(Debug, Clone)]
pub struct BuildPlan {
  pub jobs: Vec<ResolvedJob>,
  /// Batches in execution order. Jobs in one batch do not depend on each
  /// other; every dependency of a job sits in an earlier batch.
  pub batches: Vec<Vec<JobId>>,
  /// The variable snapshot the plan was resolved with.
  pub variables: VarEnv,
}

impl BuildPlan {
  pub fn job(&self, id: JobId) -> &ResolvedJob {
    &self.jobs[id.0]
  }

  pub fn find(&self, name: &str) -> Option<JobId> {
    self.jobs.iter().position(|j| j.name == name).map(JobId)
  }

  pub fn len(&self) -> usize {
    self.jobs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.jobs.is_empty()
  }

  /// Index of the batch containing `id`.
  pub fn batch_of(&self, id: JobId) -> Option<usize> {
    self.batches.iter().position(|batch| batch.contains(&id))
  }

  pub fn dependency_names(&self, id: JobId) -> Vec<&str> {
    self
      .job(id)
      .depends_on
      .iter()
      .map(|dep| self.job(*dep).name.as_str())
      .collect()
  }

  /// Hand-off record for one job.
  pub fn record(&self, id: JobId) -> JobRecord {
    let job = self.job(id);
    let contexts = job
      .contexts
      .iter()
      .map(|(alias, source)| {
        let source = match source {
          ContextSource::External(raw) => RecordContext::External { source: raw.clone() },
          ContextSource::Job(dep) => {
            let dep = self.job(*dep);
            RecordContext::Job {
              name: dep.name.clone(),
              image: dep.tags.first().map(str::to_string),
            }
          }
        };
        (alias.clone(), source)
      })
      .collect();

    JobRecord {
      name: job.name.clone(),
      batch: self.batch_of(id).unwrap_or_default(),
      dockerfile: job.dockerfile.clone(),
      context: job.context.clone(),
      contexts,
      stage: job.stage.clone(),
      tags: job.tags.as_slice().to_vec(),
      args: job.args.clone(),
      platforms: job.platforms.clone(),
      depends_on: self.dependency_names(id).into_iter().map(str::to_string).collect(),
    }
  }

  /// Hand-off records for every job, in batch order.
  pub fn records(&self) -> Vec<JobRecord> {
    self.batches.iter().flatten().map(|id| self.record(*id)).collect()
  }
}

/// What the build invoker receives for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
  pub name: String,
  pub batch: usize,
  pub dockerfile: String,
  pub context: String,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub contexts: BTreeMap<String, RecordContext>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
  pub tags: Vec<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub args: BTreeMap<String, String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub platforms: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
}

/// A concrete auxiliary context in a [`JobRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordContext {
  External {
    source: String,
  },
  /// Output of an earlier job, addressed by its first tag when it has one.
  Job {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
  },
}

/// Inputs to [`resolve`](super::resolve) besides the configuration tree.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
  /// Variable overrides, applied before resolution.
  pub overrides: BTreeMap<String, String>,
  /// Group, target or job names to plan. Empty means the default group.
  pub targets: Vec<String>,
  /// Pin the clock used by deferred variables. `None` reads the system time.
  pub now: Option<DateTime<Utc>>,
}

/// Errors that abort resolution. No partial plan is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Variable(#[from] VarError),

  #[error("undefined variable '{name}' in target '{target}'")]
  UndefinedVariable { name: String, target: String },

  #[error("template substitution failed in target '{target}' field '{field}': {source}")]
  TemplateSubstitution {
    target: String,
    field: String,
    #[source]
    source: TemplateError,
  },

  #[error("cyclic inheritance: {}", .chain.join(" -> "))]
  CyclicInheritance { chain: Vec<String> },

  #[error("unknown target '{name}'{}", referenced_by_suffix(.referenced_by))]
  UnknownTarget {
    name: String,
    referenced_by: Option<String>,
  },

  #[error("cyclic group: {}", .chain.join(" -> "))]
  CyclicGroup { chain: Vec<String> },

  #[error("matrix axis '{axis}' of target '{target}' has no values")]
  EmptyMatrixAxis { target: String, axis: String },

  #[error("duplicate job name '{name}' (from targets '{first}' and '{second}')")]
  DuplicateJobName {
    name: String,
    first: String,
    second: String,
  },

  #[error("job '{job}' context '{alias}' references unknown job: {reference}")]
  UnresolvedContextReference {
    job: String,
    alias: String,
    reference: String,
  },

  #[error("dependency cycle between jobs: {}", .jobs.join(", "))]
  DependencyCycle { jobs: Vec<String> },
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
  referenced_by
    .as_ref()
    .map(|r| format!(" (referenced by '{r}')"))
    .unwrap_or_default()
}
