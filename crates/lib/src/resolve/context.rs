//! Context graph resolution.
//!
//! An auxiliary context whose source is `target:<job>` refers to the output
//! of another job in the same run and becomes a dependency edge. Every other
//! source is passed through untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use super::matrix::JobSkeleton;
use super::types::{ContextSource, JobId, ResolveError};

/// Prefix marking a context source as a reference to another job.
pub const TARGET_PREFIX: &str = "target:";

/// A parsed context source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRef<'a> {
  Job(&'a str),
  External(&'a str),
}

impl<'a> ContextRef<'a> {
  pub fn parse(raw: &'a str) -> Self {
    match raw.strip_prefix(TARGET_PREFIX) {
      Some(job) => ContextRef::Job(job),
      None => ContextRef::External(raw),
    }
  }
}

/// Resolved contexts and dependencies of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobLinks {
  pub contexts: BTreeMap<String, ContextSource>,
  /// Ascending, without duplicates.
  pub depends_on: Vec<JobId>,
}

/// Resolve every job's contexts against the names of all jobs.
///
/// The result is parallel to `jobs`: entry `i` holds the links of job `i`.
///
/// # Errors
///
/// Returns `UnresolvedContextReference` when a `target:` reference names no
/// job (including an empty name).
pub fn resolve_contexts(jobs: &[JobSkeleton]) -> Result<Vec<JobLinks>, ResolveError> {
  let by_name: HashMap<&str, JobId> = jobs
    .iter()
    .enumerate()
    .map(|(i, job)| (job.name.as_str(), JobId(i)))
    .collect();

  jobs
    .iter()
    .map(|job| {
      let mut links = JobLinks::default();
      let mut deps = BTreeSet::new();

      for (alias, raw) in &job.contexts {
        let source = match ContextRef::parse(raw) {
          ContextRef::External(source) => ContextSource::External(source.to_string()),
          ContextRef::Job(name) => {
            let id = by_name
              .get(name)
              .copied()
              .ok_or_else(|| ResolveError::UnresolvedContextReference {
                job: job.name.clone(),
                alias: alias.clone(),
                reference: name.to_string(),
              })?;
            trace!(job = %job.name, alias = %alias, dependency = %name, "context dependency");
            deps.insert(id);
            ContextSource::Job(id)
          }
        };
        links.contexts.insert(alias.clone(), source);
      }

      links.depends_on = deps.into_iter().collect();
      Ok(links)
    })
    .collect()
}
