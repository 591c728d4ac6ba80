//! Choosing which jobs a run builds.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::Group;

use super::types::{JobId, ResolveError};

/// Group used when no names are requested.
pub const DEFAULT_GROUP: &str = "default";

/// Lookup tables for name selection.
pub struct Selector<'a> {
  pub groups: &'a IndexMap<String, Group>,
  /// Target name to the jobs it expanded into.
  pub targets: &'a IndexMap<String, Vec<JobId>>,
  /// Job names, indexed by job id.
  pub jobs: &'a [String],
}

impl Selector<'_> {
  /// Jobs named by `requested`, without dependencies.
  ///
  /// Each name is looked up as a group, then as a target, then as a job.
  pub fn roots(&self, requested: &[String]) -> Result<BTreeSet<JobId>, ResolveError> {
    let mut selected = BTreeSet::new();
    let mut stack = Vec::new();

    if requested.is_empty() {
      if self.groups.contains_key(DEFAULT_GROUP) {
        debug!(group = DEFAULT_GROUP, "selecting default group");
        self.select(DEFAULT_GROUP, None, &mut stack, &mut selected)?;
      } else {
        debug!("no default group, selecting every target");
        selected.extend(self.targets.values().flatten().copied());
      }
      return Ok(selected);
    }

    for name in requested {
      self.select(name, None, &mut stack, &mut selected)?;
    }
    Ok(selected)
  }

  fn select(
    &self,
    name: &str,
    referenced_by: Option<&str>,
    stack: &mut Vec<String>,
    selected: &mut BTreeSet<JobId>,
  ) -> Result<(), ResolveError> {
    if let Some(group) = self.groups.get(name) {
      if let Some(pos) = stack.iter().position(|n| n == name) {
        let mut chain = stack[pos..].to_vec();
        chain.push(name.to_string());
        return Err(ResolveError::CyclicGroup { chain });
      }

      stack.push(name.to_string());
      for member in &group.targets {
        if let Err(e) = self.select(member, Some(name), stack, selected) {
          stack.pop();
          return Err(e);
        }
      }
      stack.pop();
      return Ok(());
    }

    if let Some(jobs) = self.targets.get(name) {
      selected.extend(jobs.iter().copied());
      return Ok(());
    }

    if let Some(pos) = self.jobs.iter().position(|job| job == name) {
      selected.insert(JobId(pos));
      return Ok(());
    }

    Err(ResolveError::UnknownTarget {
      name: name.to_string(),
      referenced_by: referenced_by.map(str::to_string),
    })
  }
}

/// `roots` plus everything they transitively depend on.
pub fn dependency_closure<'a>(
  roots: &BTreeSet<JobId>,
  depends_on: impl Fn(JobId) -> &'a [JobId],
) -> BTreeSet<JobId> {
  let mut closure = roots.clone();
  let mut pending: Vec<JobId> = roots.iter().copied().collect();

  while let Some(id) = pending.pop() {
    for dep in depends_on(id) {
      if closure.insert(*dep) {
        pending.push(*dep);
      }
    }
  }

  closure
}
