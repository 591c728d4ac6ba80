//! Target inheritance.
//!
//! A target's effective fields are computed by an ordered merge: each parent
//! (itself fully resolved) is applied in declaration order, then the target's
//! own fields. A field absent at every level stays absent.
//!
//! Scalars and lists are replaced wholesale by a later level. Maps (`contexts`,
//! `args`) are merged key by key, later keys winning.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::trace;

use crate::config::{TargetFields, TargetSpec};

use super::types::ResolveError;

impl TargetFields {
  /// Apply `other` on top of `self`.
  pub fn overlay(&mut self, other: &TargetFields) {
    overlay_value(&mut self.dockerfile, &other.dockerfile);
    overlay_value(&mut self.context, &other.context);
    overlay_map(&mut self.contexts, &other.contexts);
    overlay_value(&mut self.target, &other.target);
    overlay_value(&mut self.tags, &other.tags);
    overlay_map(&mut self.args, &other.args);
    overlay_value(&mut self.platforms, &other.platforms);
    overlay_value(&mut self.matrix, &other.matrix);
  }
}

fn overlay_value<T: Clone>(base: &mut Option<T>, top: &Option<T>) {
  if let Some(value) = top {
    *base = Some(value.clone());
  }
}

fn overlay_map(base: &mut Option<BTreeMap<String, String>>, top: &Option<BTreeMap<String, String>>) {
  if let Some(top) = top {
    let merged = base.get_or_insert_with(BTreeMap::new);
    for (key, value) in top {
      merged.insert(key.clone(), value.clone());
    }
  }
}

/// Resolve the effective fields of every target, in declaration order.
///
/// # Errors
///
/// Returns `UnknownTarget` for a parent that does not exist and
/// `CyclicInheritance` when a chain of parents loops back.
pub fn resolve_inheritance(
  targets: &IndexMap<String, TargetSpec>,
) -> Result<IndexMap<String, TargetFields>, ResolveError> {
  let mut resolver = InheritanceResolver {
    targets,
    resolved: IndexMap::new(),
    stack: Vec::new(),
  };

  for name in targets.keys() {
    resolver.resolve(name)?;
  }

  // Return in declaration order rather than resolution order.
  Ok(
    targets
      .keys()
      .filter_map(|name| resolver.resolved.swap_remove(name).map(|f| (name.clone(), f)))
      .collect(),
  )
}

struct InheritanceResolver<'a> {
  targets: &'a IndexMap<String, TargetSpec>,
  resolved: IndexMap<String, TargetFields>,
  stack: Vec<String>,
}

impl InheritanceResolver<'_> {
  fn resolve(&mut self, name: &str) -> Result<TargetFields, ResolveError> {
    if let Some(fields) = self.resolved.get(name) {
      return Ok(fields.clone());
    }

    if let Some(pos) = self.stack.iter().position(|n| n == name) {
      let mut chain = self.stack[pos..].to_vec();
      chain.push(name.to_string());
      return Err(ResolveError::CyclicInheritance { chain });
    }

    let targets = self.targets;
    let spec = targets.get(name).ok_or_else(|| ResolveError::UnknownTarget {
      name: name.to_string(),
      referenced_by: self.stack.last().cloned(),
    })?;

    self.stack.push(name.to_string());
    let mut fields = TargetFields::default();
    for parent in &spec.inherits {
      match self.resolve(parent) {
        Ok(parent_fields) => fields.overlay(&parent_fields),
        Err(e) => {
          self.stack.pop();
          return Err(e);
        }
      }
    }
    self.stack.pop();

    fields.overlay(&spec.fields);
    trace!(target = %name, parents = spec.inherits.len(), "resolved inheritance");

    self.resolved.insert(name.to_string(), fields.clone());
    Ok(fields)
  }
}
