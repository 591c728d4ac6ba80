//! Matrix expansion.
//!
//! A target with matrix axes expands into one job per combination of axis
//! values (the cartesian product, last axis varying fastest). Every templated
//! field is substituted with the combination's values; names that are not
//! axes fall back to variables.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::{TagsSpec, TargetFields};
use crate::tags::{TagFunction, TagSet};
use crate::template::{self, Resolver, TemplateError};
use crate::vars::VarEnv;

use super::types::ResolveError;

/// Dockerfile used when no level of the inheritance chain sets one.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Build context used when no level of the inheritance chain sets one.
pub const DEFAULT_CONTEXT: &str = ".";

/// A job before its auxiliary contexts are resolved into dependency edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSkeleton {
  pub name: String,
  pub target: String,
  pub matrix: IndexMap<String, String>,
  pub dockerfile: String,
  pub context: String,
  /// Alias to raw source, still possibly `target:<job>`.
  pub contexts: BTreeMap<String, String>,
  pub stage: Option<String>,
  pub tags: TagSet,
  pub args: BTreeMap<String, String>,
  pub platforms: Vec<String>,
}

/// Every combination of axis values, in axis declaration order.
///
/// No axes yields a single empty combination.
pub fn combinations(axes: &IndexMap<String, Vec<String>>) -> Vec<IndexMap<String, String>> {
  let mut combos = vec![IndexMap::new()];

  for (axis, values) in axes {
    let mut next = Vec::with_capacity(combos.len() * values.len());
    for combo in &combos {
      for value in values {
        let mut extended = combo.clone();
        extended.insert(axis.clone(), value.clone());
        next.push(extended);
      }
    }
    combos = next;
  }

  combos
}

/// Expand one target into job skeletons.
///
/// `name` is the target's own name template; without one, jobs are named
/// after the target, suffixed with the combination's values when a matrix is
/// present.
pub fn expand(
  target: &str,
  name: Option<&str>,
  fields: &TargetFields,
  env: &VarEnv,
  tag_fn: &TagFunction,
) -> Result<Vec<JobSkeleton>, ResolveError> {
  let axes = match &fields.matrix {
    Some(matrix) => expand_axes(target, matrix, env)?,
    None => IndexMap::new(),
  };

  let jobs = combinations(&axes)
    .into_iter()
    .map(|combo| expand_one(target, name, fields, env, tag_fn, combo))
    .collect::<Result<Vec<_>, _>>()?;

  debug!(target = %target, jobs = jobs.len(), "expanded target");
  Ok(jobs)
}

/// Substitute variables into axis values and reject empty axes.
fn expand_axes(
  target: &str,
  matrix: &IndexMap<String, Vec<String>>,
  env: &VarEnv,
) -> Result<IndexMap<String, Vec<String>>, ResolveError> {
  let no_axes = IndexMap::new();
  let mut axes = IndexMap::new();

  for (axis, values) in matrix {
    if !template::is_valid_name(axis) {
      return Err(ResolveError::TemplateSubstitution {
        target: target.to_string(),
        field: "matrix".to_string(),
        source: TemplateError::InvalidName(axis.clone()),
      });
    }
    if values.is_empty() {
      return Err(ResolveError::EmptyMatrixAxis {
        target: target.to_string(),
        axis: axis.clone(),
      });
    }

    let field = format!("matrix.{axis}");
    let scope = Scope::new(target, &field, &no_axes, env);
    let values = values
      .iter()
      .map(|v| scope.substitute(v))
      .collect::<Result<Vec<_>, _>>()?;
    axes.insert(axis.clone(), values);
  }

  Ok(axes)
}

fn expand_one(
  target: &str,
  name: Option<&str>,
  fields: &TargetFields,
  env: &VarEnv,
  tag_fn: &TagFunction,
  combo: IndexMap<String, String>,
) -> Result<JobSkeleton, ResolveError> {
  let scope = |field: &str| Scope::new(target, field, &combo, env);
  let subst = |field: &str, raw: &str| Scope::new(target, field, &combo, env).substitute(raw);

  let job_name = match name {
    Some(raw) => subst("name", raw)?,
    None => default_name(target, &combo),
  };

  let dockerfile = match &fields.dockerfile {
    Some(raw) => subst("dockerfile", raw)?,
    None => DEFAULT_DOCKERFILE.to_string(),
  };

  let context = match &fields.context {
    Some(raw) => subst("context", raw)?,
    None => DEFAULT_CONTEXT.to_string(),
  };

  let contexts = substitute_map(fields.contexts.as_ref(), "contexts", &scope)?;
  let args = substitute_map(fields.args.as_ref(), "args", &scope)?;

  let stage = fields.target.as_deref().map(|raw| subst("target", raw)).transpose()?;

  let tags = match &fields.tags {
    None => TagSet::new(),
    Some(TagsSpec::List(list)) => list
      .iter()
      .map(|raw| subst("tags", raw))
      .collect::<Result<TagSet, _>>()?,
    Some(TagsSpec::Image { image }) => tag_fn.tags(&subst("tags.image", image)?, env),
  };

  let platforms = fields
    .platforms
    .iter()
    .flatten()
    .map(|raw| subst("platforms", raw))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(JobSkeleton {
    name: job_name,
    target: target.to_string(),
    matrix: combo.clone(),
    dockerfile,
    context,
    contexts,
    stage,
    tags,
    args,
    platforms,
  })
}

fn substitute_map<'a>(
  map: Option<&BTreeMap<String, String>>,
  field: &str,
  scope: &impl Fn(&str) -> Scope<'a>,
) -> Result<BTreeMap<String, String>, ResolveError> {
  let mut out = BTreeMap::new();
  for (key, raw) in map.into_iter().flatten() {
    let value = scope(&format!("{field}.{key}")).substitute(raw)?;
    out.insert(key.clone(), value);
  }
  Ok(out)
}

/// `<target>-<v1>-<v2>...`, with characters outside `[A-Za-z0-9_-]` replaced.
fn default_name(target: &str, combo: &IndexMap<String, String>) -> String {
  let mut name = target.to_string();
  for value in combo.values() {
    name.push('-');
    name.extend(value.chars().map(|c| {
      if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    }));
  }
  name
}

/// Substitution context for one field of one matrix combination.
struct Scope<'a> {
  target: &'a str,
  field: String,
  combo: &'a IndexMap<String, String>,
  env: &'a VarEnv,
}

/// Substitution failure before target/field context is attached.
enum ScopeError {
  Template(TemplateError),
  UndefinedVariable(String),
}

impl From<TemplateError> for ScopeError {
  fn from(e: TemplateError) -> Self {
    ScopeError::Template(e)
  }
}

impl<'a> Scope<'a> {
  fn new(target: &'a str, field: &str, combo: &'a IndexMap<String, String>, env: &'a VarEnv) -> Self {
    Self {
      target,
      field: field.to_string(),
      combo,
      env,
    }
  }

  fn substitute(&self, raw: &str) -> Result<String, ResolveError> {
    template::substitute(raw, self).map_err(|e| match e {
      ScopeError::Template(source) => ResolveError::TemplateSubstitution {
        target: self.target.to_string(),
        field: self.field.clone(),
        source,
      },
      ScopeError::UndefinedVariable(name) => ResolveError::UndefinedVariable {
        name,
        target: self.target.to_string(),
      },
    })
  }
}

impl Resolver for Scope<'_> {
  type Error = ScopeError;

  fn resolve(&self, name: &str) -> Result<&str, ScopeError> {
    if let Some(value) = self.combo.get(name) {
      return Ok(value.as_str());
    }
    if self.env.is_declared(name) {
      return self
        .env
        .get(name)
        .ok_or_else(|| ScopeError::UndefinedVariable(name.to_string()));
    }
    Err(ScopeError::Template(TemplateError::Unresolved(name.to_string())))
  }
}
