//! Variable environment.
//!
//! Variables are declared once in the configuration tree, optionally with a
//! default. The environment resolves every declaration into an immutable
//! snapshot before any target is expanded:
//!
//! 1. An override (conventionally from the process environment) wins.
//! 2. Otherwise a string default is interpolated against other variables.
//! 3. Otherwise a deferred default (`timestamp`) is evaluated against the
//!    run's [`RunClock`].
//! 4. Otherwise the variable stays unset.
//!
//! Deferred values are computed exactly once and shared by every target.

pub mod types;

use std::collections::BTreeMap;

use chrono::format::{Item, StrftimeItems};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::template::{self, Segment};

pub use types::{DEFAULT_TIMESTAMP_FORMAT, DeferredExpr, RunClock, VarDecl, VarDefault, VarError};

/// Variable name to its resolved value, `None` when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarEnv {
  values: IndexMap<String, Option<String>>,
}

impl VarEnv {
  /// Resolve declarations into a snapshot.
  ///
  /// # Errors
  ///
  /// Fails if a default references an undeclared or unset variable, if
  /// defaults reference each other cyclically, or if a default is malformed.
  pub fn resolve(
    decls: &IndexMap<String, VarDecl>,
    overrides: &BTreeMap<String, String>,
    clock: &RunClock,
  ) -> Result<Self, VarError> {
    for name in overrides.keys() {
      if !decls.contains_key(name) {
        debug!(variable = %name, "ignoring override for undeclared variable");
      }
    }

    let mut state = ResolveState {
      decls,
      overrides,
      clock,
      resolved: IndexMap::new(),
      stack: Vec::new(),
    };

    for name in decls.keys() {
      state.resolve(name)?;
    }

    // Keep declaration order regardless of the order values were resolved in.
    let values = decls
      .keys()
      .map(|name| (name.clone(), state.resolved.get(name).cloned().flatten()))
      .collect();

    let env = Self { values };
    debug!(variables = env.values.len(), "resolved variable environment");
    Ok(env)
  }

  /// Build an environment from already-resolved values.
  pub fn from_values<I, K, V>(values: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      values: values.into_iter().map(|(k, v)| (k.into(), Some(v.into()))).collect(),
    }
  }

  /// Value of a declared, set variable.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.values.get(name).and_then(|v| v.as_deref())
  }

  pub fn is_declared(&self, name: &str) -> bool {
    self.values.contains_key(name)
  }

  /// Iterate variables in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
  }

  /// Set variables as a plain map, omitting unset ones.
  pub fn to_map(&self) -> BTreeMap<String, String> {
    self
      .values
      .iter()
      .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
      .collect()
  }
}

/// Collect overrides for declared variables from the process environment.
pub fn env_overrides(decls: &IndexMap<String, VarDecl>) -> BTreeMap<String, String> {
  decls
    .keys()
    .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
    .inspect(|(name, _)| trace!(variable = %name, "override from environment"))
    .collect()
}

struct ResolveState<'a> {
  decls: &'a IndexMap<String, VarDecl>,
  overrides: &'a BTreeMap<String, String>,
  clock: &'a RunClock,
  resolved: IndexMap<String, Option<String>>,
  stack: Vec<String>,
}

impl ResolveState<'_> {
  fn resolve(&mut self, name: &str) -> Result<Option<String>, VarError> {
    if let Some(value) = self.resolved.get(name) {
      return Ok(value.clone());
    }

    if let Some(pos) = self.stack.iter().position(|n| n == name) {
      let mut chain = self.stack[pos..].to_vec();
      chain.push(name.to_string());
      return Err(VarError::CyclicVariable { chain });
    }

    let value = if let Some(value) = self.overrides.get(name) {
      Some(value.clone())
    } else {
      let decls = self.decls;
      match &decls[name].default {
        None => None,
        Some(VarDefault::Value(raw)) => {
          self.stack.push(name.to_string());
          let result = self.interpolate(name, raw);
          self.stack.pop();
          Some(result?)
        }
        Some(VarDefault::Deferred(expr)) => Some(self.evaluate(name, expr)?),
      }
    };

    self.resolved.insert(name.to_string(), value.clone());
    Ok(value)
  }

  fn interpolate(&mut self, variable: &str, raw: &str) -> Result<String, VarError> {
    let segments = template::parse(raw).map_err(|source| VarError::Template {
      variable: variable.to_string(),
      source,
    })?;

    let mut out = String::new();
    for segment in segments {
      match segment {
        Segment::Literal(s) => out.push_str(&s),
        Segment::Placeholder(dep) => {
          let undefined = || VarError::UndefinedVariable {
            name: dep.clone(),
            referenced_by: Some(variable.to_string()),
          };
          if !self.decls.contains_key(&dep) {
            return Err(undefined());
          }
          let value = self.resolve(&dep)?.ok_or_else(undefined)?;
          out.push_str(&value);
        }
      }
    }
    Ok(out)
  }

  fn evaluate(&self, variable: &str, expr: &DeferredExpr) -> Result<String, VarError> {
    match expr {
      DeferredExpr::Timestamp { format } => {
        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
          return Err(VarError::InvalidTimestampFormat {
            variable: variable.to_string(),
            format: format.clone(),
          });
        }
        Ok(self.clock.now().format_with_items(items.into_iter()).to_string())
      }
    }
  }
}
