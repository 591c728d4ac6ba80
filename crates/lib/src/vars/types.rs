//! Types for variable declarations and resolution.

use std::cell::OnceCell;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::TemplateError;

/// Default strftime format for `timestamp` defaults (e.g. `20250101`).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d";

/// A declared variable.
///
/// A variable without a default is *unset* unless an override provides a
/// value. Referencing an unset variable is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<VarDefault>,
}

impl VarDecl {
  pub fn value(default: &str) -> Self {
    Self {
      default: Some(VarDefault::Value(default.to_string())),
    }
  }

  pub fn timestamp(format: &str) -> Self {
    Self {
      default: Some(VarDefault::Deferred(DeferredExpr::Timestamp {
        format: format.to_string(),
      })),
    }
  }

  pub fn unset() -> Self {
    Self::default()
  }
}

/// The default of a variable.
///
/// ```yaml
/// DISTRO_RELEASE:
///   default: "43"
/// STAMP:
///   default: { fn: timestamp, format: "%Y%m%d" }
/// TAG:
///   default: "${DISTRO_RELEASE}.${STAMP}"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarDefault {
  /// A string, possibly interpolating other variables.
  Value(String),
  /// An expression evaluated once per run.
  Deferred(DeferredExpr),
}

/// Expressions whose value is computed at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum DeferredExpr {
  /// The run's clock reading rendered with a strftime format (UTC).
  Timestamp {
    #[serde(default = "default_timestamp_format")]
    format: String,
  },
}

fn default_timestamp_format() -> String {
  DEFAULT_TIMESTAMP_FORMAT.to_string()
}

/// Clock shared by every deferred expression of one resolution run.
///
/// The time is read at most once, on first use, so all jobs of a run see the
/// same date-based values.
#[derive(Debug, Default)]
pub struct RunClock {
  fixed: Option<DateTime<Utc>>,
  reading: OnceCell<DateTime<Utc>>,
}

impl RunClock {
  /// A clock that reads the system time on first use.
  pub fn system() -> Self {
    Self::default()
  }

  /// A clock pinned to the given instant.
  pub fn fixed(at: DateTime<Utc>) -> Self {
    Self {
      fixed: Some(at),
      reading: OnceCell::new(),
    }
  }

  pub fn now(&self) -> DateTime<Utc> {
    *self.reading.get_or_init(|| self.fixed.unwrap_or_else(Utc::now))
  }

  /// Whether the clock has been read yet.
  pub fn was_read(&self) -> bool {
    self.reading.get().is_some()
  }
}

/// Errors that can occur while resolving variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarError {
  #[error("undefined variable '{name}'{}", referenced_by_suffix(.referenced_by))]
  UndefinedVariable {
    name: String,
    referenced_by: Option<String>,
  },

  #[error("cyclic variable reference: {}", .chain.join(" -> "))]
  CyclicVariable { chain: Vec<String> },

  #[error("invalid default for variable '{variable}': {source}")]
  Template {
    variable: String,
    #[source]
    source: TemplateError,
  },

  #[error("invalid timestamp format '{format}' for variable '{variable}'")]
  InvalidTimestampFormat { variable: String, format: String },
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
  referenced_by
    .as_ref()
    .map(|r| format!(" (referenced by '{r}')"))
    .unwrap_or_default()
}
