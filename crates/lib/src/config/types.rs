//! Configuration tree types.
//!
//! The configuration tree is format independent: it is plain serde data and
//! can be loaded from JSON or YAML, or built in memory.
//!
//! # Example
//!
//! ```yaml
//! variables:
//!   DISTRO_RELEASE: { default: "43" }
//!   TAG: { default: "" }
//! groups:
//!   default: { targets: [runtime] }
//! targets:
//!   base:
//!     context: ./base
//!     tags: { image: base }
//!   runtime:
//!     matrix: { tgt: [shell, wayland] }
//!     name: "${tgt}-runtime"
//!     context: "./${tgt}"
//!     contexts: { base: "target:base" }
//!     tags: { image: "${tgt}-runtime" }
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::tags::TagFunction;
use crate::vars::VarDecl;

/// The complete configuration for one invocation.
///
/// All maps preserve declaration order; declaration order breaks ties when
/// scheduling jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BakeConfig {
  #[serde(default)]
  pub variables: IndexMap<String, VarDecl>,

  #[serde(default)]
  pub groups: IndexMap<String, Group>,

  #[serde(default)]
  pub targets: IndexMap<String, TargetSpec>,

  #[serde(default)]
  pub tag_function: TagFunction,
}

/// Named list of target (or group) names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
  #[serde(default)]
  pub targets: Vec<String>,
}

/// A templated target definition.
///
/// Every field is optional so that inheritance can tell "not set" apart from
/// "set to an empty value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
  /// Parent targets, applied in order before this target's own fields.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub inherits: Vec<String>,

  /// Job name template. Never inherited.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  #[serde(flatten)]
  pub fields: TargetFields,

  /// Keys matched by no other field. Rejected by validation, since
  /// `deny_unknown_fields` cannot be combined with `flatten`.
  #[serde(flatten)]
  pub unknown: BTreeMap<String, serde_json::Value>,
}

/// The inheritable fields of a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dockerfile: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,

  /// Auxiliary build contexts: alias to an external source or `target:<job>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contexts: Option<BTreeMap<String, String>>,

  /// Build stage inside the dockerfile.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tags: Option<TagsSpec>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub args: Option<BTreeMap<String, String>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub platforms: Option<Vec<String>>,

  /// Axis name to variant values.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub matrix: Option<IndexMap<String, Vec<String>>>,
}

/// How a target's tags are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsSpec {
  /// Explicit tag templates.
  List(Vec<String>),
  /// Tags computed by the tag function for an image base name template.
  Image { image: String },
}
