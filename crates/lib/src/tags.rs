//! Image tag generation.
//!
//! Every image gets a `latest` tag. When the release variable (by default
//! `TAG`) resolves to a non-empty value, the image is also tagged with it.

use serde::{Deserialize, Serialize};

use crate::vars::VarEnv;

/// Name of the variable carrying the release tag unless configured otherwise.
pub const DEFAULT_RELEASE_VARIABLE: &str = "TAG";

/// Ordered set of tags.
///
/// Insertion order is kept. Duplicates, empty strings and references with an
/// empty tag part (`base:`) are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a tag, returning whether it was added.
  pub fn insert(&mut self, tag: impl Into<String>) -> bool {
    let tag = tag.into();
    if tag.is_empty() || tag.ends_with(':') || self.0.contains(&tag) {
      return false;
    }
    self.0.push(tag);
    true
  }

  pub fn first(&self) -> Option<&str> {
    self.0.first().map(|s| s.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(|s| s.as_str())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_slice(&self) -> &[String] {
    &self.0
  }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let mut set = TagSet::new();
    for tag in iter {
      set.insert(tag);
    }
    set
  }
}

/// Maps an image base name to its tags using the variable environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFunction {
  #[serde(default = "default_release_variable")]
  pub release_variable: String,
}

fn default_release_variable() -> String {
  DEFAULT_RELEASE_VARIABLE.to_string()
}

impl Default for TagFunction {
  fn default() -> Self {
    Self {
      release_variable: default_release_variable(),
    }
  }
}

impl TagFunction {
  pub fn new(release_variable: &str) -> Self {
    Self {
      release_variable: release_variable.to_string(),
    }
  }

  /// Tags for `image`: `<image>:latest`, then `<image>:<release>` when the
  /// release variable is set and non-empty.
  ///
  /// An undeclared or unset release variable counts as empty.
  pub fn tags(&self, image: &str, env: &VarEnv) -> TagSet {
    let mut tags = TagSet::new();
    if image.is_empty() {
      return tags;
    }

    tags.insert(format!("{image}:latest"));

    if let Some(release) = env.get(&self.release_variable)
      && !release.is_empty()
    {
      tags.insert(format!("{image}:{release}"));
    }

    tags
  }
}
