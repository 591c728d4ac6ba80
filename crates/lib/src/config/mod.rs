//! Loading and validating the configuration tree.

pub mod types;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub use types::{BakeConfig, Group, TagsSpec, TargetFields, TargetSpec};

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path} as JSON: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to parse {path} as YAML: {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid {kind} name '{name}': {reason}")]
  InvalidName {
    kind: &'static str,
    name: String,
    reason: &'static str,
  },

  #[error("'{name}' is declared both as a group and as a target")]
  AmbiguousName { name: String },

  #[error("unknown field '{field}' in target '{target}'")]
  UnknownTargetField { target: String, field: String },
}

/// Supported serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Json,
  Yaml,
}

impl Format {
  /// Guess the format from a file extension. Anything other than `.json` is
  /// read as YAML, which also accepts most JSON.
  pub fn from_path(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
      _ => Format::Yaml,
    }
  }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<BakeConfig, ConfigError> {
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;

  let format = Format::from_path(path);
  debug!(path = %path.display(), ?format, "parsing configuration");

  let config = parse_config(&content, format, path)?;
  info!(
    path = %path.display(),
    targets = config.targets.len(),
    groups = config.groups.len(),
    variables = config.variables.len(),
    "loaded configuration"
  );
  Ok(config)
}

/// Parse and validate configuration text. `origin` is only used in errors.
pub fn parse_config(content: &str, format: Format, origin: &Path) -> Result<BakeConfig, ConfigError> {
  let config: BakeConfig = match format {
    Format::Json => serde_json::from_str(content).map_err(|source| ConfigError::Json {
      path: origin.to_path_buf(),
      source,
    })?,
    Format::Yaml => serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
      path: origin.to_path_buf(),
      source,
    })?,
  };

  validate(&config)?;
  Ok(config)
}

/// Check names that the resolver relies on.
pub fn validate(config: &BakeConfig) -> Result<(), ConfigError> {
  for (name, spec) in &config.targets {
    check_name("target", name)?;
    if config.groups.contains_key(name) {
      return Err(ConfigError::AmbiguousName { name: name.clone() });
    }
    if let Some(field) = spec.unknown.keys().next() {
      return Err(ConfigError::UnknownTargetField {
        target: name.clone(),
        field: field.clone(),
      });
    }
  }
  for name in config.groups.keys() {
    check_name("group", name)?;
  }
  Ok(())
}

fn check_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
  let reason = if name.is_empty() {
    "must not be empty"
  } else if name.contains(':') {
    "must not contain ':'"
  } else {
    return Ok(());
  };

  Err(ConfigError::InvalidName {
    kind,
    name: name.to_string(),
    reason,
  })
}
