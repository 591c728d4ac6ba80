use std::collections::BTreeMap;
use std::path::PathBuf;

use bakery_lib::config::{BakeConfig, load_config};
use bakery_lib::resolve::{BuildPlan, ResolveOptions};
use chrono::{TimeZone, Utc};

/// Path of a file under `tests/library/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests/library/fixtures")
    .join(name)
}

pub fn stack_config() -> BakeConfig {
  load_config(&fixture("stack.yaml")).unwrap()
}

/// Options with the clock pinned to 2025-01-01.
pub fn options(targets: &[&str], overrides: &[(&str, &str)]) -> ResolveOptions {
  ResolveOptions {
    overrides: overrides
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect::<BTreeMap<_, _>>(),
    targets: targets.iter().map(|s| s.to_string()).collect(),
    now: Some(Utc.with_ymd_and_hms(2025, 1, 1, 8, 30, 0).unwrap()),
  }
}

pub fn batch_names(plan: &BuildPlan) -> Vec<Vec<String>> {
  plan
    .batches
    .iter()
    .map(|batch| batch.iter().map(|id| plan.job(*id).name.clone()).collect())
    .collect()
}
