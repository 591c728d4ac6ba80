//! Resolution of a configuration tree into a build plan.
//!
//! The pipeline runs in a fixed order and never yields a partial plan:
//!
//! 1. Resolve the variable environment (deferred values evaluated once).
//! 2. Resolve inheritance for every target.
//! 3. Expand matrices and substitute templates into job skeletons.
//! 4. Resolve `target:` contexts into dependency edges.
//! 5. Validate the whole job graph, then select the requested jobs and their
//!    dependencies.
//! 6. Schedule the selection into batches.

pub mod context;
pub mod inherit;
pub mod matrix;
pub mod select;
pub mod types;

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::BakeConfig;
use crate::schedule::JobDag;
use crate::vars::{RunClock, VarEnv};

pub use context::{ContextRef, JobLinks, TARGET_PREFIX, resolve_contexts};
pub use inherit::resolve_inheritance;
pub use matrix::{DEFAULT_CONTEXT, DEFAULT_DOCKERFILE, JobSkeleton, combinations, expand};
pub use select::{DEFAULT_GROUP, Selector, dependency_closure};
pub use types::{
  BuildPlan, ContextSource, JobId, JobRecord, RecordContext, ResolveError, ResolveOptions, ResolvedJob,
};

/// Resolve a configuration tree into a scheduled build plan.
///
/// # Errors
///
/// Any error in the configuration aborts resolution, even in targets that
/// were not requested.
pub fn resolve(config: &BakeConfig, options: &ResolveOptions) -> Result<BuildPlan, ResolveError> {
  let clock = match options.now {
    Some(at) => RunClock::fixed(at),
    None => RunClock::system(),
  };
  let variables = VarEnv::resolve(&config.variables, &options.overrides, &clock)?;

  let effective = resolve_inheritance(&config.targets)?;

  let mut skeletons: Vec<JobSkeleton> = Vec::new();
  let mut target_jobs: IndexMap<String, Vec<JobId>> = IndexMap::new();
  for (target, fields) in &effective {
    let name = config.targets.get(target).and_then(|spec| spec.name.as_deref());
    let expanded = expand(target, name, fields, &variables, &config.tag_function)?;

    let ids = (skeletons.len()..skeletons.len() + expanded.len()).map(JobId).collect();
    target_jobs.insert(target.clone(), ids);
    skeletons.extend(expanded);
  }

  check_unique_names(&skeletons)?;

  let links = resolve_contexts(&skeletons)?;
  let jobs: Vec<ResolvedJob> = skeletons
    .into_iter()
    .zip(links)
    .map(|(skeleton, links)| into_resolved(skeleton, links))
    .collect();

  // Validate every job, not only the selection, so that a broken target
  // fails the run regardless of what was requested.
  JobDag::from_jobs(&jobs)?;

  let job_names: Vec<String> = jobs.iter().map(|j| j.name.clone()).collect();
  let selector = Selector {
    groups: &config.groups,
    targets: &target_jobs,
    jobs: &job_names,
  };
  let roots = selector.roots(&options.targets)?;
  let selected = dependency_closure(&roots, |id| jobs[id.0].depends_on.as_slice());
  debug!(
    requested = roots.len(),
    selected = selected.len(),
    total = jobs.len(),
    "selected jobs"
  );

  let jobs = subset(jobs, selected.iter().copied());
  let batches = JobDag::from_jobs(&jobs)?.batches()?;

  info!(jobs = jobs.len(), batches = batches.len(), "resolved build plan");
  Ok(BuildPlan {
    jobs,
    batches,
    variables,
  })
}

fn check_unique_names(jobs: &[JobSkeleton]) -> Result<(), ResolveError> {
  let mut seen: HashMap<&str, &str> = HashMap::new();
  for job in jobs {
    if let Some(first) = seen.insert(&job.name, &job.target) {
      return Err(ResolveError::DuplicateJobName {
        name: job.name.clone(),
        first: first.to_string(),
        second: job.target.clone(),
      });
    }
  }
  Ok(())
}

fn into_resolved(skeleton: JobSkeleton, links: JobLinks) -> ResolvedJob {
  ResolvedJob {
    name: skeleton.name,
    target: skeleton.target,
    matrix: skeleton.matrix,
    dockerfile: skeleton.dockerfile,
    context: skeleton.context,
    contexts: links.contexts,
    stage: skeleton.stage,
    tags: skeleton.tags,
    args: skeleton.args,
    platforms: skeleton.platforms,
    depends_on: links.depends_on,
  }
}

/// Keep only `keep` (ascending) and renumber job ids to match.
///
/// `keep` must be closed under dependencies.
fn subset(jobs: Vec<ResolvedJob>, keep: impl Iterator<Item = JobId>) -> Vec<ResolvedJob> {
  let keep: Vec<JobId> = keep.collect();
  let remap: BTreeMap<JobId, JobId> = keep.iter().enumerate().map(|(new, old)| (*old, JobId(new))).collect();
  let renumber = |id: &JobId| remap.get(id).copied();

  let mut jobs: Vec<Option<ResolvedJob>> = jobs.into_iter().map(Some).collect();
  keep
    .iter()
    .filter_map(|old| jobs[old.0].take())
    .map(|mut job| {
      job.depends_on = job.depends_on.iter().filter_map(renumber).collect();
      for source in job.contexts.values_mut() {
        if let ContextSource::Job(dep) = source
          && let Some(new) = renumber(&*dep)
        {
          *dep = new;
        }
      }
      job
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Format, parse_config};
  use crate::template::TemplateError;
  use chrono::{TimeZone, Utc};
  use std::path::Path;

  const STACK: &str = r#"
variables:
  DISTRO_RELEASE:
    default: "43"
  STAMP:
    default: { fn: timestamp }
  TAG:
    default: "${DISTRO_RELEASE}.${STAMP}"
targets:
  base:
    target: base
    contexts:
      fedora: "docker-image://registry.fedoraproject.org/fedora:${DISTRO_RELEASE}"
    tags: { image: base }
  runtime:
    matrix:
      tgt: [shell, wayland]
    name: "${tgt}-runtime"
    context: "./${tgt}"
    target: runtime
    contexts:
      base: "target:base"
    tags: { image: "${tgt}-runtime" }
  devel:
    inherits: [runtime]
    name: "${tgt}-devel"
    target: devel
    contexts:
      runtime: "target:${tgt}-runtime"
    tags: { image: "${tgt}-devel" }
"#;

  fn config(yaml: &str) -> BakeConfig {
    parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap()
  }

  fn options(targets: &[&str]) -> ResolveOptions {
    ResolveOptions {
      targets: targets.iter().map(|s| s.to_string()).collect(),
      now: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()),
      ..ResolveOptions::default()
    }
  }

  fn batch_names(plan: &BuildPlan) -> Vec<Vec<&str>> {
    plan
      .batches
      .iter()
      .map(|b| b.iter().map(|id| plan.job(*id).name.as_str()).collect())
      .collect()
  }

  #[test]
  fn full_stack_is_batched_by_dependency() {
    let plan = resolve(&config(STACK), &options(&[])).unwrap();

    assert_eq!(plan.len(), 5);
    assert_eq!(
      batch_names(&plan),
      vec![
        vec!["base"],
        vec!["shell-runtime", "wayland-runtime"],
        vec!["shell-devel", "wayland-devel"],
      ]
    );

    let devel = plan.job(plan.find("wayland-devel").unwrap());
    // Inherited from runtime, then overridden and merged.
    assert_eq!(devel.context, "./wayland");
    assert_eq!(devel.stage.as_deref(), Some("devel"));
    assert_eq!(devel.contexts.len(), 2);
    assert_eq!(
      devel.contexts["runtime"],
      ContextSource::Job(plan.find("wayland-runtime").unwrap())
    );
    assert_eq!(
      devel.tags.as_slice(),
      ["wayland-devel:latest", "wayland-devel:43.20250101"]
    );
  }

  #[test]
  fn every_job_shares_one_timestamp() {
    let plan = resolve(&config(STACK), &options(&[])).unwrap();
    assert_eq!(plan.variables.get("TAG"), Some("43.20250101"));
    for job in &plan.jobs {
      assert!(job.tags.iter().any(|t| t.ends_with(":43.20250101")), "{}", job.name);
    }
  }

  #[test]
  fn empty_release_tag_yields_latest_only() {
    let mut opts = options(&["base"]);
    opts.overrides.insert("TAG".to_string(), String::new());
    let plan = resolve(&config(STACK), &opts).unwrap();
    assert_eq!(plan.jobs[0].tags.as_slice(), ["base:latest"]);
  }

  #[test]
  fn listed_tag_with_empty_release_is_dropped() {
    let yaml = r#"
variables:
  TAG:
    default: ""
targets:
  base:
    tags: ["base:latest", "base:${TAG}"]
"#;
    let plan = resolve(&config(yaml), &options(&[])).unwrap();
    assert_eq!(plan.jobs[0].tags.as_slice(), ["base:latest"]);
  }

  #[test]
  fn selecting_a_job_pulls_in_dependencies() {
    let plan = resolve(&config(STACK), &options(&["shell-devel"])).unwrap();
    assert_eq!(
      batch_names(&plan),
      vec![vec!["base"], vec!["shell-runtime"], vec!["shell-devel"]]
    );

    // Ids were renumbered consistently. The `base` context is inherited
    // from `runtime`, so devel depends on both.
    let devel = plan.job(plan.find("shell-devel").unwrap());
    assert_eq!(
      devel.depends_on,
      vec![plan.find("base").unwrap(), plan.find("shell-runtime").unwrap()]
    );
    assert_eq!(
      plan.dependency_names(plan.find("shell-devel").unwrap()),
      vec!["base", "shell-runtime"]
    );
  }

  #[test]
  fn selecting_a_target_takes_all_its_jobs() {
    let plan = resolve(&config(STACK), &options(&["runtime"])).unwrap();
    assert_eq!(
      batch_names(&plan),
      vec![vec!["base"], vec!["shell-runtime", "wayland-runtime"]]
    );
  }

  #[test]
  fn records_resolve_dependency_contexts() {
    let plan = resolve(&config(STACK), &options(&["shell-runtime"])).unwrap();
    let records = plan.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "base");
    assert_eq!(records[0].batch, 0);
    assert_eq!(
      records[0].contexts["fedora"],
      RecordContext::External {
        source: "docker-image://registry.fedoraproject.org/fedora:43".to_string()
      }
    );
    assert_eq!(records[1].batch, 1);
    assert_eq!(records[1].depends_on, vec!["base"]);
    assert_eq!(
      records[1].contexts["base"],
      RecordContext::Job {
        name: "base".to_string(),
        image: Some("base:latest".to_string()),
      }
    );
  }

  #[test]
  fn broken_unrequested_target_fails_the_run() {
    let yaml = format!("{STACK}  broken:\n    context: \"${{nope}}\"\n");
    let err = resolve(&config(&yaml), &options(&["base"])).unwrap_err();
    assert_eq!(
      err,
      ResolveError::TemplateSubstitution {
        target: "broken".to_string(),
        field: "context".to_string(),
        source: TemplateError::Unresolved("nope".to_string()),
      }
    );
  }

  #[test]
  fn duplicate_job_names() {
    let yaml = r#"
targets:
  a:
    name: same
  b:
    name: same
"#;
    let err = resolve(&config(yaml), &options(&[])).unwrap_err();
    assert_eq!(
      err,
      ResolveError::DuplicateJobName {
        name: "same".to_string(),
        first: "a".to_string(),
        second: "b".to_string(),
      }
    );
  }

  #[test]
  fn unknown_context_reference() {
    let yaml = r#"
targets:
  devel:
    contexts:
      runtime: "target:qt-runtime"
"#;
    let err = resolve(&config(yaml), &options(&[])).unwrap_err();
    assert!(matches!(err, ResolveError::UnresolvedContextReference { ref reference, .. } if reference == "qt-runtime"));
  }

  #[test]
  fn context_cycle() {
    let yaml = r#"
targets:
  a:
    contexts: { b: "target:b" }
  b:
    contexts: { a: "target:a" }
"#;
    let err = resolve(&config(yaml), &options(&[])).unwrap_err();
    assert_eq!(
      err,
      ResolveError::DependencyCycle {
        jobs: vec!["a".to_string(), "b".to_string()]
      }
    );
  }

  #[test]
  fn undefined_variable_in_default() {
    let yaml = r#"
variables:
  TAG:
    default: "${MISSING}"
targets:
  base: {}
"#;
    let err = resolve(&config(yaml), &options(&[])).unwrap_err();
    assert!(matches!(err, ResolveError::Variable(_)));
  }

  #[test]
  fn empty_configuration_is_an_empty_plan() {
    let plan = resolve(&BakeConfig::default(), &options(&[])).unwrap();
    assert!(plan.is_empty());
    assert!(plan.batches.is_empty());
  }
}
