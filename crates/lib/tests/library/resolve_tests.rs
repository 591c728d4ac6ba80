use std::path::Path;

use bakery_lib::config::{Format, parse_config};
use bakery_lib::resolve::{ContextSource, RecordContext, ResolveError, resolve};
use bakery_lib::vars::env_overrides;
use serial_test::serial;

use super::common::{batch_names, options, stack_config};

fn names(batches: &[&[&str]]) -> Vec<Vec<String>> {
  batches
    .iter()
    .map(|b| b.iter().map(|s| s.to_string()).collect())
    .collect()
}

#[test]
fn default_group_builds_devel_with_its_chain() {
  let plan = resolve(&stack_config(), &options(&[], &[])).unwrap();

  assert_eq!(
    batch_names(&plan),
    names(&[
      &["base"],
      &["shell-runtime", "wayland-runtime", "java-runtime"],
      &["shell-devel", "wayland-devel", "java-devel"],
    ])
  );
}

#[test]
fn devel_never_precedes_its_runtime() {
  let plan = resolve(&stack_config(), &options(&["everything"], &[])).unwrap();

  for tgt in ["shell", "wayland", "java"] {
    let runtime = plan.find(&format!("{tgt}-runtime")).unwrap();
    let devel = plan.find(&format!("{tgt}-devel")).unwrap();
    let base = plan.find("base").unwrap();
    assert!(plan.batch_of(base) < plan.batch_of(runtime));
    assert!(plan.batch_of(runtime) < plan.batch_of(devel));
  }
}

#[test]
fn release_tag_comes_from_the_shared_timestamp() {
  let plan = resolve(&stack_config(), &options(&["shell-runtime"], &[])).unwrap();
  let job = plan.job(plan.find("shell-runtime").unwrap());
  assert_eq!(job.tags.as_slice(), ["shell-runtime:latest", "shell-runtime:43.20250101"]);
  assert_eq!(plan.variables.get("BUILD_DATE"), Some("20250101"));
}

#[test]
fn empty_release_tag_override() {
  let plan = resolve(&stack_config(), &options(&["shell-runtime"], &[("TAG", "")])).unwrap();
  let job = plan.job(plan.find("shell-runtime").unwrap());
  assert_eq!(job.tags.as_slice(), ["shell-runtime:latest"]);
}

#[test]
fn override_feeds_dependent_defaults() {
  let plan = resolve(&stack_config(), &options(&["base"], &[("DISTRO_RELEASE", "44")])).unwrap();
  let base = &plan.jobs[0];
  assert_eq!(base.tags.as_slice(), ["base:latest", "base:44.20250101"]);
  assert_eq!(base.args["RELEASE"], "44");
  assert_eq!(
    base.contexts["fedora"],
    ContextSource::External("docker-image://registry.fedoraproject.org/fedora:44".to_string())
  );
}

#[test]
#[serial]
fn environment_overrides_declared_variables() {
  temp_env::with_vars([("DISTRO_RELEASE", Some("42")), ("UNDECLARED_THING", Some("x"))], || {
    let config = stack_config();
    let overrides = env_overrides(&config.variables);
    assert_eq!(overrides.get("DISTRO_RELEASE").map(String::as_str), Some("42"));
    assert!(!overrides.contains_key("UNDECLARED_THING"));

    let mut opts = options(&["base"], &[]);
    opts.overrides = overrides;
    let plan = resolve(&config, &opts).unwrap();
    assert_eq!(plan.jobs[0].args["RELEASE"], "42");
  });
}

#[test]
fn inherited_fields_reach_every_variant() {
  let plan = resolve(&stack_config(), &options(&["devel"], &[])).unwrap();
  let java = plan.job(plan.find("java-devel").unwrap());

  assert_eq!(java.target, "devel");
  assert_eq!(java.matrix["tgt"], "java");
  assert_eq!(java.context, "./java");
  assert_eq!(java.stage.as_deref(), Some("devel"));
  assert_eq!(java.dockerfile, "Dockerfile");
  // `base` comes from the parent, `runtime` from the child.
  assert_eq!(java.contexts["base"], ContextSource::Job(plan.find("base").unwrap()));
  assert_eq!(
    java.contexts["runtime"],
    ContextSource::Job(plan.find("java-runtime").unwrap())
  );
}

#[test]
fn records_carry_batch_and_concrete_contexts() {
  let plan = resolve(&stack_config(), &options(&["wayland-devel"], &[])).unwrap();
  let records = plan.records();

  let names: Vec<_> = records.iter().map(|r| (r.name.as_str(), r.batch)).collect();
  assert_eq!(names, vec![("base", 0), ("wayland-runtime", 1), ("wayland-devel", 2)]);

  let devel = &records[2];
  assert_eq!(devel.stage.as_deref(), Some("devel"));
  // `base` is inherited from runtime alongside devel's own context.
  assert!(matches!(&devel.contexts["base"], RecordContext::Job { name, .. } if name == "base"));
  assert_eq!(
    devel.contexts["runtime"],
    RecordContext::Job {
      name: "wayland-runtime".to_string(),
      image: Some("wayland-runtime:latest".to_string()),
    }
  );

  let json = serde_json::to_value(devel).unwrap();
  assert_eq!(json["contexts"]["runtime"]["type"], "job");
  assert_eq!(json["depends_on"], serde_json::json!(["base", "wayland-runtime"]));
}

#[test]
fn identity_for_plain_target() {
  let yaml = r#"
targets:
  base:
    dockerfile: Containerfile
    context: ./base
    target: base
    contexts:
      fedora: "docker-image://registry.fedoraproject.org/fedora:43"
    tags: ["base:latest", "base:stable"]
"#;
  let config = parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap();
  let plan = resolve(&config, &options(&[], &[])).unwrap();

  assert_eq!(plan.len(), 1);
  let job = &plan.jobs[0];
  assert_eq!(job.name, "base");
  assert_eq!(job.dockerfile, "Containerfile");
  assert_eq!(job.context, "./base");
  assert_eq!(job.stage.as_deref(), Some("base"));
  assert_eq!(job.tags.as_slice(), ["base:latest", "base:stable"]);
  assert_eq!(
    job.contexts["fedora"],
    ContextSource::External("docker-image://registry.fedoraproject.org/fedora:43".to_string())
  );
  assert!(job.depends_on.is_empty());
}

#[test]
fn mutual_context_references_are_a_cycle() {
  let yaml = r#"
targets:
  a:
    contexts: { other: "target:b" }
  b:
    contexts: { other: "target:a" }
"#;
  let config = parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap();
  let err = resolve(&config, &options(&["a"], &[])).unwrap_err();
  assert_eq!(
    err,
    ResolveError::DependencyCycle {
      jobs: vec!["a".to_string(), "b".to_string()]
    }
  );
}

#[test]
fn mutual_inheritance_is_a_cycle() {
  let yaml = r#"
targets:
  a: { inherits: [b] }
  b: { inherits: [a] }
"#;
  let config = parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap();
  let err = resolve(&config, &options(&[], &[])).unwrap_err();
  assert!(matches!(err, ResolveError::CyclicInheritance { .. }));
}

#[test]
fn errors_name_the_offender() {
  let yaml = r#"
targets:
  runtime:
    matrix: { tgt: [shell] }
    contexts: { base: "target:${tgt}-base" }
"#;
  let config = parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap();
  let err = resolve(&config, &options(&[], &[])).unwrap_err();
  let message = err.to_string();
  assert!(message.contains("runtime-shell"), "{message}");
  assert!(message.contains("shell-base"), "{message}");
}

#[test]
fn unknown_requested_target() {
  let err = resolve(&stack_config(), &options(&["qt-runtime"], &[])).unwrap_err();
  assert_eq!(
    err,
    ResolveError::UnknownTarget {
      name: "qt-runtime".to_string(),
      referenced_by: None,
    }
  );
}

#[test]
fn json_and_yaml_resolve_identically() {
  let json = r#"{
    "variables": { "TAG": { "default": "1.0" } },
    "targets": {
      "base": { "tags": { "image": "base" } },
      "app": {
        "matrix": { "flavour": ["a", "b"] },
        "contexts": { "base": "target:base" },
        "tags": { "image": "app-${flavour}" }
      }
    }
  }"#;
  let yaml = r#"
variables:
  TAG: { default: "1.0" }
targets:
  base:
    tags: { image: base }
  app:
    matrix: { flavour: [a, b] }
    contexts: { base: "target:base" }
    tags: { image: "app-${flavour}" }
"#;
  let from_json = parse_config(json, Format::Json, Path::new("bake.json")).unwrap();
  let from_yaml = parse_config(yaml, Format::Yaml, Path::new("bake.yaml")).unwrap();
  let a = resolve(&from_json, &options(&[], &[])).unwrap();
  let b = resolve(&from_yaml, &options(&[], &[])).unwrap();

  assert_eq!(a.jobs, b.jobs);
  assert_eq!(a.batches, b.batches);
  assert_eq!(batch_names(&a), names(&[&["base"], &["app-a", "app-b"]]));
}
