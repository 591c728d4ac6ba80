use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bakery_lib::execute::{
  BuildInvoker, DryRunInvoker, ExecuteConfig, InvokeError, JobStatus, RunStatus, execute_plan,
};
use bakery_lib::resolve::{JobRecord, resolve};
use tokio_util::sync::CancellationToken;

use super::common::{options, stack_config};

/// Fails the named jobs and remembers what it was asked to build.
struct Recorder {
  fail: HashSet<&'static str>,
  seen: Mutex<Vec<(String, usize)>>,
}

impl Recorder {
  fn new(fail: &[&'static str]) -> Arc<Self> {
    Arc::new(Self {
      fail: fail.iter().copied().collect(),
      seen: Mutex::new(Vec::new()),
    })
  }
}

#[async_trait]
impl BuildInvoker for Recorder {
  async fn invoke(&self, job: &JobRecord, _cancel: CancellationToken) -> Result<(), InvokeError> {
    self.seen.lock().unwrap().push((job.name.clone(), job.batch));
    if self.fail.contains(job.name.as_str()) {
      return Err(InvokeError::Failed {
        cmd: "docker buildx build".to_string(),
        code: Some(1),
      });
    }
    Ok(())
  }
}

fn config(keep_going: bool) -> ExecuteConfig {
  ExecuteConfig {
    parallelism: 2,
    keep_going,
  }
}

#[tokio::test]
async fn dry_run_of_the_default_group() {
  let plan = resolve(&stack_config(), &options(&[], &[])).unwrap();
  let report = execute_plan(&plan, Arc::new(DryRunInvoker), &config(false), CancellationToken::new()).await;

  assert_eq!(report.status(), RunStatus::Succeeded);
  assert_eq!(report.jobs.len(), 7);
  assert_eq!(report.get("java-devel").unwrap().batch, 2);
}

#[tokio::test]
async fn invoker_sees_jobs_batch_by_batch() {
  let plan = resolve(&stack_config(), &options(&["everything"], &[])).unwrap();
  let recorder = Recorder::new(&[]);
  execute_plan(&plan, recorder.clone(), &config(false), CancellationToken::new()).await;

  let seen = recorder.seen.lock().unwrap().clone();
  assert_eq!(seen.len(), plan.len());
  let batches: Vec<usize> = seen.iter().map(|(_, batch)| *batch).collect();
  let mut sorted = batches.clone();
  sorted.sort();
  assert_eq!(batches, sorted);
}

#[tokio::test]
async fn runtime_failure_skips_only_its_devel() {
  let plan = resolve(&stack_config(), &options(&[], &[])).unwrap();
  let recorder = Recorder::new(&["wayland-runtime"]);
  let report = execute_plan(&plan, recorder.clone(), &config(true), CancellationToken::new()).await;

  assert!(matches!(report.get("wayland-runtime").unwrap().status, JobStatus::Failed { .. }));
  assert_eq!(
    report.get("wayland-devel").unwrap().status,
    JobStatus::Skipped {
      failed_dependency: "wayland-runtime".to_string()
    }
  );
  assert_eq!(report.get("shell-devel").unwrap().status, JobStatus::Succeeded);
  assert_eq!(report.get("java-devel").unwrap().status, JobStatus::Succeeded);
  assert_eq!(report.status(), RunStatus::Failed);
}

#[tokio::test]
async fn runtime_failure_halts_the_run_by_default() {
  let plan = resolve(&stack_config(), &options(&[], &[])).unwrap();
  let recorder = Recorder::new(&["wayland-runtime"]);
  let report = execute_plan(&plan, recorder.clone(), &config(false), CancellationToken::new()).await;

  assert_eq!(report.get("shell-runtime").unwrap().status, JobStatus::Succeeded);
  assert!(matches!(report.get("wayland-devel").unwrap().status, JobStatus::Skipped { .. }));
  assert_eq!(report.get("shell-devel").unwrap().status, JobStatus::NotStarted);
  assert!(recorder.seen.lock().unwrap().iter().all(|(_, batch)| *batch < 2));
  assert_eq!((report.failed(), report.skipped()), (1, 3));
}
