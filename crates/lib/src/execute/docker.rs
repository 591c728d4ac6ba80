//! Build invoker backed by `docker buildx build`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::resolve::{JobRecord, RecordContext};

use super::invoker::BuildInvoker;
use super::types::InvokeError;

/// Runs one `docker buildx build` per job.
#[derive(Debug, Clone)]
pub struct DockerInvoker {
  /// Executable to run, `docker` unless overridden.
  pub program: String,
  /// Push images instead of loading them into the local image store.
  pub push: bool,
}

impl Default for DockerInvoker {
  fn default() -> Self {
    Self {
      program: "docker".to_string(),
      push: false,
    }
  }
}

impl DockerInvoker {
  /// Command line arguments for `job`, after the program name.
  ///
  /// # Errors
  ///
  /// Returns `Unsupported` when a context refers to a job without tags, since
  /// its output cannot be addressed.
  pub fn build_args(&self, job: &JobRecord) -> Result<Vec<String>, InvokeError> {
    let mut args = vec!["buildx".to_string(), "build".to_string()];

    let dockerfile = Path::new(&job.context).join(&job.dockerfile);
    args.push("--file".to_string());
    args.push(dockerfile.to_string_lossy().into_owned());

    if let Some(stage) = &job.stage {
      args.push("--target".to_string());
      args.push(stage.clone());
    }

    for tag in &job.tags {
      args.push("--tag".to_string());
      args.push(tag.clone());
    }

    for (key, value) in &job.args {
      args.push("--build-arg".to_string());
      args.push(format!("{key}={value}"));
    }

    for (alias, source) in &job.contexts {
      let source = match source {
        RecordContext::External { source } => source.clone(),
        RecordContext::Job { image: Some(image), .. } => format!("docker-image://{image}"),
        RecordContext::Job { name, image: None } => {
          return Err(InvokeError::Unsupported(format!(
            "context '{alias}' of job '{}' uses job '{name}', which has no tags",
            job.name
          )));
        }
      };
      args.push("--build-context".to_string());
      args.push(format!("{alias}={source}"));
    }

    if !job.platforms.is_empty() {
      args.push("--platform".to_string());
      args.push(job.platforms.join(","));
    }

    args.push(if self.push { "--push" } else { "--load" }.to_string());
    args.push(job.context.clone());
    Ok(args)
  }
}

#[async_trait]
impl BuildInvoker for DockerInvoker {
  async fn invoke(&self, job: &JobRecord, cancel: CancellationToken) -> Result<(), InvokeError> {
    let args = self.build_args(job)?;
    let cmd = format!("{} {}", self.program, args.join(" "));
    info!(job = %job.name, "building");
    debug!(cmd = %cmd, "spawning process");

    let mut child = Command::new(&self.program)
      .args(&args)
      .stdin(Stdio::null())
      .kill_on_drop(true)
      .spawn()?;

    tokio::select! {
      status = child.wait() => {
        let status = status?;
        if status.success() {
          Ok(())
        } else {
          Err(InvokeError::Failed { cmd, code: status.code() })
        }
      }
      _ = cancel.cancelled() => {
        warn!(job = %job.name, "cancelling build");
        if let Err(e) = child.kill().await {
          debug!(error = %e, "failed to kill build process");
        }
        Err(InvokeError::Cancelled)
      }
    }
  }
}
