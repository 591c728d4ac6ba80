//! The seam between the runner and the tool that actually builds images.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::resolve::JobRecord;

use super::types::InvokeError;

/// Builds one job.
///
/// The runner calls `invoke` only after every dependency of the job has
/// succeeded. Implementations should return promptly with
/// [`InvokeError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait BuildInvoker: Send + Sync {
  async fn invoke(&self, job: &JobRecord, cancel: CancellationToken) -> Result<(), InvokeError>;
}

/// Logs each job and reports success without building anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunInvoker;

#[async_trait]
impl BuildInvoker for DryRunInvoker {
  async fn invoke(&self, job: &JobRecord, cancel: CancellationToken) -> Result<(), InvokeError> {
    if cancel.is_cancelled() {
      return Err(InvokeError::Cancelled);
    }
    info!(
      job = %job.name,
      batch = job.batch,
      dockerfile = %job.dockerfile,
      context = %job.context,
      tags = ?job.tags,
      "dry run"
    );
    Ok(())
  }
}
