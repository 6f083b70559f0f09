//! Execution service boundary.
//!
//! The adapter does not talk to hardware itself. Anything that can accept a
//! [`RunRequest`] and later hand back a [`RunResult`] implements
//! [`ExecutionService`]: an HTTP client, a simulator, or a test double.
//!
//! ```text
//!   submit(RunRequest) ──→ status() ──→ result()
//!          │                 Pending ──→ Ready | Failed | Aborted
//!          └── wait_for_results() polls status until terminal
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IqmError, IqmResult};
use crate::wire::{RunRequest, RunResult, RunStatus};

/// Unique identifier for a submitted run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Polling policy of [`ExecutionService::wait_for_results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Time between status checks.
    pub interval: Duration,
    /// Status checks before giving up.
    pub max_polls: u32,
}

impl Default for PollPolicy {
    /// 500ms between polls, for up to 5 minutes.
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_polls: 600,
        }
    }
}

/// A service that runs serialized circuits.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Submit a batch for execution.
    async fn submit(&self, request: RunRequest) -> IqmResult<JobId>;

    /// Current status of a run.
    async fn status(&self, job_id: &JobId) -> IqmResult<RunStatus>;

    /// Result of a run; shot data is only present once it is `Ready`.
    async fn result(&self, job_id: &JobId) -> IqmResult<RunResult>;

    /// Polling policy for [`wait_for_results`](Self::wait_for_results).
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::default()
    }

    /// Wait for a run to finish and return its result.
    async fn wait_for_results(&self, job_id: &JobId) -> IqmResult<RunResult> {
        let policy = self.poll_policy();

        for _ in 0..policy.max_polls {
            match self.status(job_id).await? {
                RunStatus::Ready => return self.result(job_id).await,
                RunStatus::Failed => {
                    let message = self.result(job_id).await.ok().and_then(|r| r.message);
                    return Err(IqmError::JobFailed(message.unwrap_or_else(|| job_id.to_string())));
                }
                RunStatus::Aborted => return Err(IqmError::JobCancelled(job_id.to_string())),
                RunStatus::Pending => {
                    debug!("Job {} pending, polling again", job_id);
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }

        Err(IqmError::Timeout(job_id.to_string()))
    }
}
