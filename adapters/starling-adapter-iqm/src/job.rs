//! Handle to a submitted batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::IqmResult;
use crate::result::{Counts, format_batch};
use crate::service::{ExecutionService, JobId};
use crate::wire::RunStatus;

/// Status of an [`IqmJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued or executing.
    Running,
    /// Results are available.
    Done,
    /// Execution failed.
    Failed,
    /// The service aborted the run.
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl From<RunStatus> for JobStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Pending => JobStatus::Running,
            RunStatus::Ready => JobStatus::Done,
            RunStatus::Failed => JobStatus::Failed,
            RunStatus::Aborted => JobStatus::Cancelled,
        }
    }
}

/// Formatted results of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitResult {
    /// Circuit name.
    pub name: String,
    /// Number of shots.
    pub shots: usize,
    /// Formatted bitstring of every shot, in shot order.
    pub memory: Vec<String>,
    /// Aggregated counts.
    pub counts: Counts,
}

/// Formatted results of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// The run the results belong to.
    pub job_id: JobId,
    /// When the results were formatted.
    pub date: DateTime<Utc>,
    /// Per-circuit results in submission order.
    pub results: Vec<CircuitResult>,
    /// Warnings reported by the service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobResult {
    /// Counts of the circuit at `index`.
    pub fn counts(&self, index: usize) -> Option<&Counts> {
        self.results.get(index).map(|r| &r.counts)
    }

    /// Per-shot bitstrings of the circuit at `index`.
    pub fn memory(&self, index: usize) -> Option<&[String]> {
        self.results.get(index).map(|r| r.memory.as_slice())
    }
}

/// A submitted batch.
///
/// Results are fetched once, formatted and cached; later calls to
/// [`result`](Self::result) and [`status`](Self::status) do not hit the
/// service again.
pub struct IqmJob<S> {
    service: Arc<S>,
    job_id: JobId,
    circuit_names: Option<Vec<String>>,
    shots: Option<u32>,
    cached: Mutex<Option<JobResult>>,
}

impl<S: ExecutionService> IqmJob<S> {
    /// A job whose batch is known.
    pub fn new(service: Arc<S>, job_id: JobId, circuit_names: Vec<String>, shots: u32) -> Self {
        Self {
            service,
            job_id,
            circuit_names: Some(circuit_names),
            shots: Some(shots),
            cached: Mutex::new(None),
        }
    }

    /// A job known only by its id; circuit count and shots come from the data.
    pub fn retrieve(service: Arc<S>, job_id: JobId) -> Self {
        Self {
            service,
            job_id,
            circuit_names: None,
            shots: None,
            cached: Mutex::new(None),
        }
    }

    /// The job id.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Current status.
    pub async fn status(&self) -> IqmResult<JobStatus> {
        if self.cached.lock().await.is_some() {
            return Ok(JobStatus::Done);
        }
        let status = self.service.status(&self.job_id).await?;
        debug!("Job {} status: {:?}", self.job_id, status);
        Ok(status.into())
    }

    /// Wait for the run and return its formatted results.
    pub async fn result(&self) -> IqmResult<JobResult> {
        let mut cached = self.cached.lock().await;
        if let Some(result) = cached.as_ref() {
            return Ok(result.clone());
        }

        let run = self.service.wait_for_results(&self.job_id).await?;
        let measurements = run.measurements.as_deref();
        let expected = match (&self.circuit_names, measurements) {
            (Some(names), _) => names.len(),
            (None, Some(m)) => m.len(),
            (None, None) => 0,
        };
        let shots = self.shots.map(|s| s as usize);
        let formatted = format_batch(measurements, expected, shots)?;

        let results = formatted
            .into_iter()
            .enumerate()
            .map(|(i, memory)| {
                let name = self
                    .circuit_names
                    .as_ref()
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| format!("circuit-{i}"));
                let counts: Counts = memory.iter().map(String::as_str).collect();
                CircuitResult {
                    name,
                    shots: memory.len(),
                    memory,
                    counts,
                }
            })
            .collect();

        let result = JobResult {
            job_id: self.job_id.clone(),
            date: Utc::now(),
            results,
            warnings: run.warnings,
        };
        info!(
            "Job {} finished: {} circuit results",
            self.job_id,
            result.results.len()
        );
        *cached = Some(result.clone());
        Ok(result)
    }
}
