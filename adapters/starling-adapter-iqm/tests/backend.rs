//! Backend tests against an in-memory execution service.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use starling_adapter_iqm::{
    CircuitMeasurements, ExecutionService, IqmBackend, IqmError, IqmResult, JobId, JobStatus,
    PollPolicy, RunOptions, RunRequest, RunResult, RunStatus, SingleQubitMapping, fake_adonis,
};
use starling_ir::device::adonis;
use starling_ir::{Circuit, CircuitLevel, ClbitId, QubitId};

/// Service that replays a scripted status sequence, then a fixed result.
struct MockService {
    statuses: Mutex<VecDeque<RunStatus>>,
    result: RunResult,
    submitted: Mutex<Vec<RunRequest>>,
    status_calls: Mutex<usize>,
    max_polls: u32,
}

impl MockService {
    fn new(statuses: impl IntoIterator<Item = RunStatus>, result: RunResult) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            result,
            submitted: Mutex::new(Vec::new()),
            status_calls: Mutex::new(0),
            max_polls: 20,
        }
    }

    fn ready(measurements: Vec<CircuitMeasurements>) -> Self {
        Self::new([RunStatus::Pending, RunStatus::Ready], RunResult::ready(measurements))
    }

    fn submitted(&self) -> Vec<RunRequest> {
        self.submitted.lock().unwrap().clone()
    }

    fn status_calls(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }
}

#[async_trait]
impl ExecutionService for MockService {
    async fn submit(&self, request: RunRequest) -> IqmResult<JobId> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request);
        Ok(JobId::new(format!("job-{}", submitted.len())))
    }

    async fn status(&self, _job_id: &JobId) -> IqmResult<RunStatus> {
        *self.status_calls.lock().unwrap() += 1;
        let mut statuses = self.statuses.lock().unwrap();
        // The last scripted status repeats.
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(RunStatus::Pending))
    }

    async fn result(&self, job_id: &JobId) -> IqmResult<RunResult> {
        if self.submitted.lock().unwrap().is_empty() && job_id.0 != "old-run" {
            return Err(IqmError::JobNotFound(job_id.to_string()));
        }
        Ok(self.result.clone())
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_polls: self.max_polls,
        }
    }
}

/// Bell pair already placed on Adonis: QB1 and QB3.
fn physical_bell() -> Circuit {
    let mut circuit = Circuit::with_size("bell", 5, 2);
    circuit.set_level(CircuitLevel::Physical);
    circuit.ry(std::f64::consts::FRAC_PI_2, QubitId(0)).unwrap();
    circuit.cz(QubitId(0), QubitId(2)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit.measure(QubitId(2), ClbitId(1)).unwrap();
    circuit
}

fn bell_measurements() -> CircuitMeasurements {
    let mut m = CircuitMeasurements::new();
    m.insert("c_2_0_0".into(), vec![vec![0], vec![1], vec![1]]);
    m.insert("c_2_0_1".into(), vec![vec![0], vec![1], vec![0]]);
    m
}

#[tokio::test]
async fn test_run_submits_and_formats_results() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![bell_measurements()]));
    let job = backend
        .run(&[physical_bell()], Some(RunOptions::default().with_shots(3)))
        .await
        .unwrap();
    assert_eq!(job.job_id().to_string(), "job-1");

    let submitted = backend.service().submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.shots, 3);
    assert_eq!(request.circuits[0].name, "bell");
    assert_eq!(
        request.qubit_mapping.as_deref(),
        Some(
            &[
                SingleQubitMapping {
                    logical_name: "0".into(),
                    physical_name: "QB1".into(),
                },
                SingleQubitMapping {
                    logical_name: "2".into(),
                    physical_name: "QB3".into(),
                },
            ][..]
        )
    );

    let result = job.result().await.unwrap();
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].name, "bell");
    assert_eq!(result.results[0].shots, 3);
    assert_eq!(result.memory(0).unwrap(), &["00", "11", "01"]);
    let counts = result.counts(0).unwrap();
    assert_eq!(counts.get("00"), 1);
    assert_eq!(counts.get("11"), 1);
    assert_eq!(counts.get("01"), 1);
    assert_eq!(counts.total_shots(), 3);
}

#[tokio::test]
async fn test_results_are_cached() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![bell_measurements()]));
    let job = backend
        .run(&[physical_bell()], Some(RunOptions::default().with_shots(3)))
        .await
        .unwrap();

    let first = job.result().await.unwrap();
    let calls = backend.service().status_calls();
    let second = job.result().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(job.status().await.unwrap(), JobStatus::Done);
    assert_eq!(backend.service().status_calls(), calls);
}

#[tokio::test]
async fn test_status_before_results() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![bell_measurements()]));
    let job = backend.run(&[physical_bell()], None).await.unwrap();
    assert_eq!(job.status().await.unwrap(), JobStatus::Running);
    assert_eq!(job.status().await.unwrap(), JobStatus::Done);
}

#[tokio::test]
async fn test_default_options_apply() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![]));
    backend.run(&[physical_bell()], None).await.unwrap();
    assert_eq!(backend.service().submitted()[0].shots, 1024);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![]));
    let err = backend.run(&[], None).await.err().unwrap();
    assert!(matches!(err, IqmError::EmptyBatch));
    assert!(backend.service().submitted().is_empty());
}

#[tokio::test]
async fn test_circuit_width_must_match_device() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![]));
    let mut logical = Circuit::with_size("narrow", 2, 2);
    logical.cz(QubitId(0), QubitId(1)).unwrap();

    let err = backend.run(&[logical], None).await.err().unwrap();
    assert!(matches!(err, IqmError::CircuitWidth { expected: 5, got: 2, .. }));
    assert!(err.to_string().contains("transpile"));
}

#[tokio::test]
async fn test_zero_shots_rejected() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![]));
    let err = backend
        .run(&[physical_bell()], Some(RunOptions::default().with_shots(0)))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, IqmError::InvalidOptions(_)));
}

#[tokio::test]
async fn test_failed_run_reports_message() {
    let service = MockService::new(
        [RunStatus::Pending, RunStatus::Failed],
        RunResult::with_status(RunStatus::Failed, "calibration expired"),
    );
    let backend = IqmBackend::new(adonis(), service);
    let job = backend.run(&[physical_bell()], None).await.unwrap();
    match job.result().await {
        Err(IqmError::JobFailed(message)) => assert_eq!(message, "calibration expired"),
        other => panic!("expected JobFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_aborted_run() {
    let service = MockService::new(
        [RunStatus::Aborted],
        RunResult::with_status(RunStatus::Aborted, "user request"),
    );
    let backend = IqmBackend::new(adonis(), service);
    let job = backend.run(&[physical_bell()], None).await.unwrap();
    assert_eq!(job.status().await.unwrap(), JobStatus::Cancelled);
    assert!(matches!(job.result().await, Err(IqmError::JobCancelled(_))));
}

#[tokio::test]
async fn test_polling_times_out() {
    let mut service = MockService::new([RunStatus::Pending], RunResult::ready(vec![]));
    service.max_polls = 3;
    let backend = IqmBackend::new(adonis(), service);
    let job = backend.run(&[physical_bell()], None).await.unwrap();
    assert!(matches!(job.result().await, Err(IqmError::Timeout(_))));
    assert_eq!(backend.service().status_calls(), 3);
}

#[tokio::test]
async fn test_ready_without_data() {
    let service = MockService::new(
        [RunStatus::Ready],
        RunResult::with_status(RunStatus::Ready, "no data"),
    );
    let backend = IqmBackend::new(adonis(), service);
    let job = backend.run(&[physical_bell()], None).await.unwrap();
    assert!(matches!(job.result().await, Err(IqmError::MissingResults(_))));
}

#[tokio::test]
async fn test_result_count_mismatch() {
    let service = MockService::ready(vec![bell_measurements(), bell_measurements()]);
    let backend = IqmBackend::new(adonis(), service);
    let job = backend
        .run(&[physical_bell()], Some(RunOptions::default().with_shots(3)))
        .await
        .unwrap();
    assert!(matches!(job.result().await, Err(IqmError::InconsistentResults(_))));
}

#[tokio::test]
async fn test_retrieve_job_by_id() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![bell_measurements()]));
    let job = backend.retrieve_job("old-run");
    let result = job.result().await.unwrap();
    assert_eq!(result.job_id, JobId::from("old-run"));
    assert_eq!(result.results[0].name, "circuit-0");
    assert_eq!(result.results[0].shots, 3);
}

#[tokio::test]
async fn test_transpile_then_run() {
    let backend = IqmBackend::new(adonis(), MockService::ready(vec![]));
    let mut bell = Circuit::with_size("bell", 2, 2);
    bell.h(QubitId(0)).unwrap();
    bell.cx(QubitId(0), QubitId(1)).unwrap();
    bell.measure(QubitId(0), ClbitId(0)).unwrap();
    bell.measure(QubitId(1), ClbitId(1)).unwrap();

    let compiled = backend.transpile(&bell).unwrap();
    assert_eq!(compiled.num_qubits(), 5);
    backend.run(&[compiled], None).await.unwrap();

    let request = &backend.service().submitted()[0];
    assert!(
        request.circuits[0]
            .instructions
            .iter()
            .all(|i| matches!(i.name.as_str(), "prx" | "cz" | "measure" | "barrier"))
    );
    let mapping = request.qubit_mapping.as_ref().unwrap();
    assert!(mapping.iter().any(|m| m.physical_name == "QB3"));
    for entry in mapping {
        let index: u32 = entry.logical_name.parse().unwrap();
        assert_eq!(
            backend.index_to_qubit_name(QubitId(index)),
            Some(entry.physical_name.as_str())
        );
    }
}

#[tokio::test]
async fn test_fake_backend_wraps_device() {
    let fake = fake_adonis().unwrap();
    let backend = fake.backend(MockService::ready(vec![bell_measurements()]));
    assert_eq!(backend.name(), "IQMFakeAdonisBackend");
    assert_eq!(backend.qubit_name_to_index("QB3"), Some(QubitId(2)));
    let job = backend
        .run(&[physical_bell()], Some(RunOptions::default().with_shots(3)))
        .await
        .unwrap();
    assert_eq!(job.result().await.unwrap().results[0].memory.len(), 3);
}
