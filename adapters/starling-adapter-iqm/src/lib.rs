//! Starling Adapter for IQM Quantum Computers
//!
//! This crate connects compiled circuits to IQM star-topology devices: it
//! serializes physical circuits into IQM's native instruction format, submits
//! them through an [`ExecutionService`], and formats the returned shot data.
//! It also carries error profiles for simulated Adonis and Deneb chips.
//!
//! # Native Instructions
//!
//! | IQM instruction | Starling IR                      | Notes                                |
//! |-----------------|----------------------------------|--------------------------------------|
//! | `prx`           | `R`, `RX`, `RY`, `PRX`           | angles in full turns                 |
//! | `cc_prx`        | classically conditioned rotation | needs an earlier `measure` feedback  |
//! | `cz`            | `CZ`                             |                                      |
//! | `move`          | `MOVE`                           | qubit to computational resonator     |
//! | `measure`       | measurement                      | key `{creg}_{len}_{creg_idx}_{bit}`  |
//! | `barrier`       | barrier                          |                                      |
//! | `reset`         | reset                            |                                      |
//! | `delay`         | delay                            | duration in seconds                  |
//!
//! # Service
//!
//! The adapter does not ship an HTTP client. Implement [`ExecutionService`]
//! for whatever runs the requests: a cloud client, a simulator, a test double.
//!
//! # Example
//!
//! ```ignore
//! use starling_adapter_iqm::{IqmBackend, RunOptions};
//! use starling_ir::{Circuit, ClbitId, QubitId, device::adonis};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = IqmBackend::new(adonis(), MyService::connect()?);
//!
//!     let mut circuit = Circuit::with_size("bell", 2, 2);
//!     circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//!     circuit.measure(QubitId(0), ClbitId(0))?;
//!     circuit.measure(QubitId(1), ClbitId(1))?;
//!
//!     let compiled = backend.transpile(&circuit)?;
//!     let job = backend.run(&[compiled], Some(RunOptions::default().with_shots(100))).await?;
//!     let result = job.result().await?;
//!     println!("Counts: {:?}", result.counts(0));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! [`IqmConfig`] loads from YAML and `STARLING_*` environment variables;
//! [`IqmBackend::from_config`] applies it.

pub mod backend;
pub mod config;
pub mod error;
pub mod fake_backends;
pub mod job;
pub mod logging;
pub mod measurement_key;
pub mod noise;
pub mod result;
pub mod serialize;
pub mod service;
pub mod wire;

pub use backend::{DEFAULT_SHOTS, IqmBackend, RunOptions};
pub use config::{ConfigError, IqmConfig, LoggingConfig};
pub use error::{IqmError, IqmResult};
pub use fake_backends::{IqmFakeBackend, fake_adonis, fake_deneb};
pub use job::{CircuitResult, IqmJob, JobResult, JobStatus};
pub use logging::{LogFormat, TracingConfig, init_tracing};
pub use measurement_key::MeasurementKey;
pub use noise::{GateError, IqmErrorProfile, NoiseParameters, ReadoutError, ThermalRelaxation};
pub use result::{Counts, format_batch, format_measurements};
pub use serialize::CircuitSerializer;
pub use service::{ExecutionService, JobId, PollPolicy};
pub use wire::{
    CircuitMeasurements, HeraldingMode, NativeInstruction, NativeOperation, RunRequest, RunResult,
    RunStatus, SingleQubitMapping, WireCircuit,
};
