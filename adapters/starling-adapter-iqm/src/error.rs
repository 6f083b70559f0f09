//! Error types for the IQM adapter.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for IQM operations.
pub type IqmResult<T> = Result<T, IqmError>;

/// Errors that can occur when translating for or running on IQM.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IqmError {
    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] starling_ir::IrError),

    /// Compilation failed.
    #[error("Compilation error: {0}")]
    Compile(#[from] starling_compile::CompileError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The instruction has no native counterpart.
    #[error("Instruction '{name}' in circuit '{circuit}' is not supported by IQM hardware")]
    UnsupportedInstruction { name: String, circuit: String },

    /// A classical condition IQM cannot express.
    #[error("Invalid classical condition: {0}")]
    InvalidCondition(String),

    /// A native instruction with missing or mistyped arguments.
    #[error("Malformed '{name}' instruction: {reason}")]
    MalformedInstruction { name: String, reason: String },

    /// A measured classical bit belongs to no register.
    #[error("Classical bit {0} is not part of any register")]
    BitOutsideRegister(String),

    /// A measurement key that does not parse.
    #[error("Invalid measurement key '{0}'")]
    InvalidMeasurementKey(String),

    /// A wire qubit name missing from the qubit table.
    #[error("Unknown qubit '{0}'")]
    UnknownQubit(String),

    /// A `cc_prx` whose feedback key matches no earlier measurement.
    #[error("No measurement produces feedback key '{0}'")]
    MissingFeedback(String),

    /// Nothing to run.
    #[error("Empty circuit batch")]
    EmptyBatch,

    /// A circuit does not span the device.
    #[error(
        "Circuit '{circuit}' has {got} qubits but the device has {expected} components; \
         transpile it first"
    )]
    CircuitWidth {
        circuit: String,
        expected: usize,
        got: usize,
    },

    /// Run options out of range.
    #[error("Invalid run options: {0}")]
    InvalidOptions(String),

    /// Job not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job execution failed.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Job was aborted by the service.
    #[error("Job cancelled: {0}")]
    JobCancelled(String),

    /// Timeout waiting for job.
    #[error("Timeout waiting for job: {0}")]
    Timeout(String),

    /// A circuit result has no shot data for a measurement key.
    #[error("Missing results for measurement '{0}'")]
    MissingResults(String),

    /// Shot data does not line up.
    #[error("Inconsistent results: {0}")]
    InconsistentResults(String),

    /// Error profile does not fit the device.
    #[error("Invalid error profile: {0}")]
    InvalidErrorProfile(String),
}
