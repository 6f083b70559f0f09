//! Wire types exchanged with an IQM execution service.
//!
//! A circuit travels as a list of [`NativeInstruction`]s: a native gate name,
//! the component names it acts on and a free-form argument object. The
//! adapter never works on that raw shape directly; it goes through the closed
//! [`NativeOperation`] enum, which knows the arguments of every native gate
//! and keeps anything else as [`NativeOperation::Unsupported`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::{IqmError, IqmResult};

/// One native instruction as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeInstruction {
    /// Native operation name (`prx`, `cz`, `move`, ...).
    pub name: String,
    /// Component names the operation acts on.
    pub qubits: Vec<String>,
    /// Operation arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Calibrated implementation to use; the device default if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
}

impl NativeInstruction {
    /// Build an instruction from a typed operation.
    pub fn new(operation: NativeOperation, qubits: Vec<String>) -> Self {
        let name = operation.name().to_string();
        Self {
            name,
            qubits,
            args: operation.into_args(),
            implementation: None,
        }
    }

    /// Read the typed operation back.
    pub fn operation(&self) -> IqmResult<NativeOperation> {
        NativeOperation::from_wire(&self.name, &self.args)
    }
}

/// A native operation with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeOperation {
    /// Phased X rotation; angles in full turns.
    Prx { angle_t: f64, phase_t: f64 },
    /// Phased X rotation applied when the measurement behind `feedback_key`
    /// read 1 on `feedback_qubit`.
    CcPrx {
        angle_t: f64,
        phase_t: f64,
        feedback_key: String,
        feedback_qubit: String,
    },
    /// Controlled-Z.
    Cz,
    /// Qubit/resonator state transfer.
    Move,
    /// Scheduling barrier.
    Barrier,
    /// Active reset.
    Reset,
    /// Idle time, in seconds.
    Delay { duration: f64 },
    /// Measurement under `key`, optionally also published for feedback.
    Measure {
        key: String,
        feedback_key: Option<String>,
    },
    /// Anything else, passed through untouched.
    Unsupported {
        name: String,
        args: Map<String, Value>,
    },
}

impl NativeOperation {
    /// Wire name of the operation.
    pub fn name(&self) -> &str {
        match self {
            NativeOperation::Prx { .. } => "prx",
            NativeOperation::CcPrx { .. } => "cc_prx",
            NativeOperation::Cz => "cz",
            NativeOperation::Move => "move",
            NativeOperation::Barrier => "barrier",
            NativeOperation::Reset => "reset",
            NativeOperation::Delay { .. } => "delay",
            NativeOperation::Measure { .. } => "measure",
            NativeOperation::Unsupported { name, .. } => name,
        }
    }

    fn into_args(self) -> Map<String, Value> {
        let value = match self {
            NativeOperation::Prx { angle_t, phase_t } => {
                json!({ "angle_t": angle_t, "phase_t": phase_t })
            }
            NativeOperation::CcPrx {
                angle_t,
                phase_t,
                feedback_key,
                feedback_qubit,
            } => json!({
                "angle_t": angle_t,
                "phase_t": phase_t,
                "feedback_key": feedback_key,
                "feedback_qubit": feedback_qubit,
            }),
            NativeOperation::Delay { duration } => json!({ "duration": duration }),
            NativeOperation::Measure { key, feedback_key } => match feedback_key {
                Some(fk) => json!({ "key": key, "feedback_key": fk }),
                None => json!({ "key": key }),
            },
            NativeOperation::Unsupported { args, .. } => return args,
            NativeOperation::Cz
            | NativeOperation::Move
            | NativeOperation::Barrier
            | NativeOperation::Reset => return Map::new(),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn from_wire(name: &str, args: &Map<String, Value>) -> IqmResult<Self> {
        let number = |key: &str| -> IqmResult<f64> {
            args.get(key).and_then(Value::as_f64).ok_or_else(|| malformed(name, key))
        };
        let string = |key: &str| -> IqmResult<String> {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| malformed(name, key))
        };

        Ok(match name {
            "prx" => NativeOperation::Prx {
                angle_t: number("angle_t")?,
                phase_t: number("phase_t")?,
            },
            "cc_prx" => NativeOperation::CcPrx {
                angle_t: number("angle_t")?,
                phase_t: number("phase_t")?,
                feedback_key: string("feedback_key")?,
                feedback_qubit: string("feedback_qubit")?,
            },
            "cz" => NativeOperation::Cz,
            "move" => NativeOperation::Move,
            "barrier" => NativeOperation::Barrier,
            "reset" => NativeOperation::Reset,
            "delay" => NativeOperation::Delay {
                duration: number("duration")?,
            },
            "measure" => NativeOperation::Measure {
                key: string("key")?,
                feedback_key: args
                    .get("feedback_key")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            other => NativeOperation::Unsupported {
                name: other.to_string(),
                args: args.clone(),
            },
        })
    }
}

fn malformed(name: &str, key: &str) -> IqmError {
    IqmError::MalformedInstruction {
        name: name.to_string(),
        reason: format!("missing or invalid argument '{key}'"),
    }
}

/// A serialized circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCircuit {
    /// Circuit name.
    pub name: String,
    /// Native instructions in program order.
    pub instructions: Vec<NativeInstruction>,
    /// Scalar metadata carried along with the circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Logical-to-physical qubit name pair in a run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleQubitMapping {
    /// Name used in the serialized circuits.
    pub logical_name: String,
    /// Device component name.
    pub physical_name: String,
}

/// Heralding applied before each shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeraldingMode {
    /// No heralding.
    #[default]
    None,
    /// Measure every qubit first and drop shots that did not start in |0>.
    Zeros,
}

/// Request to execute a batch of circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Circuits to run.
    pub circuits: Vec<WireCircuit>,
    /// Mapping from circuit qubit names to device components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qubit_mapping: Option<Vec<SingleQubitMapping>>,
    /// Calibration set to run against; the service default if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_set_id: Option<Uuid>,
    /// Number of shots.
    pub shots: u32,
    /// Reject circuits longer than this multiple of the shortest T2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_circuit_duration_over_t2: Option<f64>,
    /// Heralding mode.
    #[serde(default)]
    pub heralding_mode: HeraldingMode,
}

/// Status of a submitted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Queued, compiling or executing.
    Pending,
    /// Results available.
    Ready,
    /// Execution failed.
    Failed,
    /// Aborted before completion.
    Aborted,
}

impl RunStatus {
    /// True once no further status change is expected.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

/// Shot data of one circuit: measurement key to per-shot bit values.
pub type CircuitMeasurements = BTreeMap<String, Vec<Vec<u8>>>;

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Final or current status.
    pub status: RunStatus,
    /// Shot data, one map per circuit in submission order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Vec<CircuitMeasurements>>,
    /// Error or status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Service warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunResult {
    /// A ready result with shot data.
    pub fn ready(measurements: Vec<CircuitMeasurements>) -> Self {
        Self {
            status: RunStatus::Ready,
            measurements: Some(measurements),
            message: None,
            warnings: vec![],
        }
    }

    /// A result without data in the given status.
    pub fn with_status(status: RunStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            measurements: None,
            message: Some(message.into()),
            warnings: vec![],
        }
    }
}
