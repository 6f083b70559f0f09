//! Error types for the compilation crate.

use starling_ir::QubitId;
use thiserror::Error;

/// Errors that can occur during compilation.
///
/// Routing errors carry the offending instruction, written with component
/// names, and a snapshot of resonator occupancy at that point.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] starling_ir::IrError),

    /// No device in the property set.
    #[error("Missing device description")]
    MissingDevice,

    /// No layout in the property set, or a qubit without a mapping.
    #[error("Missing layout{}", format_qubit_context(.0))]
    MissingLayout(Option<QubitId>),

    /// Circuit too large for target.
    #[error("Circuit requires {required} qubits but target only has {available} components")]
    CircuitTooLarge { required: usize, available: usize },

    /// A logical qubit is needed both as a resonator and as a data qubit.
    #[error(
        "Invalid target for the '{gate}' operation: logical qubit {} would need to be {wanted} \
         but it is already required to be {existing}",
        .qubit.0
    )]
    ConflictingRole {
        qubit: QubitId,
        gate: String,
        wanted: &'static str,
        existing: &'static str,
    },

    /// The circuit needs more resonators than the device has.
    #[error(
        "Unsupported: the circuit requires {required} resonators but the device has {available}"
    )]
    MultipleResonatorsUnsupported { required: usize, available: usize },

    /// The circuit uses a resonator slot on a device without resonators.
    #[error("Logical qubit {} is used as a resonator but the device has none", .0.0)]
    NoResonator(QubitId),

    /// No physical qubit satisfies a logical qubit's requirements.
    #[error(
        "Cannot find a physical qubit to map logical qubit {} to. Required: {required:?}; \
         remaining qubits: {remaining:?}",
        .qubit.0
    )]
    LayoutFailed {
        qubit: QubitId,
        required: Vec<String>,
        remaining: Vec<String>,
    },

    /// A gate landed on a locus the device does not support.
    #[error("Gate '{gate}' is not natively available on locus {locus:?}")]
    NonNativeLocus { gate: String, locus: Vec<String> },

    /// A gate name the device does not know.
    #[error("Gate '{0}' is not native to the device")]
    GateNotNative(String),

    /// A MOVE into a resonator that holds another qubit's state.
    #[error(
        "Resonator {resonator} is occupied by {occupant}; cannot apply '{instruction}' \
         (occupancy: {occupancy})"
    )]
    ResonatorOccupied {
        resonator: String,
        occupant: String,
        instruction: String,
        occupancy: String,
    },

    /// An operation needs a qubit whose state is parked in a resonator.
    #[error(
        "Qubit {qubit} is parked in {resonator}; cannot apply '{instruction}' \
         (occupancy: {occupancy})"
    )]
    QubitParked {
        qubit: String,
        resonator: String,
        instruction: String,
        occupancy: String,
    },

    /// A two-qubit gate with no native realization.
    #[error("Cannot route '{instruction}': {reason} (occupancy: {occupancy})")]
    UnroutableGate {
        instruction: String,
        reason: String,
        occupancy: String,
    },

    /// A MOVE that is not of the form `[qubit, resonator]` or not native.
    #[error("Invalid MOVE '{instruction}': {reason}")]
    InvalidMove { instruction: String, reason: String },

    /// A resonator used where only qubits are allowed.
    #[error("Resonator {resonator} cannot be the target of '{instruction}'")]
    ResonatorMisuse {
        resonator: String,
        instruction: String,
    },

    /// An operation inside a MOVE sandwich.
    #[error(
        "Qubit {qubit} is inside a MOVE sandwich with {resonator}; '{instruction}' is not \
         allowed there"
    )]
    MoveSandwich {
        qubit: String,
        resonator: String,
        instruction: String,
    },

    /// A MOVE left open at the end of the circuit.
    #[error("MOVE of {qubit} into {resonator} is never closed")]
    UnclosedMove { qubit: String, resonator: String },

    /// Invalid pass configuration.
    #[error("Invalid pass configuration: {0}")]
    InvalidConfiguration(String),
}

#[allow(clippy::ref_option)]
fn format_qubit_context(qubit: &Option<QubitId>) -> String {
    match qubit {
        Some(q) => format!(" for logical qubit {}", q.0),
        None => String::new(),
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
