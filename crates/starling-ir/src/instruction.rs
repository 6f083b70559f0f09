//! Circuit instructions combining gates with operands.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IrError, IrResult};
use crate::gate::{ClassicalCondition, Gate, StandardGate};
use crate::qubit::{ClbitId, QubitId};

/// Time unit of a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Milliseconds.
    Ms,
    /// Microseconds.
    Us,
    /// Nanoseconds.
    Ns,
    /// Picoseconds.
    Ps,
    /// Device cycles, taken as one nanosecond each.
    Dt,
}

impl TimeUnit {
    /// Number of this unit in one second.
    pub fn per_second(self) -> f64 {
        match self {
            TimeUnit::S => 1.0,
            TimeUnit::Ms => 1e3,
            TimeUnit::Us => 1e6,
            TimeUnit::Ns | TimeUnit::Dt => 1e9,
            TimeUnit::Ps => 1e12,
        }
    }

    /// Convert a duration in this unit to seconds.
    pub fn to_seconds(self, duration: f64) -> f64 {
        duration / self.per_second()
    }

    /// Unit suffix as written in OpenQASM-style sources.
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Dt => "dt",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(Gate),
    /// Measurement operation.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (synchronization point).
    Barrier,
    /// Delay instruction.
    Delay {
        /// Duration, in `unit`.
        duration: f64,
        /// Unit of `duration`.
        unit: TimeUnit,
    },
}

/// Role of an instruction as seen by layout and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Any single-qubit gate other than identity.
    SingleQubitRotation,
    /// Two-qubit entangling gate (cz, cx, or a custom two-qubit gate).
    TwoQubitInteraction,
    /// MOVE between a qubit and a resonator.
    StateTransfer,
    /// Measurement.
    Measurement,
    /// Barrier.
    Barrier,
    /// Delay.
    Delay,
    /// Reset.
    Reset,
    /// Identity gate.
    Identity,
    /// Anything wider than two qubits.
    Other,
}

impl OperationKind {
    /// True when the instruction needs each qubit to hold its own state.
    ///
    /// Barriers and identities are transparent. Two-qubit gates and MOVEs can
    /// act on a state parked in a resonator.
    pub fn needs_own_state(self) -> bool {
        matches!(
            self,
            OperationKind::SingleQubitRotation
                | OperationKind::Measurement
                | OperationKind::Reset
                | OperationKind::Delay
                | OperationKind::Other
        )
    }
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on (for measure).
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a MOVE between `qubit` and `resonator`.
    pub fn move_gate(qubit: QubitId, resonator: QubitId) -> Self {
        Self::two_qubit_gate(StandardGate::Move, qubit, resonator)
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a multi-qubit measurement instruction.
    ///
    /// Returns an error if the number of qubits and classical bits do not match.
    pub fn measure_many(
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        let qubits: Vec<_> = qubits.into_iter().collect();
        let clbits: Vec<_> = clbits.into_iter().collect();
        if qubits.len() != clbits.len() {
            return Err(IrError::MeasurementShape {
                qubits: qubits.len(),
                clbits: clbits.len(),
            });
        }
        Ok(Self {
            kind: InstructionKind::Measure,
            qubits,
            clbits,
        })
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a delay instruction.
    pub fn delay(qubits: impl IntoIterator<Item = QubitId>, duration: f64, unit: TimeUnit) -> Self {
        Self {
            kind: InstructionKind::Delay { duration, unit },
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Check if this is a MOVE gate.
    pub fn is_move(&self) -> bool {
        self.as_gate().is_some_and(Gate::is_move)
    }

    /// Get the gate if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Classical condition of a gate instruction, if any.
    pub fn condition(&self) -> Option<&ClassicalCondition> {
        self.as_gate().and_then(|g| g.condition.as_ref())
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
        }
    }

    /// Classify the instruction for layout and routing.
    pub fn operation_kind(&self) -> OperationKind {
        match &self.kind {
            InstructionKind::Measure => OperationKind::Measurement,
            InstructionKind::Reset => OperationKind::Reset,
            InstructionKind::Barrier => OperationKind::Barrier,
            InstructionKind::Delay { .. } => OperationKind::Delay,
            InstructionKind::Gate(g) => match (g.as_standard(), g.num_qubits()) {
                (Some(StandardGate::I), _) => OperationKind::Identity,
                (Some(StandardGate::Move), _) => OperationKind::StateTransfer,
                (_, 1) => OperationKind::SingleQubitRotation,
                (_, 2) => OperationKind::TwoQubitInteraction,
                _ => OperationKind::Other,
            },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let InstructionKind::Delay { duration, unit } = &self.kind {
            write!(f, "[{duration}{unit}]")?;
        }
        let qubits: Vec<String> = self.qubits.iter().map(ToString::to_string).collect();
        write!(f, " {}", qubits.join(", "))?;
        if !self.clbits.is_empty() {
            let clbits: Vec<String> = self.clbits.iter().map(ToString::to_string).collect();
            write!(f, " -> {}", clbits.join(", "))?;
        }
        Ok(())
    }
}
