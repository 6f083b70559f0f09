//! Quantum gate types.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::parameter::ParameterExpression;
use crate::qubit::ClbitId;

/// Phase picked up by the MOVE gate outside the |01>, |10> swap.
///
/// The value is implementation-defined on hardware. A MOVE pair with nothing
/// acting on the qubit in between cancels it.
pub const MOVE_PHASE: f64 = 0.7;

/// Standard gates with known semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,
    /// Hadamard gate.
    H,
    /// sqrt(X) gate.
    SX,
    /// Rotation around X axis.
    Rx(ParameterExpression),
    /// Rotation around Y axis.
    Ry(ParameterExpression),
    /// Rotation around Z axis.
    Rz(ParameterExpression),
    /// Phased X rotation R(θ, φ) = RZ(φ) · RX(θ) · RZ(-φ). Native on IQM as `prx`.
    R(ParameterExpression, ParameterExpression),
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Z gate.
    CZ,
    /// State transfer between a qubit and a computational resonator.
    ///
    /// The locus is always `[qubit, resonator]`. Direction is implicit: the
    /// first MOVE parks the qubit state in the resonator, the next MOVE on the
    /// same pair brings it back.
    Move,
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::SX => "sx",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::R(_, _) => "r",
            StandardGate::CX => "cx",
            StandardGate::CZ => "cz",
            StandardGate::Move => "move",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::CX | StandardGate::CZ | StandardGate::Move => 2,
            _ => 1,
        }
    }

    /// Get parameters of this gate.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p) | StandardGate::Ry(p) | StandardGate::Rz(p) => vec![p],
            StandardGate::R(theta, phi) => vec![theta, phi],
            _ => vec![],
        }
    }

    /// Check if this gate has unbound parameters.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }
}

/// Unitary of the MOVE gate, row-major over the basis |qubit, resonator>.
///
/// Only meaningful in the zero/one-excitation subspace.
pub fn move_unitary() -> [Complex64; 16] {
    let zero = Complex64::new(0.0, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let ph = Complex64::from_polar(1.0, MOVE_PHASE);
    [
        one, zero, zero, zero, //
        zero, zero, ph, zero, //
        zero, ph.conj(), zero, zero, //
        zero, zero, zero, one,
    ]
}

/// A quantum gate, either standard or custom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    /// A standard gate with known semantics.
    Standard(StandardGate),
    /// A custom user-defined gate.
    Custom(CustomGate),
}

impl GateKind {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            GateKind::Standard(g) => g.name(),
            GateKind::Custom(g) => &g.name,
        }
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            GateKind::Standard(g) => g.num_qubits(),
            GateKind::Custom(g) => g.num_qubits,
        }
    }
}

/// A gate outside the standard set.
///
/// Custom gates are only ever serialized through the pass-through path, with
/// their parameters named positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// The name of the gate.
    pub name: String,
    /// The number of qubits it operates on.
    pub num_qubits: u32,
    /// Parameters of the gate.
    pub params: Vec<ParameterExpression>,
    /// Optional unitary matrix (row-major, 2^n × 2^n).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<Complex64>>,
}

impl CustomGate {
    /// Create a new custom gate.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
            matrix: None,
        }
    }

    /// Add parameters to the gate.
    #[must_use]
    pub fn with_params(mut self, params: Vec<ParameterExpression>) -> Self {
        self.params = params;
        self
    }

    /// Attach a unitary matrix, checking its size against the arity.
    pub fn with_matrix(mut self, matrix: Vec<Complex64>) -> IrResult<Self> {
        let dim = 1usize << self.num_qubits;
        if matrix.len() != dim * dim {
            return Err(IrError::QubitCountMismatch {
                gate_name: self.name,
                expected: self.num_qubits,
                got: matrix.len().checked_ilog2().unwrap_or(0) / 2,
            });
        }
        self.matrix = Some(matrix);
        Ok(self)
    }
}

/// What a classical condition reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionTarget {
    /// A single classical bit.
    Clbit(ClbitId),
    /// A whole classical register, compared as an integer.
    Register(String),
}

/// Classical condition for conditional gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicalCondition {
    /// The bit or register being tested.
    pub target: ConditionTarget,
    /// The value to compare against.
    pub value: u64,
}

impl ClassicalCondition {
    /// Condition on a single classical bit.
    pub fn on_clbit(clbit: ClbitId, value: u64) -> Self {
        Self {
            target: ConditionTarget::Clbit(clbit),
            value,
        }
    }

    /// Condition on a named register.
    pub fn on_register(register: impl Into<String>, value: u64) -> Self {
        Self {
            target: ConditionTarget::Register(register.into()),
            value,
        }
    }
}

/// A gate with associated metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// The kind of gate.
    pub kind: GateKind,
    /// Optional label for the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional classical condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ClassicalCondition>,
}

impl Gate {
    /// Create a new gate from a standard gate.
    pub fn standard(gate: StandardGate) -> Self {
        Self {
            kind: GateKind::Standard(gate),
            label: None,
            condition: None,
        }
    }

    /// Create a new gate from a custom gate.
    pub fn custom(gate: CustomGate) -> Self {
        Self {
            kind: GateKind::Custom(gate),
            label: None,
            condition: None,
        }
    }

    /// Add a label to the gate.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a classical condition to the gate.
    #[must_use]
    pub fn with_condition(mut self, condition: ClassicalCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Get the name of this gate.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.kind.num_qubits()
    }

    /// The standard gate, if this is one.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        match &self.kind {
            GateKind::Standard(g) => Some(g),
            GateKind::Custom(_) => None,
        }
    }

    /// True for a MOVE gate.
    pub fn is_move(&self) -> bool {
        matches!(self.kind, GateKind::Standard(StandardGate::Move))
    }
}

impl From<StandardGate> for Gate {
    fn from(gate: StandardGate) -> Self {
        Gate::standard(gate)
    }
}

impl From<CustomGate> for Gate {
    fn from(gate: CustomGate) -> Self {
        Gate::custom(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_standard_gate_properties() {
        assert_eq!(StandardGate::H.num_qubits(), 1);
        assert_eq!(StandardGate::CZ.num_qubits(), 2);
        assert_eq!(StandardGate::Move.num_qubits(), 2);
        assert_eq!(StandardGate::Move.name(), "move");

        assert!(!StandardGate::Rx(ParameterExpression::constant(PI)).is_parameterized());
        assert!(
            StandardGate::R(0.5.into(), ParameterExpression::symbol("phi")).is_parameterized()
        );
    }

    #[test]
    fn test_conditional_gate() {
        let g = Gate::standard(StandardGate::X)
            .with_condition(ClassicalCondition::on_clbit(ClbitId(2), 1));
        assert_eq!(
            g.condition.as_ref().map(|c| &c.target),
            Some(&ConditionTarget::Clbit(ClbitId(2)))
        );
        assert!(!g.is_move());
    }

    #[test]
    fn test_custom_gate_matrix_size() {
        let ok = CustomGate::new("u2q", 2).with_matrix(vec![Complex64::new(0.0, 0.0); 16]);
        assert!(ok.is_ok());

        let bad = CustomGate::new("u2q", 2).with_matrix(vec![Complex64::new(0.0, 0.0); 4]);
        assert!(matches!(bad, Err(IrError::QubitCountMismatch { .. })));
    }

    #[test]
    fn test_move_unitary_is_unitary() {
        let m = move_unitary();
        for i in 0..4 {
            for j in 0..4 {
                let dot: Complex64 = (0..4).map(|k| m[i * 4 + k] * m[j * 4 + k].conj()).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot.re - expected).abs() < 1e-12);
                assert!(dot.im.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_move_pair_cancels_phase() {
        let m = move_unitary();
        // (M·M)[1][1] = m[1][2] * m[2][1] = e^{i0.7} e^{-i0.7}
        let v = m[4 + 2] * m[2 * 4 + 1];
        assert!((v.re - 1.0).abs() < 1e-12);
    }
}
