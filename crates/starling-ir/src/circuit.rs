//! High-level circuit builder API.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IrError, IrResult};
use crate::gate::{ClassicalCondition, ConditionTarget, Gate, StandardGate};
use crate::instruction::{Instruction, InstructionKind, TimeUnit};
use crate::parameter::ParameterExpression;
use crate::qubit::{ClassicalRegister, Clbit, ClbitId, QubitId};

/// Abstraction level of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CircuitLevel {
    /// Qubits are virtual; no device mapping applied.
    #[default]
    Logical,
    /// Qubit `i` is component `i` of the target device.
    Physical,
}

/// A quantum circuit.
///
/// Instructions are kept in program order. Every instruction passing through
/// [`Circuit::apply`] is checked for arity, operand bounds and duplicate
/// qubits, so passes can rely on well-formed operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Number of qubits (virtual or physical, depending on `level`).
    num_qubits: u32,
    /// Classical bits in the circuit.
    clbits: Vec<Clbit>,
    /// Classical registers in creation order.
    cregs: Vec<ClassicalRegister>,
    /// Program-ordered instructions.
    instructions: Vec<Instruction>,
    /// Logical or physical.
    level: CircuitLevel,
    /// Free-form metadata attached by the caller.
    metadata: Map<String, Value>,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_qubits: 0,
            clbits: vec![],
            cregs: vec![],
            instructions: vec![],
            level: CircuitLevel::Logical,
            metadata: Map::new(),
        }
    }

    /// Create a circuit with qubits and a single classical register `c`.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        let mut circuit = Self::new(name);
        circuit.num_qubits = num_qubits;
        if num_clbits > 0 {
            circuit.push_creg("c", num_clbits);
        }
        circuit
    }

    /// Copy name, classical bits, registers and metadata onto an empty
    /// circuit of `num_qubits` qubits.
    pub fn empty_like(&self, num_qubits: u32) -> Self {
        Self {
            name: self.name.clone(),
            num_qubits,
            clbits: self.clbits.clone(),
            cregs: self.cregs.clone(),
            instructions: vec![],
            level: self.level,
            metadata: self.metadata.clone(),
        }
    }

    /// Add qubits, returning their ids.
    pub fn add_qubits(&mut self, count: u32) -> Vec<QubitId> {
        let start = self.num_qubits;
        self.num_qubits += count;
        (start..self.num_qubits).map(QubitId).collect()
    }

    /// Add a single classical bit outside any register.
    pub fn add_clbit(&mut self) -> ClbitId {
        let id = ClbitId(self.clbits.len() as u32);
        self.clbits.push(Clbit::new(id));
        id
    }

    /// Add a classical register with multiple bits.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> IrResult<Vec<ClbitId>> {
        let name = name.into();
        if self.cregs.iter().any(|r| r.name == name) {
            return Err(IrError::DuplicateRegister(name));
        }
        Ok(self.push_creg(&name, size))
    }

    fn push_creg(&mut self, name: &str, size: u32) -> Vec<ClbitId> {
        let mut ids = Vec::with_capacity(size as usize);
        for i in 0..size {
            let id = ClbitId(self.clbits.len() as u32);
            self.clbits.push(Clbit::with_register(id, name, i));
            ids.push(id);
        }
        self.cregs.push(ClassicalRegister::new(name, size));
        ids
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply identity gate.
    pub fn id(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::I, [qubit])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::X, [qubit])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::Y, [qubit])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::Z, [qubit])
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::H, [qubit])
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::SX, [qubit])
    }

    /// Apply RX rotation.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.gate(StandardGate::Rx(theta.into()), [qubit])
    }

    /// Apply RY rotation.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.gate(StandardGate::Ry(theta.into()), [qubit])
    }

    /// Apply RZ rotation.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.gate(StandardGate::Rz(theta.into()), [qubit])
    }

    /// Apply the phased rotation R(θ, φ).
    pub fn r(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.gate(StandardGate::R(theta.into(), phi.into()), [qubit])
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::CX, [control, target])
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::CZ, [q1, q2])
    }

    /// Apply a MOVE between a qubit and a resonator.
    pub fn move_gate(&mut self, qubit: QubitId, resonator: QubitId) -> IrResult<&mut Self> {
        self.gate(StandardGate::Move, [qubit, resonator])
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Apply an arbitrary gate.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.apply(Instruction::gate(gate, qubits))
    }

    /// Apply a gate that only fires when `condition` holds.
    pub fn gate_if(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
        condition: ClassicalCondition,
    ) -> IrResult<&mut Self> {
        let gate = gate.into().with_condition(condition);
        self.apply(Instruction::gate(gate, qubits))
    }

    /// Measure a qubit into a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.apply(Instruction::measure(qubit, clbit))
    }

    /// Reset a qubit.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::reset(qubit))
    }

    /// Apply a barrier on the given qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.apply(Instruction::barrier(qubits))
    }

    /// Apply a barrier on all qubits.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        let qubits: Vec<_> = (0..self.num_qubits).map(QubitId).collect();
        self.barrier(qubits)
    }

    /// Idle the given qubits.
    pub fn delay(
        &mut self,
        qubits: impl IntoIterator<Item = QubitId>,
        duration: f64,
        unit: TimeUnit,
    ) -> IrResult<&mut Self> {
        self.apply(Instruction::delay(qubits, duration, unit))
    }

    /// Append a validated instruction.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.check(&instruction)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    fn check(&self, instruction: &Instruction) -> IrResult<()> {
        let gate_name = instruction.as_gate().map(|g| g.name().to_string());

        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let expected = gate.num_qubits();
                let got = instruction.qubits.len() as u32;
                if expected != got {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: gate.name().to_string(),
                        expected,
                        got,
                    });
                }
                if let Some(condition) = &gate.condition {
                    self.check_condition(condition)?;
                }
            }
            InstructionKind::Measure => {
                if instruction.qubits.len() != instruction.clbits.len() {
                    return Err(IrError::MeasurementShape {
                        qubits: instruction.qubits.len(),
                        clbits: instruction.clbits.len(),
                    });
                }
            }
            InstructionKind::Delay { duration, .. } => {
                if !duration.is_finite() || *duration < 0.0 {
                    return Err(IrError::InvalidDuration(*duration));
                }
            }
            InstructionKind::Reset | InstructionKind::Barrier => {}
        }

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if qubit.0 >= self.num_qubits {
                return Err(IrError::QubitNotFound {
                    qubit,
                    gate_name: gate_name.clone(),
                });
            }
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    gate_name: gate_name.clone(),
                });
            }
        }

        for &clbit in &instruction.clbits {
            if clbit.0 as usize >= self.clbits.len() {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    gate_name: gate_name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_condition(&self, condition: &ClassicalCondition) -> IrResult<()> {
        match &condition.target {
            ConditionTarget::Clbit(clbit) if clbit.0 as usize >= self.clbits.len() => {
                Err(IrError::ClbitNotFound {
                    clbit: *clbit,
                    gate_name: None,
                })
            }
            ConditionTarget::Register(name) if !self.cregs.iter().any(|r| &r.name == name) => {
                Err(IrError::RegisterNotFound(name.clone()))
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits as usize
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> usize {
        self.clbits.len()
    }

    /// Get the classical bits in the circuit.
    pub fn clbits(&self) -> &[Clbit] {
        &self.clbits
    }

    /// Classical registers in creation order.
    pub fn cregs(&self) -> &[ClassicalRegister] {
        &self.cregs
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Take the instructions out, leaving the circuit empty.
    pub fn take_instructions(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.instructions)
    }

    /// Replace all instructions, validating each.
    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) -> IrResult<()> {
        for inst in &instructions {
            self.check(inst)?;
        }
        self.instructions = instructions;
        Ok(())
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the circuit has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Abstraction level.
    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    /// Set the abstraction level.
    pub fn set_level(&mut self, level: CircuitLevel) {
        self.level = level;
    }

    /// Circuit metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Mutable circuit metadata.
    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Register index, register and bit position of a classical bit.
    pub fn register_of(&self, clbit: ClbitId) -> Option<(usize, &ClassicalRegister, u32)> {
        let bit = self.clbits.get(clbit.0 as usize)?;
        let (name, index) = (bit.register.as_ref()?, bit.index?);
        self.cregs
            .iter()
            .enumerate()
            .find(|(_, r)| &r.name == name)
            .map(|(i, r)| (i, r, index))
    }

    /// The classical bit at `index` of the register at `creg_idx`.
    pub fn clbit_at(&self, creg_idx: usize, index: u32) -> Option<ClbitId> {
        let name = &self.cregs.get(creg_idx)?.name;
        self.clbits
            .iter()
            .find(|b| b.register.as_ref() == Some(name) && b.index == Some(index))
            .map(|b| b.id)
    }

    /// Qubits touched by at least one instruction, ascending.
    pub fn used_qubits(&self) -> Vec<QubitId> {
        let mut used: Vec<QubitId> = self
            .instructions
            .iter()
            .flat_map(|i| i.qubits.iter().copied())
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        used.sort_unstable();
        used
    }
}
