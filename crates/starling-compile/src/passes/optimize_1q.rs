//! Single-qubit gate merging for the `prx`/`cz` gate set.
//!
//! Every run of single-qubit gates on a qubit collapses to at most one
//! `R(θ, φ)` followed by a Z rotation. Z rotations are never emitted where
//! they can be avoided: they commute with `cz`, a later `R(θ, φ)` absorbs one
//! as a phase shift (`R(θ, φ) · RZ(λ) = RZ(λ) · R(θ, φ - λ)`), and one right
//! before a measurement has no effect. What is left at the end of the circuit
//! is emitted as `R(-π, 0)` then `R(π, λ/2)`, which together equal `RZ(λ)`.

use std::f64::consts::{FRAC_PI_2, PI};

use rustc_hash::{FxHashMap, FxHashSet};
use starling_ir::{
    Circuit, GateKind, Instruction, InstructionKind, OperationKind, ParameterExpression, QubitId,
    StandardGate,
};
use tracing::debug;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;
use crate::unitary::Unitary2x2;

const EPSILON: f64 = 1e-10;

/// Merges single-qubit gates and tracks Z rotations virtually.
///
/// Runs on circuits whose single-qubit gates have bound parameters; gates
/// with symbolic parameters, conditioned gates and gates on
/// resonators are left where they are. Z rotations are carried through
/// `cz`, delays and measurements, and made real before a MOVE or any other
/// gate that would not commute with them.
pub struct Optimize1qDecomposition;

impl Pass for Optimize1qDecomposition {
    fn name(&self) -> &'static str {
        "Optimize1qDecomposition"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let resonators = match &properties.device {
            Some(device) => device
                .computational_resonators
                .iter()
                .filter_map(|r| device.component_index(r))
                .collect(),
            None => FxHashSet::default(),
        };

        let before = circuit.len();
        let mut frames = Frames::new(resonators);
        for inst in circuit.take_instructions() {
            frames.push(inst);
        }
        circuit.set_instructions(frames.finish())?;
        debug!("Optimize1qDecomposition: {before} -> {} instructions", circuit.len());
        Ok(())
    }

    fn should_run(&self, circuit: &Circuit, _properties: &PropertySet) -> bool {
        !circuit.is_empty()
    }
}

#[derive(Debug, Default)]
struct QubitFrame {
    /// Merged gates not yet emitted, as one matrix.
    pending: Option<Unitary2x2>,
    /// Z rotation owed by everything emitted so far.
    rz: f64,
    ends_in_measure: bool,
}

struct Frames {
    resonators: FxHashSet<QubitId>,
    frames: FxHashMap<QubitId, QubitFrame>,
    out: Vec<Instruction>,
}

impl Frames {
    fn new(resonators: FxHashSet<QubitId>) -> Self {
        Self {
            resonators,
            frames: FxHashMap::default(),
            out: Vec::new(),
        }
    }

    fn push(&mut self, mut inst: Instruction) {
        if let Some(u) = self.mergeable(&inst) {
            let frame = self.frames.entry(inst.qubits[0]).or_default();
            frame.pending = Some(frame.pending.map_or(u, |p| u * p));
            frame.ends_in_measure = false;
            return;
        }

        for &q in &inst.qubits {
            self.emit_pending(q);
        }
        match inst.operation_kind() {
            OperationKind::Measurement
            | OperationKind::Delay
            | OperationKind::Barrier
            | OperationKind::Identity => {}
            OperationKind::TwoQubitInteraction if is_cz(&inst) => {}
            OperationKind::Reset => {
                for q in &inst.qubits {
                    self.frames.entry(*q).or_default().rz = 0.0;
                }
            }
            OperationKind::SingleQubitRotation if self.shift_phase(&mut inst) => {}
            _ => {
                for &q in &inst.qubits {
                    self.emit_frame(q);
                }
            }
        }

        let measured = inst.is_measure();
        for q in &inst.qubits {
            self.frames.entry(*q).or_default().ends_in_measure = measured;
        }
        self.out.push(inst);
    }

    fn finish(mut self) -> Vec<Instruction> {
        let mut qubits: Vec<QubitId> = self.frames.keys().copied().collect();
        qubits.sort_unstable();
        for q in qubits {
            self.emit_pending(q);
            if !self.frames.get(&q).is_some_and(|f| f.ends_in_measure) {
                self.emit_frame(q);
            }
        }
        self.out
    }

    /// Matrix of an unconditioned single-qubit gate that may be merged.
    fn mergeable(&self, inst: &Instruction) -> Option<Unitary2x2> {
        if inst.qubits.len() != 1 || self.resonators.contains(&inst.qubits[0]) {
            return None;
        }
        let gate = inst.as_gate()?;
        if gate.condition.is_some() {
            return None;
        }
        Unitary2x2::of(gate.as_standard()?)
    }

    /// Rewrite an unmerged `R` so it sees the qubit's pending Z rotation.
    fn shift_phase(&self, inst: &mut Instruction) -> bool {
        let rz = self.frames.get(&inst.qubits[0]).map_or(0.0, |f| f.rz);
        let InstructionKind::Gate(gate) = &mut inst.kind else {
            return false;
        };
        let GateKind::Standard(StandardGate::R(_, phi)) = &mut gate.kind else {
            return false;
        };
        match phi.as_f64() {
            Some(p) => {
                *phi = ParameterExpression::constant(p - rz);
                true
            }
            None => false,
        }
    }

    /// Emit the merged gates of `qubit` as one `R`, keeping their Z part
    /// virtual.
    fn emit_pending(&mut self, qubit: QubitId) {
        let Some(frame) = self.frames.get_mut(&qubit) else {
            return;
        };
        let Some(u) = frame.pending.take() else {
            return;
        };
        // U = RZ(α) · RY(β) · RZ(γ) = RZ(α + γ) · R(β, π/2 - γ)
        let (alpha, beta, gamma) = u.zyz_angles();
        if beta > EPSILON {
            let phi = wrap(FRAC_PI_2 - gamma - frame.rz);
            self.out.push(Instruction::single_qubit_gate(
                StandardGate::R(beta.into(), phi.into()),
                qubit,
            ));
        }
        frame.rz = wrap(frame.rz + alpha + gamma);
    }

    /// Make the pending Z rotation of `qubit` real.
    fn emit_frame(&mut self, qubit: QubitId) {
        let Some(frame) = self.frames.get_mut(&qubit) else {
            return;
        };
        if frame.rz.abs() > EPSILON {
            self.out.push(Instruction::single_qubit_gate(
                StandardGate::R((-PI).into(), 0.0.into()),
                qubit,
            ));
            self.out.push(Instruction::single_qubit_gate(
                StandardGate::R(PI.into(), (frame.rz / 2.0).into()),
                qubit,
            ));
        }
        frame.rz = 0.0;
    }
}

fn is_cz(inst: &Instruction) -> bool {
    inst.as_gate()
        .and_then(|g| g.as_standard())
        .is_some_and(|g| *g == StandardGate::CZ)
}

/// Angle in `(-π, π]`.
fn wrap(angle: f64) -> f64 {
    let a = angle.rem_euclid(2.0 * PI);
    if a > PI { a - 2.0 * PI } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starling_ir::device::deneb;
    use starling_ir::{ClassicalCondition, ClbitId, Gate};

    fn optimize(circuit: &mut Circuit) {
        let mut props = PropertySet::new().with_device(deneb());
        Optimize1qDecomposition.run(circuit, &mut props).unwrap();
    }

    fn phis(circuit: &Circuit) -> Vec<f64> {
        circuit
            .instructions()
            .iter()
            .filter_map(|i| match i.as_gate()?.as_standard()? {
                StandardGate::R(_, phi) => phi.as_f64(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_run_collapses_to_equivalent_gates() {
        let mut circuit = Circuit::with_size("run", 1, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.rz(0.3, QubitId(0)).unwrap();
        circuit.sx(QubitId(0)).unwrap();
        circuit.ry(1.1, QubitId(0)).unwrap();
        circuit.x(QubitId(0)).unwrap();
        let expected = Unitary2x2::product(circuit.instructions()).unwrap();

        optimize(&mut circuit);
        assert!(circuit.len() <= 3);
        assert!(circuit.instructions().iter().all(|i| i.name() == "r"));
        let got = Unitary2x2::product(circuit.instructions()).unwrap();
        assert!(got.equals_up_to_phase(&expected));
    }

    #[test]
    fn test_inverse_gates_cancel() {
        let mut circuit = Circuit::with_size("hh", 1, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.h(QubitId(0)).unwrap();
        optimize(&mut circuit);
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_trailing_z_emitted_as_two_rotations() {
        let mut circuit = Circuit::with_size("z", 1, 0);
        circuit.rz(0.7, QubitId(0)).unwrap();
        optimize(&mut circuit);
        assert_eq!(circuit.len(), 2);
        let got = Unitary2x2::product(circuit.instructions()).unwrap();
        assert!(got.equals_up_to_phase(&Unitary2x2::rz(0.7)));
    }

    #[test]
    fn test_z_before_measurement_dropped() {
        let mut circuit = Circuit::with_size("m", 1, 1);
        circuit.rz(0.7, QubitId(0)).unwrap();
        circuit.z(QubitId(0)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        optimize(&mut circuit);
        assert_eq!(circuit.len(), 1);
        assert!(circuit.instructions()[0].is_measure());
    }

    #[test]
    fn test_z_commutes_through_cz() {
        let mut circuit = Circuit::with_size("cz", 2, 2);
        circuit.rz(0.7, QubitId(0)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit.measure(QubitId(1), ClbitId(1)).unwrap();
        optimize(&mut circuit);
        let names: Vec<&str> = circuit.instructions().iter().map(Instruction::name).collect();
        assert_eq!(names, vec!["cz", "measure", "measure"]);
    }

    #[test]
    fn test_rotation_absorbs_earlier_z() {
        // R(θ, φ) · RZ(λ) is emitted as R(θ, φ - λ) with RZ(λ) left over.
        let mut circuit = Circuit::with_size("absorb", 2, 1);
        circuit.rz(0.5, QubitId(0)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        circuit.r(1.2, 0.3, QubitId(0)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        optimize(&mut circuit);

        let names: Vec<&str> = circuit.instructions().iter().map(Instruction::name).collect();
        assert_eq!(names, vec!["cz", "r", "measure"]);
        let r = Unitary2x2::product(&circuit.instructions()[1..2]).unwrap();
        let expected = Unitary2x2::prx(1.2, 0.3) * Unitary2x2::rz(0.5);
        assert!((Unitary2x2::rz(0.5) * r).equals_up_to_phase(&expected));
    }

    #[test]
    fn test_conditioned_rotation_shifted() {
        let mut circuit = Circuit::with_size("cc", 2, 2);
        circuit.rz(0.5, QubitId(0)).unwrap();
        circuit.measure(QubitId(1), ClbitId(0)).unwrap();
        circuit
            .gate_if(
                Gate::standard(StandardGate::R(PI.into(), 0.0.into())),
                [QubitId(0)],
                ClassicalCondition::on_clbit(ClbitId(0), 1),
            )
            .unwrap();
        circuit.measure(QubitId(0), ClbitId(1)).unwrap();
        optimize(&mut circuit);

        assert_eq!(circuit.len(), 3);
        assert!(circuit.instructions()[1].condition().is_some());
        assert_eq!(phis(&circuit).len(), 1);
        assert!((phis(&circuit)[0] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_move_makes_z_real() {
        let r = QubitId(6);
        let mut circuit = Circuit::with_size("move", 7, 0);
        circuit.rz(0.4, QubitId(0)).unwrap();
        circuit.move_gate(QubitId(0), r).unwrap();
        circuit.cz(QubitId(1), r).unwrap();
        circuit.move_gate(QubitId(0), r).unwrap();
        optimize(&mut circuit);

        let names: Vec<&str> = circuit.instructions().iter().map(Instruction::name).collect();
        assert_eq!(names, vec!["r", "r", "move", "cz", "move"]);
        let z = Unitary2x2::product(&circuit.instructions()[..2]).unwrap();
        assert!(z.equals_up_to_phase(&Unitary2x2::rz(0.4)));
    }

    #[test]
    fn test_barrier_separates_runs() {
        let mut circuit = Circuit::with_size("b", 1, 0);
        circuit.x(QubitId(0)).unwrap();
        circuit.barrier([QubitId(0)]).unwrap();
        circuit.x(QubitId(0)).unwrap();
        optimize(&mut circuit);
        let names: Vec<&str> = circuit.instructions().iter().map(Instruction::name).collect();
        assert_eq!(names, vec!["r", "barrier", "r"]);
    }

    #[test]
    fn test_symbolic_gate_left_in_place() {
        let mut circuit = Circuit::with_size("sym", 1, 0);
        circuit.rx("theta", QubitId(0)).unwrap();
        circuit.x(QubitId(0)).unwrap();
        optimize(&mut circuit);
        assert_eq!(circuit.instructions()[0].name(), "rx");
        assert_eq!(circuit.len(), 2);
    }

    #[test]
    fn test_wrap() {
        assert!((wrap(2.5 * PI) - FRAC_PI_2).abs() < 1e-12);
        assert!((wrap(-0.5) + 0.5).abs() < 1e-12);
        assert!(wrap(2.0 * PI).abs() < 1e-12);
    }
}
