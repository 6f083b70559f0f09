//! Translation to the IQM native gate set.

use std::f64::consts::PI;

use starling_ir::{
    Circuit, Gate, GateKind, Instruction, InstructionKind, ParameterExpression, QubitId,
    StandardGate,
};
use tracing::debug;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Rewrites standard gates into `R` (native `prx`), `CZ` and `MOVE`.
///
/// Sequences are listed in application order. A classical condition on the
/// source gate is copied onto every gate it expands to. Custom gates pass
/// through untouched and are left for validation to accept or reject.
pub struct NativeTranslation;

impl Pass for NativeTranslation {
    fn name(&self) -> &'static str {
        "NativeTranslation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut Circuit, _properties: &mut PropertySet) -> CompileResult<()> {
        let before = circuit.len();
        let mut translated = Vec::with_capacity(before);
        for inst in circuit.take_instructions() {
            translate(inst, &mut translated);
        }
        circuit.set_instructions(translated)?;
        debug!("NativeTranslation: {before} -> {} instructions", circuit.len());
        Ok(())
    }
}

fn translate(inst: Instruction, out: &mut Vec<Instruction>) {
    let (std_gate, condition) = match &inst.kind {
        InstructionKind::Gate(Gate {
            kind: GateKind::Standard(g),
            condition,
            ..
        }) => (g.clone(), condition.clone()),
        _ => {
            out.push(inst);
            return;
        }
    };
    let emit = |g: StandardGate, qubits: &[QubitId]| {
        let gate = match &condition {
            Some(c) => Gate::standard(g).with_condition(c.clone()),
            None => Gate::standard(g),
        };
        Instruction::gate(gate, qubits.iter().copied())
    };

    match std_gate {
        StandardGate::I => {}
        StandardGate::R(..) | StandardGate::CZ | StandardGate::Move => out.push(inst),
        StandardGate::CX => {
            let (control, target) = (inst.qubits[0], inst.qubits[1]);
            out.extend(hadamard().into_iter().map(|g| emit(g, &[target])));
            out.push(emit(StandardGate::CZ, &[control, target]));
            out.extend(hadamard().into_iter().map(|g| emit(g, &[target])));
        }
        other => {
            let q0 = inst.qubits[0];
            out.extend(single_qubit(&other).into_iter().map(|g| emit(g, &[q0])));
        }
    }
}

fn prx(theta: impl Into<ParameterExpression>, phi: impl Into<ParameterExpression>) -> StandardGate {
    StandardGate::R(theta.into(), phi.into())
}

fn hadamard() -> [StandardGate; 2] {
    [prx(PI / 2.0, PI / 2.0), prx(PI, 0.0)]
}

/// PRX sequence for a single-qubit standard gate, in application order.
fn single_qubit(gate: &StandardGate) -> Vec<StandardGate> {
    match gate {
        StandardGate::X => vec![prx(PI, 0.0)],
        StandardGate::Y => vec![prx(PI, PI / 2.0)],
        StandardGate::SX => vec![prx(PI / 2.0, 0.0)],
        StandardGate::Rx(theta) => vec![prx(theta.clone(), 0.0)],
        StandardGate::Ry(theta) => vec![prx(theta.clone(), PI / 2.0)],
        StandardGate::H => hadamard().to_vec(),
        // PRX(π, φ) · PRX(-π, 0) = RZ(2φ)
        StandardGate::Z => vec![prx(-PI, 0.0), prx(PI, PI / 2.0)],
        StandardGate::Rz(lambda) => {
            let half = lambda.clone() / ParameterExpression::constant(2.0);
            vec![prx(-PI, 0.0), prx(PI, half)]
        }
        other => vec![other.clone()],
    }
}
