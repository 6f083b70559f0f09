//! Property-based tests for MOVE routing on Deneb.
//!
//! Random circuits over the six data qubits, some with MOVEs of their own,
//! are routed and the output is replayed against a single-slot occupancy
//! model.

use proptest::prelude::*;
use starling_compile::{
    CompileError, ExistingMoveHandling, MoveValidationMode, Pass, PropertySet, ResonatorRouting,
    RoutingStats, validate_circuit,
};
use starling_ir::device::deneb;
use starling_ir::{Circuit, CircuitLevel, ClbitId, Instruction, QubitId};

const RESONATOR: QubitId = QubitId(6);

#[derive(Debug, Clone)]
enum Op {
    R(u32),
    Cz(u32, u32),
    Measure(u32),
    /// MOVE between a data qubit and the resonator, written in the input.
    Move(u32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6_u32).prop_map(Op::R),
        (0..6_u32, 0..6_u32)
            .prop_filter("distinct operands", |(a, b)| a != b)
            .prop_map(|(a, b)| Op::Cz(a, b)),
        (0..6_u32).prop_map(Op::Measure),
    ]
}

fn arb_op_with_moves() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_op(),
        1 => (0..6_u32).prop_map(Op::Move),
    ]
}

fn build(ops: &[Op]) -> Circuit {
    let mut circuit = Circuit::with_size("random", 7, 6);
    circuit.set_level(CircuitLevel::Physical);
    for op in ops {
        match *op {
            Op::R(q) => {
                circuit.r(0.5, 0.25, QubitId(q)).unwrap();
            }
            Op::Cz(a, b) => {
                circuit.cz(QubitId(a), QubitId(b)).unwrap();
            }
            Op::Measure(q) => {
                circuit.measure(QubitId(q), ClbitId(q)).unwrap();
            }
            Op::Move(q) => {
                circuit.move_gate(QubitId(q), RESONATOR).unwrap();
            }
        }
    }
    circuit
}

fn route(circuit: &mut Circuit, policy: ExistingMoveHandling) -> RoutingStats {
    let mut props = PropertySet::new()
        .with_device(deneb())
        .with_existing_moves(policy);
    ResonatorRouting.run(circuit, &mut props).unwrap();
    props.get::<RoutingStats>().copied().unwrap()
}

/// Replays `out`, failing on double occupancy or use of a parked qubit.
/// Returns whatever is still parked at the end.
fn replay(out: &[Instruction]) -> Result<Option<QubitId>, String> {
    let mut parked: Option<QubitId> = None;
    for inst in out {
        if inst.is_move() {
            let q = inst.qubits[0];
            parked = match parked {
                Some(p) if p == q => None,
                None => Some(q),
                Some(p) => return Err(format!("{q} moved into resonator holding {p}")),
            };
        } else if let Some(p) = parked {
            if inst.qubits.contains(&p) {
                return Err(format!("{inst} uses parked qubit {p}"));
            }
        }
    }
    Ok(parked)
}

proptest! {
    /// Routed output never double-books the resonator, never touches a
    /// parked qubit and leaves nothing parked.
    #[test]
    fn routed_output_respects_occupancy(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut circuit = build(&ops);
        let input = circuit.instructions().to_vec();
        let stats = route(&mut circuit, ExistingMoveHandling::Keep);
        let out = circuit.instructions();

        prop_assert_eq!(replay(out), Ok(None));

        let moves = out.iter().filter(|i| i.is_move()).count();
        prop_assert_eq!(moves, stats.moves_inserted);
        prop_assert_eq!(moves % 2, 0);

        for inst in out.iter().filter(|i| i.name() == "cz") {
            prop_assert_eq!(inst.qubits[1], RESONATOR);
        }

        // Everything except the rewritten cz keeps its order.
        let others = |insts: &[Instruction]| -> Vec<Instruction> {
            insts
                .iter()
                .filter(|i| !i.is_move() && i.name() != "cz")
                .cloned()
                .collect()
        };
        prop_assert_eq!(others(out), others(&input));
        prop_assert_eq!(
            out.iter().filter(|i| i.name() == "cz").count(),
            input.iter().filter(|i| i.name() == "cz").count()
        );

        prop_assert!(
            validate_circuit(&circuit, &deneb(), MoveValidationMode::Strict, false).is_ok()
        );
    }

    /// With MOVEs in the input, routing either reports the conflict they
    /// cause or keeps every one of them and still respects occupancy.
    #[test]
    fn input_moves_kept_or_conflict_reported(
        ops in prop::collection::vec(arb_op_with_moves(), 0..40)
    ) {
        let mut circuit = build(&ops);
        let input_moves = circuit.instructions().iter().filter(|i| i.is_move()).count();
        let mut props = PropertySet::new()
            .with_device(deneb())
            .with_existing_moves(ExistingMoveHandling::Keep);

        match ResonatorRouting.run(&mut circuit, &mut props) {
            Ok(()) => {
                let stats = props.get::<RoutingStats>().copied().unwrap();
                let out = circuit.instructions();
                prop_assert_eq!(replay(out), Ok(None));
                prop_assert_eq!(stats.moves_kept, input_moves);
                let moves = out.iter().filter(|i| i.is_move()).count();
                prop_assert_eq!(moves, stats.moves_kept + stats.moves_inserted);
                prop_assert!(
                    validate_circuit(&circuit, &deneb(), MoveValidationMode::Strict, false).is_ok()
                );
            }
            Err(err) => prop_assert!(
                matches!(
                    err,
                    CompileError::ResonatorOccupied { .. } | CompileError::QubitParked { .. }
                ),
                "unexpected error: {}",
                err
            ),
        }
    }

    /// Routing a routed circuit again under `Trust` changes nothing.
    #[test]
    fn trust_is_idempotent(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut circuit = build(&ops);
        route(&mut circuit, ExistingMoveHandling::Keep);
        let routed = circuit.instructions().to_vec();

        let stats = route(&mut circuit, ExistingMoveHandling::Trust);
        prop_assert_eq!(circuit.instructions(), routed.as_slice());
        prop_assert_eq!(stats.moves_inserted, 0);
    }
}
