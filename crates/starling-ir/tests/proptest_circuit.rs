//! Property-based tests for circuit construction.
//!
//! The builder must accept every well-formed operation and reject every
//! malformed one without touching the instruction list.

use proptest::prelude::*;
use starling_ir::{Circuit, ClbitId, IrError, ParameterExpression, QubitId};

/// Operations with operands drawn from a range wider than the circuit.
#[derive(Debug, Clone)]
enum Op {
    R(f64, f64, u32),
    Cz(u32, u32),
    Move(u32, u32),
    Measure(u32, u32),
}

impl Op {
    fn apply(&self, circuit: &mut Circuit) -> Result<(), IrError> {
        match *self {
            Op::R(theta, phi, q) => circuit.r(theta, phi, QubitId(q)).map(|_| ()),
            Op::Cz(a, b) => circuit.cz(QubitId(a), QubitId(b)).map(|_| ()),
            Op::Move(q, r) => circuit.move_gate(QubitId(q), QubitId(r)).map(|_| ()),
            Op::Measure(q, c) => circuit.measure(QubitId(q), ClbitId(c)).map(|_| ()),
        }
    }

    fn is_valid(&self, num_qubits: u32, num_clbits: u32) -> bool {
        match *self {
            Op::R(_, _, q) => q < num_qubits,
            Op::Cz(a, b) | Op::Move(a, b) => a < num_qubits && b < num_qubits && a != b,
            Op::Measure(q, c) => q < num_qubits && c < num_clbits,
        }
    }
}

fn arb_op(bound: u32) -> impl Strategy<Value = Op> {
    // Quarter-radian steps keep the JSON text exact.
    let angle = (-40_i32..40).prop_map(|k| f64::from(k) * 0.25);
    prop_oneof![
        (angle.clone(), angle, 0..bound).prop_map(|(t, p, q)| Op::R(t, p, q)),
        (0..bound, 0..bound).prop_map(|(a, b)| Op::Cz(a, b)),
        (0..bound, 0..bound).prop_map(|(a, b)| Op::Move(a, b)),
        (0..bound, 0..bound).prop_map(|(q, c)| Op::Measure(q, c)),
    ]
}

proptest! {
    /// Valid operations are appended, invalid ones leave the circuit unchanged.
    #[test]
    fn test_builder_accepts_exactly_valid_ops(
        num_qubits in 1_u32..=6,
        num_clbits in 0_u32..=4,
        ops in prop::collection::vec(arb_op(8), 1..=20),
    ) {
        let mut circuit = Circuit::with_size("prop", num_qubits, num_clbits);
        let mut expected_len = 0;
        for op in &ops {
            let before = circuit.len();
            let result = op.apply(&mut circuit);
            if op.is_valid(num_qubits, num_clbits) {
                prop_assert!(result.is_ok(), "valid op rejected: {:?}", op);
                expected_len += 1;
            } else {
                prop_assert!(result.is_err(), "invalid op accepted: {:?}", op);
                prop_assert_eq!(circuit.len(), before);
            }
        }
        prop_assert_eq!(circuit.len(), expected_len);
    }

    /// Serialized circuits come back identical.
    #[test]
    fn test_circuit_json_preserves_instructions(
        ops in prop::collection::vec(arb_op(4), 0..=12),
    ) {
        let mut circuit = Circuit::with_size("json", 4, 4);
        for op in &ops {
            let _ = op.apply(&mut circuit);
        }
        let json = serde_json::to_string(&circuit).expect("serialize");
        let back: Circuit = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, circuit);
    }

    /// Binding every symbol makes an expression evaluable.
    #[test]
    fn test_bound_expression_evaluates(a in -100.0..100.0f64, b in 1.0..100.0f64) {
        let expr = (ParameterExpression::symbol("a") + ParameterExpression::pi())
            / ParameterExpression::symbol("b");
        prop_assert!(expr.evaluate().is_err());

        let bound = expr.bind("a", a).bind("b", b);
        let value = bound.evaluate().expect("fully bound");
        prop_assert!((value - (a + std::f64::consts::PI) / b).abs() < 1e-9);
    }
}
