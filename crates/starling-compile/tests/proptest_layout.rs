//! Property-based tests for resonator-aware layout.
//!
//! Random logical circuits with one resonator slot are laid out on the
//! resonator devices. Whenever a layout is found it must place every logical
//! qubit exactly once and put every two-qubit gate on a native locus.

use proptest::prelude::*;
use starling_compile::{CompileError, generate_layout};
use starling_ir::device::{deneb, move_architecture};
use starling_ir::{Circuit, ClbitId, DeviceDescription, OperationKind, QubitId};

#[derive(Debug, Clone)]
enum Op {
    /// MOVE into the slot.
    Move(u32),
    /// `cz` with the slot.
    CzSlot(u32),
    Prx(u32),
    Measure(u32),
}

/// Width, slot index and ops over the other qubits.
fn arb_circuit() -> impl Strategy<Value = (u32, u32, Vec<Op>)> {
    (2..=7_u32).prop_flat_map(|width| {
        let data = width - 1;
        let op = prop_oneof![
            (0..data).prop_map(Op::Move),
            (0..data).prop_map(Op::CzSlot),
            (0..data).prop_map(Op::Prx),
            (0..data).prop_map(Op::Measure),
        ];
        (Just(width), 0..width, prop::collection::vec(op, 0..30))
    })
}

fn build(width: u32, slot: u32, ops: &[Op]) -> Circuit {
    // Data indices skip the slot.
    let data = |q: u32| QubitId(if q >= slot { q + 1 } else { q });
    let slot = QubitId(slot);
    let mut circuit = Circuit::with_size("random", width, width);
    for op in ops {
        match *op {
            Op::Move(q) => {
                circuit.move_gate(data(q), slot).unwrap();
            }
            Op::CzSlot(q) => {
                circuit.cz(data(q), slot).unwrap();
            }
            Op::Prx(q) => {
                circuit.r(0.5, 0.25, data(q)).unwrap();
            }
            Op::Measure(q) => {
                circuit.measure(data(q), ClbitId(data(q).0)).unwrap();
            }
        }
    }
    circuit
}

/// Checks an accepted layout; returns a description of the first violation.
fn check_layout(circuit: &Circuit, device: &DeviceDescription) -> Result<(), String> {
    let layout = match generate_layout(circuit, device, None) {
        Ok(layout) => layout,
        Err(CompileError::LayoutFailed { .. } | CompileError::NonNativeLocus { .. }) => {
            return Ok(());
        }
        Err(other) => return Err(format!("unexpected error: {other}")),
    };

    if layout.len() != circuit.num_qubits() {
        return Err(format!("{} of {} qubits placed", layout.len(), circuit.num_qubits()));
    }
    let mut physical: Vec<QubitId> = Vec::with_capacity(layout.len());
    for q in (0..circuit.num_qubits() as u32).map(QubitId) {
        match layout.get_physical(q) {
            Some(p) => physical.push(p),
            None => return Err(format!("logical {q} not placed")),
        }
    }
    physical.sort_unstable();
    physical.dedup();
    if physical.len() != circuit.num_qubits() {
        return Err("two logical qubits share a component".into());
    }

    for inst in circuit.instructions() {
        if !matches!(
            inst.operation_kind(),
            OperationKind::TwoQubitInteraction | OperationKind::StateTransfer
        ) {
            continue;
        }
        let names: Vec<&str> = inst
            .qubits
            .iter()
            .filter_map(|&q| layout.get_physical(q))
            .filter_map(|p| device.component_name(p))
            .collect();
        if !device.supports(inst.name(), &names) {
            return Err(format!("{} placed on non-native locus {names:?}", inst.name()));
        }
    }
    Ok(())
}

proptest! {
    /// On Deneb every qubit can both MOVE and `cz`, so a layout always exists.
    #[test]
    fn deneb_layout_covers_every_qubit((width, slot, ops) in arb_circuit()) {
        let circuit = build(width, slot, &ops);
        prop_assert!(generate_layout(&circuit, &deneb(), None).is_ok());
        prop_assert_eq!(check_layout(&circuit, &deneb()), Ok(()));
    }

    /// Only QB6 can MOVE on the move architecture, so layouts may fail; the
    /// ones that succeed are still complete and native.
    #[test]
    fn move_architecture_layout_is_native((width, slot, ops) in arb_circuit()) {
        let circuit = build(width, slot, &ops);
        prop_assert_eq!(check_layout(&circuit, &move_architecture()), Ok(()));
    }
}
