//! Layout pass for star-topology devices.
//!
//! [`MoveLayout`] maps logical qubits onto device components so that every
//! gate in the circuit has a native locus. A logical qubit used as the second
//! operand of a MOVE (or of a two-qubit gate on a device with resonators) is a
//! *resonator slot* and gets a computational resonator; every other qubit gets
//! the physical qubit whose capabilities cover its needs with the fewest
//! capabilities to spare.
//!
//! The assignment is greedy. A choice that is locally cheapest can strand a
//! later logical qubit even when a valid global assignment exists; that case
//! is reported as a layout failure, not searched around. It only works
//! reliably with a single resonator.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use starling_ir::device::native;
use starling_ir::{Circuit, CircuitLevel, DeviceDescription, OperationKind, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::locus;
use crate::pass::{Pass, PassKind};
use crate::property::{Layout, PropertySet};

/// What a logical qubit must be able to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    /// Second operand of a resonator-mediated gate.
    ResonatorSlot,
    /// A physical qubit with at least these gates.
    Data(BTreeSet<String>),
}

impl Requirement {
    fn role(&self) -> &'static str {
        match self {
            Requirement::ResonatorSlot => "a resonator",
            Requirement::Data(_) => "a data qubit",
        }
    }
}

/// Requirements in discovery order.
#[derive(Debug, Default)]
struct Requirements {
    order: Vec<QubitId>,
    by_qubit: FxHashMap<QubitId, Requirement>,
}

impl Requirements {
    fn gather(circuit: &Circuit, device: &DeviceDescription) -> CompileResult<Self> {
        let mut reqs = Self::default();
        let star = !device.computational_resonators.is_empty();

        for inst in circuit.instructions() {
            let name = inst.name();
            match inst.operation_kind() {
                OperationKind::StateTransfer => {
                    reqs.require_gate(inst.qubits[0], name, name)?;
                    reqs.require_slot(inst.qubits[1], name)?;
                }
                OperationKind::TwoQubitInteraction if star => {
                    reqs.require_gate(inst.qubits[0], name, name)?;
                    reqs.require_slot(inst.qubits[1], name)?;
                }
                OperationKind::TwoQubitInteraction | OperationKind::Other => {
                    for &q in &inst.qubits {
                        reqs.require_gate(q, name, name)?;
                    }
                }
                OperationKind::SingleQubitRotation => {
                    let gate = if inst.condition().is_some() {
                        native::CC_PRX
                    } else {
                        native::PRX
                    };
                    reqs.require_gate(inst.qubits[0], gate, name)?;
                }
                OperationKind::Measurement => {
                    for &q in &inst.qubits {
                        reqs.require_gate(q, native::MEASURE, name)?;
                    }
                }
                OperationKind::Reset => {
                    for &q in &inst.qubits {
                        reqs.require_data(q, name)?;
                    }
                }
                OperationKind::Barrier | OperationKind::Delay | OperationKind::Identity => {}
            }
        }
        Ok(reqs)
    }

    fn entry(&mut self, qubit: QubitId, fresh: Requirement) -> &mut Requirement {
        if !self.by_qubit.contains_key(&qubit) {
            self.order.push(qubit);
        }
        self.by_qubit.entry(qubit).or_insert(fresh)
    }

    fn require_data(&mut self, qubit: QubitId, gate_name: &str) -> CompileResult<()> {
        match self.entry(qubit, Requirement::Data(BTreeSet::new())) {
            Requirement::Data(_) => Ok(()),
            existing @ Requirement::ResonatorSlot => Err(CompileError::ConflictingRole {
                qubit,
                gate: gate_name.to_string(),
                wanted: "a data qubit",
                existing: existing.role(),
            }),
        }
    }

    fn require_gate(&mut self, qubit: QubitId, gate: &str, gate_name: &str) -> CompileResult<()> {
        self.require_data(qubit, gate_name)?;
        if let Some(Requirement::Data(set)) = self.by_qubit.get_mut(&qubit) {
            set.insert(gate.to_string());
        }
        Ok(())
    }

    fn require_slot(&mut self, qubit: QubitId, gate_name: &str) -> CompileResult<()> {
        match self.entry(qubit, Requirement::ResonatorSlot) {
            Requirement::ResonatorSlot => Ok(()),
            existing @ Requirement::Data(_) => Err(CompileError::ConflictingRole {
                qubit,
                gate: gate_name.to_string(),
                wanted: "a resonator",
                existing: existing.role(),
            }),
        }
    }

    fn slots(&self) -> Vec<QubitId> {
        self.order
            .iter()
            .copied()
            .filter(|q| self.by_qubit.get(q) == Some(&Requirement::ResonatorSlot))
            .collect()
    }
}

/// Resonator-aware layout pass.
///
/// Skipped when a layout is already present (a user-supplied initial layout)
/// or the circuit is already physical.
pub struct MoveLayout;

impl Pass for MoveLayout {
    fn name(&self) -> &'static str {
        "MoveLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let device = properties.device()?;
        let layout = generate_layout(circuit, &device, properties.restrict_to_qubits.as_deref())?;
        info!(
            "MoveLayout placed {} logical qubits for circuit '{}'",
            layout.len(),
            circuit.name()
        );
        properties.layout = Some(layout);
        Ok(())
    }

    fn should_run(&self, circuit: &Circuit, properties: &PropertySet) -> bool {
        properties.layout.is_none()
            && properties.device.is_some()
            && circuit.level() == CircuitLevel::Logical
    }
}

/// Generate a layout for `circuit` on `device`.
///
/// `restrict_to` limits the physical qubits layout may use; resonators are
/// unaffected.
pub fn generate_layout(
    circuit: &Circuit,
    device: &DeviceDescription,
    restrict_to: Option<&[String]>,
) -> CompileResult<Layout> {
    if circuit.num_qubits() > device.num_components() {
        return Err(CompileError::CircuitTooLarge {
            required: circuit.num_qubits(),
            available: device.num_components(),
        });
    }

    let reqs = Requirements::gather(circuit, device)?;
    let slots = reqs.slots();
    let resonators = &device.computational_resonators;
    if let Some(&first) = slots.first() {
        if resonators.is_empty() {
            return Err(CompileError::NoResonator(first));
        }
    }
    if slots.len() > resonators.len() {
        return Err(CompileError::MultipleResonatorsUnsupported {
            required: slots.len(),
            available: resonators.len(),
        });
    }

    let mut pool: Vec<&str> = match restrict_to {
        Some(names) => {
            if let Some(unknown) = names.iter().find(|n| !device.is_qubit(n)) {
                return Err(CompileError::InvalidConfiguration(format!(
                    "restrict_to_qubits names unknown qubit '{unknown}'"
                )));
            }
            device
                .qubits
                .iter()
                .map(String::as_str)
                .filter(|q| names.iter().any(|n| n == q))
                .collect()
        }
        None => device.qubits.iter().map(String::as_str).collect(),
    };
    let mut free_resonators: Vec<&str> = resonators.iter().map(String::as_str).collect();
    let caps = device.qubit_capabilities();

    let mut assigned: Vec<(QubitId, &str)> = Vec::with_capacity(circuit.num_qubits());

    for &slot in &slots {
        let resonator = free_resonators.remove(0);
        debug!("Logical qubit {} -> resonator {resonator}", slot.0);
        assigned.push((slot, resonator));
    }

    let mut empties: Vec<QubitId> = Vec::new();
    for &qubit in &reqs.order {
        let Some(Requirement::Data(needed)) = reqs.by_qubit.get(&qubit) else {
            continue;
        };
        if needed.is_empty() {
            empties.push(qubit);
            continue;
        }
        let choice = pool
            .iter()
            .enumerate()
            .filter_map(|(i, &q)| {
                let have = caps.get(q)?;
                needed
                    .iter()
                    .all(|g| have.contains(g.as_str()))
                    .then(|| (i, have.len() - needed.len()))
            })
            .min_by_key(|&(_, extra)| extra);
        let Some((index, _)) = choice else {
            return Err(CompileError::LayoutFailed {
                qubit,
                required: needed.iter().cloned().collect(),
                remaining: pool.iter().map(|q| (*q).to_string()).collect(),
            });
        };
        let physical = pool.remove(index);
        debug!("Logical qubit {} -> {physical} (needs {needed:?})", qubit.0);
        assigned.push((qubit, physical));
    }

    // Reset-only qubits must land on a qubit; untouched ones may take a
    // leftover resonator once the qubits run out.
    for qubit in empties {
        if pool.is_empty() {
            return Err(CompileError::LayoutFailed {
                qubit,
                required: vec![],
                remaining: vec![],
            });
        }
        assigned.push((qubit, pool.remove(0)));
    }
    let touched: FxHashSet<QubitId> = reqs.order.iter().copied().collect();
    for qubit in (0..circuit.num_qubits() as u32).map(QubitId) {
        if touched.contains(&qubit) {
            continue;
        }
        let physical = if pool.is_empty() {
            (!free_resonators.is_empty()).then(|| free_resonators.remove(0))
        } else {
            Some(pool.remove(0))
        };
        let Some(physical) = physical else {
            return Err(CompileError::LayoutFailed {
                qubit,
                required: vec![],
                remaining: vec![],
            });
        };
        assigned.push((qubit, physical));
    }

    let layout = Layout::from_names(device, assigned)?;
    check_native_loci(circuit, device, &layout)?;
    Ok(layout)
}

/// Every two-qubit gate must land on a native locus.
fn check_native_loci(
    circuit: &Circuit,
    device: &DeviceDescription,
    layout: &Layout,
) -> CompileResult<()> {
    for inst in circuit.instructions() {
        if !matches!(
            inst.operation_kind(),
            OperationKind::TwoQubitInteraction | OperationKind::StateTransfer
        ) {
            continue;
        }
        let physical: Vec<QubitId> = inst
            .qubits
            .iter()
            .map(|&q| layout.get_physical(q).ok_or(CompileError::MissingLayout(Some(q))))
            .collect::<CompileResult<_>>()?;
        let names = locus::names(device, &physical)?;
        if !device.supports(inst.name(), &names) {
            return Err(CompileError::NonNativeLocus {
                gate: inst.name().to_string(),
                locus: names.into_iter().map(str::to_string).collect(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use starling_ir::ClbitId;
    use starling_ir::device::{adonis, deneb, move_architecture};

    fn layout_names(circuit: &Circuit, device: &DeviceDescription) -> Vec<(QubitId, String)> {
        generate_layout(circuit, device, None)
            .unwrap()
            .to_names(device)
            .into_iter()
            .map(|(q, n)| (q, n.to_string()))
            .collect()
    }

    #[test]
    fn test_move_qubit_and_resonator_found() {
        // GHZ through the resonator: logical 0 parks, 1 and 2 interact.
        let mut circuit = Circuit::with_size("ghz", 4, 3);
        let r = QubitId(3);
        circuit.h(QubitId(0)).unwrap();
        circuit.move_gate(QubitId(0), r).unwrap();
        for k in 1..3 {
            circuit.h(QubitId(k)).unwrap();
            circuit.cz(QubitId(k), r).unwrap();
            circuit.h(QubitId(k)).unwrap();
        }
        circuit.move_gate(QubitId(0), r).unwrap();

        let device = move_architecture();
        let names = layout_names(&circuit, &device);
        assert!(names.contains(&(QubitId(3), "COMP_R".to_string())));
        assert!(names.contains(&(QubitId(0), "QB6".to_string())));
        assert_eq!(names.len(), 4);
    }

    /// Two qubits around one resonator; only QB1 can MOVE, only QB2 can cz.
    fn lopsided() -> DeviceDescription {
        DeviceDescription::new(["QB1", "QB2"], ["CR"])
            .with_gate(native::PRX, [["QB1"], ["QB2"]])
            .with_gate(native::MOVE, [["QB1", "CR"]])
            .with_gate(native::CZ, [["QB2", "CR"]])
            .with_gate(native::MEASURE, [["QB2"]])
    }

    #[test]
    fn test_fewest_extra_capabilities() {
        // QB1 has one capability beyond prx, QB2 has two.
        let mut circuit = Circuit::with_size("c", 1, 0);
        circuit.x(QubitId(0)).unwrap();
        let names = layout_names(&circuit, &lopsided());
        assert_eq!(names, vec![(QubitId(0), "QB1".to_string())]);
    }

    #[test]
    fn test_greedy_choice_can_strand_later_qubit() {
        // Logical 0 takes QB1 as the cheaper fit, leaving nothing that can
        // MOVE for logical 1. The swapped assignment would have worked.
        let mut circuit = Circuit::with_size("c", 3, 0);
        circuit.x(QubitId(0)).unwrap();
        circuit.x(QubitId(1)).unwrap();
        circuit.move_gate(QubitId(1), QubitId(2)).unwrap();
        circuit.move_gate(QubitId(1), QubitId(2)).unwrap();

        let err = generate_layout(&circuit, &lopsided(), None).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Cannot find a physical qubit to map logical qubit 1")
        );
        match err {
            CompileError::LayoutFailed {
                qubit,
                required,
                remaining,
            } => {
                assert_eq!(qubit, QubitId(1));
                assert_eq!(required, vec!["move".to_string(), "prx".to_string()]);
                assert_eq!(remaining, vec!["QB2".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflicting_role() {
        let mut circuit = Circuit::with_size("c", 3, 0);
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        circuit.x(QubitId(1)).unwrap();
        let err = generate_layout(&circuit, &deneb(), None).unwrap_err();
        assert!(matches!(err, CompileError::ConflictingRole { qubit: QubitId(1), .. }));
    }

    #[test]
    fn test_multiple_resonators_unsupported() {
        let mut circuit = Circuit::with_size("c", 4, 0);
        circuit.move_gate(QubitId(0), QubitId(1)).unwrap();
        circuit.move_gate(QubitId(2), QubitId(3)).unwrap();
        let err = generate_layout(&circuit, &deneb(), None).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MultipleResonatorsUnsupported {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_move_on_device_without_resonator() {
        let mut circuit = Circuit::with_size("c", 2, 0);
        circuit.move_gate(QubitId(0), QubitId(1)).unwrap();
        let err = generate_layout(&circuit, &adonis(), None).unwrap_err();
        assert!(matches!(err, CompileError::NoResonator(QubitId(1))));
    }

    #[test]
    fn test_leaf_to_leaf_cz_rejected_without_resonator() {
        // Greedy placement puts the pair on QB1 and QB2, which only meet
        // through QB3.
        let mut circuit = Circuit::with_size("c", 2, 2);
        circuit.h(QubitId(0)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit.measure(QubitId(1), ClbitId(1)).unwrap();

        let err = generate_layout(&circuit, &adonis(), None).unwrap_err();
        assert!(matches!(err, CompileError::NonNativeLocus { ref gate, .. } if gate == "cz"));
    }

    #[test]
    fn test_center_restricted_cz_accepted() {
        let mut circuit = Circuit::with_size("c", 2, 0);
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        let only = vec!["QB1".to_string(), "QB3".to_string()];
        let device = adonis();
        let layout = generate_layout(&circuit, &device, Some(&only)).unwrap();
        let names: Vec<&str> = layout.to_names(&device).into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["QB1", "QB3"]);
    }

    #[test]
    fn test_restrict_to_qubits() {
        let mut circuit = Circuit::with_size("c", 1, 0);
        circuit.x(QubitId(0)).unwrap();
        let only = vec!["QB4".to_string()];
        let layout = generate_layout(&circuit, &deneb(), Some(&only)).unwrap();
        assert_eq!(layout.get_physical(QubitId(0)), Some(QubitId(3)));

        let unknown = vec!["QB42".to_string()];
        assert!(matches!(
            generate_layout(&circuit, &deneb(), Some(&unknown)),
            Err(CompileError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unused_qubits_assigned_last() {
        let mut circuit = Circuit::with_size("c", 7, 0);
        circuit.move_gate(QubitId(5), QubitId(6)).unwrap();
        let device = deneb();
        let layout = generate_layout(&circuit, &device, None).unwrap();
        assert_eq!(layout.len(), 7);
        assert_eq!(layout.get_physical(QubitId(6)), Some(QubitId(6)));
        // Logical 5 is placed before the unused 0..5 and takes QB1.
        assert_eq!(layout.get_physical(QubitId(5)), Some(QubitId(0)));
    }

    #[test]
    fn test_circuit_too_large() {
        let circuit = Circuit::with_size("c", 8, 0);
        assert!(matches!(
            generate_layout(&circuit, &deneb(), None),
            Err(CompileError::CircuitTooLarge {
                required: 8,
                available: 7
            })
        ));
    }

    #[test]
    fn test_pass_skipped_with_initial_layout() {
        let device = deneb();
        let circuit = Circuit::with_size("c", 1, 0);
        let layout = Layout::from_names(&device, [(QubitId(0), "QB2")]).unwrap();
        let props = PropertySet::new().with_device(device).with_layout(layout);
        assert!(!MoveLayout.should_run(&circuit, &props));
    }
}
