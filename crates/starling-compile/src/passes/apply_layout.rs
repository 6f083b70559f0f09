//! Rewrite a logical circuit onto device components.

use starling_ir::{Circuit, CircuitLevel};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Applies the layout in the property set.
///
/// The result has one qubit per device component and is marked
/// [`CircuitLevel::Physical`]. Classical bits, registers and metadata are
/// carried over.
pub struct ApplyLayout;

impl Pass for ApplyLayout {
    fn name(&self) -> &'static str {
        "ApplyLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let device = properties.device()?;
        let layout = properties
            .layout
            .as_ref()
            .ok_or(CompileError::MissingLayout(None))?;

        let width = device.num_components();
        if circuit.num_qubits() > width {
            return Err(CompileError::CircuitTooLarge {
                required: circuit.num_qubits(),
                available: width,
            });
        }

        let mut physical = circuit.empty_like(width as u32);
        physical.set_level(CircuitLevel::Physical);
        for mut inst in circuit.take_instructions() {
            for q in &mut inst.qubits {
                *q = layout
                    .get_physical(*q)
                    .ok_or(CompileError::MissingLayout(Some(*q)))?;
            }
            physical.apply(inst)?;
        }

        debug!(
            "Applied layout to '{}': {} instructions on {width} components",
            physical.name(),
            physical.len()
        );
        *circuit = physical;
        Ok(())
    }

    fn should_run(&self, circuit: &Circuit, properties: &PropertySet) -> bool {
        circuit.level() == CircuitLevel::Logical && properties.layout.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Layout;
    use starling_ir::device::deneb;
    use starling_ir::{ClbitId, QubitId};

    #[test]
    fn test_apply_layout_remaps_operands() {
        let device = deneb();
        let mut circuit = Circuit::with_size("c", 2, 1);
        circuit.move_gate(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit.metadata_mut().insert("shots_hint".into(), 100.into());

        let layout = Layout::from_names(&device, [(QubitId(0), "QB3"), (QubitId(1), "COMP_R")])
            .unwrap();
        let mut props = PropertySet::new().with_device(device).with_layout(layout);

        assert!(ApplyLayout.should_run(&circuit, &props));
        ApplyLayout.run(&mut circuit, &mut props).unwrap();

        assert_eq!(circuit.level(), CircuitLevel::Physical);
        assert_eq!(circuit.num_qubits(), 7);
        assert_eq!(circuit.num_clbits(), 1);
        assert_eq!(circuit.instructions()[0].qubits, vec![QubitId(2), QubitId(6)]);
        assert_eq!(circuit.instructions()[1].qubits, vec![QubitId(2)]);
        assert!(circuit.metadata().contains_key("shots_hint"));
        assert!(!ApplyLayout.should_run(&circuit, &props));
    }

    #[test]
    fn test_unmapped_qubit_reported() {
        let device = deneb();
        let mut circuit = Circuit::with_size("c", 2, 0);
        circuit.x(QubitId(1)).unwrap();
        let layout = Layout::from_names(&device, [(QubitId(0), "QB1")]).unwrap();
        let mut props = PropertySet::new().with_device(device).with_layout(layout);

        let err = ApplyLayout.run(&mut circuit, &mut props).unwrap_err();
        assert!(matches!(err, CompileError::MissingLayout(Some(QubitId(1)))));
    }
}
