//! Final check that a physical circuit can run on the device.

use starling_ir::device::native;
use starling_ir::{
    Circuit, CircuitLevel, DeviceDescription, GateKind, Instruction, InstructionKind,
    OperationKind, QubitId, StandardGate,
};
use tracing::info;

use crate::error::{CompileError, CompileResult};
use crate::locus;
use crate::occupancy::{Occupancy, ParkOrigin};
use crate::pass::{Pass, PassKind};
use crate::property::{MoveValidationMode, PropertySet};

/// Checks native gate loci and MOVE sandwiches.
///
/// Every gate must map onto a native gate listed for its exact locus. Unless
/// the mode is [`MoveValidationMode::None`], a qubit whose state is parked in
/// a resonator may not be touched until it is moved back, and every MOVE must
/// be closed by the end of the circuit (unless MOVEs are left open on
/// purpose).
pub struct CircuitValidation;

impl Pass for CircuitValidation {
    fn name(&self) -> &'static str {
        "CircuitValidation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let device = properties.device()?;
        validate_circuit(
            circuit,
            &device,
            properties.validation_mode,
            properties.leave_moves_open,
        )?;
        info!(
            "Circuit '{}' is valid for the device ({} instructions)",
            circuit.name(),
            circuit.len()
        );
        Ok(())
    }

    fn should_run(&self, circuit: &Circuit, properties: &PropertySet) -> bool {
        circuit.level() == CircuitLevel::Physical && properties.device.is_some()
    }
}

/// Validate a physical circuit against `device`.
pub fn validate_circuit(
    circuit: &Circuit,
    device: &DeviceDescription,
    mode: MoveValidationMode,
    leave_moves_open: bool,
) -> CompileResult<()> {
    let mut sandwiches = Occupancy::new();
    for inst in circuit.instructions() {
        check_locus(device, inst)?;
        if mode != MoveValidationMode::None {
            check_sandwich(device, inst, mode, &mut sandwiches)?;
        }
    }

    if mode != MoveValidationMode::None && !leave_moves_open {
        if let Some((resonator, park)) = sandwiches.iter().next() {
            return Err(CompileError::UnclosedMove {
                qubit: component(device, park.qubit),
                resonator: component(device, resonator),
            });
        }
    }
    Ok(())
}

fn component(device: &DeviceDescription, q: QubitId) -> String {
    device
        .component_name(q)
        .map_or_else(|| q.to_string(), str::to_string)
}

/// Native gate name an instruction runs as, `None` for instructions that
/// need no calibrated gate.
fn native_name<'a>(device: &DeviceDescription, inst: &'a Instruction) -> Option<&'a str> {
    match &inst.kind {
        InstructionKind::Barrier | InstructionKind::Delay { .. } => None,
        InstructionKind::Measure => Some(native::MEASURE),
        InstructionKind::Reset => {
            if device.has_gate(native::RESET) {
                Some(native::RESET)
            } else {
                Some(native::CC_PRX)
            }
        }
        InstructionKind::Gate(gate) => match &gate.kind {
            GateKind::Standard(StandardGate::I) => None,
            GateKind::Standard(
                StandardGate::R(..)
                | StandardGate::X
                | StandardGate::Y
                | StandardGate::Rx(_)
                | StandardGate::Ry(_),
            ) => {
                if gate.condition.is_some() {
                    Some(native::CC_PRX)
                } else {
                    Some(native::PRX)
                }
            }
            GateKind::Standard(StandardGate::CZ) => Some(native::CZ),
            GateKind::Standard(StandardGate::Move) => Some(native::MOVE),
            _ => Some(gate.name()),
        },
    }
}

fn check_locus(device: &DeviceDescription, inst: &Instruction) -> CompileResult<()> {
    let Some(gate) = native_name(device, inst) else {
        return Ok(());
    };
    if !device.has_gate(gate) {
        let name = if inst.is_gate() { gate } else { inst.name() };
        return Err(CompileError::GateNotNative(name.to_string()));
    }

    let names = locus::names(device, &inst.qubits)?;
    let per_qubit = matches!(inst.kind, InstructionKind::Measure | InstructionKind::Reset);
    let loci: Vec<&[&str]> = if per_qubit {
        names.chunks(1).collect()
    } else {
        vec![names.as_slice()]
    };
    for l in loci {
        if !device.supports(gate, l) {
            return Err(CompileError::NonNativeLocus {
                gate: gate.to_string(),
                locus: l.iter().map(|s| (*s).to_string()).collect(),
            });
        }
    }
    Ok(())
}

fn check_sandwich(
    device: &DeviceDescription,
    inst: &Instruction,
    mode: MoveValidationMode,
    sandwiches: &mut Occupancy,
) -> CompileResult<()> {
    if inst.is_move() {
        let (qubit, resonator) = (inst.qubits[0], inst.qubits[1]);
        match sandwiches.occupant(resonator) {
            Some(park) if park.qubit == qubit => {
                sandwiches.release(resonator);
            }
            Some(park) => {
                return Err(CompileError::ResonatorOccupied {
                    resonator: component(device, resonator),
                    occupant: component(device, park.qubit),
                    instruction: locus::describe(device, inst),
                    occupancy: sandwiches.snapshot(device),
                });
            }
            None => {
                if let Some((elsewhere, _)) = sandwiches.resonator_of(qubit) {
                    return Err(CompileError::QubitParked {
                        qubit: component(device, qubit),
                        resonator: component(device, elsewhere),
                        instruction: locus::describe(device, inst),
                        occupancy: sandwiches.snapshot(device),
                    });
                }
                sandwiches.park(resonator, qubit, ParkOrigin::Existing);
            }
        }
        return Ok(());
    }

    let kind = inst.operation_kind();
    let allowed = match kind {
        OperationKind::Barrier | OperationKind::Identity => true,
        OperationKind::SingleQubitRotation => mode == MoveValidationMode::AllowPrx,
        _ => false,
    };
    if allowed {
        return Ok(());
    }
    for &q in &inst.qubits {
        if let Some((resonator, _)) = sandwiches.resonator_of(q) {
            return Err(CompileError::MoveSandwich {
                qubit: component(device, q),
                resonator: component(device, resonator),
                instruction: locus::describe(device, inst),
            });
        }
    }
    Ok(())
}
