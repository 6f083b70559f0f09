//! Component-name views of physical instructions.

use starling_ir::{DeviceDescription, Instruction, InstructionKind, IrError, QubitId};

use crate::error::{CompileError, CompileResult};

/// Component names of a physical locus.
pub(crate) fn names<'d>(
    device: &'d DeviceDescription,
    qubits: &[QubitId],
) -> CompileResult<Vec<&'d str>> {
    qubits
        .iter()
        .map(|&q| {
            device
                .component_name(q)
                .ok_or_else(|| CompileError::from(IrError::UnknownComponent(q.to_string())))
        })
        .collect()
}

/// A physical instruction written with component names, for diagnostics.
pub(crate) fn describe(device: &DeviceDescription, instruction: &Instruction) -> String {
    let operands: Vec<String> = instruction
        .qubits
        .iter()
        .map(|&q| {
            device
                .component_name(q)
                .map_or_else(|| q.to_string(), str::to_string)
        })
        .collect();
    let name = match &instruction.kind {
        InstructionKind::Delay { duration, unit } => format!("delay[{duration}{unit}]"),
        _ => instruction.name().to_string(),
    };
    format!("{name} {}", operands.join(", "))
}
