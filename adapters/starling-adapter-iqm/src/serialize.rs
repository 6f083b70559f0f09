//! Translation between physical circuits and IQM native instructions.
//!
//! Rotation angles travel in full turns: `r(θ, φ)` becomes `prx` with
//! `angle_t = θ/2π` and `phase_t = φ/2π`, unnormalized. Measurements carry
//! their classical bit's [`MeasurementKey`], which is what lets
//! [`CircuitSerializer::deserialize`] rebuild the register layout.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use starling_ir::{
    Circuit, CircuitLevel, ClassicalCondition, ClbitId, ConditionTarget, CustomGate, Gate,
    GateKind, Instruction, InstructionKind, ParameterExpression, QubitId, StandardGate, TimeUnit,
};

use crate::error::{IqmError, IqmResult};
use crate::measurement_key::MeasurementKey;
use crate::wire::{NativeInstruction, NativeOperation, WireCircuit};

/// Serializes circuits against a fixed qubit naming.
///
/// `names[i]` is the wire name of circuit qubit `i`. The backend uses index
/// strings and sends the component names separately in the qubit mapping;
/// any unique naming works.
#[derive(Debug, Clone)]
pub struct CircuitSerializer {
    names: Vec<String>,
    allow_passthrough: bool,
}

impl CircuitSerializer {
    /// Create a serializer for the given qubit names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            allow_passthrough: false,
        }
    }

    /// Serializer naming qubit `i` by the decimal string `i`.
    pub fn indexed(num_qubits: usize) -> Self {
        Self::new((0..num_qubits).map(|i| i.to_string()))
    }

    /// Emit instructions without a native counterpart instead of failing.
    #[must_use]
    pub fn allow_passthrough(mut self, allow: bool) -> Self {
        self.allow_passthrough = allow;
        self
    }

    /// Qubit names, by circuit index.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn name_of(&self, qubit: QubitId) -> IqmResult<&str> {
        self.names
            .get(qubit.0 as usize)
            .map(String::as_str)
            .ok_or_else(|| IqmError::UnknownQubit(qubit.to_string()))
    }

    fn names_of(&self, qubits: &[QubitId]) -> IqmResult<Vec<String>> {
        qubits
            .iter()
            .map(|&q| self.name_of(q).map(str::to_string))
            .collect()
    }

    /// Serialize a physical circuit.
    pub fn serialize(&self, circuit: &Circuit) -> IqmResult<WireCircuit> {
        let mut out: Vec<NativeInstruction> = Vec::with_capacity(circuit.len());
        // Latest measurement of each classical bit: output position and qubit name.
        let mut last_measure: FxHashMap<ClbitId, (usize, String)> = FxHashMap::default();

        for inst in circuit.instructions() {
            match &inst.kind {
                InstructionKind::Gate(gate) => {
                    if let Some(condition) = &gate.condition {
                        let native = self.conditioned(
                            circuit,
                            inst,
                            gate,
                            condition,
                            &mut out,
                            &last_measure,
                        )?;
                        out.push(native);
                        continue;
                    }
                    if let Some(native) = self.gate(circuit, inst, gate)? {
                        out.push(native);
                    }
                }
                InstructionKind::Measure => {
                    for (&qubit, &clbit) in inst.qubits.iter().zip(&inst.clbits) {
                        let key = MeasurementKey::from_clbit(circuit, clbit)?.to_string();
                        let name = self.name_of(qubit)?.to_string();
                        last_measure.insert(clbit, (out.len(), name.clone()));
                        out.push(NativeInstruction::new(
                            NativeOperation::Measure {
                                key,
                                feedback_key: None,
                            },
                            vec![name],
                        ));
                    }
                }
                InstructionKind::Reset => {
                    out.push(NativeInstruction::new(
                        NativeOperation::Reset,
                        self.names_of(&inst.qubits)?,
                    ));
                }
                InstructionKind::Barrier => {
                    out.push(NativeInstruction::new(
                        NativeOperation::Barrier,
                        self.names_of(&inst.qubits)?,
                    ));
                }
                InstructionKind::Delay { duration, unit } => {
                    out.push(NativeInstruction::new(
                        NativeOperation::Delay {
                            duration: unit.to_seconds(*duration),
                        },
                        self.names_of(&inst.qubits)?,
                    ));
                }
            }
        }

        debug!(
            "Serialized circuit '{}': {} -> {} instructions",
            circuit.name(),
            circuit.len(),
            out.len()
        );

        Ok(WireCircuit {
            name: circuit.name().to_string(),
            instructions: out,
            metadata: scalar_metadata(circuit),
        })
    }

    fn gate(
        &self,
        circuit: &Circuit,
        inst: &Instruction,
        gate: &Gate,
    ) -> IqmResult<Option<NativeInstruction>> {
        let qubits = self.names_of(&inst.qubits)?;
        if let GateKind::Standard(standard) = &gate.kind {
            if let Some((angle_t, phase_t)) = prx_angles(standard)? {
                return Ok(Some(NativeInstruction::new(
                    NativeOperation::Prx { angle_t, phase_t },
                    qubits,
                )));
            }
            match standard {
                StandardGate::I => return Ok(None),
                StandardGate::CZ => {
                    return Ok(Some(NativeInstruction::new(NativeOperation::Cz, qubits)));
                }
                StandardGate::Move => {
                    return Ok(Some(NativeInstruction::new(NativeOperation::Move, qubits)));
                }
                _ => {}
            }
        }

        if !self.allow_passthrough {
            return Err(IqmError::UnsupportedInstruction {
                name: gate.name().to_string(),
                circuit: circuit.name().to_string(),
            });
        }

        let params: Vec<&ParameterExpression> = match &gate.kind {
            GateKind::Standard(g) => g.parameters(),
            GateKind::Custom(g) => g.params.iter().collect(),
        };
        let mut args = Map::new();
        for (i, p) in params.into_iter().enumerate() {
            args.insert(format!("p{i}"), Value::from(p.evaluate()?));
        }
        debug!("Passing through '{}' on {:?}", gate.name(), qubits);
        Ok(Some(NativeInstruction::new(
            NativeOperation::Unsupported {
                name: gate.name().to_string(),
                args,
            },
            qubits,
        )))
    }

    fn conditioned(
        &self,
        circuit: &Circuit,
        inst: &Instruction,
        gate: &Gate,
        condition: &ClassicalCondition,
        out: &mut [NativeInstruction],
        last_measure: &FxHashMap<ClbitId, (usize, String)>,
    ) -> IqmResult<NativeInstruction> {
        let clbit = match &condition.target {
            ConditionTarget::Clbit(clbit) => *clbit,
            ConditionTarget::Register(name) => {
                let (idx, reg) = circuit
                    .cregs()
                    .iter()
                    .enumerate()
                    .find(|(_, r)| &r.name == name)
                    .ok_or_else(|| {
                        IqmError::InvalidCondition(format!("unknown register '{name}'"))
                    })?;
                if reg.size != 1 {
                    return Err(IqmError::InvalidCondition(format!(
                        "register '{name}' has {} bits; only single bits can be fed forward",
                        reg.size
                    )));
                }
                circuit.clbit_at(idx, 0).ok_or_else(|| {
                    IqmError::InvalidCondition(format!("register '{name}' is empty"))
                })?
            }
        };

        if condition.value != 1 {
            return Err(IqmError::InvalidCondition(format!(
                "'{}' is conditioned on value {}; only 1 is supported",
                gate.name(),
                condition.value
            )));
        }

        let Some((angle_t, phase_t)) = gate.as_standard().map(prx_angles).transpose()?.flatten()
        else {
            return Err(IqmError::InvalidCondition(format!(
                "'{}' cannot be classically controlled; only rotations can",
                gate.name()
            )));
        };

        let (position, feedback_qubit) = last_measure.get(&clbit).ok_or_else(|| {
            IqmError::InvalidCondition(format!(
                "'{}' is conditioned on {clbit}, which is not measured before it",
                gate.name()
            ))
        })?;

        let feedback_key = MeasurementKey::from_clbit(circuit, clbit)?.to_string();
        if let Some(measure) = out.get_mut(*position) {
            measure
                .args
                .insert("feedback_key".to_string(), Value::from(feedback_key.clone()));
        }

        Ok(NativeInstruction::new(
            NativeOperation::CcPrx {
                angle_t,
                phase_t,
                feedback_key,
                feedback_qubit: feedback_qubit.clone(),
            },
            self.names_of(&inst.qubits)?,
        ))
    }

    /// Rebuild a physical circuit from native instructions.
    ///
    /// Classical registers are recreated from the measurement keys in
    /// register order. Register positions no key refers to get an empty
    /// placeholder register so the positions of the others are kept.
    pub fn deserialize(&self, wire: &WireCircuit) -> IqmResult<Circuit> {
        let index: FxHashMap<&str, QubitId> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), QubitId(i as u32)))
            .collect();
        let qubits_of = |inst: &NativeInstruction| -> IqmResult<Vec<QubitId>> {
            inst.qubits
                .iter()
                .map(|n| {
                    index
                        .get(n.as_str())
                        .copied()
                        .ok_or_else(|| IqmError::UnknownQubit(n.clone()))
                })
                .collect()
        };

        let mut circuit = Circuit::new(wire.name.clone());
        circuit.add_qubits(self.names.len() as u32);
        rebuild_registers(&mut circuit, wire)?;

        let mut feedback_keys: FxHashSet<String> = FxHashSet::default();
        for inst in &wire.instructions {
            let qubits = qubits_of(inst)?;
            let rebuilt = match inst.operation()? {
                NativeOperation::Prx { angle_t, phase_t } => Instruction::gate(
                    StandardGate::R(
                        ParameterExpression::constant(angle_t * TAU),
                        ParameterExpression::constant(phase_t * TAU),
                    ),
                    qubits,
                ),
                NativeOperation::CcPrx {
                    angle_t,
                    phase_t,
                    feedback_key,
                    ..
                } => {
                    if !feedback_keys.contains(&feedback_key) {
                        return Err(IqmError::MissingFeedback(feedback_key));
                    }
                    let clbit = clbit_for_key(&circuit, &feedback_key)?;
                    let gate = Gate::standard(StandardGate::R(
                        ParameterExpression::constant(angle_t * TAU),
                        ParameterExpression::constant(phase_t * TAU),
                    ))
                    .with_condition(ClassicalCondition::on_clbit(clbit, 1));
                    Instruction::gate(gate, qubits)
                }
                NativeOperation::Cz => Instruction::gate(StandardGate::CZ, qubits),
                NativeOperation::Move => Instruction::gate(StandardGate::Move, qubits),
                NativeOperation::Barrier => Instruction::barrier(qubits),
                NativeOperation::Reset => {
                    for q in qubits {
                        circuit.apply(Instruction::reset(q))?;
                    }
                    continue;
                }
                NativeOperation::Delay { duration } => {
                    Instruction::delay(qubits, duration, TimeUnit::S)
                }
                NativeOperation::Measure { key, feedback_key } => {
                    let [qubit] = qubits.as_slice() else {
                        return Err(IqmError::MalformedInstruction {
                            name: inst.name.clone(),
                            reason: format!("expected one qubit, got {}", qubits.len()),
                        });
                    };
                    let clbit = clbit_for_key(&circuit, &key)?;
                    if let Some(fk) = feedback_key {
                        feedback_keys.insert(fk);
                    }
                    Instruction::measure(*qubit, clbit)
                }
                NativeOperation::Unsupported { name, args } => {
                    let params = (0..)
                        .map_while(|i| args.get(&format!("p{i}")).and_then(Value::as_f64))
                        .map(ParameterExpression::constant)
                        .collect();
                    let gate = CustomGate::new(name, qubits.len() as u32).with_params(params);
                    Instruction::gate(gate, qubits)
                }
            };
            circuit.apply(rebuilt)?;
        }

        if let Some(metadata) = &wire.metadata {
            circuit
                .metadata_mut()
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        circuit.set_level(CircuitLevel::Physical);
        Ok(circuit)
    }
}

/// Angles in full turns of a rotation that maps to `prx`, if it is one.
fn prx_angles(gate: &StandardGate) -> IqmResult<Option<(f64, f64)>> {
    Ok(match gate {
        StandardGate::R(theta, phi) => Some((theta.evaluate()? / TAU, phi.evaluate()? / TAU)),
        StandardGate::X => Some((0.5, 0.0)),
        StandardGate::Rx(theta) => Some((theta.evaluate()? / TAU, 0.0)),
        StandardGate::Y => Some((0.5, 0.25)),
        StandardGate::Ry(theta) => Some((theta.evaluate()? / TAU, 0.25)),
        _ => None,
    })
}

fn clbit_for_key(circuit: &Circuit, key: &str) -> IqmResult<ClbitId> {
    let parsed: MeasurementKey = key.parse()?;
    circuit
        .clbit_at(parsed.creg_idx, parsed.clbit_idx)
        .ok_or_else(|| IqmError::InvalidMeasurementKey(key.to_string()))
}

fn rebuild_registers(circuit: &mut Circuit, wire: &WireCircuit) -> IqmResult<()> {
    let mut registers: BTreeMap<usize, (String, u32)> = BTreeMap::new();
    for inst in &wire.instructions {
        if let NativeOperation::Measure { key, .. } = inst.operation()? {
            let parsed: MeasurementKey = key.parse()?;
            let entry = registers
                .entry(parsed.creg_idx)
                .or_insert_with(|| (parsed.creg_name.clone(), parsed.creg_len));
            if entry.0 != parsed.creg_name || entry.1 != parsed.creg_len {
                return Err(IqmError::InvalidMeasurementKey(key));
            }
        }
    }

    let Some(&last) = registers.keys().next_back() else {
        return Ok(());
    };
    let taken: FxHashSet<String> = registers.values().map(|(n, _)| n.clone()).collect();
    for idx in 0..=last {
        match registers.get(&idx) {
            Some((name, len)) => {
                circuit.add_creg(name.clone(), *len)?;
            }
            None => {
                let mut name = format!("_unused_{idx}");
                while taken.contains(&name) {
                    name.push('_');
                }
                circuit.add_creg(name, 0)?;
            }
        }
    }
    Ok(())
}

/// Scalar metadata entries; anything else is dropped with a warning.
fn scalar_metadata(circuit: &Circuit) -> Option<Map<String, Value>> {
    let mut kept = Map::new();
    for (key, value) in circuit.metadata() {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                kept.insert(key.clone(), value.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                warn!(
                    "Dropping metadata '{}' of circuit '{}': only scalar values are serialized",
                    key,
                    circuit.name()
                );
            }
        }
    }
    (!kept.is_empty()).then_some(kept)
}
