//! Starling Circuit and Device Model
//!
//! This crate provides the data structures the rest of Starling works on:
//! a small, validated circuit IR and the description of an IQM device's
//! components and native gate loci.
//!
//! # Overview
//!
//! Circuits are ordered instruction lists. A circuit starts at
//! [`CircuitLevel::Logical`], where qubit ids are virtual; after layout it is
//! [`CircuitLevel::Physical`] and `QubitId(i)` names component `i` of the
//! target [`DeviceDescription`] (qubits first, then computational resonators).
//!
//! # Core Components
//!
//! - **Qubits and Classical Bits**: [`QubitId`], [`ClbitId`], [`ClassicalRegister`]
//! - **Gates**: [`StandardGate`] for the gates the IQM toolchain knows about,
//!   including the resonator [`StandardGate::Move`], and [`CustomGate`] for the rest
//! - **Parameters**: [`ParameterExpression`] for symbolic angles
//! - **Instructions**: [`Instruction`] combining an operation with its operands
//! - **Circuit**: [`Circuit`] builder with operand validation
//! - **Device**: [`DeviceDescription`] with loci queries and presets
//!
//! # Example: Building a GHZ state through a resonator
//!
//! ```rust
//! use starling_ir::{Circuit, ClbitId, QubitId};
//!
//! // Two data qubits and one resonator slot (index 2).
//! let mut circuit = Circuit::with_size("ghz", 3, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.move_gate(QubitId(0), QubitId(2)).unwrap();
//! circuit.h(QubitId(1)).unwrap();
//! circuit.cz(QubitId(1), QubitId(2)).unwrap();
//! circuit.h(QubitId(1)).unwrap();
//! circuit.move_gate(QubitId(0), QubitId(2)).unwrap();
//! circuit.measure(QubitId(0), ClbitId(0)).unwrap();
//! circuit.measure(QubitId(1), ClbitId(1)).unwrap();
//!
//! assert_eq!(circuit.len(), 8);
//! ```
//!
//! # Example: Device lookups
//!
//! ```rust
//! use starling_ir::device::{deneb, native};
//!
//! let device = deneb();
//! assert!(device.supports(native::MOVE, &["QB1", "COMP_R"]));
//! assert!(!device.supports(native::CZ, &["QB1", "QB2"]));
//! ```

pub mod circuit;
pub mod device;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::{Circuit, CircuitLevel};
pub use device::{DeviceDescription, GateImplementation, GateInfo};
pub use error::{IrError, IrResult};
pub use gate::{
    ClassicalCondition, ConditionTarget, CustomGate, Gate, GateKind, MOVE_PHASE, StandardGate,
    move_unitary,
};
pub use instruction::{Instruction, InstructionKind, OperationKind, TimeUnit};
pub use parameter::{BinaryOp, ParameterExpression};
pub use qubit::{ClassicalRegister, Clbit, ClbitId, QubitId};
