//! Starling Compilation for Star-Topology Devices
//!
//! This crate turns logical circuits into circuits an IQM device can run.
//! Devices with a computational resonator connect every qubit to the
//! resonator and to nothing else, so two-qubit gates between data qubits
//! have to be routed through it with MOVE gates.
//!
//! # Architecture
//!
//! ```text
//! Logical Circuit
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (device, layout, MOVE options)
//! └─────────────┘
//!       │
//!       ├── NativeTranslation   (prx, cz, move)
//!       ├── MoveLayout          (logical qubit -> component)
//!       ├── ApplyLayout         (physical circuit)
//!       ├── Optimize1qDecomposition (optional gate merging)
//!       ├── ResonatorRouting    (MOVE insertion)
//!       └── CircuitValidation   (native loci, MOVE sandwiches)
//!       │
//!       ▼
//! Physical Circuit
//! ```
//!
//! # Example: Compiling for Deneb
//!
//! On a device with a resonator, layout treats the second operand of every
//! two-qubit gate as a resonator slot. A circuit written against data qubits
//! only is placed with an initial layout, and routing parks one of them in
//! the resonator.
//!
//! ```rust
//! use starling_compile::{Layout, PassManagerBuilder, RoutingStats};
//! use starling_ir::{Circuit, CircuitLevel, ClbitId, QubitId, device::deneb};
//!
//! let mut circuit = Circuit::with_size("bell", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! circuit.measure(QubitId(0), ClbitId(0)).unwrap();
//! circuit.measure(QubitId(1), ClbitId(1)).unwrap();
//!
//! let device = deneb();
//! let layout = Layout::from_names(&device, [(QubitId(0), "QB1"), (QubitId(1), "QB2")]).unwrap();
//! let (pm, mut props) = PassManagerBuilder::new()
//!     .with_device(device)
//!     .with_initial_layout(layout)
//!     .build();
//! pm.run(&mut circuit, &mut props).unwrap();
//!
//! assert_eq!(circuit.level(), CircuitLevel::Physical);
//! assert_eq!(props.get::<RoutingStats>().unwrap().moves_inserted, 2);
//! ```
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to add a pass:
//!
//! ```rust
//! use starling_compile::{CompileResult, Pass, PassKind, PropertySet};
//! use starling_ir::Circuit;
//!
//! struct CountGates;
//!
//! impl Pass for CountGates {
//!     fn name(&self) -> &str { "count_gates" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&self, circuit: &mut Circuit, props: &mut PropertySet) -> CompileResult<()> {
//!         props.insert(circuit.len());
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
mod locus;
pub mod manager;
pub mod occupancy;
pub mod pass;
pub mod passes;
pub mod property;
pub mod unitary;

pub use error::{CompileError, CompileResult};
pub use manager::{PassManager, PassManagerBuilder};
pub use occupancy::{Occupancy, Park, ParkOrigin};
pub use pass::{Pass, PassKind};
pub use passes::{
    ApplyLayout, CircuitValidation, MoveLayout, NativeTranslation, Optimize1qDecomposition,
    ResonatorRouting, generate_layout, validate_circuit,
};
pub use property::{ExistingMoveHandling, Layout, MoveValidationMode, PropertySet, RoutingStats};
