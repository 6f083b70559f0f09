//! Built-in compilation passes.
//!
//! In pipeline order:
//! - [`NativeTranslation`]: standard gates to `prx`/`cz`/`move`
//! - [`MoveLayout`]: logical qubits to device components
//! - [`ApplyLayout`]: rewrite the circuit onto components
//! - [`Optimize1qDecomposition`]: merge single-qubit gates (opt-in)
//! - [`ResonatorRouting`]: insert the MOVEs resonator-mediated gates need
//! - [`CircuitValidation`]: native loci and MOVE sandwich checks

pub mod apply_layout;
pub mod layout;
pub mod optimize_1q;
pub mod routing;
pub mod translation;
pub mod validation;

pub use apply_layout::ApplyLayout;
pub use layout::{MoveLayout, generate_layout};
pub use optimize_1q::Optimize1qDecomposition;
pub use routing::ResonatorRouting;
pub use translation::NativeTranslation;
pub use validation::{CircuitValidation, validate_circuit};
