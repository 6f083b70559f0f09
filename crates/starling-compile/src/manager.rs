//! Pass manager for orchestrating compilation.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use starling_ir::{Circuit, DeviceDescription};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::passes::{
    ApplyLayout, CircuitValidation, MoveLayout, NativeTranslation, Optimize1qDecomposition,
    ResonatorRouting,
};
use crate::property::{ExistingMoveHandling, Layout, MoveValidationMode, PropertySet};

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run all passes on the given circuit.
    #[instrument(skip(self, circuit, properties), fields(circuit = circuit.name()))]
    pub fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        info!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.passes.len(),
            circuit.num_qubits()
        );

        for pass in &self.passes {
            if pass.should_run(circuit, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(circuit, properties)?;
                debug!("Pass {} completed, instructions: {}", pass.name(), circuit.len());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!(
            "Pass manager completed: {} instructions at {:?} level",
            circuit.len(),
            circuit.level()
        );
        Ok(())
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Names of the passes, in run order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the standard star-topology pipeline.
///
/// The pipeline is translation, layout, layout application, MOVE routing and
/// validation, with single-qubit optimization between layout application and
/// routing when enabled. Passes that do not apply (routing on a device without
/// resonators, layout when one is supplied) skip themselves at run time.
pub struct PassManagerBuilder {
    /// Target properties.
    properties: PropertySet,
    optimize_single_qubit: bool,
}

impl PassManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            properties: PropertySet::new(),
            optimize_single_qubit: false,
        }
    }

    /// Set the target properties.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Set the target device.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<Arc<DeviceDescription>>) -> Self {
        self.properties.device = Some(device.into());
        self
    }

    /// Use `layout` instead of searching for one.
    #[must_use]
    pub fn with_initial_layout(mut self, layout: Layout) -> Self {
        self.properties.layout = Some(layout);
        self
    }

    /// Set the policy for MOVEs already in the input.
    #[must_use]
    pub fn with_existing_moves(mut self, policy: ExistingMoveHandling) -> Self {
        self.properties.existing_moves = policy;
        self
    }

    /// Only let layout place logical qubits on these physical qubits.
    #[must_use]
    pub fn restrict_to_qubits<I, S>(mut self, qubits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.restrict_to_qubits = Some(qubits.into_iter().map(Into::into).collect());
        self
    }

    /// Leave MOVEs open at the end of the circuit.
    #[must_use]
    pub fn leave_moves_open(mut self, open: bool) -> Self {
        self.properties.leave_moves_open = open;
        self
    }

    /// Set the MOVE sandwich validation mode.
    #[must_use]
    pub fn with_validation_mode(mut self, mode: MoveValidationMode) -> Self {
        self.properties.validation_mode = mode;
        self
    }

    /// Merge single-qubit gates after layout.
    #[must_use]
    pub fn optimize_single_qubit_gates(mut self, enabled: bool) -> Self {
        self.optimize_single_qubit = enabled;
        self
    }

    /// Build the pass manager and return it with the properties.
    pub fn build(self) -> (PassManager, PropertySet) {
        let mut pm = PassManager::new();
        pm.add_pass(NativeTranslation);
        pm.add_pass(MoveLayout);
        pm.add_pass(ApplyLayout);
        if self.optimize_single_qubit {
            pm.add_pass(Optimize1qDecomposition);
        }
        pm.add_pass(ResonatorRouting);
        pm.add_pass(CircuitValidation);
        (pm, self.properties)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starling_ir::QubitId;
    use starling_ir::device::deneb;

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn test_empty_pass_manager_leaves_circuit_alone() {
        let pm = PassManager::new();
        let mut props = PropertySet::new();

        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();

        pm.run(&mut circuit, &mut props).unwrap();
        assert_eq!(circuit.len(), 2);
    }

    #[test]
    fn test_pass_manager_builder() {
        let (pm, props) = PassManagerBuilder::new()
            .with_device(deneb())
            .restrict_to_qubits(["QB1", "QB2"])
            .with_existing_moves(ExistingMoveHandling::Trust)
            .leave_moves_open(true)
            .build();

        assert_eq!(
            pm.pass_names(),
            vec![
                "NativeTranslation",
                "MoveLayout",
                "ApplyLayout",
                "ResonatorRouting",
                "CircuitValidation"
            ]
        );
        assert!(props.device.is_some());
        assert_eq!(props.restrict_to_qubits.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(props.existing_moves, ExistingMoveHandling::Trust);
        assert!(props.leave_moves_open);
    }

    #[test]
    fn test_builder_with_single_qubit_optimization() {
        let (pm, _) = PassManagerBuilder::new()
            .with_device(deneb())
            .optimize_single_qubit_gates(true)
            .build();
        assert_eq!(pm.len(), 6);
        assert_eq!(pm.pass_names()[3], "Optimize1qDecomposition");
    }
}
