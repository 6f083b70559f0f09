//! IQM backend: transpile, serialize and submit.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use starling_compile::{
    ExistingMoveHandling, Layout, MoveValidationMode, PassManagerBuilder, RoutingStats,
};
use starling_ir::{Circuit, DeviceDescription, QubitId};

use crate::config::IqmConfig;
use crate::error::{IqmError, IqmResult};
use crate::job::IqmJob;
use crate::serialize::CircuitSerializer;
use crate::service::{ExecutionService, JobId};
use crate::wire::{HeraldingMode, RunRequest, SingleQubitMapping, WireCircuit};

/// Default number of shots.
pub const DEFAULT_SHOTS: u32 = 1024;

/// Per-run options.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Number of shots; must be positive.
    pub shots: u32,
    /// Calibration set to run against.
    pub calibration_set_id: Option<Uuid>,
    /// Reject circuits longer than this multiple of the shortest T2.
    pub max_circuit_duration_over_t2: Option<f64>,
    /// Heralding mode.
    pub heralding_mode: HeraldingMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            shots: DEFAULT_SHOTS,
            calibration_set_id: None,
            max_circuit_duration_over_t2: None,
            heralding_mode: HeraldingMode::None,
        }
    }
}

impl RunOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &IqmConfig) -> Self {
        Self {
            shots: config.shots,
            calibration_set_id: config.calibration_set_id,
            max_circuit_duration_over_t2: config.max_circuit_duration_over_t2,
            heralding_mode: config.heralding_mode,
        }
    }

    /// Set the number of shots.
    #[must_use]
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    /// Set the calibration set id.
    #[must_use]
    pub fn with_calibration_set_id(mut self, id: Uuid) -> Self {
        self.calibration_set_id = Some(id);
        self
    }

    /// Set the heralding mode.
    #[must_use]
    pub fn with_heralding_mode(mut self, mode: HeraldingMode) -> Self {
        self.heralding_mode = mode;
        self
    }

    /// Check option ranges.
    pub fn validate(&self) -> IqmResult<()> {
        if self.shots == 0 {
            return Err(IqmError::InvalidOptions("shots must be positive".into()));
        }
        if let Some(ratio) = self.max_circuit_duration_over_t2 {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(IqmError::InvalidOptions(format!(
                    "max_circuit_duration_over_t2 must be a non-negative number, got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Backend for an IQM device behind an [`ExecutionService`].
///
/// Circuits handed to [`run`](Self::run) must already be physical and span
/// every device component; [`transpile`](Self::transpile) produces such
/// circuits. Qubit `i` goes over the wire as the string `"i"`, and the
/// request's qubit mapping names the component behind each index used.
pub struct IqmBackend<S> {
    name: String,
    device: Arc<DeviceDescription>,
    service: Arc<S>,
    options: RunOptions,
    existing_moves: ExistingMoveHandling,
    validation_mode: MoveValidationMode,
    allow_passthrough: bool,
}

impl<S: ExecutionService> IqmBackend<S> {
    /// Create a backend with default options.
    pub fn new(device: impl Into<Arc<DeviceDescription>>, service: S) -> Self {
        Self {
            name: "IQMBackend".to_string(),
            device: device.into(),
            service: Arc::new(service),
            options: RunOptions::default(),
            existing_moves: ExistingMoveHandling::default(),
            validation_mode: MoveValidationMode::default(),
            allow_passthrough: false,
        }
    }

    /// Create a backend configured from `config`.
    pub fn from_config(
        device: impl Into<Arc<DeviceDescription>>,
        service: S,
        config: &IqmConfig,
    ) -> IqmResult<Self> {
        config.validate()?;
        let mut backend = Self::new(device, service);
        backend.options = RunOptions::from_config(config);
        backend.existing_moves = config.existing_moves;
        backend.validation_mode = config.validation_mode;
        backend.allow_passthrough = config.allow_passthrough;
        Ok(backend)
    }

    /// Set the backend name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the default run options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the policy for MOVEs already present in transpiled circuits.
    #[must_use]
    pub fn with_existing_moves(mut self, policy: ExistingMoveHandling) -> Self {
        self.existing_moves = policy;
        self
    }

    /// Allow serializing instructions without a native counterpart.
    #[must_use]
    pub fn allow_passthrough(mut self, allow: bool) -> Self {
        self.allow_passthrough = allow;
        self
    }

    /// Backend name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target device.
    pub fn device(&self) -> &Arc<DeviceDescription> {
        &self.device
    }

    /// Default run options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// The execution service.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Circuit index of a component.
    pub fn qubit_name_to_index(&self, name: &str) -> Option<QubitId> {
        self.device.component_index(name)
    }

    /// Component at a circuit index.
    pub fn index_to_qubit_name(&self, index: QubitId) -> Option<&str> {
        self.device.component_name(index)
    }

    /// Compile a circuit for the device.
    pub fn transpile(&self, circuit: &Circuit) -> IqmResult<Circuit> {
        self.transpile_with(circuit, None)
    }

    /// Compile a circuit with a fixed initial layout.
    pub fn transpile_with_layout(&self, circuit: &Circuit, layout: Layout) -> IqmResult<Circuit> {
        self.transpile_with(circuit, Some(layout))
    }

    fn transpile_with(&self, circuit: &Circuit, layout: Option<Layout>) -> IqmResult<Circuit> {
        let mut builder = PassManagerBuilder::new()
            .with_device(Arc::clone(&self.device))
            .with_existing_moves(self.existing_moves)
            .with_validation_mode(self.validation_mode);
        if let Some(layout) = layout {
            builder = builder.with_initial_layout(layout);
        }
        let (pm, mut props) = builder.build();

        let mut compiled = circuit.clone();
        pm.run(&mut compiled, &mut props)?;
        if let Some(stats) = props.get::<RoutingStats>() {
            debug!(
                "Transpiled '{}': {} MOVEs inserted, {} kept, {} removed",
                compiled.name(),
                stats.moves_inserted,
                stats.moves_kept,
                stats.moves_removed
            );
        }
        Ok(compiled)
    }

    /// Serializer naming qubits by their circuit index.
    pub fn serializer(&self) -> CircuitSerializer {
        CircuitSerializer::indexed(self.device.num_components())
            .allow_passthrough(self.allow_passthrough)
    }

    /// Serialize a physical circuit for this device.
    pub fn serialize(&self, circuit: &Circuit) -> IqmResult<WireCircuit> {
        self.check_width(circuit)?;
        self.serializer().serialize(circuit)
    }

    fn check_width(&self, circuit: &Circuit) -> IqmResult<()> {
        let expected = self.device.num_components();
        if circuit.num_qubits() != expected {
            return Err(IqmError::CircuitWidth {
                circuit: circuit.name().to_string(),
                expected,
                got: circuit.num_qubits(),
            });
        }
        Ok(())
    }

    /// Build the request [`run`](Self::run) submits.
    pub fn build_request(
        &self,
        circuits: &[Circuit],
        options: &RunOptions,
    ) -> IqmResult<RunRequest> {
        if circuits.is_empty() {
            return Err(IqmError::EmptyBatch);
        }
        options.validate()?;

        let serializer = self.serializer();
        let mut wire = Vec::with_capacity(circuits.len());
        for circuit in circuits {
            self.check_width(circuit)?;
            wire.push(serializer.serialize(circuit)?);
        }

        let used: BTreeSet<&str> = wire
            .iter()
            .flat_map(|c| &c.instructions)
            .flat_map(|i| i.qubits.iter().map(String::as_str))
            .collect();
        let qubit_mapping = serializer
            .names()
            .iter()
            .enumerate()
            .filter(|(_, name)| used.contains(name.as_str()))
            .filter_map(|(i, name)| {
                self.device
                    .component_name(QubitId(i as u32))
                    .map(|physical| SingleQubitMapping {
                        logical_name: name.clone(),
                        physical_name: physical.to_string(),
                    })
            })
            .collect();

        Ok(RunRequest {
            circuits: wire,
            qubit_mapping: Some(qubit_mapping),
            calibration_set_id: options.calibration_set_id,
            shots: options.shots,
            max_circuit_duration_over_t2: options.max_circuit_duration_over_t2,
            heralding_mode: options.heralding_mode,
        })
    }

    /// Submit a batch of physical circuits.
    ///
    /// `options` replaces the backend defaults for this run.
    #[instrument(skip(self, circuits, options), fields(backend = %self.name))]
    pub async fn run(
        &self,
        circuits: &[Circuit],
        options: Option<RunOptions>,
    ) -> IqmResult<IqmJob<S>> {
        let options = options.unwrap_or_else(|| self.options.clone());
        let request = self.build_request(circuits, &options)?;
        info!(
            "Submitting {} circuits to {}: {} shots",
            request.circuits.len(),
            self.name,
            request.shots
        );

        let job_id = self.service.submit(request).await?;
        info!("Job submitted: {}", job_id);

        let names = circuits.iter().map(|c| c.name().to_string()).collect();
        Ok(IqmJob::new(Arc::clone(&self.service), job_id, names, options.shots))
    }

    /// Handle to an earlier run known only by id.
    pub fn retrieve_job(&self, job_id: impl Into<JobId>) -> IqmJob<S> {
        IqmJob::retrieve(Arc::clone(&self.service), job_id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options_default() {
        let options = RunOptions::default();
        assert_eq!(options.shots, 1024);
        assert!(options.calibration_set_id.is_none());
        assert_eq!(options.heralding_mode, HeraldingMode::None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_run_options_validation() {
        let zero = RunOptions::default().with_shots(0);
        assert!(matches!(zero.validate(), Err(IqmError::InvalidOptions(_))));

        let negative = RunOptions {
            max_circuit_duration_over_t2: Some(-1.0),
            ..RunOptions::default()
        };
        assert!(matches!(negative.validate(), Err(IqmError::InvalidOptions(_))));

        let fine = RunOptions::default()
            .with_shots(10)
            .with_heralding_mode(HeraldingMode::Zeros)
            .with_calibration_set_id(Uuid::nil());
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn test_run_options_from_config() {
        let config = IqmConfig {
            shots: 200,
            heralding_mode: HeraldingMode::Zeros,
            ..IqmConfig::default()
        };
        let options = RunOptions::from_config(&config);
        assert_eq!(options.shots, 200);
        assert_eq!(options.heralding_mode, HeraldingMode::Zeros);
    }
}
