//! Simulated IQM devices with reference error profiles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use starling_ir::DeviceDescription;
use starling_ir::device::{adonis, deneb};

use crate::backend::IqmBackend;
use crate::error::IqmResult;
use crate::noise::{IqmErrorProfile, NoiseParameters, ReadoutError};
use crate::service::ExecutionService;

/// A device description paired with a validated error profile.
#[derive(Debug, Clone)]
pub struct IqmFakeBackend {
    name: String,
    device: Arc<DeviceDescription>,
    error_profile: IqmErrorProfile,
    noise: NoiseParameters,
}

impl IqmFakeBackend {
    /// Pair `device` with `error_profile`, which must describe it.
    pub fn new(
        device: impl Into<Arc<DeviceDescription>>,
        error_profile: IqmErrorProfile,
        name: impl Into<String>,
    ) -> IqmResult<Self> {
        let device = device.into();
        let noise = error_profile.noise_parameters(&device)?;
        let name = name.into();
        debug!(
            "Fake backend '{}': {} gate errors, {} readout channels",
            name,
            noise.gate_errors.len(),
            noise.readout.len()
        );
        Ok(Self {
            name,
            device,
            error_profile,
            noise,
        })
    }

    /// Backend name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulated device.
    pub fn device(&self) -> &Arc<DeviceDescription> {
        &self.device
    }

    /// The error profile.
    pub fn error_profile(&self) -> &IqmErrorProfile {
        &self.error_profile
    }

    /// Noise derived from the error profile.
    pub fn noise_parameters(&self) -> &NoiseParameters {
        &self.noise
    }

    /// The same device with a different error profile.
    pub fn copy_with_error_profile(&self, error_profile: IqmErrorProfile) -> IqmResult<Self> {
        Self::new(Arc::clone(&self.device), error_profile, self.name.clone())
    }

    /// The same device with the current profile modified by `update`.
    ///
    /// ```ignore
    /// let noisier = fake_adonis()?.with_error_profile(|p| {
    ///     p.t1s.insert("QB1".into(), 2000.0);
    /// })?;
    /// ```
    pub fn with_error_profile(&self, update: impl FnOnce(&mut IqmErrorProfile)) -> IqmResult<Self> {
        let mut profile = self.error_profile.clone();
        update(&mut profile);
        self.copy_with_error_profile(profile)
    }

    /// Whether `device` has the same components and gate loci as this backend.
    ///
    /// Two-qubit loci are compared unordered.
    pub fn validate_compatible_architecture(&self, device: &DeviceDescription) -> bool {
        fn shape(d: &DeviceDescription) -> (Vec<&str>, BTreeMap<&str, BTreeSet<Vec<&str>>>) {
            let components = d.components().collect();
            let gates = d
                .gates
                .keys()
                .map(|gate| {
                    let loci = d
                        .loci(gate)
                        .into_iter()
                        .map(|locus| {
                            let mut locus: Vec<&str> = locus.iter().map(String::as_str).collect();
                            locus.sort_unstable();
                            locus
                        })
                        .collect();
                    (gate.as_str(), loci)
                })
                .collect();
            (components, gates)
        }
        shape(&self.device) == shape(device)
    }

    /// A backend for the simulated device that submits to `service`.
    pub fn backend<S: ExecutionService>(&self, service: S) -> IqmBackend<S> {
        IqmBackend::new(Arc::clone(&self.device), service).with_name(self.name.clone())
    }
}

fn uniform(components: &[&str], value: f64) -> BTreeMap<String, f64> {
    components.iter().map(|c| (c.to_string(), value)).collect()
}

fn couplings(pairs: &[(&str, &str, f64)]) -> BTreeMap<(String, String), f64> {
    pairs
        .iter()
        .map(|&(a, b, p)| ((a.to_string(), b.to_string()), p))
        .collect()
}

fn per_gate<V>(entries: impl IntoIterator<Item = (&'static str, V)>) -> BTreeMap<String, V> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Reference error profile of a five-qubit Adonis chip.
pub fn adonis_error_profile() -> IqmErrorProfile {
    let per_qubit = |values: [f64; 5]| -> BTreeMap<String, f64> {
        ["QB1", "QB2", "QB3", "QB4", "QB5"]
            .iter()
            .zip(values)
            .map(|(q, v)| (q.to_string(), v))
            .collect()
    };
    let readout = per_qubit([0.021, 0.018, 0.056, 0.021, 0.023])
        .into_iter()
        .map(|(q, e)| (q, ReadoutError::symmetric(e)))
        .collect();

    IqmErrorProfile {
        t1s: per_qubit([27000.0, 33000.0, 25000.0, 40000.0, 25000.0]),
        t2s: per_qubit([20000.0, 26000.0, 23000.0, 26000.0, 7000.0]),
        single_qubit_gate_depolarizing_error_parameters: per_gate([(
            "prx",
            per_qubit([0.0006, 0.0054, 0.0001, 0.0, 0.0005]),
        )]),
        two_qubit_gate_depolarizing_error_parameters: per_gate([(
            "cz",
            couplings(&[
                ("QB1", "QB3", 0.0335),
                ("QB2", "QB3", 0.0344),
                ("QB3", "QB4", 0.0192),
                ("QB3", "QB5", 0.0373),
            ]),
        )]),
        single_qubit_gate_durations: per_gate([("prx", 40.0)]),
        two_qubit_gate_durations: per_gate([("cz", 80.0)]),
        readout_errors: readout,
        name: Some("sample-chip".to_string()),
    }
}

/// Reference error profile of a six-qubit Deneb chip with one resonator.
pub fn deneb_error_profile() -> IqmErrorProfile {
    let qubits = ["QB1", "QB2", "QB3", "QB4", "QB5", "QB6"];
    let with_resonator = |qubit_value: f64, resonator_value: f64| {
        let mut values = uniform(&qubits, qubit_value);
        values.insert("COMP_R".to_string(), resonator_value);
        values
    };
    let to_resonator = |p: f64| {
        qubits
            .iter()
            .map(|q| ((q.to_string(), "COMP_R".to_string()), p))
            .collect::<BTreeMap<_, _>>()
    };
    let mut readout: BTreeMap<String, ReadoutError> = qubits
        .iter()
        .map(|q| (q.to_string(), ReadoutError::symmetric(0.977)))
        .collect();
    readout.insert("COMP_R".to_string(), ReadoutError::symmetric(0.0));

    IqmErrorProfile {
        t1s: with_resonator(35000.0, 5400.0),
        t2s: with_resonator(33000.0, 10800.0),
        single_qubit_gate_depolarizing_error_parameters: per_gate([(
            "prx",
            with_resonator(0.0002, 0.0),
        )]),
        two_qubit_gate_depolarizing_error_parameters: per_gate([
            ("cz", to_resonator(0.0128)),
            ("move", to_resonator(0.0)),
        ]),
        single_qubit_gate_durations: per_gate([("prx", 40.0)]),
        two_qubit_gate_durations: per_gate([("cz", 120.0), ("move", 96.0)]),
        readout_errors: readout,
        name: Some("sample-chip".to_string()),
    }
}

/// Fake five-qubit Adonis backend.
pub fn fake_adonis() -> IqmResult<IqmFakeBackend> {
    IqmFakeBackend::new(adonis(), adonis_error_profile(), "IQMFakeAdonisBackend")
}

/// Fake six-qubit Deneb backend.
pub fn fake_deneb() -> IqmResult<IqmFakeBackend> {
    IqmFakeBackend::new(deneb(), deneb_error_profile(), "IQMFakeDenebBackend")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IqmError;
    use starling_ir::device::move_architecture;

    #[test]
    fn test_reference_profiles_are_valid() {
        let adonis = fake_adonis().unwrap();
        assert_eq!(adonis.name(), "IQMFakeAdonisBackend");
        assert_eq!(adonis.device().num_components(), 5);
        assert_eq!(adonis.error_profile().name.as_deref(), Some("sample-chip"));

        let deneb = fake_deneb().unwrap();
        assert_eq!(deneb.name(), "IQMFakeDenebBackend");
        assert_eq!(deneb.device().num_components(), 7);
    }

    #[test]
    fn test_deneb_noise() {
        let deneb = fake_deneb().unwrap();
        let noise = deneb.noise_parameters();
        // 7 prx + (6 cz + 6 move) in both orders.
        assert_eq!(noise.gate_errors.len(), 7 + 24);

        let mv = noise.gate_error("move", &["COMP_R", "QB2"]).unwrap();
        assert_eq!(mv.depolarizing, 0.0);
        assert_eq!(mv.relaxation[0].t1, 5400.0);
        assert_eq!(mv.relaxation[1].duration, 96.0);
        assert_eq!(noise.readout["COMP_R"], [[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_with_error_profile() {
        let adonis = fake_adonis().unwrap();
        let updated = adonis
            .with_error_profile(|p| {
                p.t1s.insert("QB1".into(), 2000.0);
                p.t2s.insert("QB1".into(), 1000.0);
            })
            .unwrap();
        assert_eq!(updated.error_profile().t1s["QB1"], 2000.0);
        assert_eq!(adonis.error_profile().t1s["QB1"], 27000.0);
        assert_eq!(updated.name(), adonis.name());

        let prx = updated.noise_parameters().gate_error("prx", &["QB1"]).unwrap();
        assert_eq!(prx.relaxation[0].t1, 2000.0);
    }

    #[test]
    fn test_with_error_profile_revalidates() {
        let adonis = fake_adonis().unwrap();
        let result = adonis.with_error_profile(|p| {
            p.t1s.insert("QB9".into(), 2000.0);
        });
        assert!(matches!(result, Err(IqmError::InvalidErrorProfile(_))));
    }

    #[test]
    fn test_profile_for_wrong_device() {
        assert!(IqmFakeBackend::new(deneb(), adonis_error_profile(), "mixed").is_err());
    }

    #[test]
    fn test_compatible_architecture() {
        let adonis = fake_adonis().unwrap();
        assert!(adonis.validate_compatible_architecture(&starling_ir::device::adonis()));
        assert!(!adonis.validate_compatible_architecture(&deneb()));

        let deneb = fake_deneb().unwrap();
        assert!(deneb.validate_compatible_architecture(&starling_ir::device::deneb()));
        assert!(!deneb.validate_compatible_architecture(&move_architecture()));
    }
}
