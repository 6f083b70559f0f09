//! Error profiles of IQM chips and the noise parameters derived from them.
//!
//! An [`IqmErrorProfile`] describes one QPU specimen by component name:
//! coherence times, depolarizing parameters per gate and locus, gate
//! durations and readout errors. [`IqmErrorProfile::noise_parameters`] turns
//! it into per-locus [`GateError`]s, each a thermal relaxation of every locus
//! component for the gate's duration followed by a depolarizing channel, and
//! per-component readout confusion matrices.
//!
//! Times are in nanoseconds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use starling_ir::DeviceDescription;

use crate::error::{IqmError, IqmResult};

/// Readout error of one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadoutError {
    /// Probability of reading 1 when the state was 0.
    pub e0: f64,
    /// Probability of reading 0 when the state was 1.
    pub e1: f64,
}

impl ReadoutError {
    /// The same error for both states.
    pub fn symmetric(e: f64) -> Self {
        Self { e0: e, e1: e }
    }

    /// Confusion matrix `[[P(0|0), P(1|0)], [P(0|1), P(1|1)]]`.
    pub fn matrix(&self) -> [[f64; 2]; 2] {
        [[1.0 - self.e0, self.e0], [self.e1, 1.0 - self.e1]]
    }
}

/// Properties of one QPU specimen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IqmErrorProfile {
    /// T1 per component.
    pub t1s: BTreeMap<String, f64>,
    /// T2 per component.
    pub t2s: BTreeMap<String, f64>,
    /// Depolarizing parameter per single-qubit gate and component.
    pub single_qubit_gate_depolarizing_error_parameters: BTreeMap<String, BTreeMap<String, f64>>,
    /// Depolarizing parameter per two-qubit gate and component pair.
    pub two_qubit_gate_depolarizing_error_parameters:
        BTreeMap<String, BTreeMap<(String, String), f64>>,
    /// Duration per single-qubit gate.
    pub single_qubit_gate_durations: BTreeMap<String, f64>,
    /// Duration per two-qubit gate.
    pub two_qubit_gate_durations: BTreeMap<String, f64>,
    /// Readout error per component.
    pub readout_errors: BTreeMap<String, ReadoutError>,
    /// Specimen name.
    pub name: Option<String>,
}

/// Thermal relaxation of one component over one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalRelaxation {
    /// Component name.
    pub component: String,
    /// T1.
    pub t1: f64,
    /// T2.
    pub t2: f64,
    /// Gate duration.
    pub duration: f64,
}

impl ThermalRelaxation {
    /// Probability of amplitude damping during the gate, `1 - exp(-t/T1)`.
    pub fn relaxation_probability(&self) -> f64 {
        1.0 - (-self.duration / self.t1).exp()
    }

    /// Decay of the off-diagonal terms during the gate, `exp(-t/T2)`.
    pub fn coherence_factor(&self) -> f64 {
        (-self.duration / self.t2).exp()
    }
}

/// Error channel of one gate on one ordered locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateError {
    /// Native gate name.
    pub gate: String,
    /// Ordered locus.
    pub locus: Vec<String>,
    /// Relaxation of each locus component, in locus order.
    pub relaxation: Vec<ThermalRelaxation>,
    /// Depolarizing parameter applied after relaxation.
    pub depolarizing: f64,
}

/// Noise parameters of a device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseParameters {
    /// Gate errors; two-qubit errors appear once per qubit order.
    pub gate_errors: Vec<GateError>,
    /// Readout confusion matrix per component.
    pub readout: BTreeMap<String, [[f64; 2]; 2]>,
}

impl NoiseParameters {
    /// The error of `gate` on exactly `locus`.
    pub fn gate_error(&self, gate: &str, locus: &[&str]) -> Option<&GateError> {
        self.gate_errors.iter().find(|e| {
            e.gate == gate
                && e.locus.len() == locus.len()
                && e.locus.iter().zip(locus).all(|(a, b)| a == b)
        })
    }
}

fn invalid(msg: impl Into<String>) -> IqmError {
    IqmError::InvalidErrorProfile(msg.into())
}

fn unordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn check_keys<'a>(
    what: &str,
    keys: impl Iterator<Item = &'a String>,
    expected: &BTreeSet<String>,
) -> IqmResult<()> {
    let got: BTreeSet<String> = keys.cloned().collect();
    if &got != expected {
        return Err(invalid(format!(
            "{what} are given for {got:?} but the device components are {expected:?}"
        )));
    }
    Ok(())
}

fn duration_of(durations: &BTreeMap<String, f64>, gate: &str) -> IqmResult<f64> {
    durations
        .get(gate)
        .copied()
        .ok_or_else(|| invalid(format!("gate '{gate}' has no duration")))
}

fn check_probability(what: &str, value: f64) -> IqmResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{what} must be in [0, 1], got {value}")));
    }
    Ok(())
}

impl IqmErrorProfile {
    /// Check that the profile describes `device`.
    pub fn validate(&self, device: &DeviceDescription) -> IqmResult<()> {
        let components: BTreeSet<String> = device.components().map(str::to_string).collect();

        check_keys("T1 times", self.t1s.keys(), &components)?;
        check_keys("T2 times", self.t2s.keys(), &components)?;
        for (component, &t1) in &self.t1s {
            let t2 = self.t2s.get(component).copied().unwrap_or(f64::NAN);
            if !(t1.is_finite() && t1 > 0.0 && t2.is_finite() && t2 > 0.0) {
                return Err(invalid(format!(
                    "coherence times of {component} must be positive, got T1={t1}, T2={t2}"
                )));
            }
            if t2 > 2.0 * t1 {
                return Err(invalid(format!(
                    "T2 of {component} ({t2}) exceeds twice its T1 ({t1})"
                )));
            }
        }

        for (gate, params) in &self.single_qubit_gate_depolarizing_error_parameters {
            self.check_gate(device, gate, "single_qubit_gate_depolarizing_error_parameters")?;
            check_keys(
                &format!("depolarizing parameters of '{gate}'"),
                params.keys(),
                &components,
            )?;
            for (component, &p) in params {
                check_probability(
                    &format!("depolarizing parameter of '{gate}' on {component}"),
                    p,
                )?;
            }
            if !self.single_qubit_gate_durations.contains_key(gate) {
                return Err(invalid(format!("single-qubit gate '{gate}' has no duration")));
            }
        }

        for (gate, params) in &self.two_qubit_gate_depolarizing_error_parameters {
            self.check_gate(device, gate, "two_qubit_gate_depolarizing_error_parameters")?;
            let expected: BTreeSet<(String, String)> = device
                .loci(gate)
                .into_iter()
                .filter_map(|locus| match locus {
                    [a, b] => Some(unordered(a, b)),
                    _ => None,
                })
                .collect();
            let got: BTreeSet<(String, String)> =
                params.keys().map(|(a, b)| unordered(a, b)).collect();
            if got != expected || got.len() != params.len() {
                return Err(invalid(format!(
                    "couplings of '{gate}' are {got:?} but the device loci are {expected:?}"
                )));
            }
            for ((a, b), &p) in params {
                check_probability(&format!("depolarizing parameter of '{gate}' on ({a}, {b})"), p)?;
            }
            if !self.two_qubit_gate_durations.contains_key(gate) {
                return Err(invalid(format!("two-qubit gate '{gate}' has no duration")));
            }
        }

        for (gate, &duration) in self
            .single_qubit_gate_durations
            .iter()
            .chain(&self.two_qubit_gate_durations)
        {
            self.check_gate(device, gate, "durations")?;
            if !duration.is_finite() || duration <= 0.0 {
                return Err(invalid(format!(
                    "duration of '{gate}' must be positive, got {duration}"
                )));
            }
        }

        check_keys("readout errors", self.readout_errors.keys(), &components)?;
        for (component, readout) in &self.readout_errors {
            check_probability(&format!("readout error of {component} in state 0"), readout.e0)?;
            check_probability(&format!("readout error of {component} in state 1"), readout.e1)?;
        }
        Ok(())
    }

    fn check_gate(&self, device: &DeviceDescription, gate: &str, field: &str) -> IqmResult<()> {
        if !device.has_gate(gate) {
            let valid: Vec<&String> = device.gates.keys().collect();
            return Err(invalid(format!(
                "gate '{gate}' in {field} is not supported by the device; valid gates: {valid:?}"
            )));
        }
        Ok(())
    }

    /// Derive per-locus gate errors and readout matrices.
    ///
    /// The profile is validated against `device` first.
    pub fn noise_parameters(&self, device: &DeviceDescription) -> IqmResult<NoiseParameters> {
        self.validate(device)?;
        let relax = |component: &str, duration: f64| -> IqmResult<ThermalRelaxation> {
            match (self.t1s.get(component), self.t2s.get(component)) {
                (Some(&t1), Some(&t2)) => Ok(ThermalRelaxation {
                    component: component.to_string(),
                    t1,
                    t2,
                    duration,
                }),
                _ => Err(invalid(format!("no coherence times for {component}"))),
            }
        };

        let mut gate_errors = Vec::new();
        for (gate, params) in &self.single_qubit_gate_depolarizing_error_parameters {
            let duration = duration_of(&self.single_qubit_gate_durations, gate)?;
            for (component, &p) in params {
                gate_errors.push(GateError {
                    gate: gate.clone(),
                    locus: vec![component.clone()],
                    relaxation: vec![relax(component, duration)?],
                    depolarizing: p,
                });
            }
        }

        for (gate, params) in &self.two_qubit_gate_depolarizing_error_parameters {
            let duration = duration_of(&self.two_qubit_gate_durations, gate)?;
            for ((a, b), &p) in params {
                for (first, second) in [(a, b), (b, a)] {
                    gate_errors.push(GateError {
                        gate: gate.clone(),
                        locus: vec![first.clone(), second.clone()],
                        relaxation: vec![relax(first, duration)?, relax(second, duration)?],
                        depolarizing: p,
                    });
                }
            }
        }

        let readout = self
            .readout_errors
            .iter()
            .map(|(component, e)| (component.clone(), e.matrix()))
            .collect();

        Ok(NoiseParameters {
            gate_errors,
            readout,
        })
    }
}
