//! Device description: components and native gate loci.
//!
//! The JSON shape follows IQM's dynamic quantum architecture:
//!
//! ```json
//! {
//!   "calibration_set_id": "26c5e70f-bea0-43af-bd37-6212ec7d04cb",
//!   "qubits": ["QB1", "QB2"],
//!   "computational_resonators": ["COMP_R"],
//!   "gates": {
//!     "prx": {
//!       "implementations": {"drag_gaussian": {"loci": [["QB1"], ["QB2"]]}},
//!       "default_implementation": "drag_gaussian"
//!     }
//!   }
//! }
//! ```
//!
//! Components are indexed qubits first, then resonators, both in declaration
//! order. A physical circuit's `QubitId(i)` is component `i`.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IrError, IrResult};
use crate::qubit::QubitId;

/// Native gate names used on IQM devices.
pub mod native {
    /// Phased X rotation.
    pub const PRX: &str = "prx";
    /// Classically controlled phased X rotation.
    pub const CC_PRX: &str = "cc_prx";
    /// Controlled-Z.
    pub const CZ: &str = "cz";
    /// Qubit/resonator state transfer.
    pub const MOVE: &str = "move";
    /// Measurement.
    pub const MEASURE: &str = "measure";
    /// Active reset.
    pub const RESET: &str = "reset";
}

/// Loci of one calibrated implementation of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateImplementation {
    /// Ordered component tuples the implementation is calibrated for.
    pub loci: Vec<Vec<String>>,
}

/// A native gate with its implementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateInfo {
    /// Implementations by name.
    pub implementations: BTreeMap<String, GateImplementation>,
    /// Implementation used when none is requested.
    pub default_implementation: String,
}

impl GateInfo {
    /// A gate with a single implementation named `default`.
    pub fn single(loci: Vec<Vec<String>>) -> Self {
        let mut implementations = BTreeMap::new();
        implementations.insert("default".to_string(), GateImplementation { loci });
        Self {
            implementations,
            default_implementation: "default".to_string(),
        }
    }

    /// Union of loci over all implementations, first occurrence order.
    pub fn loci(&self) -> Vec<&[String]> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for imp in self.implementations.values() {
            for locus in &imp.loci {
                if seen.insert(locus.as_slice()) {
                    out.push(locus.as_slice());
                }
            }
        }
        out
    }
}

/// Components and native gate loci of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescription {
    /// Calibration set the loci belong to.
    pub calibration_set_id: Uuid,
    /// Qubit names in declaration order.
    pub qubits: Vec<String>,
    /// Computational resonator names in declaration order.
    #[serde(default)]
    pub computational_resonators: Vec<String>,
    /// Native gates by name.
    pub gates: BTreeMap<String, GateInfo>,
}

impl DeviceDescription {
    /// A device with the given components and no gates.
    pub fn new<Q, R>(qubits: Q, resonators: R) -> Self
    where
        Q: IntoIterator,
        Q::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            calibration_set_id: Uuid::nil(),
            qubits: qubits.into_iter().map(Into::into).collect(),
            computational_resonators: resonators.into_iter().map(Into::into).collect(),
            gates: BTreeMap::new(),
        }
    }

    /// Set the calibration set id.
    #[must_use]
    pub fn with_calibration_set_id(mut self, id: Uuid) -> Self {
        self.calibration_set_id = id;
        self
    }

    /// Add a gate with a single implementation over `loci`.
    #[must_use]
    pub fn with_gate<L, C>(mut self, name: impl Into<String>, loci: L) -> Self
    where
        L: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let loci = loci
            .into_iter()
            .map(|locus| locus.into_iter().map(Into::into).collect())
            .collect();
        self.gates.insert(name.into(), GateInfo::single(loci));
        self
    }

    /// Parse and validate a JSON description.
    pub fn from_json(json: &str) -> IrResult<Self> {
        let device: Self = serde_json::from_str(json)?;
        device.validate()?;
        Ok(device)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> IrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All component names: qubits, then resonators.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.qubits
            .iter()
            .chain(&self.computational_resonators)
            .map(String::as_str)
    }

    /// Number of components.
    pub fn num_components(&self) -> usize {
        self.qubits.len() + self.computational_resonators.len()
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Index of a component by name.
    pub fn component_index(&self, name: &str) -> Option<QubitId> {
        self.components()
            .position(|c| c == name)
            .map(|i| QubitId(i as u32))
    }

    /// Name of the component at `index`.
    pub fn component_name(&self, index: QubitId) -> Option<&str> {
        self.components().nth(index.0 as usize)
    }

    /// True if `name` is a computational resonator.
    pub fn is_resonator(&self, name: &str) -> bool {
        self.computational_resonators.iter().any(|r| r == name)
    }

    /// True if `name` is a qubit.
    pub fn is_qubit(&self, name: &str) -> bool {
        self.qubits.iter().any(|q| q == name)
    }

    /// True if the device has a gate named `name`.
    pub fn has_gate(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }

    /// Loci of a gate, empty if the gate is unknown.
    pub fn loci(&self, gate: &str) -> Vec<&[String]> {
        self.gates.get(gate).map(GateInfo::loci).unwrap_or_default()
    }

    /// True if `locus` is listed for `gate` exactly as given.
    pub fn has_locus(&self, gate: &str, locus: &[&str]) -> bool {
        self.gates.get(gate).is_some_and(|info| {
            info.implementations.values().any(|imp| {
                imp.loci
                    .iter()
                    .any(|l| l.len() == locus.len() && l.iter().zip(locus).all(|(a, b)| a == b))
            })
        })
    }

    /// True if `gate` can run on `locus`.
    ///
    /// Two-qubit loci between two qubits are symmetric for every gate but
    /// `move`. Loci touching a resonator are directional: the resonator is
    /// always the second element.
    pub fn supports(&self, gate: &str, locus: &[&str]) -> bool {
        if self.has_locus(gate, locus) {
            return true;
        }
        match locus {
            [a, b] if gate != native::MOVE && self.is_qubit(a) && self.is_qubit(b) => {
                self.has_locus(gate, &[*b, *a])
            }
            _ => false,
        }
    }

    /// Gate names each qubit can act as the first locus element of.
    ///
    /// Symmetric qubit-qubit loci grant the gate to both ends. Every qubit is
    /// present in the map, possibly with an empty set.
    pub fn qubit_capabilities(&self) -> FxHashMap<&str, BTreeSet<&str>> {
        let mut caps: FxHashMap<&str, BTreeSet<&str>> =
            self.qubits.iter().map(|q| (q.as_str(), BTreeSet::new())).collect();
        for (name, info) in &self.gates {
            for locus in info.loci() {
                let Some(first) = locus.first() else { continue };
                if let Some(set) = caps.get_mut(first.as_str()) {
                    set.insert(name.as_str());
                }
                if name == native::MOVE {
                    continue;
                }
                if let [_, second] = locus {
                    if let Some(set) = caps.get_mut(second.as_str()) {
                        set.insert(name.as_str());
                    }
                }
            }
        }
        caps
    }

    /// Qubits that have a `move` locus, in declaration order.
    pub fn move_qubits(&self) -> Vec<&str> {
        let loci = self.loci(native::MOVE);
        self.qubits
            .iter()
            .map(String::as_str)
            .filter(|q| loci.iter().any(|l| l.first().is_some_and(|f| f == q)))
            .collect()
    }

    /// Check internal consistency.
    ///
    /// Components must be unique, every locus must name known components,
    /// single-qubit gates must act on qubits, `move` loci must be
    /// `[qubit, resonator]`, and a resonator may only appear second in a
    /// two-component locus.
    pub fn validate(&self) -> IrResult<()> {
        let mut seen = FxHashSet::default();
        for c in self.components() {
            if !seen.insert(c) {
                return Err(IrError::InvalidDevice(format!("duplicate component '{c}'")));
            }
        }

        for (name, info) in &self.gates {
            if !info.implementations.contains_key(&info.default_implementation) {
                return Err(IrError::InvalidDevice(format!(
                    "gate '{name}' has unknown default implementation '{}'",
                    info.default_implementation
                )));
            }
            for locus in info.loci() {
                self.validate_locus(name, locus)?;
            }
        }
        Ok(())
    }

    fn validate_locus(&self, gate: &str, locus: &[String]) -> IrResult<()> {
        for c in locus {
            if !self.components().any(|known| known == c) {
                return Err(IrError::UnknownComponent(c.clone()));
            }
        }
        let bad = |reason: &str| {
            Err(IrError::InvalidDevice(format!("{gate} locus {locus:?}: {reason}")))
        };
        match (gate, locus) {
            (native::PRX | native::CC_PRX | native::MEASURE | native::RESET, [q]) => {
                if self.is_resonator(q) {
                    return bad("resonators cannot be rotated, measured or reset");
                }
            }
            (native::PRX | native::CC_PRX | native::MEASURE | native::RESET, _) => {
                return bad("expected a single component");
            }
            (native::MOVE, [q, r]) => {
                if !self.is_qubit(q) || !self.is_resonator(r) {
                    return bad("expected [qubit, resonator]");
                }
            }
            (native::MOVE, _) => return bad("expected [qubit, resonator]"),
            (_, [a, _]) if self.is_resonator(a) => {
                return bad("a resonator may only be the second element");
            }
            (native::CZ, [a, b]) if self.has_gate(native::MOVE) => {
                if self.is_qubit(a) && self.is_qubit(b) {
                    return bad("cz is resonator-mediated on devices with move");
                }
            }
            (native::CZ, [_, _]) => {}
            (native::CZ, _) => return bad("expected two components"),
            _ => {}
        }
        Ok(())
    }
}

fn names(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i}")).collect()
}

fn singles(components: &[String]) -> Vec<Vec<String>> {
    components.iter().map(|c| vec![c.clone()]).collect()
}

/// IQM Adonis: five qubits in a star around QB3, no resonator.
pub fn adonis() -> DeviceDescription {
    let qubits = names("QB", 5);
    let cz = [["QB1", "QB3"], ["QB2", "QB3"], ["QB4", "QB3"], ["QB5", "QB3"]];
    DeviceDescription::new(qubits.clone(), Vec::<String>::new())
        .with_gate(native::PRX, singles(&qubits))
        .with_gate(native::CZ, cz)
        .with_gate(native::MEASURE, singles(&qubits))
}

/// IQM Deneb: six qubits around one computational resonator `COMP_R`.
pub fn deneb() -> DeviceDescription {
    let qubits = names("QB", 6);
    let pairs: Vec<Vec<String>> = qubits
        .iter()
        .map(|q| vec![q.clone(), "COMP_R".to_string()])
        .collect();
    DeviceDescription::new(qubits.clone(), ["COMP_R"])
        .with_gate(native::PRX, singles(&qubits))
        .with_gate(native::CC_PRX, singles(&qubits))
        .with_gate(native::CZ, pairs.clone())
        .with_gate(native::MOVE, pairs)
        .with_gate(native::MEASURE, singles(&qubits))
}

/// Six qubits around `COMP_R` where only QB6 can MOVE; QB1..QB5 can only `cz`.
pub fn move_architecture() -> DeviceDescription {
    let qubits = names("QB", 6);
    let cz: Vec<Vec<String>> = qubits[..5]
        .iter()
        .map(|q| vec![q.clone(), "COMP_R".to_string()])
        .collect();
    DeviceDescription::new(qubits.clone(), ["COMP_R"])
        .with_gate(native::PRX, singles(&qubits))
        .with_gate(native::CZ, cz)
        .with_gate(native::MOVE, [["QB6", "COMP_R"]])
        .with_gate(native::MEASURE, singles(&qubits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_indexing() {
        let d = deneb();
        assert_eq!(d.num_components(), 7);
        assert_eq!(d.num_qubits(), 6);
        assert_eq!(d.component_index("QB1"), Some(QubitId(0)));
        assert_eq!(d.component_index("COMP_R"), Some(QubitId(6)));
        assert_eq!(d.component_name(QubitId(6)), Some("COMP_R"));
        assert_eq!(d.component_name(QubitId(7)), None);
        assert!(d.is_resonator("COMP_R"));
        assert!(!d.is_resonator("QB1"));
    }

    #[test]
    fn test_presets_validate() {
        adonis().validate().unwrap();
        deneb().validate().unwrap();
        move_architecture().validate().unwrap();
    }

    #[test]
    fn test_symmetric_cz_between_qubits() {
        let d = adonis();
        assert!(d.has_locus("cz", &["QB4", "QB3"]));
        assert!(!d.has_locus("cz", &["QB3", "QB4"]));
        assert!(d.supports("cz", &["QB3", "QB4"]));
        assert!(!d.supports("cz", &["QB1", "QB2"]));
    }

    #[test]
    fn test_resonator_loci_are_directional() {
        let d = deneb();
        assert!(d.supports("cz", &["QB2", "COMP_R"]));
        assert!(!d.supports("cz", &["COMP_R", "QB2"]));
        assert!(d.supports("move", &["QB2", "COMP_R"]));
        assert!(!d.supports("move", &["COMP_R", "QB2"]));
    }

    #[test]
    fn test_capabilities() {
        let d = adonis();
        let caps = d.qubit_capabilities();
        assert!(caps["QB3"].contains("cz"));
        assert!(caps["QB1"].contains("cz"));
        assert!(caps["QB1"].contains("prx"));

        let m = move_architecture();
        let caps = m.qubit_capabilities();
        assert!(caps["QB6"].contains("move"));
        assert!(!caps["QB6"].contains("cz"));
        assert!(!caps.contains_key("COMP_R"));
        assert_eq!(m.move_qubits(), vec!["QB6"]);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "calibration_set_id": "26c5e70f-bea0-43af-bd37-6212ec7d04cb",
            "qubits": ["QB1", "QB2"],
            "computational_resonators": ["CR1"],
            "gates": {
                "prx": {
                    "implementations": {"drag_gaussian": {"loci": [["QB1"], ["QB2"]]}},
                    "default_implementation": "drag_gaussian"
                },
                "move": {
                    "implementations": {"tgss_crf": {"loci": [["QB1", "CR1"]]}},
                    "default_implementation": "tgss_crf"
                }
            }
        }"#;
        let d = DeviceDescription::from_json(json).unwrap();
        assert_eq!(d.computational_resonators, vec!["CR1"]);
        assert_eq!(d.loci("prx").len(), 2);
        assert_eq!(d.move_qubits(), vec!["QB1"]);

        let back = DeviceDescription::from_json(&d.to_json().unwrap()).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_missing_resonators_default_to_empty() {
        let json = r#"{
            "calibration_set_id": "00000000-0000-0000-0000-000000000000",
            "qubits": ["QB1"],
            "gates": {}
        }"#;
        let d = DeviceDescription::from_json(json).unwrap();
        assert!(d.computational_resonators.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_loci() {
        let unknown = DeviceDescription::new(["QB1"], Vec::<String>::new())
            .with_gate("prx", [["QB9"]]);
        assert!(matches!(
            unknown.validate(),
            Err(IrError::UnknownComponent(c)) if c == "QB9"
        ));

        let reversed_move =
            DeviceDescription::new(["QB1"], ["CR"]).with_gate("move", [["CR", "QB1"]]);
        assert!(matches!(reversed_move.validate(), Err(IrError::InvalidDevice(_))));

        let direct_cz = DeviceDescription::new(["QB1", "QB2"], ["CR"])
            .with_gate("move", [["QB1", "CR"]])
            .with_gate("cz", [["QB1", "QB2"]]);
        assert!(matches!(direct_cz.validate(), Err(IrError::InvalidDevice(_))));

        let dup = DeviceDescription::new(["QB1", "QB1"], Vec::<String>::new());
        assert!(matches!(dup.validate(), Err(IrError::InvalidDevice(_))));
    }
}
