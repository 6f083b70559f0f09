//! Measurement keys: a classical bit's register identity on the wire.
//!
//! IQM measurements carry a string key and results come back keyed the same
//! way. The key has to be enough to rebuild the register layout of the
//! circuit, so it encodes `{register}_{register_len}_{register_index}_{bit}`.
//! Register names may contain underscores; the key is parsed from the right.

use std::fmt;
use std::str::FromStr;

use starling_ir::{Circuit, ClbitId};

use crate::error::{IqmError, IqmResult};

/// Identity of one classical bit inside its register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementKey {
    /// Register name.
    pub creg_name: String,
    /// Register size.
    pub creg_len: u32,
    /// Position of the register in the circuit's register order.
    pub creg_idx: usize,
    /// Bit position inside the register.
    pub clbit_idx: u32,
}

impl MeasurementKey {
    /// Create a key.
    pub fn new(
        creg_name: impl Into<String>,
        creg_len: u32,
        creg_idx: usize,
        clbit_idx: u32,
    ) -> Self {
        Self {
            creg_name: creg_name.into(),
            creg_len,
            creg_idx,
            clbit_idx,
        }
    }

    /// The key of a classical bit of `circuit`.
    pub fn from_clbit(circuit: &Circuit, clbit: ClbitId) -> IqmResult<Self> {
        let (creg_idx, creg, clbit_idx) = circuit
            .register_of(clbit)
            .ok_or_else(|| IqmError::BitOutsideRegister(clbit.to_string()))?;
        Ok(Self::new(creg.name.clone(), creg.size, creg_idx, clbit_idx))
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.creg_name, self.creg_len, self.creg_idx, self.clbit_idx
        )
    }
}

impl FromStr for MeasurementKey {
    type Err = IqmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IqmError::InvalidMeasurementKey(s.to_string());
        let mut parts = s.rsplitn(4, '_');
        let clbit_idx = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let creg_idx = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let creg_len: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let creg_name = parts.next().filter(|n| !n.is_empty()).ok_or_else(invalid)?;
        if clbit_idx >= creg_len {
            return Err(invalid());
        }
        Ok(Self::new(creg_name, creg_len, creg_idx, clbit_idx))
    }
}
