//! Shot data formatting and counts.
//!
//! The service returns, per circuit, a map from measurement key to per-shot
//! bit values. A formatted shot lists the measured registers in reverse
//! creation order, separated by spaces, each written with its highest bit
//! leftmost. Bits of a register that were never measured read `0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IqmError, IqmResult};
use crate::measurement_key::MeasurementKey;
use crate::wire::CircuitMeasurements;

/// Measurement counts, keyed by formatted bitstring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.0.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Count of one bitstring, zero if never seen.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.0.get(bitstring).copied().unwrap_or(0)
    }

    /// Sum over all bitstrings.
    pub fn total_shots(&self) -> u64 {
        self.0.values().sum()
    }

    /// Number of distinct bitstrings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing was counted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bitstrings and counts in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The most frequent bitstring, ties broken by sort order.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.iter().fold(None, |best, (k, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((k, v)),
        })
    }
}

impl<'a> FromIterator<&'a str> for Counts {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for shot in iter {
            counts.insert(shot, 1);
        }
        counts
    }
}

/// Format one circuit's shot data into per-shot bitstrings.
///
/// `shots` is the number of shots requested; without it the length of the
/// data is used.
pub fn format_measurements(
    measurements: &CircuitMeasurements,
    shots: Option<usize>,
) -> IqmResult<Vec<String>> {
    let num_shots = match shots {
        Some(n) => n,
        None => measurements.values().next().map_or(0, Vec::len),
    };

    // Register index -> per-shot bits.
    let mut registers: BTreeMap<usize, (u32, Vec<Vec<u8>>)> = BTreeMap::new();
    for (raw_key, data) in measurements {
        let key: MeasurementKey = raw_key.parse()?;
        if data.len() != num_shots {
            return Err(IqmError::InconsistentResults(format!(
                "'{raw_key}' has {} shots, expected {num_shots}",
                data.len()
            )));
        }

        let (len, bits) = registers
            .entry(key.creg_idx)
            .or_insert_with(|| (key.creg_len, vec![vec![0; key.creg_len as usize]; num_shots]));
        if *len != key.creg_len {
            return Err(IqmError::InconsistentResults(format!(
                "register {} reported with sizes {len} and {}",
                key.creg_idx, key.creg_len
            )));
        }

        for (shot, values) in data.iter().enumerate() {
            let value = values.first().copied().ok_or_else(|| {
                IqmError::InconsistentResults(format!("'{raw_key}' has an empty shot {shot}"))
            })?;
            bits[shot][key.clbit_idx as usize] = value;
        }
    }

    Ok((0..num_shots)
        .map(|shot| {
            registers
                .values()
                .rev()
                .map(|(_, bits)| {
                    bits[shot]
                        .iter()
                        .rev()
                        .map(|&b| if b == 0 { '0' } else { '1' })
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect())
}

/// Format shot data of a whole batch, checking there is one entry per circuit.
pub fn format_batch(
    measurements: Option<&[CircuitMeasurements]>,
    num_circuits: usize,
    shots: Option<usize>,
) -> IqmResult<Vec<Vec<String>>> {
    let measurements =
        measurements.ok_or_else(|| IqmError::MissingResults("no shot data returned".into()))?;
    if measurements.len() != num_circuits {
        return Err(IqmError::InconsistentResults(format!(
            "{} circuits submitted but results for {}",
            num_circuits,
            measurements.len()
        )));
    }
    measurements
        .iter()
        .map(|m| format_measurements(m, shots))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shots(values: &[u8]) -> Vec<Vec<u8>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn test_register_order_and_bit_order() {
        let mut m = CircuitMeasurements::new();
        // Register 0 "a" (2 bits), register 1 "b" (1 bit).
        m.insert("a_2_0_0".into(), shots(&[1, 0]));
        m.insert("a_2_0_1".into(), shots(&[0, 0]));
        m.insert("b_1_1_0".into(), shots(&[1, 1]));

        let formatted = format_measurements(&m, None).unwrap();
        assert_eq!(formatted, vec!["1 01", "1 00"]);
    }

    #[test]
    fn test_unmeasured_bits_read_zero() {
        let mut m = CircuitMeasurements::new();
        m.insert("c_3_0_2".into(), shots(&[1]));
        assert_eq!(format_measurements(&m, Some(1)).unwrap(), vec!["100"]);
    }

    #[test]
    fn test_inconsistent_lengths() {
        let mut m = CircuitMeasurements::new();
        m.insert("c_2_0_0".into(), shots(&[1, 0, 1]));
        m.insert("c_2_0_1".into(), shots(&[1]));
        assert!(matches!(
            format_measurements(&m, None),
            Err(IqmError::InconsistentResults(_))
        ));
    }

    #[test]
    fn test_requested_shots_must_match() {
        let mut m = CircuitMeasurements::new();
        m.insert("c_1_0_0".into(), shots(&[1, 0]));
        assert!(matches!(
            format_measurements(&m, Some(3)),
            Err(IqmError::InconsistentResults(_))
        ));
    }

    #[test]
    fn test_empty_shot() {
        let mut m = CircuitMeasurements::new();
        m.insert("c_1_0_0".into(), vec![vec![]]);
        assert!(matches!(
            format_measurements(&m, None),
            Err(IqmError::InconsistentResults(_))
        ));
    }

    #[test]
    fn test_bad_key() {
        let mut m = CircuitMeasurements::new();
        m.insert("not-a-key".into(), shots(&[1]));
        assert!(matches!(
            format_measurements(&m, None),
            Err(IqmError::InvalidMeasurementKey(_))
        ));
    }

    #[test]
    fn test_batch_missing_and_mismatched() {
        assert!(matches!(format_batch(None, 1, None), Err(IqmError::MissingResults(_))));

        let batch = vec![CircuitMeasurements::new()];
        assert!(matches!(
            format_batch(Some(&batch), 2, None),
            Err(IqmError::InconsistentResults(_))
        ));
        assert_eq!(format_batch(Some(&batch), 1, Some(2)).unwrap(), vec![vec!["", ""]]);
    }

    #[test]
    fn test_counts() {
        let counts: Counts = ["00", "11", "00", "01"].into_iter().collect();
        assert_eq!(counts.get("00"), 2);
        assert_eq!(counts.get("10"), 0);
        assert_eq!(counts.total_shots(), 4);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.most_frequent(), Some(("00", 2)));

        let keys: Vec<&str> = counts.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["00", "01", "11"]);
    }

    #[test]
    fn test_counts_insert_accumulates() {
        let mut counts = Counts::new();
        counts.insert("1", 3);
        counts.insert("1".to_string(), 2);
        assert_eq!(counts.get("1"), 5);
        assert!(!counts.is_empty());
    }
}
