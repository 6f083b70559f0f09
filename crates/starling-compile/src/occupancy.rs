//! Resonator occupancy during routing.
//!
//! A resonator holds at most one qubit's state. The map is owned by a single
//! routing or validation run and threaded through it explicitly.

use std::collections::BTreeMap;

use starling_ir::{DeviceDescription, QubitId};

/// Who opened a park.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkOrigin {
    /// A MOVE the router emitted on its own; it may close it at will.
    Inserted,
    /// A MOVE from the input circuit; only the input may close it.
    Existing,
}

/// A qubit state parked in a resonator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Park {
    /// The qubit whose state sits in the resonator.
    pub qubit: QubitId,
    /// Who opened the park.
    pub origin: ParkOrigin,
}

/// Resonator index to parked state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    parks: BTreeMap<QubitId, Park>,
}

impl Occupancy {
    /// An empty occupancy map.
    pub fn new() -> Self {
        Self::default()
    }

    /// What is parked in `resonator`, if anything.
    pub fn occupant(&self, resonator: QubitId) -> Option<Park> {
        self.parks.get(&resonator).copied()
    }

    /// Resonator holding `qubit`'s state, with the park.
    pub fn resonator_of(&self, qubit: QubitId) -> Option<(QubitId, Park)> {
        self.parks
            .iter()
            .find(|(_, park)| park.qubit == qubit)
            .map(|(&r, &park)| (r, park))
    }

    /// Park `qubit` in `resonator`.
    ///
    /// Returns the previous occupant; callers check occupancy first, so a
    /// `Some` here means a bookkeeping bug upstream.
    pub fn park(&mut self, resonator: QubitId, qubit: QubitId, origin: ParkOrigin) -> Option<Park> {
        self.parks.insert(resonator, Park { qubit, origin })
    }

    /// Empty `resonator`, returning what it held.
    pub fn release(&mut self, resonator: QubitId) -> Option<Park> {
        self.parks.remove(&resonator)
    }

    /// Mark the park in `resonator` as coming from the input circuit.
    pub fn adopt(&mut self, resonator: QubitId) {
        if let Some(park) = self.parks.get_mut(&resonator) {
            park.origin = ParkOrigin::Existing;
        }
    }

    /// True when nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.parks.is_empty()
    }

    /// Number of occupied resonators.
    pub fn len(&self) -> usize {
        self.parks.len()
    }

    /// (resonator, park) pairs in resonator order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, Park)> + '_ {
        self.parks.iter().map(|(&r, &p)| (r, p))
    }

    /// Occupancy written with component names, e.g. `{COMP_R: QB1}`.
    pub fn snapshot(&self, device: &DeviceDescription) -> String {
        let name = |q: QubitId| {
            device
                .component_name(q)
                .map_or_else(|| q.to_string(), str::to_string)
        };
        let entries: Vec<String> = self
            .parks
            .iter()
            .map(|(&r, park)| format!("{}: {}", name(r), name(park.qubit)))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}
