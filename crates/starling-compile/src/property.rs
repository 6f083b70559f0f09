//! `PropertySet` and related types for pass communication.
//!
//! This module provides the [`PropertySet`], the shared context every pass
//! receives. It carries the target device, the layout found (or supplied)
//! for the circuit, the options that steer MOVE routing and validation, and
//! arbitrary typed values passes publish for each other.
//!
//! # Examples
//!
//! ## Targeting a device
//!
//! ```
//! use starling_compile::{ExistingMoveHandling, PropertySet};
//! use starling_ir::device::deneb;
//!
//! let props = PropertySet::new()
//!     .with_device(deneb())
//!     .with_existing_moves(ExistingMoveHandling::Remove);
//!
//! assert_eq!(props.device().unwrap().num_components(), 7);
//! ```
//!
//! ## Supplying an initial layout
//!
//! ```
//! use starling_compile::{Layout, PropertySet};
//! use starling_ir::{QubitId, device::deneb};
//!
//! let device = deneb();
//! let layout =
//!     Layout::from_names(&device, [(QubitId(0), "QB3"), (QubitId(1), "COMP_R")]).unwrap();
//! let props = PropertySet::new().with_device(device).with_layout(layout);
//!
//! assert_eq!(props.layout.unwrap().get_physical(QubitId(1)), Some(QubitId(6)));
//! ```
//!
//! ## Custom properties for pass communication
//!
//! ```
//! use starling_compile::{PropertySet, RoutingStats};
//!
//! let mut props = PropertySet::new();
//! props.insert(RoutingStats { moves_inserted: 2, ..Default::default() });
//!
//! assert_eq!(props.get::<RoutingStats>().unwrap().moves_inserted, 2);
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use starling_ir::{DeviceDescription, QubitId};

use crate::error::{CompileError, CompileResult};

/// A mapping from logical qubits to device components.
///
/// Physical ids are component indices of the target device: qubits first,
/// then computational resonators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Map from logical qubit to component index.
    logical_to_physical: FxHashMap<QubitId, QubitId>,
    /// Map from component index to logical qubit.
    physical_to_logical: FxHashMap<QubitId, QubitId>,
}

impl Layout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from component names.
    pub fn from_names<'a>(
        device: &DeviceDescription,
        pairs: impl IntoIterator<Item = (QubitId, &'a str)>,
    ) -> CompileResult<Self> {
        let mut layout = Self::new();
        for (logical, name) in pairs {
            let physical = device
                .component_index(name)
                .ok_or_else(|| starling_ir::IrError::UnknownComponent(name.to_string()))?;
            if layout.get_logical(physical).is_some() || layout.get_physical(logical).is_some() {
                return Err(CompileError::InvalidConfiguration(format!(
                    "layout maps logical qubit {} or component {name} twice",
                    logical.0
                )));
            }
            layout.add(logical, physical);
        }
        Ok(layout)
    }

    /// Add a mapping from logical qubit to component.
    ///
    /// Any previous mapping of either side is dropped so both directions stay
    /// consistent.
    pub fn add(&mut self, logical: QubitId, physical: QubitId) {
        if let Some(old_logical) = self.physical_to_logical.insert(physical, logical) {
            if old_logical != logical {
                self.logical_to_physical.remove(&old_logical);
            }
        }
        if let Some(old_physical) = self.logical_to_physical.insert(logical, physical) {
            if old_physical != physical {
                self.physical_to_logical.remove(&old_physical);
            }
        }
    }

    /// Get the component for a logical qubit.
    pub fn get_physical(&self, logical: QubitId) -> Option<QubitId> {
        self.logical_to_physical.get(&logical).copied()
    }

    /// Get the logical qubit placed on a component.
    pub fn get_logical(&self, physical: QubitId) -> Option<QubitId> {
        self.physical_to_logical.get(&physical).copied()
    }

    /// Get the number of mapped qubits.
    pub fn len(&self) -> usize {
        self.logical_to_physical.len()
    }

    /// Check if the layout is empty.
    pub fn is_empty(&self) -> bool {
        self.logical_to_physical.is_empty()
    }

    /// (logical, physical) pairs in ascending logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, QubitId)> + '_ {
        let mut pairs: Vec<_> = self
            .logical_to_physical
            .iter()
            .map(|(&l, &p)| (l, p))
            .collect();
        pairs.sort_unstable();
        pairs.into_iter()
    }

    /// (logical, component name) pairs in ascending logical order.
    pub fn to_names<'d>(&self, device: &'d DeviceDescription) -> Vec<(QubitId, &'d str)> {
        self.iter()
            .filter_map(|(l, p)| device.component_name(p).map(|name| (l, name)))
            .collect()
    }
}

/// What routing does with MOVE gates already present in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingMoveHandling {
    /// Keep them as fixed decisions, checking their loci, and route the rest.
    #[default]
    Keep,
    /// Strip them and route from scratch.
    Remove,
    /// Keep them without checking their loci.
    Trust,
}

/// How strictly validation treats operations between two MOVEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveValidationMode {
    /// Nothing but barriers may touch a qubit while its state is parked.
    #[default]
    Strict,
    /// Rotations on the parked qubit are allowed.
    AllowPrx,
    /// Only check gate loci.
    None,
}

/// MOVE bookkeeping published by the routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStats {
    /// MOVEs emitted by the router.
    pub moves_inserted: usize,
    /// Input MOVEs dropped.
    pub moves_removed: usize,
    /// Input MOVEs passed through.
    pub moves_kept: usize,
}

/// Properties shared between compilation passes.
///
/// # Standard Properties
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `device` | [`DeviceDescription`] | Target components and native loci |
/// | `layout` | [`Layout`] | Logical qubit to component mapping |
/// | `restrict_to_qubits` | `Vec<String>` | Qubits layout may use |
/// | `existing_moves` | [`ExistingMoveHandling`] | Policy for input MOVEs |
/// | `leave_moves_open` | `bool` | Skip closing MOVEs at the end |
/// | `validation_mode` | [`MoveValidationMode`] | MOVE sandwich rules |
///
/// # Custom Properties
///
/// Passes can store arbitrary data using the type-safe [`insert`](Self::insert)
/// and [`get`](Self::get) methods. Each type can have at most one value stored.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Target device, shared read-only.
    pub device: Option<Arc<DeviceDescription>>,
    /// Qubit layout mapping.
    ///
    /// Set by the layout pass unless supplied up front, in which case layout
    /// is skipped.
    pub layout: Option<Layout>,
    /// Names of the qubits layout may pick from; `None` allows all.
    pub restrict_to_qubits: Option<Vec<String>>,
    /// Policy for MOVEs already in the circuit.
    pub existing_moves: ExistingMoveHandling,
    /// Leave MOVEs open at the end of routing.
    pub leave_moves_open: bool,
    /// Validation mode for MOVE sandwiches.
    pub validation_mode: MoveValidationMode,
    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target device.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<Arc<DeviceDescription>>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set the existing MOVE policy.
    #[must_use]
    pub fn with_existing_moves(mut self, policy: ExistingMoveHandling) -> Self {
        self.existing_moves = policy;
        self
    }

    /// The target device, or [`CompileError::MissingDevice`].
    ///
    /// Returns a clone of the `Arc` so passes can keep it while mutating
    /// other properties.
    pub fn device(&self) -> CompileResult<Arc<DeviceDescription>> {
        self.device.clone().ok_or(CompileError::MissingDevice)
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}
