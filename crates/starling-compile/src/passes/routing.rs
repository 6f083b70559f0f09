//! MOVE routing for devices with computational resonators.
//!
//! On a star-topology device two data qubits never interact directly. A `cz`
//! between them is realized by parking one qubit's state in a resonator with a
//! MOVE, applying `cz` between the other qubit and the resonator, and moving
//! the state back later. The router keeps that state in an explicit
//! [`Occupancy`] map and only closes a park when something needs the qubit
//! back, so consecutive interactions with the same parked qubit share one
//! MOVE pair.
//!
//! MOVEs already in the input are governed by [`ExistingMoveHandling`]:
//! they are either fixed decisions the router works around, stripped before
//! routing, or passed through with only structural checks.

use starling_ir::device::native;
use starling_ir::{Circuit, CircuitLevel, DeviceDescription, Instruction, OperationKind, QubitId};
use tracing::{debug, info, warn};

use crate::error::{CompileError, CompileResult};
use crate::locus;
use crate::occupancy::{Occupancy, Park, ParkOrigin};
use crate::pass::{Pass, PassKind};
use crate::property::{ExistingMoveHandling, PropertySet, RoutingStats};

/// Inserts the MOVE gates needed to run two-qubit gates through resonators.
///
/// Runs on physical circuits targeting a device with at least one
/// computational resonator. Publishes [`RoutingStats`].
pub struct ResonatorRouting;

impl Pass for ResonatorRouting {
    fn name(&self) -> &'static str {
        "ResonatorRouting"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let device = properties.device()?;
        if circuit.num_qubits() > device.num_components() {
            return Err(CompileError::CircuitTooLarge {
                required: circuit.num_qubits(),
                available: device.num_components(),
            });
        }

        let policy = properties.existing_moves;
        let mut router = Router::new(&device, policy);
        let input = match policy {
            ExistingMoveHandling::Remove => router.strip_moves(circuit.instructions())?,
            ExistingMoveHandling::Keep | ExistingMoveHandling::Trust => {
                circuit.instructions().to_vec()
            }
        };

        for idx in 0..input.len() {
            router.route(&input, idx)?;
        }
        if properties.leave_moves_open {
            if !router.occupancy.is_empty() {
                debug!(
                    "Leaving MOVEs open at end of circuit: {}",
                    router.occupancy.snapshot(&device)
                );
            }
        } else {
            router.close_all();
        }

        let stats = router.stats;
        circuit.set_instructions(router.out)?;
        info!(
            "ResonatorRouting ({policy:?}): {} MOVEs inserted, {} kept, {} removed",
            stats.moves_inserted, stats.moves_kept, stats.moves_removed
        );
        properties.insert(stats);
        Ok(())
    }

    fn should_run(&self, circuit: &Circuit, properties: &PropertySet) -> bool {
        circuit.level() == CircuitLevel::Physical
            && properties
                .device
                .as_ref()
                .is_some_and(|d| !d.computational_resonators.is_empty())
    }
}

/// State of one routing run.
struct Router<'d> {
    device: &'d DeviceDescription,
    resonators: Vec<QubitId>,
    trust: bool,
    occupancy: Occupancy,
    out: Vec<Instruction>,
    stats: RoutingStats,
}

impl<'d> Router<'d> {
    fn new(device: &'d DeviceDescription, policy: ExistingMoveHandling) -> Self {
        let resonators = device
            .computational_resonators
            .iter()
            .filter_map(|r| device.component_index(r))
            .collect();
        Self {
            device,
            resonators,
            trust: policy == ExistingMoveHandling::Trust,
            occupancy: Occupancy::new(),
            out: Vec::new(),
            stats: RoutingStats::default(),
        }
    }

    // =========================================================================
    // Component helpers
    // =========================================================================

    fn name(&self, q: QubitId) -> String {
        self.device
            .component_name(q)
            .map_or_else(|| q.to_string(), str::to_string)
    }

    fn is_resonator(&self, q: QubitId) -> bool {
        self.device
            .component_name(q)
            .is_some_and(|n| self.device.is_resonator(n))
    }

    fn is_qubit(&self, q: QubitId) -> bool {
        self.device
            .component_name(q)
            .is_some_and(|n| self.device.is_qubit(n))
    }

    fn supports(&self, gate: &str, qubits: &[QubitId]) -> bool {
        locus::names(self.device, qubits).is_ok_and(|names| self.device.supports(gate, &names))
    }

    fn describe(&self, inst: &Instruction) -> String {
        locus::describe(self.device, inst)
    }

    fn snapshot(&self) -> String {
        self.occupancy.snapshot(self.device)
    }

    fn occupied(&self, resonator: QubitId, occupant: QubitId, inst: &Instruction) -> CompileError {
        CompileError::ResonatorOccupied {
            resonator: self.name(resonator),
            occupant: self.name(occupant),
            instruction: self.describe(inst),
            occupancy: self.snapshot(),
        }
    }

    fn parked(&self, qubit: QubitId, resonator: QubitId, inst: &Instruction) -> CompileError {
        CompileError::QubitParked {
            qubit: self.name(qubit),
            resonator: self.name(resonator),
            instruction: self.describe(inst),
            occupancy: self.snapshot(),
        }
    }

    fn unroutable(&self, inst: &Instruction, reason: &str) -> CompileError {
        CompileError::UnroutableGate {
            instruction: self.describe(inst),
            reason: reason.to_string(),
            occupancy: self.snapshot(),
        }
    }

    fn misuse(&self, resonator: QubitId, inst: &Instruction) -> CompileError {
        CompileError::ResonatorMisuse {
            resonator: self.name(resonator),
            instruction: self.describe(inst),
        }
    }

    // =========================================================================
    // Park bookkeeping
    // =========================================================================

    /// Emit the MOVE that brings `qubit`'s state back out of `resonator`.
    fn close(&mut self, resonator: QubitId, qubit: QubitId) {
        debug!("Closing MOVE {} <- {}", self.name(qubit), self.name(resonator));
        self.out.push(Instruction::move_gate(qubit, resonator));
        self.occupancy.release(resonator);
        self.stats.moves_inserted += 1;
    }

    /// Make sure `qubit` holds its own state, closing a router park.
    ///
    /// A park opened by the input cannot be closed on the input's behalf.
    fn ensure_own_state(&mut self, qubit: QubitId, inst: &Instruction) -> CompileResult<()> {
        match self.occupancy.resonator_of(qubit) {
            None => Ok(()),
            Some((resonator, park)) if park.origin == ParkOrigin::Inserted => {
                self.close(resonator, qubit);
                Ok(())
            }
            Some((resonator, _)) => Err(self.parked(qubit, resonator, inst)),
        }
    }

    /// Free `resonator` if the router put something there.
    fn evict_inserted(&mut self, resonator: QubitId) {
        if let Some(Park {
            qubit,
            origin: ParkOrigin::Inserted,
        }) = self.occupancy.occupant(resonator)
        {
            self.close(resonator, qubit);
        }
    }

    /// Close every open park in resonator order.
    fn close_all(&mut self) {
        let open: Vec<(QubitId, Park)> = self.occupancy.iter().collect();
        for (resonator, park) in open {
            if park.origin == ParkOrigin::Existing {
                warn!(
                    "Closing MOVE of {} into {} left open by the input circuit",
                    self.name(park.qubit),
                    self.name(resonator)
                );
            }
            self.close(resonator, park.qubit);
        }
    }

    // =========================================================================
    // Existing MOVE removal
    // =========================================================================

    /// Drop input MOVEs, pointing resonator operands back at the qubit whose
    /// state the resonator held.
    fn strip_moves(&mut self, input: &[Instruction]) -> CompileResult<Vec<Instruction>> {
        let mut held = Occupancy::new();
        let mut stripped = Vec::with_capacity(input.len());

        for inst in input {
            if inst.operation_kind() == OperationKind::StateTransfer {
                let (qubit, resonator) = (inst.qubits[0], inst.qubits[1]);
                if !self.is_qubit(qubit) || !self.is_resonator(resonator) {
                    return Err(CompileError::InvalidMove {
                        instruction: self.describe(inst),
                        reason: "expected [qubit, resonator]".into(),
                    });
                }
                match held.occupant(resonator) {
                    Some(park) if park.qubit == qubit => {
                        held.release(resonator);
                    }
                    Some(park) => {
                        return Err(CompileError::ResonatorOccupied {
                            resonator: self.name(resonator),
                            occupant: self.name(park.qubit),
                            instruction: self.describe(inst),
                            occupancy: held.snapshot(self.device),
                        });
                    }
                    None => {
                        held.park(resonator, qubit, ParkOrigin::Existing);
                    }
                }
                self.stats.moves_removed += 1;
                continue;
            }

            if inst.operation_kind().needs_own_state() {
                let parked = inst
                    .qubits
                    .iter()
                    .find_map(|&q| held.resonator_of(q).map(|(r, _)| (q, r)));
                if let Some((qubit, resonator)) = parked {
                    return Err(CompileError::QubitParked {
                        qubit: self.name(qubit),
                        resonator: self.name(resonator),
                        instruction: self.describe(inst),
                        occupancy: held.snapshot(self.device),
                    });
                }
            }

            let mut rewritten = inst.clone();
            for q in &mut rewritten.qubits {
                if let Some(park) = held.occupant(*q) {
                    *q = park.qubit;
                }
            }
            let mut seen = rewritten.qubits.clone();
            seen.sort_unstable();
            seen.dedup();
            if seen.len() != rewritten.qubits.len() {
                return Err(CompileError::InvalidMove {
                    instruction: self.describe(inst),
                    reason: "acts on a qubit together with the resonator holding its state"
                        .into(),
                });
            }
            stripped.push(rewritten);
        }
        debug!("Stripped {} input MOVEs", self.stats.moves_removed);
        Ok(stripped)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn route(&mut self, input: &[Instruction], idx: usize) -> CompileResult<()> {
        let inst = &input[idx];
        match inst.operation_kind() {
            OperationKind::StateTransfer => self.route_move(inst),
            OperationKind::TwoQubitInteraction => self.route_two_qubit(input, idx),
            OperationKind::Barrier | OperationKind::Identity => {
                self.out.push(inst.clone());
                Ok(())
            }
            OperationKind::Delay => {
                for &q in &inst.qubits {
                    if !self.is_resonator(q) {
                        self.ensure_own_state(q, inst)?;
                    }
                }
                self.out.push(inst.clone());
                Ok(())
            }
            OperationKind::SingleQubitRotation
            | OperationKind::Measurement
            | OperationKind::Reset
            | OperationKind::Other => {
                if let Some(&r) = inst.qubits.iter().find(|&&q| self.is_resonator(q)) {
                    return Err(self.misuse(r, inst));
                }
                for &q in &inst.qubits {
                    self.ensure_own_state(q, inst)?;
                }
                self.out.push(inst.clone());
                Ok(())
            }
        }
    }

    /// An input MOVE: a fixed decision the router must respect.
    fn route_move(&mut self, inst: &Instruction) -> CompileResult<()> {
        let (qubit, resonator) = (inst.qubits[0], inst.qubits[1]);
        if !self.is_qubit(qubit) || !self.is_resonator(resonator) {
            return Err(CompileError::InvalidMove {
                instruction: self.describe(inst),
                reason: "expected [qubit, resonator]".into(),
            });
        }
        if !self.trust && !self.supports(native::MOVE, &inst.qubits) {
            return Err(CompileError::InvalidMove {
                instruction: self.describe(inst),
                reason: "locus is not native".into(),
            });
        }
        self.stats.moves_kept += 1;

        if let Some(park) = self.occupancy.occupant(resonator) {
            if park.qubit == qubit {
                match park.origin {
                    ParkOrigin::Existing => {
                        self.occupancy.release(resonator);
                        self.out.push(inst.clone());
                    }
                    ParkOrigin::Inserted => {
                        // The router already parked this qubit here; the
                        // input's MOVE takes over that park.
                        self.occupancy.adopt(resonator);
                        self.stats.moves_inserted = self.stats.moves_inserted.saturating_sub(1);
                    }
                }
                return Ok(());
            }
        }

        if let Some((elsewhere, park)) = self.occupancy.resonator_of(qubit) {
            match park.origin {
                ParkOrigin::Inserted => self.close(elsewhere, qubit),
                ParkOrigin::Existing => return Err(self.parked(qubit, elsewhere, inst)),
            }
        }
        match self.occupancy.occupant(resonator) {
            Some(Park {
                qubit: other,
                origin: ParkOrigin::Inserted,
            }) => self.close(resonator, other),
            Some(park) => return Err(self.occupied(resonator, park.qubit, inst)),
            None => {}
        }
        self.occupancy.park(resonator, qubit, ParkOrigin::Existing);
        self.out.push(inst.clone());
        Ok(())
    }

    fn route_two_qubit(&mut self, input: &[Instruction], idx: usize) -> CompileResult<()> {
        let inst = &input[idx];
        let (a, b) = (inst.qubits[0], inst.qubits[1]);
        if self.is_resonator(a) {
            return Err(self.misuse(a, inst));
        }

        if self.is_resonator(b) {
            // Explicit resonator operand: acts on whatever the input parked.
            self.ensure_own_state(a, inst)?;
            self.evict_inserted(b);
            if !self.supports(inst.name(), &inst.qubits) {
                return Err(self.unroutable(inst, "gate is not native on this locus"));
            }
            self.out.push(inst.clone());
            return Ok(());
        }

        self.settle_double_park(a, b, inst)?;
        if inst.name() == native::CZ {
            for (parked, other) in [(a, b), (b, a)] {
                if let Some((resonator, _)) = self.occupancy.resonator_of(parked) {
                    if self.supports(native::CZ, &[other, resonator]) {
                        self.ensure_own_state(other, inst)?;
                        self.out.push(with_qubits(inst, [other, resonator]));
                        return Ok(());
                    }
                }
            }
        }
        self.ensure_own_state(a, inst)?;
        self.ensure_own_state(b, inst)?;

        if self.supports(inst.name(), &inst.qubits) {
            self.out.push(inst.clone());
            return Ok(());
        }
        if inst.name() != native::CZ {
            return Err(self.unroutable(inst, "only cz can be routed through a resonator"));
        }

        let preferred = pick_mover(&input[idx + 1..], a, b);
        let (mover, stay, resonator) = self.choose_route(preferred, a, b, inst)?;
        self.evict_inserted(resonator);
        debug!(
            "Routing {} by parking {} in {}",
            self.describe(inst),
            self.name(mover),
            self.name(resonator)
        );
        self.out.push(Instruction::move_gate(mover, resonator));
        self.stats.moves_inserted += 1;
        self.occupancy.park(resonator, mover, ParkOrigin::Inserted);
        self.out.push(with_qubits(inst, [stay, resonator]));
        Ok(())
    }

    /// Both operands parked: free one, preferring a router park.
    fn settle_double_park(
        &mut self,
        a: QubitId,
        b: QubitId,
        inst: &Instruction,
    ) -> CompileResult<()> {
        let (Some((ra, pa)), Some((rb, pb))) =
            (self.occupancy.resonator_of(a), self.occupancy.resonator_of(b))
        else {
            return Ok(());
        };
        if pa.origin == ParkOrigin::Inserted {
            self.close(ra, a);
        } else if pb.origin == ParkOrigin::Inserted {
            self.close(rb, b);
        } else {
            return Err(self.parked(a, ra, inst));
        }
        Ok(())
    }

    /// Pick (mover, stay, resonator) for a `cz` between two data qubits.
    ///
    /// Candidates are ordered by mover preference, then resonator order. An
    /// empty resonator wins over one the router can empty; a resonator held by
    /// the input is never taken.
    fn choose_route(
        &self,
        preferred: QubitId,
        a: QubitId,
        b: QubitId,
        inst: &Instruction,
    ) -> CompileResult<(QubitId, QubitId, QubitId)> {
        let order = if preferred == b { [(b, a), (a, b)] } else { [(a, b), (b, a)] };
        let candidates: Vec<(QubitId, QubitId, QubitId)> = order
            .iter()
            .flat_map(|&(mover, stay)| self.resonators.iter().map(move |&r| (mover, stay, r)))
            .filter(|&(mover, stay, r)| {
                self.supports(native::MOVE, &[mover, r]) && self.supports(native::CZ, &[stay, r])
            })
            .collect();

        if let Some(&free) = candidates
            .iter()
            .find(|&&(_, _, r)| self.occupancy.occupant(r).is_none())
        {
            return Ok(free);
        }
        if let Some(&evictable) = candidates.iter().find(|&&(_, _, r)| {
            self.occupancy
                .occupant(r)
                .is_some_and(|p| p.origin == ParkOrigin::Inserted)
        }) {
            return Ok(evictable);
        }
        match candidates.first() {
            Some(&(_, _, r)) => {
                let occupant = self.occupancy.occupant(r).map_or(r, |p| p.qubit);
                Err(self.occupied(r, occupant, inst))
            }
            None => Err(self.unroutable(inst, "no resonator connects the pair")),
        }
    }
}

/// The same instruction on different operands.
fn with_qubits(inst: &Instruction, qubits: [QubitId; 2]) -> Instruction {
    let mut moved = inst.clone();
    moved.qubits = qubits.to_vec();
    moved
}

/// Which operand of a `cz(a, b)` should be parked.
///
/// Looks at the next instruction touching either qubit. If it is another
/// two-qubit gate with exactly one of them, that one stays parked for it; if
/// it needs one of them in its own qubit, the other one moves.
fn pick_mover(rest: &[Instruction], a: QubitId, b: QubitId) -> QubitId {
    for next in rest {
        let kind = next.operation_kind();
        if matches!(kind, OperationKind::Barrier | OperationKind::Identity) {
            continue;
        }
        let (has_a, has_b) = (next.qubits.contains(&a), next.qubits.contains(&b));
        if !has_a && !has_b {
            continue;
        }
        if has_a != has_b {
            let (touched, other) = if has_a { (a, b) } else { (b, a) };
            if kind == OperationKind::TwoQubitInteraction {
                return touched;
            }
            if kind.needs_own_state() {
                return other;
            }
        }
        break;
    }
    a
}
