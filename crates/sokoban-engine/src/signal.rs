//! Switch/gate signal network.
//!
//! Switches watch their floor cell for a solid occupant. Gates raise a
//! [`GateWall`](sokoban_grid::ObjectKind::GateWall) into their SOLID slot
//! while their effective signal (`signal XOR default_up`) is high. Switch
//! links are the structures that connect the two:
//!
//! - a [`SingleSwitchLink`] forwards one switch's pressed state straight to
//!   its gates;
//! - a [`MultiSwitchLink`] collects the pressed state of several switches
//!   and combines them with an `all`/`any` rule, optionally latching once
//!   asserted.
//!
//! # Settling
//!
//! After the moves and merges of a step are final, [`SignalNetwork::settle`]
//! runs one *pass*: every placed dynamic object (switches and gate bases) is
//! updated in id order, then every structure in id order. Each state change
//! appends the previous state to the step's [`Delta`], which is all undo
//! needs to restore the network without re-running any signal logic.
//!
//! [`SettleMode::FixedPoint`] repeats the pass until nothing changes.
//!
//! A gate driven by several links takes the last signal sent to it in a
//! pass. Single links send only when their switch changes, during the object
//! phase; multi links send on every pass, during the structure phase. A gate
//! shared with a multi link therefore follows that link, and the highest-id
//! multi link when there are several.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sokoban_delta::{Delta, DynamicSnapshot, LinkSnapshot, StructureId};
use sokoban_grid::{Grid, Layer, ObjectId, ObjectKind, ObjectState};

// ---------------------------------------------------------------------------
// SettleMode
// ---------------------------------------------------------------------------

/// How many signal passes run after each successful step.
///
/// With the current object kinds a single pass already reaches the fixed
/// point. Switches read only the SOLID slot of their own cell, settling only
/// writes the SOLID slot above a gate base, and a switch never shares a cell
/// with a gate base (both live on FLOOR). `FixedPoint` then runs one extra
/// pass that changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettleMode {
    /// Exactly one pass per step.
    #[default]
    SinglePass,
    /// Repeat passes until one changes nothing, at most `max_passes` times.
    FixedPoint {
        /// Upper bound on passes per step.
        max_passes: u32,
    },
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// How a multi-switch link combines its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkRule {
    /// High when every switch is pressed.
    All,
    /// High when any switch is pressed.
    Any,
}

/// One switch driving any number of gates directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSwitchLink {
    /// The driving switch.
    pub switch: ObjectId,
    /// Driven gate bases.
    pub gates: Vec<ObjectId>,
}

/// Several switches combined into one signal for a set of gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSwitchLink {
    /// Input switches.
    pub switches: Vec<ObjectId>,
    /// Driven gate bases.
    pub gates: Vec<ObjectId>,
    /// Combination rule.
    pub rule: LinkRule,
    /// Once the combined signal goes high, keep it high.
    pub persistent: bool,
    inputs: Vec<bool>,
    signal: bool,
}

impl MultiSwitchLink {
    /// Create a link with every input low.
    pub fn new(
        switches: Vec<ObjectId>,
        gates: Vec<ObjectId>,
        rule: LinkRule,
        persistent: bool,
    ) -> Self {
        let inputs = vec![false; switches.len()];
        Self {
            switches,
            gates,
            rule,
            persistent,
            inputs,
            signal: false,
        }
    }

    /// The last pressed state received from each switch.
    pub fn inputs(&self) -> &[bool] {
        &self.inputs
    }

    /// The current combined output.
    pub fn signal(&self) -> bool {
        self.signal
    }

    fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            inputs: self.inputs.clone(),
            signal: self.signal,
        }
    }

    fn restore(&mut self, snapshot: LinkSnapshot) {
        self.inputs = snapshot.inputs;
        self.signal = snapshot.signal;
    }

    fn combined(&self) -> bool {
        let asserted = match self.rule {
            LinkRule::All => self.inputs.iter().all(|&i| i),
            LinkRule::Any => self.inputs.iter().any(|&i| i),
        };
        asserted || (self.persistent && self.signal)
    }
}

/// A signal structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Structure {
    /// See [`SingleSwitchLink`].
    Single(SingleSwitchLink),
    /// See [`MultiSwitchLink`].
    Multi(MultiSwitchLink),
}

impl Structure {
    /// Every switch the structure listens to.
    pub fn switches(&self) -> &[ObjectId] {
        match self {
            Structure::Single(link) => std::slice::from_ref(&link.switch),
            Structure::Multi(link) => &link.switches,
        }
    }

    /// Every gate the structure drives.
    pub fn gates(&self) -> &[ObjectId] {
        match self {
            Structure::Single(link) => &link.gates,
            Structure::Multi(link) => &link.gates,
        }
    }

    /// Whether `object` is referenced by this structure.
    pub fn references(&self, object: ObjectId) -> bool {
        self.switches().contains(&object) || self.gates().contains(&object)
    }
}

// ---------------------------------------------------------------------------
// SignalNetwork
// ---------------------------------------------------------------------------

/// All signal structures of a level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalNetwork {
    structures: BTreeMap<StructureId, Structure>,
    next_id: u32,
}

impl SignalNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a structure and return its handle. Callers validate references.
    pub fn add(&mut self, structure: Structure) -> StructureId {
        let id = StructureId(self.next_id);
        self.next_id += 1;
        self.structures.insert(id, structure);
        id
    }

    /// Look up a structure.
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    /// Iterate structures in id order.
    pub fn iter(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter().map(|(id, s)| (*id, s))
    }

    /// Number of structures.
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// `true` if there are no structures.
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Drop every reference to a destroyed object.
    ///
    /// A destroyed gate is dropped from every link, and a destroyed switch
    /// from every multi link. A link left without its switch (or switches) or
    /// without gates is removed. Returns the removed structures.
    pub fn forget_object(&mut self, object: ObjectId) -> Vec<StructureId> {
        let mut removed = Vec::new();
        for (id, structure) in self.structures.iter_mut() {
            match structure {
                Structure::Single(link) => {
                    link.gates.retain(|g| *g != object);
                    if link.switch == object || link.gates.is_empty() {
                        removed.push(*id);
                    }
                }
                Structure::Multi(link) => {
                    if let Some(i) = link.switches.iter().position(|s| *s == object) {
                        link.switches.remove(i);
                        link.inputs.remove(i);
                    }
                    link.gates.retain(|g| *g != object);
                    if link.switches.is_empty() || link.gates.is_empty() {
                        removed.push(*id);
                    }
                }
            }
        }
        for id in &removed {
            self.structures.remove(id);
            tracing::debug!(structure = ?id, object = %object, "removed switch link");
        }
        removed
    }

    /// Put a structure's state back to a recorded snapshot.
    pub fn restore(&mut self, id: StructureId, snapshot: LinkSnapshot) {
        match self.structures.get_mut(&id) {
            Some(Structure::Multi(link)) => link.restore(snapshot),
            Some(Structure::Single(_)) | None => {
                tracing::warn!(structure = ?id, "no multi-switch link to restore -- skipping");
            }
        }
    }

    // -- settling -----------------------------------------------------------

    /// Run the signal network after a step's moves and merges.
    ///
    /// Returns the number of passes run.
    pub fn settle(&mut self, grid: &mut Grid, delta: &mut Delta, mode: SettleMode) -> u32 {
        match mode {
            SettleMode::SinglePass => {
                self.pass(grid, delta);
                1
            }
            SettleMode::FixedPoint { max_passes } => {
                for pass in 1..=max_passes {
                    let before = change_count(delta);
                    self.pass(grid, delta);
                    if change_count(delta) == before {
                        return pass;
                    }
                }
                tracing::warn!(
                    max_passes,
                    "signal network did not settle within the pass limit"
                );
                max_passes
            }
        }
    }

    /// One pass: dynamic objects in id order, then structures in id order.
    fn pass(&mut self, grid: &mut Grid, delta: &mut Delta) {
        let dynamic: Vec<ObjectId> = grid
            .placed_objects()
            .filter(|obj| obj.capabilities().dynamic)
            .map(|obj| obj.id)
            .collect();

        for id in dynamic {
            match grid[id].kind {
                ObjectKind::Switch { persistent } => self.update_switch(grid, id, persistent, delta),
                ObjectKind::GateBase { .. } => update_gate(grid, id, delta),
                _ => {}
            }
        }

        for (id, structure) in self.structures.iter_mut() {
            let Structure::Multi(link) = structure else {
                continue;
            };
            let signal = link.combined();
            if signal != link.signal {
                delta.add_structure(*id, link.snapshot());
                link.signal = signal;
                tracing::trace!(structure = ?id, signal, "switch link output changed");
            }
            for gate in &link.gates {
                set_gate_signal(grid, *gate, signal, delta);
            }
        }
    }

    fn update_switch(&mut self, grid: &mut Grid, id: ObjectId, persistent: bool, delta: &mut Delta) {
        let ObjectState::Switch { pressed } = grid[id].state else {
            return;
        };
        let covered = grid.solid_at(grid[id].position).is_some();
        let now = if !pressed && covered {
            true
        } else if pressed && !covered && !persistent {
            false
        } else {
            return;
        };

        delta.add_dynamic(id, DynamicSnapshot::Switch { pressed });
        grid.set_state(id, ObjectState::Switch { pressed: now });
        tracing::trace!(switch = %id, pressed = now, "switch changed");
        self.send_signal(grid, id, now, delta);
    }

    /// Forward a switch's new pressed state to every structure bound to it.
    fn send_signal(&mut self, grid: &mut Grid, switch: ObjectId, pressed: bool, delta: &mut Delta) {
        for (id, structure) in self.structures.iter_mut() {
            match structure {
                Structure::Single(link) if link.switch == switch => {
                    for gate in &link.gates {
                        set_gate_signal(grid, *gate, pressed, delta);
                    }
                }
                Structure::Multi(link) => {
                    let before = link.snapshot();
                    for (input, s) in link.inputs.iter_mut().zip(&link.switches) {
                        if *s == switch {
                            *input = pressed;
                        }
                    }
                    if link.inputs != before.inputs {
                        delta.add_structure(*id, before);
                    }
                }
                Structure::Single(_) => {}
            }
        }
    }
}

fn change_count(delta: &Delta) -> usize {
    delta.dynamic_changes().len() + delta.structure_changes().len()
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Retry a waiting gate once its cell has cleared.
fn update_gate(grid: &mut Grid, gate: ObjectId, delta: &mut Delta) {
    if let ObjectState::Gate { waiting: true, .. } = grid[gate].state {
        if grid.solid_at(grid[gate].position).is_none() {
            check_gate(grid, gate, None, delta);
        }
    }
}

/// Set a gate's signal and bring its wall in line with it.
pub(crate) fn set_gate_signal(grid: &mut Grid, gate: ObjectId, signal: bool, delta: &mut Delta) {
    check_gate(grid, gate, Some(signal), delta);
}

/// Bring a gate's wall in line with its (optionally updated) signal.
///
/// A gate that should be up raises its wall if the SOLID slot is free and
/// waits otherwise. A gate that should be down lowers immediately and stops
/// waiting. The previous state is recorded if anything changed.
pub(crate) fn check_gate(
    grid: &mut Grid,
    gate: ObjectId,
    new_signal: Option<bool>,
    delta: &mut Delta,
) {
    let obj = &grid[gate];
    let (ObjectKind::GateBase { default_up }, ObjectState::Gate { active, signal, waiting, wall }) =
        (obj.kind, obj.state)
    else {
        tracing::warn!(object = %gate, "signal sent to an object that is not a gate -- ignoring");
        return;
    };
    let pos = obj.position;
    let before = (active, signal, waiting);

    let signal = new_signal.unwrap_or(signal);
    let (mut active, mut waiting) = (active, waiting);
    let occupant = grid.solid_at(pos);
    if signal == default_up {
        active = false;
        waiting = false;
        if occupant == Some(wall) {
            let _ = grid.vacate(pos, Layer::Solid);
        }
    } else if occupant.is_none() {
        grid.occupy(wall);
        active = true;
        waiting = false;
    } else if occupant != Some(wall) {
        active = false;
        waiting = true;
    }

    grid.set_state(gate, ObjectState::Gate { active, signal, waiting, wall });
    if before != (active, signal, waiting) {
        tracing::trace!(gate = %gate, active, waiting, "gate changed");
        let (active, signal, waiting) = before;
        delta.add_dynamic(gate, DynamicSnapshot::Gate { active, signal, waiting });
    }
}

/// Put a gate back into a recorded state, raising or lowering its wall to
/// match `active`.
pub(crate) fn restore_gate(grid: &mut Grid, gate: ObjectId, active: bool, signal: bool, waiting: bool) {
    let ObjectState::Gate { wall, .. } = grid[gate].state else {
        return;
    };
    let pos = grid[gate].position;
    let raised = grid.solid_at(pos) == Some(wall);
    if active && !raised {
        grid.occupy(wall);
    } else if !active && raised {
        let _ = grid.vacate(pos, Layer::Solid);
    }
    grid.set_state(gate, ObjectState::Gate { active, signal, waiting, wall });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sokoban_grid::{Color, Position};

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn a_box() -> ObjectKind {
        ObjectKind::Box {
            color: Color::GOLD,
            sticky: false,
        }
    }

    fn wall_of(grid: &Grid, gate: ObjectId) -> ObjectId {
        match grid[gate].state {
            ObjectState::Gate { wall, .. } => wall,
            _ => panic!("not a gate"),
        }
    }

    fn gate_active(grid: &Grid, gate: ObjectId) -> bool {
        matches!(grid[gate].state, ObjectState::Gate { active: true, .. })
    }

    /// Switch at (0,0), gate at (2,0), single link.
    fn single_link_level(persistent: bool, default_up: bool) -> (Grid, SignalNetwork, ObjectId, ObjectId) {
        let mut grid = Grid::new(4, 3);
        let switch = grid.spawn(ObjectKind::Switch { persistent }, p(0, 0)).unwrap();
        let gate = grid.spawn(ObjectKind::GateBase { default_up }, p(2, 0)).unwrap();
        let mut net = SignalNetwork::new();
        net.add(Structure::Single(SingleSwitchLink {
            switch,
            gates: vec![gate],
        }));
        let mut scratch = Delta::new();
        check_gate(&mut grid, gate, None, &mut scratch);
        (grid, net, switch, gate)
    }

    // -- 1. Gates -----------------------------------------------------------

    #[test]
    fn default_up_gate_rises_on_initial_check() {
        let (grid, _, _, gate) = single_link_level(false, true);
        assert!(gate_active(&grid, gate));
        assert_eq!(grid.solid_at(p(2, 0)), Some(wall_of(&grid, gate)));
    }

    #[test]
    fn blocked_gate_waits_then_rises_when_cleared() {
        let mut grid = Grid::new(3, 3);
        let gate = grid.spawn(ObjectKind::GateBase { default_up: true }, p(1, 1)).unwrap();
        grid.spawn(a_box(), p(1, 1)).unwrap();
        let mut delta = Delta::new();
        check_gate(&mut grid, gate, None, &mut delta);
        assert!(matches!(
            grid[gate].state,
            ObjectState::Gate { active: false, waiting: true, .. }
        ));

        grid.remove(p(1, 1), Layer::Solid).unwrap();
        update_gate(&mut grid, gate, &mut delta);
        assert!(gate_active(&grid, gate));
        assert_eq!(delta.dynamic_changes().len(), 2);
    }

    #[test]
    fn lowering_never_waits() {
        let (mut grid, _, _, gate) = single_link_level(false, true);
        let mut delta = Delta::new();
        set_gate_signal(&mut grid, gate, true, &mut delta);
        assert!(!gate_active(&grid, gate));
        assert!(grid.solid_at(p(2, 0)).is_none());
    }

    #[test]
    fn unchanged_gate_records_nothing() {
        let (mut grid, _, _, gate) = single_link_level(false, false);
        let mut delta = Delta::new();
        set_gate_signal(&mut grid, gate, false, &mut delta);
        assert!(delta.is_empty());
    }

    // -- 2. Switches --------------------------------------------------------

    #[test]
    fn covered_switch_raises_linked_gate() {
        let (mut grid, mut net, switch, gate) = single_link_level(false, false);
        grid.spawn(a_box(), p(0, 0)).unwrap();
        let mut delta = Delta::new();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);

        assert_eq!(grid[switch].state, ObjectState::Switch { pressed: true });
        assert!(gate_active(&grid, gate));
        assert_eq!(delta.dynamic_changes()[0], (switch, DynamicSnapshot::Switch { pressed: false }));
    }

    #[test]
    fn persistent_switch_stays_pressed() {
        let (mut grid, mut net, switch, gate) = single_link_level(true, false);
        grid.spawn(a_box(), p(0, 0)).unwrap();
        let mut delta = Delta::new();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        grid.remove(p(0, 0), Layer::Solid).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);

        assert_eq!(grid[switch].state, ObjectState::Switch { pressed: true });
        assert!(gate_active(&grid, gate));
    }

    // -- 3. Multi links -----------------------------------------------------

    fn multi_level(rule: LinkRule, persistent: bool) -> (Grid, SignalNetwork, [ObjectId; 2], ObjectId) {
        let mut grid = Grid::new(5, 3);
        let s0 = grid.spawn(ObjectKind::Switch { persistent: false }, p(0, 0)).unwrap();
        let s1 = grid.spawn(ObjectKind::Switch { persistent: false }, p(1, 0)).unwrap();
        let gate = grid.spawn(ObjectKind::GateBase { default_up: false }, p(4, 0)).unwrap();
        let mut net = SignalNetwork::new();
        net.add(Structure::Multi(MultiSwitchLink::new(
            vec![s0, s1],
            vec![gate],
            rule,
            persistent,
        )));
        (grid, net, [s0, s1], gate)
    }

    #[test]
    fn all_rule_needs_every_switch() {
        let (mut grid, mut net, _, gate) = multi_level(LinkRule::All, false);
        let mut delta = Delta::new();
        grid.spawn(a_box(), p(0, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(!gate_active(&grid, gate));

        grid.spawn(a_box(), p(1, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(gate_active(&grid, gate));
    }

    #[test]
    fn any_rule_needs_one_switch() {
        let (mut grid, mut net, _, gate) = multi_level(LinkRule::Any, false);
        let mut delta = Delta::new();
        grid.spawn(a_box(), p(1, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(gate_active(&grid, gate));

        grid.remove(p(1, 0), Layer::Solid).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(!gate_active(&grid, gate));
    }

    #[test]
    fn persistent_link_latches() {
        let (mut grid, mut net, _, gate) = multi_level(LinkRule::Any, true);
        let mut delta = Delta::new();
        grid.spawn(a_box(), p(0, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        grid.remove(p(0, 0), Layer::Solid).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(gate_active(&grid, gate));
    }

    #[test]
    fn fixed_point_stops_when_quiet() {
        let (mut grid, mut net, _, _) = multi_level(LinkRule::Any, false);
        let mut delta = Delta::new();
        grid.spawn(a_box(), p(0, 0)).unwrap();
        let passes = net.settle(&mut grid, &mut delta, SettleMode::FixedPoint { max_passes: 8 });
        assert_eq!(passes, 2);
    }

    #[test]
    fn one_pass_reaches_the_fixed_point() {
        let build = || {
            let (mut grid, mut net, [s0, _], gate) = multi_level(LinkRule::All, true);
            let blocked = grid.spawn(ObjectKind::GateBase { default_up: false }, p(2, 1)).unwrap();
            grid.spawn(a_box(), p(2, 1)).unwrap();
            net.add(Structure::Single(SingleSwitchLink {
                switch: s0,
                gates: vec![gate, blocked],
            }));
            grid.spawn(a_box(), p(0, 0)).unwrap();
            grid.spawn(a_box(), p(1, 0)).unwrap();
            (grid, net)
        };

        let (mut single, mut single_net) = build();
        single_net.settle(&mut single, &mut Delta::new(), SettleMode::SinglePass);
        let (mut fixed, mut fixed_net) = build();
        let passes = fixed_net.settle(&mut fixed, &mut Delta::new(), SettleMode::FixedPoint { max_passes: 8 });

        assert_eq!(passes, 2);
        assert_eq!(fixed.capture_snapshot(), single.capture_snapshot());
        assert_eq!(fixed_net, single_net);

        let mut again = Delta::new();
        single_net.settle(&mut single, &mut again, SettleMode::SinglePass);
        assert!(again.is_empty());
    }

    #[test]
    fn shared_gate_follows_the_multi_link() {
        let mut grid = Grid::new(5, 3);
        let s0 = grid.spawn(ObjectKind::Switch { persistent: false }, p(0, 0)).unwrap();
        let s1 = grid.spawn(ObjectKind::Switch { persistent: false }, p(1, 0)).unwrap();
        let gate = grid.spawn(ObjectKind::GateBase { default_up: false }, p(4, 0)).unwrap();
        let mut net = SignalNetwork::new();
        net.add(Structure::Single(SingleSwitchLink {
            switch: s0,
            gates: vec![gate],
        }));
        net.add(Structure::Multi(MultiSwitchLink::new(
            vec![s1],
            vec![gate],
            LinkRule::Any,
            false,
        )));
        let mut delta = Delta::new();

        // s0 alone: the single link raises, the multi link lowers again.
        grid.spawn(a_box(), p(0, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(!gate_active(&grid, gate));

        grid.spawn(a_box(), p(1, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(gate_active(&grid, gate));

        // s1 alone: the single link lowers, the multi link raises again.
        grid.remove(p(0, 0), Layer::Solid).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        assert!(gate_active(&grid, gate));
    }

    // -- 4. Removal ---------------------------------------------------------

    #[test]
    fn forgetting_a_single_links_switch_removes_it() {
        let (_, mut net, switch, _) = single_link_level(false, false);
        assert_eq!(net.forget_object(switch).len(), 1);
        assert!(net.is_empty());
    }

    #[test]
    fn forgetting_a_gate_drops_the_reference() {
        let (mut grid, mut net, switch, gate) = single_link_level(false, false);
        let other = grid.spawn(ObjectKind::GateBase { default_up: false }, p(3, 0)).unwrap();
        net.forget_object(switch);
        net.add(Structure::Single(SingleSwitchLink {
            switch,
            gates: vec![gate, other],
        }));

        assert!(net.forget_object(gate).is_empty());
        let (_, structure) = net.iter().next().unwrap();
        assert_eq!(structure.gates(), &[other]);

        assert_eq!(net.forget_object(other).len(), 1);
        assert!(net.is_empty());
    }

    #[test]
    fn multi_link_without_switches_is_removed() {
        let (_, mut net, [s0, s1], _) = multi_level(LinkRule::All, false);
        assert!(net.forget_object(s0).is_empty());
        let (_, Structure::Multi(link)) = net.iter().next().unwrap() else {
            panic!("expected a multi link");
        };
        assert_eq!(link.inputs().len(), 1);
        assert_eq!(net.forget_object(s1).len(), 1);
        assert!(net.is_empty());
    }

    #[test]
    fn restore_puts_link_state_back() {
        let (mut grid, mut net, _, _) = multi_level(LinkRule::Any, false);
        let mut delta = Delta::new();
        grid.spawn(a_box(), p(0, 0)).unwrap();
        net.settle(&mut grid, &mut delta, SettleMode::SinglePass);
        for (id, snapshot) in delta.structure_changes().iter().rev() {
            net.restore(*id, snapshot.clone());
        }
        let (_, Structure::Multi(link)) = net.iter().next().unwrap() else {
            panic!("expected a multi link");
        };
        assert_eq!(link.inputs(), &[false, false]);
        assert!(!link.signal());
    }
}
