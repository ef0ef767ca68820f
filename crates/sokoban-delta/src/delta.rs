//! The per-step undo record.
//!
//! A [`Delta`] accumulates everything one input step did to a level, in the
//! order it happened:
//!
//! - **moves**: every object the push resolver decided to move, bucketed by
//!   direction, with the position it moved *from*;
//! - **group merges**: every sticky union triggered by the moves;
//! - **dynamic changes**: the previous state of every switch or gate whose
//!   state changed during the signal pass;
//! - **structure changes**: the previous state of every multi-switch link
//!   whose inputs or output changed.
//!
//! Undo consumes the record in strict reverse: structures, then dynamic
//! objects, then merges, then moves. See [`Delta::into_parts`].
//!
//! # Example
//!
//! ```
//! use sokoban_delta::{Delta, MoveRecord};
//! use sokoban_grid::prelude::*;
//!
//! let mut delta = Delta::new();
//! delta.add_move(
//!     Direction::Right,
//!     MoveRecord { object: ObjectId::new(7), from: Position::new(1, 1), layer: Layer::Solid },
//! );
//! assert_eq!(delta.moves(Direction::Right).len(), 1);
//!
//! delta.reset_moves();
//! assert!(delta.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use sokoban_grid::{Direction, GroupMerge, Layer, ObjectId, Position};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One object's move within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// The moved object.
    pub object: ObjectId,
    /// Where it stood before the step.
    pub from: Position,
    /// The layer it moved in.
    pub layer: Layer,
}

/// Previous state of a dynamic object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicSnapshot {
    /// A switch's pressed flag.
    Switch {
        /// Value before the change.
        pressed: bool,
    },
    /// A gate's state triple.
    Gate {
        /// The wall was raised.
        active: bool,
        /// Last received signal.
        signal: bool,
        /// Waiting for its cell to clear.
        waiting: bool,
    },
}

/// Handle to a signal structure (switch link) in a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

/// Previous state of a multi-switch link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    /// Per-switch input flags.
    pub inputs: Vec<bool>,
    /// The combined (possibly latched) output.
    pub signal: bool,
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// The undo record of one input step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    moves: [Vec<MoveRecord>; 4],
    group_merges: Vec<GroupMerge>,
    dynamic: Vec<(ObjectId, DynamicSnapshot)>,
    structures: Vec<(StructureId, LinkSnapshot)>,
}

/// A delta taken apart for undo.
///
/// Each list is in recording order; the consumer reverses them.
#[derive(Debug, Clone)]
pub struct DeltaParts {
    /// Moves, indexed by [`Direction::index`].
    pub moves: [Vec<MoveRecord>; 4],
    /// Group merges.
    pub group_merges: Vec<GroupMerge>,
    /// Dynamic-object previous states.
    pub dynamic: Vec<(ObjectId, DynamicSnapshot)>,
    /// Structure previous states.
    pub structures: Vec<(StructureId, LinkSnapshot)>,
}

impl Delta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `record.object` moves one cell in `dir`.
    pub fn add_move(&mut self, dir: Direction, record: MoveRecord) {
        self.moves[dir.index()].push(record);
    }

    /// Moves recorded in `dir`, in recording order.
    pub fn moves(&self, dir: Direction) -> &[MoveRecord] {
        &self.moves[dir.index()]
    }

    /// Every recorded move with its direction.
    pub fn all_moves(&self) -> impl Iterator<Item = (Direction, &MoveRecord)> {
        Direction::ALL
            .into_iter()
            .flat_map(move |dir| self.moves[dir.index()].iter().map(move |m| (dir, m)))
    }

    /// Total number of recorded moves.
    pub fn move_count(&self) -> usize {
        self.moves.iter().map(Vec::len).sum()
    }

    /// Drop every recorded move. Used when a compound move turns out to be
    /// illegal before anything was applied.
    pub fn reset_moves(&mut self) {
        for bucket in &mut self.moves {
            bucket.clear();
        }
    }

    /// Record a group merge.
    pub fn add_group_merge(&mut self, merge: GroupMerge) {
        self.group_merges.push(merge);
    }

    /// Recorded merges.
    pub fn group_merges(&self) -> &[GroupMerge] {
        &self.group_merges
    }

    /// Record the previous state of a dynamic object.
    pub fn add_dynamic(&mut self, object: ObjectId, previous: DynamicSnapshot) {
        self.dynamic.push((object, previous));
    }

    /// Recorded dynamic-object changes.
    pub fn dynamic_changes(&self) -> &[(ObjectId, DynamicSnapshot)] {
        &self.dynamic
    }

    /// Record the previous state of a structure.
    pub fn add_structure(&mut self, structure: StructureId, previous: LinkSnapshot) {
        self.structures.push((structure, previous));
    }

    /// Recorded structure changes.
    pub fn structure_changes(&self) -> &[(StructureId, LinkSnapshot)] {
        &self.structures
    }

    /// `true` if nothing at all was recorded.
    pub fn is_empty(&self) -> bool {
        self.move_count() == 0
            && self.group_merges.is_empty()
            && self.dynamic.is_empty()
            && self.structures.is_empty()
    }

    /// Consume the delta for undo.
    pub fn into_parts(self) -> DeltaParts {
        DeltaParts {
            moves: self.moves,
            group_merges: self.group_merges,
            dynamic: self.dynamic,
            structures: self.structures,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
