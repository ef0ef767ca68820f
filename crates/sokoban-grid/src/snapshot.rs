//! Grid snapshots.
//!
//! Provides [`GridSnapshot`], a serializable, comparison-friendly picture of
//! a grid's observable state. Group identity is recorded as a canonical
//! partition (sorted member lists) rather than by [`GroupId`](crate::GroupId),
//! so two grids that hold the same objects in the same rigid bodies compare
//! equal even when their group tables issued different ids along the way.

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::object::{Layer, ObjectId, ObjectKind, ObjectState};
use crate::position::Position;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Serializable snapshot of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    /// Arena handle.
    pub id: ObjectId,
    /// Kind and arguments.
    pub kind: ObjectKind,
    /// Recorded position.
    pub position: Position,
    /// Layer of the kind.
    pub layer: Layer,
    /// Whether the object currently occupies its slot. Only gate walls are
    /// ever unplaced.
    pub placed: bool,
    /// Runtime state.
    pub state: ObjectState,
}

/// A complete, serializable snapshot of a grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    /// Interior columns.
    pub width: u16,
    /// Interior rows.
    pub height: u16,
    /// Every alive object, sorted by id.
    pub objects: Vec<ObjectSnapshot>,
    /// Multi-member groups as sorted member lists, sorted by first member.
    /// Singletons are implied.
    pub groups: Vec<Vec<ObjectId>>,
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

impl Grid {
    /// Capture the observable state of the grid.
    pub fn capture_snapshot(&self) -> GridSnapshot {
        let objects: Vec<ObjectSnapshot> = self
            .objects()
            .map(|obj| ObjectSnapshot {
                id: obj.id,
                kind: obj.kind,
                position: obj.position,
                layer: obj.layer(),
                placed: self.is_placed(obj.id),
                state: obj.state,
            })
            .collect();

        let mut groups: Vec<Vec<ObjectId>> = self
            .groups()
            .iter()
            .filter(|(_, g)| g.len() > 1)
            .map(|(_, g)| g.members.iter().copied().collect())
            .collect();
        groups.sort();

        GridSnapshot {
            width: self.width(),
            height: self.height(),
            objects,
            groups,
        }
    }
}

impl GridSnapshot {
    /// Count objects of a given type name that occupy their slot.
    pub fn count_placed(&self, type_name: &str) -> usize {
        self.objects
            .iter()
            .filter(|o| o.placed && o.kind.type_name() == type_name)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
