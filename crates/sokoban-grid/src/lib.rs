//! Sokoban grid -- the layered board, its objects, and sticky groups.
//!
//! This crate is the data model underneath the puzzle engine. A [`Grid`]
//! holds every object of a level in an id-indexed arena, keeps one slot per
//! [`Layer`] in every cell, and tracks the rigid bodies ([`Group`]s) formed
//! by sticky objects of the same color. Everything about *moving* objects
//! lives one crate up; this crate only provides the primitives (vacate,
//! occupy, merge, unmerge) that the move resolver and undo log are built on.
//!
//! # Quick Start
//!
//! ```
//! use sokoban_grid::prelude::*;
//!
//! let mut grid = Grid::new(5, 3);
//! let sticky = ObjectKind::Box { color: Color::RED, sticky: true };
//! let a = grid.spawn(sticky, Position::new(1, 1)).unwrap();
//! let b = grid.spawn(sticky, Position::new(2, 1)).unwrap();
//! grid.merge_adjacent(a);
//!
//! assert_eq!(grid.group_of(a), grid.group_of(b));
//! assert!(grid.solid_at(Position::new(-1, 1)).is_some()); // border wall
//! ```

#![deny(unsafe_code)]

pub mod grid;
pub mod group;
pub mod object;
pub mod position;
pub mod snapshot;

pub use grid::Grid;
pub use group::{Group, GroupId, GroupMerge, GroupTable};
pub use object::{
    AttributeError, Capabilities, Color, GameObject, Layer, ObjectId, ObjectKind, ObjectPreview,
    ObjectState, NUM_LAYERS, TYPE_NAMES,
};
pub use position::{Direction, Position};
pub use snapshot::{GridSnapshot, ObjectSnapshot};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The position is not an interior cell.
    #[error("position {position} is outside the grid")]
    OutOfBounds { position: Position },

    /// The target slot already holds an object.
    #[error("slot {layer:?} at {position} is already occupied")]
    Occupied { position: Position, layer: Layer },

    /// The target slot holds nothing.
    #[error("slot {layer:?} at {position} is empty")]
    Empty { position: Position, layer: Layer },

    /// The kind cannot be created on its own (it is owned by another object).
    #[error("objects of type '{0}' cannot be created directly")]
    DependentKind(&'static str),

    /// The grid would need more cells than [`Grid::MAX_CELLS`].
    #[error("a {width}x{height} grid is too large")]
    TooLarge { width: u16, height: u16 },

    /// A group invariant does not hold.
    #[error("group invariant violated: {0}")]
    GroupInvariant(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::grid::Grid;
    pub use crate::group::{GroupId, GroupMerge};
    pub use crate::object::{Color, GameObject, Layer, ObjectId, ObjectKind, ObjectState};
    pub use crate::position::{Direction, Position};
    pub use crate::GridError;
}
