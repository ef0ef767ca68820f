//! Engine snapshots with BLAKE3 state hashing.
//!
//! An [`EngineSnapshot`] is a serializable view of everything on the board:
//! the grid (objects, runtime state, group partition), the signal links
//! including their latched inputs, and the player handle. Its `hash` covers
//! exactly that board state and nothing else, so two engines that show the
//! same board hash equal regardless of how they got there. In particular,
//! undoing a step restores the hash from before the step.
//!
//! ```
//! use sokoban_engine::prelude::*;
//!
//! let mut level = Level::new(4, 4);
//! level.create(ObjectKind::Player, Position::new(1, 1)).unwrap();
//! let mut engine = Engine::new(level, EngineConfig::default());
//!
//! let before = engine.state_hash();
//! assert_eq!(before.len(), 64); // BLAKE3 hex digest
//!
//! engine.try_move_player(Direction::Down);
//! assert_ne!(engine.state_hash(), before);
//!
//! engine.undo();
//! assert_eq!(engine.state_hash(), before);
//! ```
//!
//! The undo history and the step counter are not part of the hash.

use serde::{Deserialize, Serialize};
use sokoban_delta::StructureId;
use sokoban_grid::{GridSnapshot, ObjectId};

use crate::signal::Structure;
use crate::step::Engine;

// ---------------------------------------------------------------------------
// EngineSnapshot
// ---------------------------------------------------------------------------

/// A serializable snapshot of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Objects, slots and groups.
    pub grid: GridSnapshot,
    /// Signal structures in id order.
    pub links: Vec<(StructureId, Structure)>,
    /// The player object, if any.
    pub player: Option<ObjectId>,
    /// Steps taken when the snapshot was captured. Not hashed.
    pub step_counter: u64,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the board state.
    pub hash: String,
}

impl EngineSnapshot {
    /// Recompute the hash from the snapshot's own data and compare.
    pub fn verify(&self) -> bool {
        compute_hash(&self.grid, &self.links, self.player) == self.hash
    }
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// BLAKE3 hex digest of the canonical JSON encoding of the board.
fn compute_hash(grid: &GridSnapshot, links: &[(StructureId, Structure)], player: Option<ObjectId>) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        grid: &'a GridSnapshot,
        links: &'a [(StructureId, Structure)],
        player: Option<ObjectId>,
    }

    let hashable = HashableState { grid, links, player };
    let json_bytes =
        serde_json::to_vec(&hashable).expect("board state should always be JSON-serializable");

    blake3::hash(&json_bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Engine snapshot methods
// ---------------------------------------------------------------------------

impl Engine {
    /// Capture the board and hash it.
    pub fn capture_snapshot(&self) -> EngineSnapshot {
        let level = self.level();
        let grid = level.grid().capture_snapshot();
        let links: Vec<(StructureId, Structure)> = level
            .signals()
            .iter()
            .map(|(id, s)| (id, s.clone()))
            .collect();
        let player = level.player();
        let hash = compute_hash(&grid, &links, player);

        EngineSnapshot {
            grid,
            links,
            player,
            step_counter: self.step_count(),
            hash,
        }
    }

    /// The board hash, as in [`capture_snapshot`](Self::capture_snapshot).
    pub fn state_hash(&self) -> String {
        self.capture_snapshot().hash
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
