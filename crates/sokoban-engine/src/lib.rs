//! Sokoban engine -- turn-based push resolution, switch logic, undo, and map files.
//!
//! This crate builds on [`sokoban_grid`] and [`sokoban_delta`] to provide the
//! puzzle rules: the move/push resolver, the switch/gate signal network, the
//! step driver with bounded undo, the binary map codec, and state hashing
//! for snapshots and replays.
//!
//! # Quick Start
//!
//! ```
//! use sokoban_engine::prelude::*;
//!
//! let mut level = Level::new(5, 1);
//! level.create(ObjectKind::Player, Position::new(0, 0)).unwrap();
//! level
//!     .create(ObjectKind::Box { color: Color::GOLD, sticky: false }, Position::new(1, 0))
//!     .unwrap();
//!
//! let mut engine = Engine::new(level, EngineConfig::default());
//! assert!(engine.try_move_player(Direction::Right));
//! assert!(engine.try_move_player(Direction::Right));
//! assert!(engine.try_move_player(Direction::Right));
//! assert!(!engine.try_move_player(Direction::Right)); // box against the border
//!
//! let bytes = encode(engine.level(), MapFormat::Standard).unwrap();
//! let reloaded = decode(&bytes, MapFormat::Standard).unwrap();
//! assert_eq!(reloaded.player_position(), Some(Position::new(3, 0)));
//! ```

#![deny(unsafe_code)]

pub mod codec;
pub mod level;
pub mod replay;
pub mod resolver;
pub mod signal;
pub mod snapshot;
pub mod step;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the grid crate for convenience.
pub use sokoban_grid;

/// Re-export the delta crate for convenience.
pub use sokoban_delta;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use sokoban_grid::prelude::*;

    pub use crate::codec::{decode, encode, load, save, LoadError, MapFormat, SaveError};
    pub use crate::level::{EditError, Level};
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::signal::{
        LinkRule, MultiSwitchLink, SettleMode, SignalNetwork, SingleSwitchLink, Structure,
    };
    pub use crate::snapshot::EngineSnapshot;
    pub use crate::step::{Engine, EngineConfig, StepInput};

    pub use sokoban_delta::{Delta, StructureId, UndoHistory};
}
