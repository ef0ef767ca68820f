//! The turn-based step driver.
//!
//! The [`Engine`] owns a [`Level`] and resolves one input at a time. A move
//! step runs, in order:
//!
//! 1. **Resolve**: the player's move and every push it causes are recorded
//!    in a fresh [`Delta`]. An illegal move resets the delta and changes
//!    nothing.
//! 2. **Apply**: the recorded moves are realized (clear all, then place
//!    all) and newly touching sticky groups merge.
//! 3. **Settle**: the signal network updates switches, gates and links.
//! 4. **Commit**: the delta goes onto the bounded [`UndoHistory`].
//!
//! Undo pops the newest delta and reverts it in strict reverse order:
//! structures, dynamic objects, merges, moves.
//!
//! # Example
//!
//! ```
//! use sokoban_engine::prelude::*;
//!
//! let mut level = Level::new(5, 5);
//! level.create(ObjectKind::Player, Position::new(2, 2)).unwrap();
//! let mut engine = Engine::new(level, EngineConfig::default());
//!
//! assert!(engine.try_move_player(Direction::Right));
//! assert_eq!(engine.level().player_position(), Some(Position::new(3, 2)));
//!
//! assert!(engine.undo());
//! assert_eq!(engine.level().player_position(), Some(Position::new(2, 2)));
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};
use sokoban_delta::{Delta, DynamicSnapshot, MoveRecord, StructureId, UndoHistory, DEFAULT_UNDO_CAPACITY};
use sokoban_grid::{Direction, GameObject, Layer, ObjectId, ObjectKind, ObjectState, Position};

use crate::level::{EditError, Level};
use crate::resolver;
use crate::signal::{self, SettleMode, Structure};

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration for the step driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of steps that can be undone. Must be non-zero.
    pub undo_capacity: usize,
    /// Signal settling policy.
    pub settle: SettleMode,
}

impl Default for EngineConfig {
    /// 256 undo steps, one signal pass per step.
    fn default() -> Self {
        Self {
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            settle: SettleMode::SinglePass,
        }
    }
}

// ---------------------------------------------------------------------------
// StepInput
// ---------------------------------------------------------------------------

/// One player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepInput {
    /// Move the player one cell.
    Move(Direction),
    /// Revert the last step.
    Undo,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The step driver.
///
/// All grid mutation happens on the thread that owns the engine. Other
/// threads feed it through [`Engine::input_sender`]; queued inputs are only
/// resolved when [`Engine::process_pending`] runs.
pub struct Engine {
    level: Level,
    config: EngineConfig,
    history: UndoHistory,
    /// Moves and undos that changed the level.
    step_counter: u64,
    input_tx: Sender<StepInput>,
    input_rx: Receiver<StepInput>,
}

impl Engine {
    /// Create an engine driving `level`.
    ///
    /// # Panics
    ///
    /// Panics if `config.undo_capacity` is zero.
    pub fn new(level: Level, config: EngineConfig) -> Self {
        let (input_tx, input_rx) = mpsc::channel();
        Self {
            level,
            history: UndoHistory::new(config.undo_capacity),
            config,
            step_counter: 0,
            input_tx,
            input_rx,
        }
    }

    /// The level being played.
    pub fn level(&self) -> &Level {
        &self.level
    }

    /// Give the level back, dropping the undo history.
    pub fn into_level(self) -> Level {
        self.level
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of moves and undos that changed the level.
    pub fn step_count(&self) -> u64 {
        self.step_counter
    }

    /// Number of steps that can currently be undone.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // -- gameplay -----------------------------------------------------------

    /// Move the player one cell in `dir`, pushing whatever is in the way.
    ///
    /// Returns `false` (and changes nothing) if there is no player, another
    /// player-layer object is in the way, or the push is blocked.
    pub fn try_move_player(&mut self, dir: Direction) -> bool {
        let Some(player) = self.level.player() else {
            return false;
        };
        let grid = self.level.grid();
        let from = grid[player].position;
        let dest = from.step(dir);
        if grid.at(dest, Layer::Player).is_some() {
            return false;
        }

        let mut delta = Delta::new();
        delta.add_move(
            dir,
            MoveRecord {
                object: player,
                from,
                layer: Layer::Player,
            },
        );

        let pushed = match self.level.riding() {
            Some(car) => Some(car),
            None => grid.solid_at(dest),
        };
        if let Some(pushed) = pushed {
            if let Err(blocked) = resolver::record_push(grid, pushed, dir, &mut delta) {
                delta.reset_moves();
                tracing::debug!(
                    direction = ?dir,
                    blocker = %blocked.blocker,
                    position = %blocked.position,
                    "move blocked"
                );
                return false;
            }
        }

        self.apply(delta);
        true
    }

    /// Revert the most recent step. Returns `false` if there is nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        let Some(delta) = self.history.pop() else {
            return false;
        };
        let parts = delta.into_parts();
        let (grid, signals) = self.level.parts_mut();

        for (id, snapshot) in parts.structures.into_iter().rev() {
            signals.restore(id, snapshot);
        }
        for (id, snapshot) in parts.dynamic.into_iter().rev() {
            match snapshot {
                DynamicSnapshot::Switch { pressed } => {
                    grid.set_state(id, ObjectState::Switch { pressed });
                }
                DynamicSnapshot::Gate {
                    active,
                    signal: received,
                    waiting,
                } => signal::restore_gate(grid, id, active, received, waiting),
            }
        }
        for merge in parts.group_merges.into_iter().rev() {
            grid.unmerge(merge);
        }
        resolver::revert_moves(grid, &parts.moves);

        self.step_counter += 1;
        tracing::debug!(step = self.step_counter, remaining = self.history.len(), "undid step");
        true
    }

    /// Resolve one input. Returns whether the level changed.
    pub fn step(&mut self, input: StepInput) -> bool {
        match input {
            StepInput::Move(dir) => self.try_move_player(dir),
            StepInput::Undo => self.undo(),
        }
    }

    /// A handle other threads can use to queue inputs.
    pub fn input_sender(&self) -> Sender<StepInput> {
        self.input_tx.clone()
    }

    /// Resolve every queued input in arrival order. Returns how many inputs
    /// were resolved.
    pub fn process_pending(&mut self) -> usize {
        let pending: Vec<StepInput> = self.input_rx.try_iter().collect();
        for input in &pending {
            let _ = self.step(*input);
        }
        pending.len()
    }

    fn apply(&mut self, mut delta: Delta) {
        let settle = self.config.settle;
        let (grid, signals) = self.level.parts_mut();
        let moved = resolver::apply_moves(grid, &mut delta);
        let passes = signals.settle(grid, &mut delta, settle);

        self.step_counter += 1;
        tracing::debug!(
            step = self.step_counter,
            moved = moved.len(),
            merges = delta.group_merges().len(),
            signal_changes = delta.dynamic_changes().len() + delta.structure_changes().len(),
            passes,
            "applied step"
        );
        self.history.push(delta);
    }

    // -- editor -------------------------------------------------------------

    /// Create an object (editor). Clears the undo history.
    ///
    /// # Errors
    ///
    /// See [`Level::create`].
    pub fn create(&mut self, kind: ObjectKind, pos: Position) -> Result<ObjectId, EditError> {
        let id = self.level.create(kind, pos)?;
        self.history.clear();
        Ok(id)
    }

    /// Destroy an object (editor). Clears the undo history.
    ///
    /// # Errors
    ///
    /// See [`Level::destroy`].
    pub fn destroy(&mut self, pos: Position, layer: Layer) -> Result<GameObject, EditError> {
        let removed = self.level.destroy(pos, layer)?;
        self.history.clear();
        Ok(removed)
    }

    /// Add a switch link (editor). Clears the undo history.
    ///
    /// # Errors
    ///
    /// See [`Level::link`].
    pub fn link(&mut self, structure: Structure) -> Result<StructureId, EditError> {
        let id = self.level.link(structure)?;
        self.history.clear();
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sokoban_grid::Color;

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn engine_with(build: impl FnOnce(&mut Level)) -> Engine {
        let mut level = Level::new(6, 4);
        build(&mut level);
        Engine::new(level, EngineConfig::default())
    }

    fn plain_box() -> ObjectKind {
        ObjectKind::Box {
            color: Color::RED,
            sticky: false,
        }
    }

    // -- 1. Config ----------------------------------------------------------

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.undo_capacity, 256);
        assert_eq!(config.settle, SettleMode::SinglePass);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_undo_capacity_panics() {
        let config = EngineConfig {
            undo_capacity: 0,
            ..Default::default()
        };
        let _ = Engine::new(Level::new(1, 1), config);
    }

    // -- 2. Moving ----------------------------------------------------------

    #[test]
    fn no_player_means_no_move() {
        let mut engine = engine_with(|_| {});
        assert!(!engine.try_move_player(Direction::Up));
        assert_eq!(engine.history_len(), 0);
    }

    #[test]
    fn walking_records_history() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 0)).unwrap();
        });
        assert!(engine.try_move_player(Direction::Down));
        assert_eq!(engine.history_len(), 1);
        assert_eq!(engine.step_count(), 1);
    }

    #[test]
    fn blocked_move_leaves_no_history() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 0)).unwrap();
        });
        assert!(!engine.try_move_player(Direction::Left));
        assert_eq!(engine.history_len(), 0);
        assert_eq!(engine.step_count(), 0);
    }

    #[test]
    fn pushing_a_box() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 1)).unwrap();
            l.create(plain_box(), p(1, 1)).unwrap();
        });
        assert!(engine.try_move_player(Direction::Right));
        let grid = engine.level().grid();
        assert!(grid.solid_at(p(1, 1)).is_none());
        assert!(grid.solid_at(p(2, 1)).is_some());
        assert_eq!(engine.level().player_position(), Some(p(1, 1)));
    }

    #[test]
    fn riding_player_carries_the_car() {
        let car = ObjectKind::Car {
            color: Color::BLUE,
            sticky: false,
        };
        let mut engine = engine_with(|l| {
            l.create(car, p(1, 1)).unwrap();
            l.create(ObjectKind::Player, p(1, 1)).unwrap();
        });
        let car_id = engine.level().riding().unwrap();
        assert!(engine.try_move_player(Direction::Down));
        assert_eq!(engine.level().grid()[car_id].position, p(1, 2));
        assert_eq!(engine.level().player_position(), Some(p(1, 2)));

        assert!(engine.try_move_player(Direction::Down));
        assert!(!engine.try_move_player(Direction::Down));
        assert_eq!(engine.level().player_position(), Some(p(1, 3)));
    }

    // -- 3. Undo ------------------------------------------------------------

    #[test]
    fn undo_on_empty_history_is_a_no_op() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 0)).unwrap();
        });
        assert!(!engine.undo());
        assert_eq!(engine.step_count(), 0);
    }

    #[test]
    fn undo_reverts_a_push() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 1)).unwrap();
            l.create(plain_box(), p(1, 1)).unwrap();
        });
        let before = engine.level().grid().capture_snapshot();
        assert!(engine.try_move_player(Direction::Right));
        assert!(engine.undo());
        assert_eq!(engine.level().grid().capture_snapshot(), before);
    }

    #[test]
    fn history_is_bounded() {
        let mut level = Level::new(3, 1);
        level.create(ObjectKind::Player, p(0, 0)).unwrap();
        let config = EngineConfig {
            undo_capacity: 2,
            ..Default::default()
        };
        let mut engine = Engine::new(level, config);
        for dir in [Direction::Right, Direction::Left, Direction::Right] {
            assert!(engine.try_move_player(dir));
        }
        assert_eq!(engine.history_len(), 2);
        assert!(engine.undo());
        assert!(engine.undo());
        assert!(!engine.undo());
        // The first step was evicted, so the player stops one cell short.
        assert_eq!(engine.level().player_position(), Some(p(1, 0)));
    }

    // -- 4. Editor ----------------------------------------------------------

    #[test]
    fn editor_changes_clear_history() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 0)).unwrap();
        });
        assert!(engine.try_move_player(Direction::Right));
        engine.create(plain_box(), p(3, 3)).unwrap();
        assert_eq!(engine.history_len(), 0);
        assert!(!engine.undo());
    }

    // -- 5. Queued input ----------------------------------------------------

    #[test]
    fn queued_inputs_resolve_in_order() {
        let mut engine = engine_with(|l| {
            l.create(ObjectKind::Player, p(0, 0)).unwrap();
        });
        let tx = engine.input_sender();
        tx.send(StepInput::Move(Direction::Right)).unwrap();
        tx.send(StepInput::Move(Direction::Right)).unwrap();
        tx.send(StepInput::Undo).unwrap();
        assert_eq!(engine.level().player_position(), Some(p(0, 0)));

        assert_eq!(engine.process_pending(), 3);
        assert_eq!(engine.level().player_position(), Some(p(1, 0)));
        assert_eq!(engine.process_pending(), 0);
    }
}
