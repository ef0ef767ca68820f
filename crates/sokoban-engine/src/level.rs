//! A playable level: the grid, its signal structures, and the player.
//!
//! [`Level`] is what the map codec produces and consumes. It also carries the
//! editor operations ([`Level::create`], [`Level::destroy`],
//! [`Level::link`]), which mutate the level directly and are not recorded in
//! any [`Delta`](sokoban_delta::Delta).

use sokoban_delta::{Delta, StructureId};
use sokoban_grid::{GameObject, Grid, GridError, Layer, ObjectId, ObjectKind, ObjectState, Position};

use crate::signal::{self, SignalNetwork, Structure};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by editor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// The underlying grid rejected the change.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// A level holds at most one player.
    #[error("the level already has a player at {existing}")]
    DuplicatePlayer { existing: Position },

    /// A link input is not a switch.
    #[error("object {object} is not a switch")]
    NotASwitch { object: ObjectId },

    /// A link output is not a gate base.
    #[error("object {object} is not a gate")]
    NotAGate { object: ObjectId },

    /// A link needs at least one switch and one gate.
    #[error("a switch link needs at least one switch and one gate")]
    EmptyLink,
}

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// A level: grid, signal network, and player handle.
#[derive(Debug, Clone)]
pub struct Level {
    grid: Grid,
    signals: SignalNetwork,
    player: Option<ObjectId>,
}

impl Level {
    /// Create an empty, walled level of `width × height` interior cells.
    ///
    /// # Panics
    ///
    /// Panics if the grid would exceed [`Grid::MAX_CELLS`].
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_grid(Grid::new(width, height))
    }

    /// Like [`Level::new`], but refuses oversized levels instead of
    /// panicking.
    ///
    /// # Errors
    ///
    /// [`GridError::TooLarge`] if the grid would exceed [`Grid::MAX_CELLS`].
    pub fn try_new(width: u16, height: u16) -> Result<Self, GridError> {
        Grid::try_new(width, height).map(Self::with_grid)
    }

    fn with_grid(grid: Grid) -> Self {
        Self {
            grid,
            signals: SignalNetwork::new(),
            player: None,
        }
    }

    /// The grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// The signal structures.
    pub fn signals(&self) -> &SignalNetwork {
        &self.signals
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Grid, &mut SignalNetwork) {
        (&mut self.grid, &mut self.signals)
    }

    /// The player object, if the level has one.
    pub fn player(&self) -> Option<ObjectId> {
        self.player
    }

    /// Where the player stands.
    pub fn player_position(&self) -> Option<Position> {
        self.player.map(|id| self.grid[id].position)
    }

    /// The object the player is riding, if any.
    pub fn riding(&self) -> Option<ObjectId> {
        match self.grid[self.player?].state {
            ObjectState::Player { riding } => riding,
            _ => None,
        }
    }

    // -- editor operations --------------------------------------------------

    /// Create an object of `kind` at `pos`.
    ///
    /// Sticky objects merge with their neighbours, gates settle against
    /// their (still unsignalled) input, and a player placed on a rideable
    /// object starts riding it.
    ///
    /// # Errors
    ///
    /// - [`EditError::Grid`] if the slot is taken, out of bounds, or the kind
    ///   cannot be created on its own.
    /// - [`EditError::DuplicatePlayer`] if a second player is created.
    pub fn create(&mut self, kind: ObjectKind, pos: Position) -> Result<ObjectId, EditError> {
        if kind == ObjectKind::Player {
            if let Some(existing) = self.player_position() {
                return Err(EditError::DuplicatePlayer { existing });
            }
        }

        let id = self.grid.spawn(kind, pos)?;
        let caps = kind.capabilities();
        if caps.sticky {
            let _ = self.grid.merge_adjacent(id);
        }
        if caps.is_player {
            self.player = Some(id);
            self.refresh_riding();
        }
        if caps.rideable && self.player_position() == Some(pos) {
            self.refresh_riding();
        }
        if caps.is_switchable {
            signal::check_gate(&mut self.grid, id, None, &mut Delta::new());
        }
        tracing::debug!(object = %id, kind = kind.type_name(), position = %pos, "created object");
        Ok(id)
    }

    /// Destroy the object in the `layer` slot at `pos`.
    ///
    /// Links that reference it are updated (see
    /// [`SignalNetwork::forget_object`]), a ridden car drops its rider, and
    /// destroying the player clears the player handle.
    ///
    /// # Errors
    ///
    /// [`EditError::Grid`] if the slot is empty, lies on the border, or holds
    /// a raised gate wall (destroy the gate base on the FLOOR layer instead).
    /// The level is unchanged on error.
    pub fn destroy(&mut self, pos: Position, layer: Layer) -> Result<GameObject, EditError> {
        let id = self
            .grid
            .at(pos, layer)
            .ok_or(GridError::Empty { position: pos, layer })?;
        let was_player = self.player == Some(id);
        let was_ridden = !was_player && self.riding() == Some(id);

        let removed = self.grid.remove(pos, layer)?;
        if was_player {
            self.player = None;
        } else if was_ridden {
            self.set_riding(None);
        }
        let _ = self.signals.forget_object(id);
        tracing::debug!(object = %id, kind = removed.kind.type_name(), position = %pos, "destroyed object");
        Ok(removed)
    }

    /// Add a switch link.
    ///
    /// A gate may appear in several links. It follows whichever link sends
    /// last in a signal pass, which is a multi link whenever one drives it
    /// (see the [`signal`](crate::signal) module docs).
    ///
    /// # Errors
    ///
    /// [`EditError::NotASwitch`], [`EditError::NotAGate`], or
    /// [`EditError::EmptyLink`] if the references do not fit.
    pub fn link(&mut self, structure: Structure) -> Result<StructureId, EditError> {
        if structure.switches().is_empty() || structure.gates().is_empty() {
            return Err(EditError::EmptyLink);
        }
        for &object in structure.switches() {
            let is_switch = self
                .grid
                .object(object)
                .map(|o| o.capabilities().is_switch)
                .unwrap_or(false);
            if !is_switch {
                return Err(EditError::NotASwitch { object });
            }
        }
        for &object in structure.gates() {
            let is_gate = self
                .grid
                .object(object)
                .map(|o| o.capabilities().is_switchable)
                .unwrap_or(false);
            if !is_gate {
                return Err(EditError::NotAGate { object });
            }
        }
        let id = self.signals.add(structure);
        tracing::debug!(structure = ?id, "linked switches");
        Ok(id)
    }

    // -- helpers ------------------------------------------------------------

    /// Settle every gate against its current signal without recording
    /// anything. Used once after loading.
    pub(crate) fn settle_gates(&mut self) {
        let gates: Vec<ObjectId> = self
            .grid
            .placed_objects()
            .filter(|o| o.capabilities().is_switchable)
            .map(|o| o.id)
            .collect();
        let mut scratch = Delta::new();
        for gate in gates {
            signal::check_gate(&mut self.grid, gate, None, &mut scratch);
        }
    }

    /// Register a freshly spawned player and start riding whatever rideable
    /// object shares its cell.
    pub(crate) fn adopt_player(&mut self, id: ObjectId) {
        self.player = Some(id);
        self.refresh_riding();
    }

    fn refresh_riding(&mut self) {
        let Some(pos) = self.player_position() else {
            return;
        };
        let car = self
            .grid
            .object_at(pos, Layer::Solid)
            .filter(|o| o.capabilities().rideable)
            .map(|o| o.id);
        self.set_riding(car);
    }

    fn set_riding(&mut self, riding: Option<ObjectId>) {
        if let Some(player) = self.player {
            self.grid.set_state(player, ObjectState::Player { riding });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
