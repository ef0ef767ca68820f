//! The [`Grid`] is the top-level container for a level's objects. It owns the
//! object arena, the per-cell layer slots, and the group table.
//!
//! Cells are addressed by [`Position`]. The interior spans
//! `0..width × 0..height`; the ring one cell outside it holds the implicit
//! wall border, which is made of ordinary [`ObjectKind::Wall`] objects so the
//! push resolver needs no special bounds check.

use std::ops::Index;

use crate::group::GroupTable;
use crate::object::{GameObject, Layer, ObjectId, ObjectKind, ObjectState, NUM_LAYERS};
use crate::position::Position;
use crate::GridError;

/// The layer slots of one cell.
type Cell = [Option<ObjectId>; NUM_LAYERS];

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A bounded, layered grid of objects.
#[derive(Clone, Debug)]
pub struct Grid {
    width: u16,
    height: u16,
    /// `(width + 2) * (height + 2)` cells, border ring included.
    cells: Vec<Cell>,
    /// Object arena, indexed by [`ObjectId::index`]. Removed objects leave
    /// `None` behind so ids are never reused.
    objects: Vec<Option<GameObject>>,
    groups: GroupTable,
}

impl Grid {
    /// Upper bound on `(width + 2) * (height + 2)`, border ring included.
    pub const MAX_CELLS: usize = 1 << 22;

    /// Create an empty grid of `width × height` interior cells, surrounded by
    /// a wall border.
    ///
    /// # Panics
    ///
    /// Panics if the grid would exceed [`Grid::MAX_CELLS`]. Use
    /// [`Grid::try_new`] for sizes that come from untrusted input.
    pub fn new(width: u16, height: u16) -> Self {
        match Self::try_new(width, height) {
            Ok(grid) => grid,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create an empty grid, or fail if it would exceed [`Grid::MAX_CELLS`].
    ///
    /// # Errors
    ///
    /// [`GridError::TooLarge`] if the cell count overflows or passes the cap.
    pub fn try_new(width: u16, height: u16) -> Result<Self, GridError> {
        let cell_count = (usize::from(width) + 2)
            .checked_mul(usize::from(height) + 2)
            .filter(|&n| n <= Self::MAX_CELLS)
            .ok_or(GridError::TooLarge { width, height })?;
        let mut grid = Self {
            width,
            height,
            cells: vec![[None; NUM_LAYERS]; cell_count],
            objects: Vec::new(),
            groups: GroupTable::new(),
        };
        grid.create_wall_border();
        Ok(grid)
    }

    fn create_wall_border(&mut self) {
        let (w, h) = (i32::from(self.width), i32::from(self.height));
        for y in [-1, h] {
            for x in 0..w {
                self.spawn_unchecked(ObjectKind::Wall, Position::new(x, y));
            }
        }
        for x in [-1, w] {
            for y in 0..h {
                self.spawn_unchecked(ObjectKind::Wall, Position::new(x, y));
            }
        }
    }

    // -- geometry -----------------------------------------------------------

    /// Number of interior columns.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Number of interior rows.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// `true` if `pos` is an interior cell.
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < i32::from(self.width) && pos.y < i32::from(self.height)
    }

    /// `true` if `pos` is an interior or border cell.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= -1 && pos.y >= -1 && pos.x <= i32::from(self.width) && pos.y <= i32::from(self.height)
    }

    fn cell_index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let stride = self.width as usize + 2;
        Some((pos.y + 1) as usize * stride + (pos.x + 1) as usize)
    }

    /// Interior positions in column-major order (x outer, y inner).
    pub fn interior_positions(&self) -> impl Iterator<Item = Position> {
        let (w, h) = (i32::from(self.width), i32::from(self.height));
        (0..w).flat_map(move |x| (0..h).map(move |y| Position::new(x, y)))
    }

    // -- lookup -------------------------------------------------------------

    /// The object in the `layer` slot at `pos`, if any. Positions outside the
    /// border are always empty.
    pub fn at(&self, pos: Position, layer: Layer) -> Option<ObjectId> {
        self.cell_index(pos)
            .and_then(|i| self.cells[i][layer.slot()])
    }

    /// The object in the SOLID slot at `pos`, if any.
    pub fn solid_at(&self, pos: Position) -> Option<ObjectId> {
        self.at(pos, Layer::Solid)
    }

    /// The object with the given id, if it is alive.
    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id.index() as usize).and_then(Option::as_ref)
    }

    /// Mutable access to an alive object.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects
            .get_mut(id.index() as usize)
            .and_then(Option::as_mut)
    }

    pub(crate) fn object_mut_internal(&mut self, id: ObjectId) -> &mut GameObject {
        match self.object_mut(id) {
            Some(obj) => obj,
            None => panic!("invariant violation: {id:?} is not alive"),
        }
    }

    /// The object in the `layer` slot at `pos`, if any.
    pub fn object_at(&self, pos: Position, layer: Layer) -> Option<&GameObject> {
        self.at(pos, layer).and_then(|id| self.object(id))
    }

    /// All alive objects in id order, including detached ones.
    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.iter().flatten()
    }

    /// All alive objects that currently occupy a slot.
    pub fn placed_objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects().filter(|obj| self.is_placed(obj.id))
    }

    /// Number of alive objects, including border walls and detached gate
    /// walls.
    pub fn object_count(&self) -> usize {
        self.objects().count()
    }

    /// `true` if `id` is alive and occupies its slot.
    pub fn is_placed(&self, id: ObjectId) -> bool {
        self.object(id)
            .map(|obj| self.at(obj.position, obj.layer()) == Some(id))
            .unwrap_or(false)
    }

    /// The group table.
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut GroupTable {
        &mut self.groups
    }

    // -- spawning -----------------------------------------------------------

    fn allocate(&mut self, kind: ObjectKind, position: Position) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        let group = self.groups.create_singleton(id);
        let state = match kind {
            ObjectKind::Player => ObjectState::Player { riding: None },
            ObjectKind::Switch { .. } => ObjectState::Switch { pressed: false },
            _ => ObjectState::Inert,
        };
        self.objects.push(Some(GameObject {
            id,
            kind,
            position,
            group,
            state,
        }));
        id
    }

    fn spawn_unchecked(&mut self, kind: ObjectKind, position: Position) -> ObjectId {
        let id = self.allocate(kind, position);
        self.occupy(id);
        id
    }

    /// Create an object of `kind` at the interior cell `pos`.
    ///
    /// Gate bases get their detached [`ObjectKind::GateWall`] here; raising it
    /// is the signal network's job. Stickiness is *not* resolved here: call
    /// [`Grid::merge_adjacent`] once the surrounding objects are in place.
    ///
    /// # Errors
    ///
    /// - [`GridError::OutOfBounds`] if `pos` is not an interior cell.
    /// - [`GridError::Occupied`] if the kind's layer slot is taken.
    /// - [`GridError::DependentKind`] for kinds that only exist as part of
    ///   another object.
    pub fn spawn(&mut self, kind: ObjectKind, pos: Position) -> Result<ObjectId, GridError> {
        if !kind.is_persisted() {
            return Err(GridError::DependentKind(kind.type_name()));
        }
        if !self.in_bounds(pos) {
            return Err(GridError::OutOfBounds { position: pos });
        }
        let layer = kind.layer();
        if self.at(pos, layer).is_some() {
            return Err(GridError::Occupied {
                position: pos,
                layer,
            });
        }

        let id = self.spawn_unchecked(kind, pos);
        if let ObjectKind::GateBase { .. } = kind {
            let wall = self.allocate(ObjectKind::GateWall, pos);
            self.object_mut_internal(id).state = ObjectState::Gate {
                active: false,
                signal: false,
                waiting: false,
                wall,
            };
        }
        Ok(id)
    }

    /// Remove the object in the `layer` slot at `pos` and destroy it.
    ///
    /// Removing a sticky object rebuilds the groups of its former group mates.
    /// Removing a gate base also destroys its gate wall. Returns the removed
    /// object.
    ///
    /// # Errors
    ///
    /// - [`GridError::OutOfBounds`] if `pos` is not an interior cell.
    /// - [`GridError::Empty`] if the slot holds nothing.
    /// - [`GridError::DependentKind`] if the slot holds a raised gate wall;
    ///   remove its gate base instead.
    pub fn remove(&mut self, pos: Position, layer: Layer) -> Result<GameObject, GridError> {
        if !self.in_bounds(pos) {
            return Err(GridError::OutOfBounds { position: pos });
        }
        let id = self
            .at(pos, layer)
            .ok_or(GridError::Empty { position: pos, layer })?;
        let kind = self[id].kind;
        if !kind.is_persisted() {
            return Err(GridError::DependentKind(kind.type_name()));
        }
        let _ = self.vacate(pos, layer);
        let removed = self.destroy(id);

        if let ObjectState::Gate { wall, .. } = removed.state {
            if self.at(pos, Layer::Solid) == Some(wall) {
                let _ = self.vacate(pos, Layer::Solid);
            }
            let _ = self.destroy(wall);
        }

        let survivors: Vec<ObjectId> = self
            .groups
            .remove(removed.group)
            .map(|g| g.members.into_iter().filter(|m| *m != id).collect())
            .unwrap_or_default();
        if !survivors.is_empty() {
            self.rebuild_groups(&survivors);
        }
        Ok(removed)
    }

    fn destroy(&mut self, id: ObjectId) -> GameObject {
        match self.objects.get_mut(id.index() as usize).and_then(Option::take) {
            Some(obj) => {
                if let Some(group) = self.groups.get(obj.group) {
                    if group.len() == 1 {
                        let _ = self.groups.remove(obj.group);
                    }
                }
                obj
            }
            None => panic!("invariant violation: destroying dead object {id:?}"),
        }
    }

    // -- slot primitives ----------------------------------------------------

    /// Clear the `layer` slot at `pos`, returning what was there. The object
    /// stays alive and keeps its position.
    pub fn vacate(&mut self, pos: Position, layer: Layer) -> Option<ObjectId> {
        let index = self.cell_index(pos)?;
        self.cells[index][layer.slot()].take()
    }

    /// Put an alive object into the slot at its own position and layer.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already taken or the position is off the grid:
    /// two objects claiming one slot would corrupt every later push.
    pub fn occupy(&mut self, id: ObjectId) {
        let obj = &self[id];
        let (pos, layer) = (obj.position, obj.layer());
        let Some(index) = self.cell_index(pos) else {
            panic!("invariant violation: {} is off the grid", obj.display_str());
        };
        let slot = &mut self.cells[index][layer.slot()];
        assert!(
            slot.is_none(),
            "invariant violation: {pos} {layer:?} is already occupied by {:?}",
            slot
        );
        *slot = Some(id);
    }

    /// Change an object's recorded position without touching any slot.
    /// Pair with [`Grid::vacate`] / [`Grid::occupy`].
    pub fn set_position(&mut self, id: ObjectId, pos: Position) {
        self.object_mut_internal(id).position = pos;
    }

    /// Replace an object's runtime state.
    pub fn set_state(&mut self, id: ObjectId, state: ObjectState) {
        self.object_mut_internal(id).state = state;
    }
}

impl Index<ObjectId> for Grid {
    type Output = GameObject;

    /// # Panics
    ///
    /// Panics if `id` is not alive.
    fn index(&self, id: ObjectId) -> &GameObject {
        match self.object(id) {
            Some(obj) => obj,
            None => panic!("invariant violation: {id:?} is not alive"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
