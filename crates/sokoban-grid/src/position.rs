//! Grid coordinates and the four cardinal directions.
//!
//! A [`Position`] is a signed integer pair so that the implicit wall border
//! (`x == -1`, `x == width`, `y == -1`, `y == height`) can be addressed with
//! the same type as interior cells.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell coordinate on the grid. `(0, 0)` is the top-left interior cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column, increasing to the right.
    pub x: i32,
    /// Row, increasing downward.
    pub y: i32,
}

impl Position {
    /// Construct a position from its column and row.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step in `dir`.
    #[inline]
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// The neighbouring cell one step against `dir`.
    #[inline]
    pub fn unstep(self, dir: Direction) -> Self {
        self.step(dir.opposite())
    }

    /// The four cardinal neighbours, in [`Direction::ALL`] order.
    pub fn neighbours(self) -> impl Iterator<Item = Position> {
        Direction::ALL.into_iter().map(move |dir| self.step(dir))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the four cardinal unit vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Toward decreasing `y`.
    Up,
    /// Toward increasing `y`.
    Down,
    /// Toward decreasing `x`.
    Left,
    /// Toward increasing `x`.
    Right,
}

impl Direction {
    /// Every direction, in the stable order used for iteration and storage.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// The `(dx, dy)` unit vector.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The direction pointing the other way.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Index into [`Direction::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
