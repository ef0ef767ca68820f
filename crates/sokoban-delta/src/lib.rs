//! Sokoban delta -- per-step undo records and the bounded undo history.
//!
//! A [`Delta`] is created at the start of every input step and filled in
//! chronological order as the step resolves. Committed deltas go onto an
//! [`UndoHistory`]; undo pops the newest one and reverts it in reverse
//! order. This crate only stores the records; applying and reverting them is
//! the engine's job, since it needs the grid and the signal network.

#![deny(unsafe_code)]

pub mod delta;
pub mod history;

pub use delta::{Delta, DeltaParts, DynamicSnapshot, LinkSnapshot, MoveRecord, StructureId};
pub use history::{UndoHistory, DEFAULT_UNDO_CAPACITY};
