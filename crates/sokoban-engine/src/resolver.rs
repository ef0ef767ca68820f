//! Move/push resolver.
//!
//! Resolving a push is split in two so that nothing touches the grid until
//! the whole move is known to be legal:
//!
//! 1. [`plan_push`] walks the chain of rigid bodies in front of the mover,
//!    breadth-first over groups, and either returns every group that has to
//!    move or the object that blocks them.
//! 2. [`apply_moves`] realizes the moves recorded in a [`Delta`]: clear every
//!    old slot first, then place every object at its new slot, then merge
//!    any sticky groups that now touch.
//!
//! [`revert_moves`] is the inverse of step 2's first half, used by undo.

use std::collections::{BTreeSet, VecDeque};

use sokoban_delta::{Delta, MoveRecord};
use sokoban_grid::{Direction, Grid, GroupId, ObjectId, Position};

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Why a push is illegal: `blocker` at `position` cannot be moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocked {
    /// The immovable object.
    pub blocker: ObjectId,
    /// Where it stands.
    pub position: Position,
}

/// Work out every group that moves when `start`'s group is pushed one cell
/// in `dir`.
///
/// Returns the groups in discovery order, `start`'s group first. An
/// unpushable `start` blocks itself. A group is
/// never listed twice, so two bodies converging on one cell are caught as a
/// self-overlap of an already-seen group rather than double-booked.
pub fn plan_push(grid: &Grid, start: ObjectId, dir: Direction) -> Result<Vec<GroupId>, Blocked> {
    let obj = &grid[start];
    if !obj.capabilities().pushable {
        return Err(Blocked {
            blocker: start,
            position: obj.position,
        });
    }
    let first = grid.group_of(start);
    let mut seen: BTreeSet<GroupId> = BTreeSet::from([first]);
    let mut order = vec![first];
    let mut to_check = VecDeque::from([first]);

    while let Some(group) = to_check.pop_front() {
        for member in grid.group_members(group) {
            let dest = grid[member].position.step(dir);
            let Some(occupant) = grid.solid_at(dest) else {
                continue;
            };
            let occupant_group = grid.group_of(occupant);
            if seen.contains(&occupant_group) {
                continue;
            }
            if !grid[occupant].capabilities().pushable {
                return Err(Blocked {
                    blocker: occupant,
                    position: dest,
                });
            }
            seen.insert(occupant_group);
            order.push(occupant_group);
            to_check.push_back(occupant_group);
        }
    }
    Ok(order)
}

/// Plan a push and, if legal, record a move for every member of every moving
/// group. Returns the number of moves recorded.
pub fn record_push(
    grid: &Grid,
    start: ObjectId,
    dir: Direction,
    delta: &mut Delta,
) -> Result<usize, Blocked> {
    let groups = plan_push(grid, start, dir)?;
    let mut count = 0;
    for group in groups {
        for member in grid.group_members(group) {
            let obj = &grid[member];
            delta.add_move(
                dir,
                MoveRecord {
                    object: member,
                    from: obj.position,
                    layer: obj.layer(),
                },
            );
            count += 1;
        }
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Applying
// ---------------------------------------------------------------------------

/// Realize every move recorded in `delta`, then merge the sticky groups the
/// moved objects now touch, recording each merge in `delta`.
///
/// Returns the moved objects.
///
/// # Panics
///
/// Panics if a recorded object is not where the record says, or if two
/// objects land in one slot.
pub fn apply_moves(grid: &mut Grid, delta: &mut Delta) -> Vec<ObjectId> {
    let moves: Vec<(Direction, MoveRecord)> = delta.all_moves().map(|(d, m)| (d, *m)).collect();

    for (_, record) in &moves {
        let vacated = grid.vacate(record.from, record.layer);
        assert_eq!(
            vacated,
            Some(record.object),
            "invariant violation: move record does not match the grid at {}",
            record.from
        );
    }
    for (dir, record) in &moves {
        grid.set_position(record.object, record.from.step(*dir));
        grid.occupy(record.object);
    }

    let moved: Vec<ObjectId> = moves.iter().map(|(_, m)| m.object).collect();
    for &object in &moved {
        let group = grid.group_of(object);
        grid.uncheck_group(group);
    }
    for &object in &moved {
        let group = grid.group_of(object);
        if grid.is_group_checked(group) {
            continue;
        }
        let found = grid.find_adjacent_groups(group);
        if let Some(merge) = grid.merge_groups(&found) {
            delta.add_group_merge(merge);
        }
    }
    moved
}

/// Move every recorded object back to its `from` position.
///
/// # Panics
///
/// Panics if a recorded object is not at its destination.
pub fn revert_moves(grid: &mut Grid, moves: &[Vec<MoveRecord>; 4]) {
    let records: Vec<(Direction, MoveRecord)> = Direction::ALL
        .into_iter()
        .flat_map(|dir| moves[dir.index()].iter().map(move |m| (dir, *m)))
        .collect();

    for (dir, record) in records.iter().rev() {
        let dest = record.from.step(*dir);
        let vacated = grid.vacate(dest, record.layer);
        assert_eq!(
            vacated,
            Some(record.object),
            "invariant violation: undo expected {} at {dest}",
            record.object
        );
    }
    for (_, record) in records.iter().rev() {
        grid.set_position(record.object, record.from);
        grid.occupy(record.object);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sokoban_grid::{Color, Layer, ObjectKind};

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn plain(color: Color) -> ObjectKind {
        ObjectKind::Box {
            color,
            sticky: false,
        }
    }

    fn sticky(color: Color) -> ObjectKind {
        ObjectKind::Box {
            color,
            sticky: true,
        }
    }

    #[test]
    fn push_into_empty_cell_moves_one_group() {
        let mut grid = Grid::new(5, 3);
        let b = grid.spawn(plain(Color::RED), p(1, 1)).unwrap();
        let groups = plan_push(&grid, b, Direction::Right).unwrap();
        assert_eq!(groups, vec![grid.group_of(b)]);
    }

    #[test]
    fn chain_push_collects_every_box() {
        let mut grid = Grid::new(6, 1);
        let ids: Vec<ObjectId> = (0..4)
            .map(|x| grid.spawn(plain(Color::BLUE), p(x, 0)).unwrap())
            .collect();
        let groups = plan_push(&grid, ids[0], Direction::Right).unwrap();
        assert_eq!(groups.len(), 4);
    }

    #[test]
    fn wall_at_chain_end_blocks_everything() {
        let mut grid = Grid::new(4, 1);
        let first = grid.spawn(plain(Color::BLUE), p(0, 0)).unwrap();
        grid.spawn(plain(Color::BLUE), p(1, 0)).unwrap();
        let wall = grid.spawn(ObjectKind::Wall, p(2, 0)).unwrap();
        let err = plan_push(&grid, first, Direction::Right).unwrap_err();
        assert_eq!(
            err,
            Blocked {
                blocker: wall,
                position: p(2, 0)
            }
        );
    }

    #[test]
    fn walls_cannot_be_pushed_directly() {
        let mut grid = Grid::new(3, 1);
        let wall = grid.spawn(ObjectKind::Wall, p(1, 0)).unwrap();
        assert_eq!(
            plan_push(&grid, wall, Direction::Right).unwrap_err(),
            Blocked {
                blocker: wall,
                position: p(1, 0)
            }
        );
        let border = grid.solid_at(p(-1, 0)).unwrap();
        assert!(plan_push(&grid, border, Direction::Left).is_err());
    }

    #[test]
    fn border_wall_blocks() {
        let mut grid = Grid::new(2, 2);
        let b = grid.spawn(plain(Color::RED), p(1, 0)).unwrap();
        assert!(plan_push(&grid, b, Direction::Right).is_err());
        assert!(plan_push(&grid, b, Direction::Up).is_err());
    }

    #[test]
    fn sticky_group_moves_together_and_ignores_itself() {
        let mut grid = Grid::new(5, 3);
        let a = grid.spawn(sticky(Color::RED), p(1, 1)).unwrap();
        let _b = grid.spawn(sticky(Color::RED), p(2, 1)).unwrap();
        let _ = grid.merge_adjacent(a);

        let mut delta = Delta::new();
        let n = record_push(&grid, a, Direction::Right, &mut delta).unwrap();
        assert_eq!(n, 2);
        apply_moves(&mut grid, &mut delta);
        assert!(grid.solid_at(p(1, 1)).is_none());
        assert!(grid.solid_at(p(2, 1)).is_some());
        assert!(grid.solid_at(p(3, 1)).is_some());
    }

    #[test]
    fn side_contact_of_a_group_is_pushed_too() {
        // A vertical sticky pair pushed right shoves a box beside its lower half.
        let mut grid = Grid::new(5, 3);
        let top = grid.spawn(sticky(Color::GREEN), p(1, 0)).unwrap();
        grid.spawn(sticky(Color::GREEN), p(1, 1)).unwrap();
        let _ = grid.merge_adjacent(top);
        let side = grid.spawn(plain(Color::RED), p(2, 1)).unwrap();

        let groups = plan_push(&grid, top, Direction::Right).unwrap();
        assert!(groups.contains(&grid.group_of(side)));
    }

    #[test]
    fn apply_merges_newly_touching_sticky_boxes() {
        let mut grid = Grid::new(5, 1);
        let mover = grid.spawn(sticky(Color::PURPLE), p(0, 0)).unwrap();
        let target = grid.spawn(sticky(Color::PURPLE), p(2, 0)).unwrap();

        let mut delta = Delta::new();
        record_push(&grid, mover, Direction::Right, &mut delta).unwrap();
        apply_moves(&mut grid, &mut delta);

        assert_eq!(grid.group_of(mover), grid.group_of(target));
        assert_eq!(delta.group_merges().len(), 1);
        grid.verify_groups().unwrap();
    }

    #[test]
    fn revert_restores_positions() {
        let mut grid = Grid::new(6, 1);
        let a = grid.spawn(plain(Color::RED), p(0, 0)).unwrap();
        let b = grid.spawn(plain(Color::RED), p(1, 0)).unwrap();
        let before = grid.capture_snapshot();

        let mut delta = Delta::new();
        record_push(&grid, a, Direction::Right, &mut delta).unwrap();
        apply_moves(&mut grid, &mut delta);
        assert_eq!(grid[b].position, p(2, 0));

        let parts = delta.into_parts();
        revert_moves(&mut grid, &parts.moves);
        assert_eq!(grid.capture_snapshot(), before);
        assert_eq!(grid.solid_at(p(0, 0)), Some(a));
        assert!(grid.at(p(2, 0), Layer::Solid).is_none());
    }
}
