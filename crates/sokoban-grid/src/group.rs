//! Group/union engine: rigid bodies of sticky, same-color objects.
//!
//! Every object points at exactly one [`Group`]. Non-sticky objects are always
//! the sole member of their own group; sticky objects of identical color that
//! touch (cardinally, on the SOLID layer) always share one group.
//!
//! Merging never mutates an existing group into another one. The merged
//! groups are *removed* from the table and handed back inside a
//! [`GroupMerge`], and a brand-new group takes their members. That value is
//! what the undo log stores, and [`Grid::unmerge`] puts the old groups back
//! verbatim.
//!
//! Splitting (when a sticky object is destroyed) is a full rebuild of the
//! affected component: survivors are reset to singletons and re-merged from
//! scratch, because disconnection cannot be detected incrementally.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::object::{Layer, ObjectId};
use crate::GridError;

// ---------------------------------------------------------------------------
// GroupId / Group
// ---------------------------------------------------------------------------

/// Handle to a group in a grid's group table. Issued monotonically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u32);

impl GroupId {
    /// The raw table key.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

/// A rigid body: the set of objects that move together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Member objects (non-owning).
    pub members: BTreeSet<ObjectId>,
    /// Set once this group has been visited by an adjacency scan in the
    /// current step, so later scans in the same step skip it.
    pub checked: bool,
}

impl Group {
    fn singleton(id: ObjectId) -> Self {
        Self {
            members: BTreeSet::from([id]),
            checked: true,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The record of one merge, sufficient to reverse it exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMerge {
    /// The group created by the merge.
    pub merged: GroupId,
    /// The groups consumed by the merge, by value, in discovery order.
    pub parts: Vec<(GroupId, Group)>,
}

// ---------------------------------------------------------------------------
// GroupTable
// ---------------------------------------------------------------------------

/// Storage for all live groups of a grid.
#[derive(Clone, Debug, Default)]
pub struct GroupTable {
    groups: BTreeMap<GroupId, Group>,
    next_id: u32,
}

impl GroupTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create(&mut self, group: Group) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        self.groups.insert(id, group);
        id
    }

    pub(crate) fn create_singleton(&mut self, object: ObjectId) -> GroupId {
        self.create(Group::singleton(object))
    }

    /// Look up a live group.
    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: GroupId) -> Option<Group> {
        self.groups.remove(&id)
    }

    pub(crate) fn restore(&mut self, id: GroupId, group: Group) {
        let previous = self.groups.insert(id, group);
        assert!(
            previous.is_none(),
            "invariant violation: group {id:?} restored while still live"
        );
    }

    /// Number of live groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// `true` if there are no live groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate live groups in id order.
    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().map(|(id, g)| (*id, g))
    }
}

// ---------------------------------------------------------------------------
// Grid group operations
// ---------------------------------------------------------------------------

impl Grid {
    /// The group `object` currently belongs to.
    ///
    /// # Panics
    ///
    /// Panics if `object` is not alive.
    pub fn group_of(&self, object: ObjectId) -> GroupId {
        self[object].group
    }

    /// Look up a live group.
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups().get(id)
    }

    /// Members of a live group; empty if the group is gone.
    pub fn group_members(&self, id: GroupId) -> Vec<ObjectId> {
        self.group(id)
            .map(|g| g.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Mark a group as needing an adjacency scan in this step.
    pub fn uncheck_group(&mut self, id: GroupId) {
        if let Some(group) = self.groups_mut().get_mut(id) {
            group.checked = false;
        }
    }

    /// Whether a group has already been scanned this step.
    pub fn is_group_checked(&self, id: GroupId) -> bool {
        self.group(id).map(|g| g.checked).unwrap_or(true)
    }

    /// Breadth-first search for every group reachable from `start` through
    /// "sticky, same color, cardinally adjacent, on the SOLID layer" edges.
    ///
    /// Returns the groups in discovery order, `start` first. Every returned
    /// group is marked checked.
    pub fn find_adjacent_groups(&mut self, start: GroupId) -> Vec<GroupId> {
        let mut seen: BTreeSet<GroupId> = BTreeSet::from([start]);
        let mut order = vec![start];
        let mut to_check = vec![start];

        while let Some(current) = to_check.pop() {
            for member in self.group_members(current) {
                let obj = &self[member];
                if obj.layer() != Layer::Solid || !obj.capabilities().sticky {
                    continue;
                }
                for neighbour in obj.position.neighbours() {
                    let Some(adj_id) = self.at(neighbour, Layer::Solid) else {
                        continue;
                    };
                    let adj = &self[adj_id];
                    if !seen.contains(&adj.group) && obj.sticks_to(adj) {
                        seen.insert(adj.group);
                        order.push(adj.group);
                        to_check.push(adj.group);
                    }
                }
            }
        }

        for id in &order {
            if let Some(group) = self.groups_mut().get_mut(*id) {
                group.checked = true;
            }
        }
        order
    }

    /// Union `groups` into one new group.
    ///
    /// Returns `None` (and changes nothing) when fewer than two groups are
    /// given. The consumed groups are returned by value inside the
    /// [`GroupMerge`].
    ///
    /// # Panics
    ///
    /// Panics if the union would contain objects of different colors or a
    /// non-sticky object, which would corrupt every later push.
    pub fn merge_groups(&mut self, groups: &[GroupId]) -> Option<GroupMerge> {
        if groups.len() < 2 {
            return None;
        }
        let mut parts = Vec::with_capacity(groups.len());
        let mut members = BTreeSet::new();
        for id in groups {
            if let Some(group) = self.groups_mut().remove(*id) {
                members.extend(group.members.iter().copied());
                parts.push((*id, group));
            }
        }

        let mut colors = members.iter().map(|m| self[*m].color());
        let first = colors.next().flatten();
        assert!(
            first.is_some() && colors.all(|c| c == first),
            "invariant violation: merged group would mix colors or non-sticky members"
        );
        assert!(
            members.iter().all(|m| self[*m].capabilities().sticky),
            "invariant violation: merged group contains a non-sticky object"
        );

        let merged = self.groups_mut().create(Group {
            members: members.clone(),
            checked: true,
        });
        for member in members {
            self.object_mut_internal(member).group = merged;
        }
        tracing::debug!(merged = ?merged, parts = parts.len(), "merged sticky groups");
        Some(GroupMerge { merged, parts })
    }

    /// Reverse a merge: drop the merged group and restore every consumed
    /// group with its original membership.
    pub fn unmerge(&mut self, merge: GroupMerge) {
        let _ = self.groups_mut().remove(merge.merged);
        for (id, group) in merge.parts {
            let members: Vec<ObjectId> = group.members.iter().copied().collect();
            self.groups_mut().restore(id, group);
            for member in members {
                if self.object(member).is_some() {
                    self.object_mut_internal(member).group = id;
                }
            }
        }
    }

    /// Scan from `object`'s group and merge everything adjacent to it.
    pub fn merge_adjacent(&mut self, object: ObjectId) -> Option<GroupMerge> {
        let start = self.group_of(object);
        let found = self.find_adjacent_groups(start);
        self.merge_groups(&found)
    }

    /// Rebuild the groups of `survivors` after one of their former group
    /// mates was removed: reset each to a singleton, then re-merge from
    /// scratch.
    pub(crate) fn rebuild_groups(&mut self, survivors: &[ObjectId]) {
        for &survivor in survivors {
            let old = self.group_of(survivor);
            let _ = self.groups_mut().remove(old);
            let fresh = self.groups_mut().create_singleton(survivor);
            self.object_mut_internal(survivor).group = fresh;
            self.uncheck_group(fresh);
        }
        for &survivor in survivors {
            let group = self.group_of(survivor);
            if !self.is_group_checked(group) {
                let found = self.find_adjacent_groups(group);
                let _ = self.merge_groups(&found);
            }
        }
    }

    /// Verify the group invariants over the whole grid:
    ///
    /// - every object's group exists and lists it as a member;
    /// - every group is single-colored, and multi-member groups are sticky;
    /// - every pair of adjacent, same-color, sticky SOLID objects shares a
    ///   group.
    pub fn verify_groups(&self) -> Result<(), GridError> {
        let violation = |msg: String| Err(GridError::GroupInvariant(msg));

        for obj in self.objects() {
            match self.group(obj.group) {
                Some(group) if group.members.contains(&obj.id) => {}
                _ => return violation(format!("{} is not a member of its group", obj.display_str())),
            }
        }

        for (id, group) in self.groups().iter() {
            if group.len() > 1 {
                let mut colors = group.members.iter().map(|m| self[*m].color());
                let first = colors.next().flatten();
                if first.is_none() || !colors.all(|c| c == first) {
                    return violation(format!("group {id:?} mixes colors"));
                }
                if !group.members.iter().all(|m| self[*m].capabilities().sticky) {
                    return violation(format!("group {id:?} contains a non-sticky object"));
                }
            }
        }

        for obj in self.placed_objects() {
            if obj.layer() != Layer::Solid {
                continue;
            }
            for neighbour in obj.position.neighbours() {
                if let Some(adj) = self.object_at(neighbour, Layer::Solid) {
                    if obj.sticks_to(adj) && obj.group != adj.group {
                        return violation(format!(
                            "{} and {} touch but are in different groups",
                            obj.display_str(),
                            adj.display_str()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
