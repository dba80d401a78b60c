//! Merging freshly computed layouts into the canvas state.
//!
//! Every placed item (free node, grouped node, event container) is
//! classified against the previous state:
//!
//! * absent before: **new**, takes the computed position;
//! * present with the same affiliation: **unchanged**, keeps its canvas
//!   position so manual drags survive. Grouped nodes cannot be dragged;
//!   an explicit arrange repacks them into their container's grid;
//! * present with a different affiliation: **membership changed**, takes
//!   the computed position, but only when merging in [`MergeMode::Reconcile`];
//! * absent now: **removed**, dropped from the state.
//!
//! [`MergeMode::Append`] is the incremental merge used outside explicit
//! arrange actions: only new items receive computed positions, and a new
//! member whose cell is still held by a kept sibling takes the first free
//! cell instead.
//!
//! An item's position is read in the frame of its *stored* affiliation:
//! canvas coordinates for free nodes and containers, container-relative
//! for grouped nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::{Affiliation, Layout, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedItem {
    /// Canvas position for free nodes and containers, container-relative
    /// for grouped nodes.
    pub position: Position,
    pub affiliation: Affiliation,
}

/// Canvas positions carried from one cycle to the next.
///
/// Created on first load, replaced by every applied cycle and dropped with
/// the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutState {
    pub items: BTreeMap<String, PlacedItem>,
    /// Graph nodes (containers excluded) when the state was produced.
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("nothing placed under id {0}")]
    Unknown(String),
    #[error("{0} is positioned by its event container")]
    Pinned(String),
}

impl LayoutState {
    pub fn position(&self, id: &str) -> Option<Position> {
        self.items.get(id).map(|item| item.position)
    }

    pub fn item(&self, id: &str) -> Option<&PlacedItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records a manual drag. Grouped nodes move only with their container.
    pub fn move_item(&mut self, id: &str, position: Position) -> Result<(), MoveError> {
        let Some(item) = self.items.get_mut(id) else {
            return Err(MoveError::Unknown(id.to_string()));
        };
        if !item.affiliation.is_relocatable() {
            return Err(MoveError::Pinned(id.to_string()));
        }
        item.position = position;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Full reconciliation, used by explicit arrange actions.
    Reconcile,
    /// Incremental merge: only new items are placed.
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFate {
    New,
    Unchanged,
    MembershipChanged,
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub fates: BTreeMap<String, ItemFate>,
    /// Membership changes left in place because the merge was incremental.
    pub deferred: Vec<String>,
}

impl MergeReport {
    pub fn ids(&self, fate: ItemFate) -> Vec<&str> {
        self.fates
            .iter()
            .filter(|(_, f)| **f == fate)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn count(&self, fate: ItemFate) -> usize {
        self.fates.values().filter(|f| **f == fate).count()
    }

    pub fn fate(&self, id: &str) -> Option<ItemFate> {
        self.fates.get(id).copied()
    }
}

/// Merges `layout` into `previous` and returns the next state.
///
/// Without a previous state every item is new. In append mode an existing
/// item keeps its old affiliation record as well as its position, so the
/// next explicit arrange still sees the membership change.
pub fn reconcile(previous: Option<&LayoutState>, layout: &Layout, mode: MergeMode) -> (LayoutState, MergeReport) {
    let empty = LayoutState::default();
    let previous = previous.unwrap_or(&empty);
    let mut report = MergeReport::default();
    let mut items = BTreeMap::new();

    for (id, computed, affiliation) in layout.placements() {
        let fresh = PlacedItem {
            position: computed,
            affiliation,
        };
        let (fate, item) = match previous.items.get(id) {
            None => (ItemFate::New, fresh),
            Some(old) if old.affiliation == fresh.affiliation => match (mode, &fresh.affiliation) {
                (MergeMode::Reconcile, Affiliation::Grouped { .. }) => (ItemFate::Unchanged, fresh),
                _ => (ItemFate::Unchanged, old.clone()),
            },
            Some(old) => match mode {
                MergeMode::Reconcile => (ItemFate::MembershipChanged, fresh),
                MergeMode::Append => {
                    report.deferred.push(id.to_string());
                    (ItemFate::MembershipChanged, old.clone())
                }
            },
        };
        report.fates.insert(id.to_string(), fate);
        items.insert(id.to_string(), item);
    }

    for id in previous.items.keys() {
        if !items.contains_key(id) {
            report.fates.insert(id.clone(), ItemFate::Removed);
        }
    }
    if mode == MergeMode::Append {
        settle_new_members(&mut items, &report, layout);
    }

    tracing::debug!(
        ?mode,
        new = report.count(ItemFate::New),
        unchanged = report.count(ItemFate::Unchanged),
        changed = report.count(ItemFate::MembershipChanged),
        deferred = report.deferred.len(),
        removed = report.count(ItemFate::Removed),
        "merged layout"
    );

    let state = LayoutState {
        items,
        node_count: layout.nodes.len(),
        generation: previous.generation + 1,
    };
    (state, report)
}

/// Moves new members off cells still held by members kept from the
/// previous state, including members whose move elsewhere was deferred.
fn settle_new_members(items: &mut BTreeMap<String, PlacedItem>, report: &MergeReport, layout: &Layout) {
    let is_new = |id: &str| report.fate(id) == Some(ItemFate::New);
    for group in &layout.groups {
        let affiliation = Affiliation::Grouped {
            event_id: group.event_id.clone(),
        };
        let mut occupied: Vec<Position> = items
            .iter()
            .filter(|(id, item)| item.affiliation == affiliation && !is_new(id.as_str()))
            .map(|(_, item)| item.position)
            .collect();
        for member in group.members.iter().filter(|id| is_new(id.as_str())) {
            let Some(item) = items.get_mut(member) else {
                continue;
            };
            if occupied.contains(&item.position) {
                // One of the first `occupied.len() + 1` cells is always free.
                if let Some(cell) = (0..=occupied.len())
                    .map(|index| group.slot(index))
                    .find(|cell| !occupied.contains(cell))
                {
                    tracing::debug!(node = %member, container = %group.id, x = cell.x, y = cell.y, "member moved to a free cell");
                    item.position = cell;
                }
            }
            occupied.push(item.position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::labels::NoNames;
    use crate::layout::compute_layout;
    use crate::model::{GraphEdge, GraphNode, GraphSnapshot, LogicAssignment, NodeType};

    fn layout_of(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Layout {
        let snapshot = GraphSnapshot { nodes, edges };
        compute_layout(&snapshot, &LogicAssignment::default(), &NoNames, &LayoutConfig::default())
    }

    fn free(id: &str) -> GraphNode {
        GraphNode::new(id, NodeType::Evidence, format!("ref_{id}"))
    }

    #[test]
    fn first_merge_adopts_everything() {
        let layout = layout_of(vec![free("A"), free("B").in_event("ev1")], Vec::new());
        let (state, report) = reconcile(None, &layout, MergeMode::Reconcile);
        assert_eq!(state.len(), 3);
        assert_eq!(report.count(ItemFate::New), 3);
        assert_eq!(state.node_count, 2);
        assert_eq!(state.generation, 1);
        assert_eq!(state.position("A"), Some(layout.nodes["A"].position));
    }

    #[test]
    fn dragged_free_node_stays_put_on_incremental_merge() {
        let layout = layout_of(vec![free("A")], Vec::new());
        let (mut state, _) = reconcile(None, &layout, MergeMode::Reconcile);
        state.move_item("A", Position::new(40.0, 40.0)).unwrap();

        let refreshed = layout_of(vec![free("A")], Vec::new());
        let (state, report) = reconcile(Some(&state), &refreshed, MergeMode::Append);
        assert_eq!(state.position("A"), Some(Position::new(40.0, 40.0)));
        assert_eq!(report.fate("A"), Some(ItemFate::Unchanged));
    }

    #[test]
    fn unchanged_nodes_keep_positions_even_on_arrange() {
        let layout = layout_of(vec![free("A"), free("B")], Vec::new());
        let (mut state, _) = reconcile(None, &layout, MergeMode::Reconcile);
        state.move_item("B", Position::new(-5.0, 900.0)).unwrap();
        let (state, _) = reconcile(Some(&state), &layout, MergeMode::Reconcile);
        assert_eq!(state.position("B"), Some(Position::new(-5.0, 900.0)));
    }

    #[test]
    fn append_places_exactly_the_new_nodes() {
        let before = layout_of(vec![free("A"), free("B")], vec![GraphEdge::new("e1", "A", "B")]);
        let (mut state, _) = reconcile(None, &before, MergeMode::Reconcile);
        state.move_item("A", Position::new(7.0, 7.0)).unwrap();
        let old = state.clone();

        let after = layout_of(
            vec![free("A"), free("B"), free("C"), free("D")],
            vec![GraphEdge::new("e1", "A", "B"), GraphEdge::new("e2", "A", "C")],
        );
        let (state, report) = reconcile(Some(&old), &after, MergeMode::Append);
        for (id, item) in &old.items {
            assert_eq!(state.item(id), Some(item));
        }
        assert_eq!(report.ids(ItemFate::New), vec!["C", "D"]);
        assert_eq!(state.position("C"), Some(after.nodes["C"].position));
    }

    #[test]
    fn membership_change_relocates_only_on_arrange() {
        let before = layout_of(vec![free("A"), free("B")], Vec::new());
        let (mut state, _) = reconcile(None, &before, MergeMode::Reconcile);
        state.move_item("A", Position::new(40.0, 40.0)).unwrap();

        let after = layout_of(vec![free("A").in_event("ev1"), free("B")], Vec::new());
        let (appended, report) = reconcile(Some(&state), &after, MergeMode::Append);
        assert_eq!(appended.position("A"), Some(Position::new(40.0, 40.0)));
        assert_eq!(appended.item("A").unwrap().affiliation, Affiliation::Free);
        assert_eq!(report.deferred, vec!["A".to_string()]);
        assert_eq!(report.fate("event_group_ev1"), Some(ItemFate::New));

        let (arranged, report) = reconcile(Some(&appended), &after, MergeMode::Reconcile);
        assert_eq!(report.fate("A"), Some(ItemFate::MembershipChanged));
        assert_eq!(arranged.position("A"), Some(after.nodes["A"].position));
        assert_eq!(
            arranged.item("A").unwrap().affiliation,
            Affiliation::Grouped {
                event_id: "ev1".to_string()
            }
        );
    }

    #[test]
    fn moving_between_groups_counts_as_a_membership_change() {
        let before = layout_of(vec![free("A").in_event("ev1"), free("B").in_event("ev2")], Vec::new());
        let (state, _) = reconcile(None, &before, MergeMode::Reconcile);
        let after = layout_of(vec![free("A").in_event("ev2"), free("B").in_event("ev2")], Vec::new());
        let (_, report) = reconcile(Some(&state), &after, MergeMode::Reconcile);
        assert_eq!(report.fate("A"), Some(ItemFate::MembershipChanged));
        assert_eq!(report.fate("B"), Some(ItemFate::Unchanged));
        assert_eq!(report.fate("event_group_ev1"), Some(ItemFate::Removed));
    }

    #[test]
    fn removed_nodes_leave_the_state() {
        let before = layout_of(vec![free("A"), free("B")], Vec::new());
        let (state, _) = reconcile(None, &before, MergeMode::Reconcile);
        let after = layout_of(vec![free("B")], Vec::new());
        let (state, report) = reconcile(Some(&state), &after, MergeMode::Append);
        assert!(state.item("A").is_none());
        assert_eq!(report.ids(ItemFate::Removed), vec!["A"]);
        assert_eq!(state.node_count, 1);
    }

    #[test]
    fn grouped_nodes_cannot_be_dragged_alone() {
        let layout = layout_of(vec![free("A").in_event("ev1")], Vec::new());
        let (mut state, _) = reconcile(None, &layout, MergeMode::Reconcile);
        assert_eq!(
            state.move_item("A", Position::new(1.0, 1.0)),
            Err(MoveError::Pinned("A".to_string()))
        );
        assert!(state.move_item("event_group_ev1", Position::new(1.0, 1.0)).is_ok());
        assert_eq!(
            state.move_item("ghost", Position::default()),
            Err(MoveError::Unknown("ghost".to_string()))
        );
    }

    #[test]
    fn new_member_skips_a_cell_held_by_a_kept_sibling() {
        let before = layout_of(vec![free("X").in_event("ev1"), free("Y").in_event("ev1")], Vec::new());
        let (state, _) = reconcile(None, &before, MergeMode::Reconcile);
        let kept = state.position("Y").unwrap();

        // X is deleted and Z joins: Z is computed into Y's old cell.
        let after = layout_of(vec![free("Y").in_event("ev1"), free("Z").in_event("ev1")], Vec::new());
        let group = after.group("event_group_ev1").unwrap();
        assert_eq!(after.nodes["Z"].position, kept);

        let (appended, report) = reconcile(Some(&state), &after, MergeMode::Append);
        assert_eq!(report.fate("Z"), Some(ItemFate::New));
        assert_eq!(appended.position("Y"), Some(kept));
        assert_eq!(appended.position("Z"), Some(group.slot(0)));
    }

    #[test]
    fn deferred_leaver_still_holds_its_cell() {
        let before = layout_of(vec![free("X").in_event("ev1"), free("Y").in_event("ev1")], Vec::new());
        let (state, _) = reconcile(None, &before, MergeMode::Reconcile);

        let after = layout_of(
            vec![free("X"), free("Y").in_event("ev1"), free("Z").in_event("ev1")],
            Vec::new(),
        );
        let (appended, report) = reconcile(Some(&state), &after, MergeMode::Append);
        assert_eq!(report.deferred, vec!["X".to_string()]);
        let group = after.group("event_group_ev1").unwrap();
        let cells = [appended.position("X"), appended.position("Y"), appended.position("Z")];
        assert_eq!(cells, [Some(group.slot(0)), Some(group.slot(1)), Some(group.slot(2))]);
    }

    #[test]
    fn arrange_repacks_members_into_the_grid() {
        let before = layout_of(vec![free("X").in_event("ev1"), free("Y").in_event("ev1")], Vec::new());
        let (state, _) = reconcile(None, &before, MergeMode::Reconcile);
        let after = layout_of(vec![free("Y").in_event("ev1"), free("Z").in_event("ev1")], Vec::new());
        let (appended, _) = reconcile(Some(&state), &after, MergeMode::Append);

        let (arranged, report) = reconcile(Some(&appended), &after, MergeMode::Reconcile);
        assert_eq!(report.fate("Y"), Some(ItemFate::Unchanged));
        assert_eq!(arranged.position("Y"), Some(after.nodes["Y"].position));
        assert_eq!(arranged.position("Z"), Some(after.nodes["Z"].position));
        assert_ne!(arranged.position("Y"), arranged.position("Z"));
    }

    #[test]
    fn state_round_trips_through_json() {
        let layout = layout_of(vec![free("A"), free("B").in_event("ev1")], Vec::new());
        let (state, _) = reconcile(None, &layout, MergeMode::Reconcile);
        let json = serde_json::to_string(&state).unwrap();
        let back: LayoutState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
