pub mod grouping;
pub mod groups;
pub mod hierarchy;
pub mod redirect;
pub(crate) mod types;
pub use types::*;

use crate::config::LayoutConfig;
use crate::labels::{EntityResolver, container_title, node_label};
use crate::model::{GraphSnapshot, LogicAssignment};
use std::collections::BTreeMap;

use grouping::group_by_known_event;
use groups::{ContainerGeometry, flow_containers, member_cell, member_offset};
use hierarchy::layout_chains;
use redirect::{Redirects, container_id, redirect_edges};

/// Computes candidate positions for every node and event container.
///
/// Free nodes are laid out per logic chain, left to right. Event containers
/// flow after the last chain. Members are positioned relative to their
/// container. The result is pure: equal inputs give equal layouts.
pub fn compute_layout(
    snapshot: &GraphSnapshot,
    assignment: &LogicAssignment,
    resolver: &dyn EntityResolver,
    config: &LayoutConfig,
) -> Layout {
    let grouped = group_by_known_event(&snapshot.nodes, |event_id| resolver.knows_event(event_id));
    let (placements, cursor) = layout_chains(&grouped.free, &snapshot.edges, assignment, config);

    let mut nodes: BTreeMap<String, NodeLayout> = BTreeMap::new();
    let mut chains = Vec::with_capacity(placements.len());
    for placement in placements {
        for cell in &placement.cells {
            let Some(node) = snapshot.node(&cell.node_id) else {
                continue;
            };
            nodes.insert(
                node.node_id.clone(),
                NodeLayout {
                    id: node.node_id.clone(),
                    node_type: node.node_type,
                    label: node_label(node, resolver),
                    logic_id: assignment.logic_of(&node.node_id).map(str::to_string),
                    event_id: None,
                    parent: None,
                    cell: (cell.level, cell.column),
                    branching: cell.branching,
                    position: cell.position,
                    width: config.node_width,
                    height: config.node_height,
                },
            );
        }
        chains.push(ChainLayout {
            logic_id: placement.logic_id,
            origin_x: placement.origin_x,
            columns: placement.columns,
            levels: placement.levels,
            nodes: placement.cells.into_iter().map(|cell| cell.node_id).collect(),
        });
    }

    let sizes: Vec<ContainerGeometry> = grouped
        .groups
        .iter()
        .map(|group| ContainerGeometry::for_members(group.members.len(), config))
        .collect();
    let origins = flow_containers(&sizes, Position::new(cursor, 0.0), &config.group);

    let mut groups = Vec::with_capacity(grouped.groups.len());
    for ((group, size), origin) in grouped.groups.iter().zip(&sizes).zip(origins) {
        let id = container_id(group.event_id);
        for (index, member) in group.members.iter().enumerate() {
            nodes.insert(
                member.node_id.clone(),
                NodeLayout {
                    id: member.node_id.clone(),
                    node_type: member.node_type,
                    label: node_label(member, resolver),
                    logic_id: assignment.logic_of(&member.node_id).map(str::to_string),
                    event_id: Some(group.event_id.to_string()),
                    parent: Some(id.clone()),
                    cell: member_cell(index, &config.group),
                    branching: false,
                    position: member_offset(index, config),
                    width: config.node_width,
                    height: config.node_height,
                },
            );
        }
        tracing::debug!(container = %id, members = group.members.len(), x = origin.x, y = origin.y, "placed event container");
        groups.push(GroupLayout {
            id,
            event_id: group.event_id.to_string(),
            title: container_title(group.event_id, resolver),
            members: group.members.iter().map(|m| m.node_id.clone()).collect(),
            columns: size.columns,
            rows: size.rows,
            position: origin,
            width: size.width,
            height: size.height,
            slot_origin: member_offset(0, config),
            slot_pitch: Position::new(
                config.node_width + config.group.member_gap,
                config.node_height + config.group.member_gap,
            ),
            slot_columns: config.group.max_columns.max(1),
        });
    }

    let redirects = Redirects::build(&grouped);
    let edges = redirect_edges(&snapshot.edges, &snapshot.nodes, &redirects, assignment);

    let mut width = 0.0f32;
    let mut height = 0.0f32;
    for node in nodes.values().filter(|node| node.parent.is_none()) {
        width = width.max(node.position.x + node.width);
        height = height.max(node.position.y + node.height);
    }
    for group in &groups {
        width = width.max(group.position.x + group.width);
        height = height.max(group.position.y + group.height);
    }

    tracing::debug!(
        nodes = nodes.len(),
        containers = groups.len(),
        edges = edges.len(),
        chains = chains.len(),
        "layout computed"
    );

    Layout {
        nodes,
        groups,
        edges,
        chains,
        redirects,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{EntityDirectory, NoNames};
    use crate::model::{EventMembership, GraphEdge, GraphNode, NodeType};

    fn assignment(pairs: &[(&str, &str)]) -> LogicAssignment {
        LogicAssignment {
            node_to_logic: pairs.iter().map(|(n, l)| (n.to_string(), l.to_string())).collect(),
            logics: Vec::new(),
        }
    }

    #[test]
    fn branching_scenario_places_children_right_of_root() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                GraphNode::new("A", NodeType::Evidence, "ev_a"),
                GraphNode::new("B", NodeType::Secret, "sec_b"),
                GraphNode::new("C", NodeType::Character, "ch_c"),
            ],
            edges: vec![GraphEdge::new("e1", "A", "B"), GraphEdge::new("e2", "A", "C")],
        };
        let assignment = assignment(&[("A", "L1"), ("B", "L1"), ("C", "L1")]);
        let layout = compute_layout(&snapshot, &assignment, &NoNames, &LayoutConfig::default());
        assert_eq!(layout.nodes["A"].cell, (0, 0));
        assert!(layout.nodes["A"].branching);
        assert_eq!(layout.nodes["B"].cell, (1, 1));
        assert_eq!(layout.nodes["C"].cell, (1, 2));
        assert_eq!(layout.nodes["B"].label, "Secret: sec_b");
        assert_eq!(layout.chains.len(), 1);
        assert_eq!(layout.width, 2.0 * 190.0 + 150.0);
    }

    #[test]
    fn containers_follow_the_chains() {
        let mut y = GraphNode::new("Y", NodeType::Secret, "sec_y");
        y.event_id = EventMembership::Cleared;
        let snapshot = GraphSnapshot {
            nodes: vec![GraphNode::new("X", NodeType::Evidence, "ev_x").in_event("ev1"), y],
            edges: vec![GraphEdge::new("e1", "X", "Y")],
        };
        let config = LayoutConfig::default();
        let layout = compute_layout(&snapshot, &LogicAssignment::default(), &NoNames, &config);
        let group = layout.group("event_group_ev1").unwrap();
        assert_eq!(group.position, Position::new(hierarchy::chain_advance(1, &config), 0.0));
        assert_eq!(group.members, vec!["X".to_string()]);
        assert_eq!(layout.nodes["X"].parent.as_deref(), Some("event_group_ev1"));
        assert_eq!(layout.edges[0].source, "event_group_ev1");
        assert_eq!(layout.edges[0].target, "Y");
        assert_eq!(layout.redirects.concrete("event_group_ev1"), Some("X"));
    }

    #[test]
    fn container_slots_match_member_offsets() {
        let nodes: Vec<GraphNode> = (0..4)
            .map(|i| GraphNode::new(format!("m{i}"), NodeType::Character, format!("ch_{i}")).in_event("ev1"))
            .collect();
        let snapshot = GraphSnapshot { nodes, edges: Vec::new() };
        let config = LayoutConfig::default();
        let layout = compute_layout(&snapshot, &LogicAssignment::default(), &NoNames, &config);
        let group = layout.group("event_group_ev1").unwrap();
        for (index, member) in group.members.iter().enumerate() {
            assert_eq!(group.slot(index), layout.nodes[member].position);
        }
        // Past the member count the grid keeps going row-major.
        assert_eq!(group.slot(5), member_offset(5, &config));
    }

    #[test]
    fn vanished_event_leaves_node_free() {
        let mut names = EntityDirectory::default();
        names.events.insert("ev_live".to_string(), "Dinner".to_string());
        let snapshot = GraphSnapshot {
            nodes: vec![
                GraphNode::new("X", NodeType::Evidence, "ev_x").in_event("ev_gone"),
                GraphNode::new("Z", NodeType::Evidence, "ev_z").in_event("ev_live"),
            ],
            edges: Vec::new(),
        };
        let layout = compute_layout(&snapshot, &LogicAssignment::default(), &names, &LayoutConfig::default());
        assert!(layout.nodes["X"].parent.is_none());
        assert_eq!(layout.groups.len(), 1);
        assert_eq!(layout.groups[0].title, "Dinner");
    }

    #[test]
    fn placements_list_containers_and_every_node() {
        let snapshot = GraphSnapshot {
            nodes: vec![
                GraphNode::new("a", NodeType::Evidence, "ev_a").in_event("ev1"),
                GraphNode::new("b", NodeType::Evidence, "ev_b"),
            ],
            edges: Vec::new(),
        };
        let layout = compute_layout(&snapshot, &LogicAssignment::default(), &NoNames, &LayoutConfig::default());
        let items: Vec<(&str, Affiliation)> = layout.placements().map(|(id, _, aff)| (id, aff)).collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], ("event_group_ev1", Affiliation::Container));
        assert!(items.contains(&(
            "a",
            Affiliation::Grouped {
                event_id: "ev1".to_string()
            }
        )));
        assert!(items.contains(&("b", Affiliation::Free)));
    }
}
