use std::collections::{BTreeMap, HashSet};

use crate::model::{GraphEdge, GraphNode, LogicAssignment};

use super::grouping::EventGroups;
use super::types::EdgeLayout;

pub const CONTAINER_PREFIX: &str = "event_group_";

pub fn container_id(event_id: &str) -> String {
    format!("{CONTAINER_PREFIX}{event_id}")
}

pub fn is_container_id(id: &str) -> bool {
    id.starts_with(CONTAINER_PREFIX)
}

/// Node to representative id mapping and its reverse.
///
/// Grouped nodes map to their container; free nodes map to themselves.
/// A container resolves back to its first member, which is what the store
/// sees whenever something attaches to "the event".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redirects {
    visual: BTreeMap<String, String>,
    concrete: BTreeMap<String, String>,
}

impl Redirects {
    pub fn build(groups: &EventGroups<'_>) -> Self {
        let mut redirects = Redirects::default();
        for group in &groups.groups {
            let container = container_id(group.event_id);
            if let Some(first) = group.members.first() {
                redirects.concrete.insert(container.clone(), first.node_id.clone());
            }
            for member in &group.members {
                redirects.visual.insert(member.node_id.clone(), container.clone());
            }
        }
        redirects
    }

    pub fn visual<'a>(&'a self, node_id: &'a str) -> &'a str {
        self.visual.get(node_id).map(String::as_str).unwrap_or(node_id)
    }

    /// Concrete node id for `id`. Plain node ids pass through; an unknown
    /// container yields `None`.
    pub fn concrete<'a>(&'a self, id: &'a str) -> Option<&'a str> {
        match self.concrete.get(id) {
            Some(node_id) => Some(node_id.as_str()),
            None if is_container_id(id) => None,
            None => Some(id),
        }
    }
}

/// Rewrites every edge through `redirects`. Edges with an endpoint that is
/// not in `nodes` are dropped. An edge keeps the logic of its source node.
pub fn redirect_edges(
    edges: &[GraphEdge],
    nodes: &[GraphNode],
    redirects: &Redirects,
    assignment: &LogicAssignment,
) -> Vec<EdgeLayout> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
    let mut out = Vec::with_capacity(edges.len());
    for edge in edges {
        let (source, target) = (edge.source_node_id.as_str(), edge.target_node_id.as_str());
        if !known.contains(source) || !known.contains(target) {
            tracing::debug!(edge = %edge.edge_id, source, target, "dropping edge with missing endpoint");
            continue;
        }
        out.push(EdgeLayout {
            edge_id: edge.edge_id.clone(),
            source: redirects.visual(source).to_string(),
            target: redirects.visual(target).to_string(),
            source_node_id: edge.source_node_id.clone(),
            target_node_id: edge.target_node_id.clone(),
            edge_type: edge.edge_type.clone(),
            logic_id: assignment.logic_of(source).map(str::to_string),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::grouping::group_by_event;
    use crate::model::{EventMembership, NodeType};

    fn nodes() -> Vec<GraphNode> {
        let mut y = GraphNode::new("Y", NodeType::Secret, "sec_y");
        y.event_id = EventMembership::Cleared;
        vec![
            GraphNode::new("X", NodeType::Evidence, "ev_x").in_event("ev1"),
            y,
            GraphNode::new("Z", NodeType::Location, "loc_z"),
            GraphNode::new("W", NodeType::Character, "ch_w").in_event("ev1"),
        ]
    }

    #[test]
    fn grouped_endpoint_becomes_container() {
        let nodes = nodes();
        let redirects = Redirects::build(&group_by_event(&nodes));
        let edges = vec![GraphEdge::new("e1", "X", "Y"), GraphEdge::new("e2", "Y", "Z")];
        let out = redirect_edges(&edges, &nodes, &redirects, &LogicAssignment::default());
        assert_eq!(out[0].source, "event_group_ev1");
        assert_eq!(out[0].target, "Y");
        assert_eq!(out[0].source_node_id, "X");
        assert_eq!((out[1].source.as_str(), out[1].target.as_str()), ("Y", "Z"));
    }

    #[test]
    fn container_resolves_to_first_member() {
        let nodes = nodes();
        let redirects = Redirects::build(&group_by_event(&nodes));
        assert_eq!(redirects.concrete("event_group_ev1"), Some("X"));
        assert_eq!(redirects.concrete("Z"), Some("Z"));
        assert_eq!(redirects.concrete("event_group_gone"), None);
    }

    #[test]
    fn intra_group_edge_loops_on_container_and_dangling_edges_drop() {
        let nodes = nodes();
        let redirects = Redirects::build(&group_by_event(&nodes));
        let edges = vec![GraphEdge::new("e1", "X", "W"), GraphEdge::new("e2", "Z", "ghost")];
        let mut assignment = LogicAssignment::default();
        assignment.node_to_logic.insert("X".to_string(), "logic_0".to_string());
        let out = redirect_edges(&edges, &nodes, &redirects, &assignment);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_loop());
        assert_eq!(out[0].logic_id.as_deref(), Some("logic_0"));
    }
}
