use std::collections::HashSet;

use serde::Serialize;

use crate::model::{GraphNode, GraphSnapshot, Logic, LogicAssignment};

/// What one logic says about an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicDetail {
    pub logic_id: String,
    pub logic: Option<Logic>,
    /// Nodes for the entity inside this logic.
    pub nodes: Vec<GraphNode>,
    /// Detail text as stored on the first of `nodes`.
    pub detail: String,
    /// Direct edge neighbours of `nodes`, in either direction.
    pub related: Vec<GraphNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDetails {
    pub reference_id: String,
    pub logics: Vec<LogicDetail>,
}

/// Every logic the entity behind `node_id` takes part in.
///
/// Nodes sharing the clicked node's `reference_id` are grouped by logic in
/// order of first appearance; nodes the classifier did not assign are left
/// out. Returns `None` for an unknown node.
pub fn logic_details_for(
    snapshot: &GraphSnapshot,
    assignment: &LogicAssignment,
    node_id: &str,
) -> Option<EntityDetails> {
    let clicked = snapshot.node(node_id)?;
    let same_reference: Vec<&GraphNode> = snapshot
        .nodes
        .iter()
        .filter(|node| node.reference_id == clicked.reference_id)
        .collect();

    let mut logic_ids: Vec<&str> = Vec::new();
    for node in &same_reference {
        if let Some(logic_id) = assignment.logic_of(&node.node_id)
            && !logic_ids.contains(&logic_id)
        {
            logic_ids.push(logic_id);
        }
    }

    let logics = logic_ids
        .into_iter()
        .map(|logic_id| {
            let nodes: Vec<GraphNode> = same_reference
                .iter()
                .filter(|node| assignment.logic_of(&node.node_id) == Some(logic_id))
                .map(|node| (*node).clone())
                .collect();
            let members: HashSet<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
            let mut neighbours: HashSet<&str> = HashSet::new();
            for edge in &snapshot.edges {
                if members.contains(edge.source_node_id.as_str()) {
                    neighbours.insert(edge.target_node_id.as_str());
                }
                if members.contains(edge.target_node_id.as_str()) {
                    neighbours.insert(edge.source_node_id.as_str());
                }
            }
            let related = snapshot
                .nodes
                .iter()
                .filter(|node| neighbours.contains(node.node_id.as_str()))
                .cloned()
                .collect();
            let detail = nodes
                .first()
                .and_then(|node| node.logic_details.get(logic_id))
                .cloned()
                .unwrap_or_default();
            LogicDetail {
                logic_id: logic_id.to_string(),
                logic: assignment.logic(logic_id).cloned(),
                nodes,
                detail,
                related,
            }
        })
        .collect();

    Some(EntityDetails {
        reference_id: clicked.reference_id.clone(),
        logics,
    })
}

/// Nodes whose `logic_details[logic_id]` must change when the detail text
/// for `node_id`'s entity in `logic_id` is edited.
pub fn detail_targets<'a>(
    snapshot: &'a GraphSnapshot,
    assignment: &LogicAssignment,
    node_id: &str,
    logic_id: &str,
) -> Vec<&'a GraphNode> {
    let Some(clicked) = snapshot.node(node_id) else {
        return Vec::new();
    };
    snapshot
        .nodes
        .iter()
        .filter(|node| node.reference_id == clicked.reference_id)
        .filter(|node| assignment.logic_of(&node.node_id) == Some(logic_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphEdge, NodeType};

    fn fixture() -> (GraphSnapshot, LogicAssignment) {
        let mut knife = GraphNode::new("n1", NodeType::Evidence, "ev_knife");
        knife
            .logic_details
            .insert("logic_0".to_string(), "Found in the study".to_string());
        let snapshot = GraphSnapshot {
            nodes: vec![
                knife,
                GraphNode::new("n2", NodeType::Character, "ch_butler"),
                GraphNode::new("n3", NodeType::Evidence, "ev_knife"),
                GraphNode::new("n4", NodeType::Location, "loc_study"),
                GraphNode::new("n5", NodeType::Evidence, "ev_knife"),
            ],
            edges: vec![GraphEdge::new("e1", "n2", "n1"), GraphEdge::new("e2", "n3", "n4")],
        };
        let assignment = LogicAssignment {
            node_to_logic: [("n1", "logic_0"), ("n2", "logic_0"), ("n3", "logic_1"), ("n4", "logic_1")]
                .into_iter()
                .map(|(n, l)| (n.to_string(), l.to_string()))
                .collect(),
            logics: vec![Logic {
                logic_id: "logic_0".to_string(),
                name: "Motive".to_string(),
                color: None,
            }],
        };
        (snapshot, assignment)
    }

    #[test]
    fn details_are_grouped_by_logic() {
        let (snapshot, assignment) = fixture();
        let details = logic_details_for(&snapshot, &assignment, "n3").unwrap();
        assert_eq!(details.reference_id, "ev_knife");
        let ids: Vec<&str> = details.logics.iter().map(|d| d.logic_id.as_str()).collect();
        assert_eq!(ids, vec!["logic_0", "logic_1"]);

        let motive = &details.logics[0];
        assert_eq!(motive.logic.as_ref().map(|l| l.name.as_str()), Some("Motive"));
        assert_eq!(motive.detail, "Found in the study");
        assert_eq!(motive.related[0].node_id, "n2");

        let second = &details.logics[1];
        assert!(second.logic.is_none());
        assert_eq!(second.detail, "");
        assert_eq!(second.related[0].node_id, "n4");
    }

    #[test]
    fn unknown_node_has_no_details() {
        let (snapshot, assignment) = fixture();
        assert!(logic_details_for(&snapshot, &assignment, "ghost").is_none());
    }

    #[test]
    fn edit_targets_stay_inside_the_logic() {
        let (snapshot, assignment) = fixture();
        let targets: Vec<&str> = detail_targets(&snapshot, &assignment, "n3", "logic_0")
            .iter()
            .map(|n| n.node_id.as_str())
            .collect();
        assert_eq!(targets, vec!["n1"]);
    }
}
