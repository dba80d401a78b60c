use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::LayoutConfig;
use crate::model::{GraphEdge, GraphNode, LogicAssignment};

use super::types::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainCell {
    pub node_id: String,
    pub level: usize,
    pub column: usize,
    pub branching: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainPlacement {
    pub logic_id: Option<String>,
    pub origin_x: f32,
    pub columns: usize,
    pub levels: usize,
    pub cells: Vec<ChainCell>,
}

/// Breadth-first levels over the edges restricted to `node_ids`.
///
/// Every node of in-degree zero seeds level 0. A node takes the level of
/// the predecessor that reaches it first plus one and is never re-levelled,
/// so back edges are harmless. Nodes never reached stay at level 0.
pub(crate) fn compute_levels(node_ids: &[&str], edges: &[(&str, &str)]) -> HashMap<String, usize> {
    let set: HashSet<&str> = node_ids.iter().copied().collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = node_ids.iter().map(|id| (*id, 0)).collect();

    for (from, to) in edges {
        if set.contains(from) && set.contains(to) {
            adj.entry(from).or_default().push(to);
            if let Some(deg) = indeg.get_mut(to) {
                *deg += 1;
            }
        }
    }

    let mut levels: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for id in node_ids {
        if indeg.get(id).copied().unwrap_or(0) == 0 && !levels.contains_key(*id) {
            levels.insert(id.to_string(), 0);
            queue.push_back(id);
        }
    }

    while let Some(current) = queue.pop_front() {
        let level = levels.get(current).copied().unwrap_or(0);
        let Some(nexts) = adj.get(current) else {
            continue;
        };
        for next in nexts {
            if levels.contains_key(*next) {
                continue;
            }
            levels.insert(next.to_string(), level + 1);
            queue.push_back(next);
        }
    }

    for id in node_ids {
        levels.entry(id.to_string()).or_insert(0);
    }
    levels
}

/// Lays out one chain on a grid whose left edge is `origin_x`.
///
/// Within a level, nodes with more than one outgoing edge take the leftmost
/// columns; the rest follow in source order.
pub fn layout_chain(
    logic_id: Option<String>,
    node_ids: &[&str],
    edges: &[(&str, &str)],
    origin_x: f32,
    config: &LayoutConfig,
) -> ChainPlacement {
    let set: HashSet<&str> = node_ids.iter().copied().collect();
    let levels = compute_levels(node_ids, edges);

    let mut outdeg: HashMap<&str, usize> = HashMap::new();
    for (from, to) in edges {
        if set.contains(from) && set.contains(to) {
            *outdeg.entry(from).or_insert(0) += 1;
        }
    }

    let level_count = levels.values().copied().max().map_or(0, |max| max + 1);
    let mut buckets: Vec<Vec<&str>> = vec![Vec::new(); level_count];
    for id in node_ids {
        if let Some(level) = levels.get(*id) {
            buckets[*level].push(id);
        }
    }

    let mut cells = Vec::with_capacity(node_ids.len());
    let mut columns = 0usize;
    for (level, bucket) in buckets.iter().enumerate() {
        let is_branching = |id: &&str| outdeg.get(id).copied().unwrap_or(0) > 1;
        let branching: Vec<&str> = bucket.iter().copied().filter(is_branching).collect();
        let rest: Vec<&str> = bucket.iter().copied().filter(|id| !is_branching(id)).collect();
        let ordered = branching
            .iter()
            .map(|id| (*id, true))
            .chain(rest.iter().map(|id| (*id, false)));
        for (column, (id, branching)) in ordered.enumerate() {
            cells.push(ChainCell {
                node_id: id.to_string(),
                level,
                column,
                branching,
                position: Position::new(
                    origin_x + column as f32 * config.column_pitch(),
                    level as f32 * config.row_pitch(),
                ),
            });
        }
        columns = columns.max(bucket.len());
    }

    ChainPlacement {
        logic_id,
        origin_x,
        columns,
        levels: level_count,
        cells,
    }
}

/// Horizontal space a chain with `columns` columns takes, trailing gap included.
pub fn chain_advance(columns: usize, config: &LayoutConfig) -> f32 {
    columns.max(1) as f32 * config.column_pitch() + config.gap
}

/// Lays out every logic chain left to right and returns the placements with
/// the cursor just past the last chain.
///
/// Chains are ordered by the first appearance of one of their nodes in
/// `nodes`. Nodes without a logic form one trailing chain.
pub fn layout_chains(
    nodes: &[&GraphNode],
    edges: &[GraphEdge],
    assignment: &LogicAssignment,
    config: &LayoutConfig,
) -> (Vec<ChainPlacement>, f32) {
    let mut chain_order: Vec<Option<&str>> = Vec::new();
    let mut members: HashMap<Option<&str>, Vec<&str>> = HashMap::new();
    for node in nodes {
        let logic = assignment.logic_of(&node.node_id);
        if !members.contains_key(&logic) {
            chain_order.push(logic);
        }
        members.entry(logic).or_default().push(node.node_id.as_str());
    }
    // The unassigned chain always goes last.
    if let Some(idx) = chain_order.iter().position(Option::is_none) {
        let unassigned = chain_order.remove(idx);
        chain_order.push(unassigned);
    }

    let edge_pairs: Vec<(&str, &str)> = edges
        .iter()
        .map(|edge| (edge.source_node_id.as_str(), edge.target_node_id.as_str()))
        .collect();

    let mut cursor = 0.0f32;
    let mut placements = Vec::with_capacity(chain_order.len());
    for logic in chain_order {
        let Some(node_ids) = members.get(&logic) else {
            continue;
        };
        let placement = layout_chain(logic.map(str::to_string), node_ids, &edge_pairs, cursor, config);
        tracing::debug!(
            logic = logic.unwrap_or("<unassigned>"),
            nodes = node_ids.len(),
            columns = placement.columns,
            levels = placement.levels,
            origin_x = cursor,
            "laid out chain"
        );
        cursor += chain_advance(placement.columns, config);
        placements.push(placement);
    }
    (placements, cursor)
}
