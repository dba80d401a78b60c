use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::NodeType;

use super::redirect::Redirects;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: Position) -> Position {
        Position::new(self.x + by.x, self.y + by.y)
    }
}

/// What a placed item hangs off.
///
/// Free nodes and containers are positioned on the canvas; grouped nodes
/// are positioned inside their container and move with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Affiliation {
    Free,
    Grouped { event_id: String },
    Container,
}

impl Affiliation {
    pub fn is_relocatable(&self) -> bool {
        !matches!(self, Affiliation::Grouped { .. })
    }
}

#[derive(Debug, Clone)]
pub struct NodeLayout {
    pub id: String,
    pub node_type: NodeType,
    pub label: String,
    pub logic_id: Option<String>,
    /// Event the node is drawn inside, if any.
    pub event_id: Option<String>,
    /// Container id for grouped nodes; their position is relative to it.
    pub parent: Option<String>,
    /// Grid cell: `(level, column)` for free nodes, `(row, column)` inside a container.
    pub cell: (usize, usize),
    pub branching: bool,
    pub position: Position,
    pub width: f32,
    pub height: f32,
}

impl NodeLayout {
    pub fn affiliation(&self) -> Affiliation {
        match &self.event_id {
            Some(event_id) => Affiliation::Grouped {
                event_id: event_id.clone(),
            },
            None => Affiliation::Free,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupLayout {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub members: Vec<String>,
    pub columns: usize,
    pub rows: usize,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    /// Interior grid: offset of cell 0, step between cells, and cells per row.
    pub slot_origin: Position,
    pub slot_pitch: Position,
    pub slot_columns: usize,
}

impl GroupLayout {
    /// Container-relative offset of the `index`-th interior cell, row-major.
    /// Cells past the member count extend the grid downwards.
    pub fn slot(&self, index: usize) -> Position {
        let columns = self.slot_columns.max(1);
        let (row, column) = (index / columns, index % columns);
        Position::new(
            self.slot_origin.x + column as f32 * self.slot_pitch.x,
            self.slot_origin.y + row as f32 * self.slot_pitch.y,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub edge_id: String,
    /// Visual endpoints after container redirection.
    pub source: String,
    pub target: String,
    /// Stored endpoints, always concrete node ids.
    pub source_node_id: String,
    pub target_node_id: String,
    pub edge_type: String,
    pub logic_id: Option<String>,
}

impl EdgeLayout {
    pub fn is_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Grid summary of one logic chain. `logic_id` is `None` for nodes the
/// classifier did not assign.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLayout {
    pub logic_id: Option<String>,
    pub origin_x: f32,
    pub columns: usize,
    pub levels: usize,
    pub nodes: Vec<String>,
}

/// Candidate layout for one recomputation. Whether these positions reach
/// the canvas is decided by reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub nodes: BTreeMap<String, NodeLayout>,
    pub groups: Vec<GroupLayout>,
    pub edges: Vec<EdgeLayout>,
    pub chains: Vec<ChainLayout>,
    pub redirects: Redirects,
    pub width: f32,
    pub height: f32,
}

impl Layout {
    pub fn group(&self, container_id: &str) -> Option<&GroupLayout> {
        self.groups.iter().find(|group| group.id == container_id)
    }

    /// Every positioned item with its affiliation: containers first, then nodes.
    pub fn placements(&self) -> impl Iterator<Item = (&str, Position, Affiliation)> + '_ {
        let containers = self
            .groups
            .iter()
            .map(|group| (group.id.as_str(), group.position, Affiliation::Container));
        let nodes = self
            .nodes
            .values()
            .map(|node| (node.id.as_str(), node.position, node.affiliation()));
        containers.chain(nodes)
    }
}
