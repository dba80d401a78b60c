//! Graph store clients.
//!
//! The store owns nodes and edges; the engine only reads them back and
//! issues whole-record mutations. A mutation either applies fully or fails.

#[cfg(feature = "http")]
pub mod http;

use crate::labels::EntityDirectory;
use crate::model::{GraphEdge, GraphNode, GraphSnapshot, Logic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("graph file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait GraphStore {
    fn fetch_nodes(&self) -> StoreResult<Vec<GraphNode>>;
    fn fetch_edges(&self) -> StoreResult<Vec<GraphEdge>>;
    fn create_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode>;
    fn update_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode>;
    fn delete_node(&mut self, node_id: &str) -> StoreResult<()>;
    fn create_edge(&mut self, edge: &GraphEdge) -> StoreResult<GraphEdge>;
    fn delete_edge(&mut self, edge_id: &str) -> StoreResult<()>;

    fn fetch_snapshot(&self) -> StoreResult<GraphSnapshot> {
        Ok(GraphSnapshot {
            nodes: self.fetch_nodes()?,
            edges: self.fetch_edges()?,
        })
    }
}

/// On-disk document: the graph plus optional logic records and entity names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logics: Vec<Logic>,
    #[serde(default, skip_serializing_if = "EntityDirectory::is_empty")]
    pub names: EntityDirectory,
}

impl GraphDocument {
    pub fn from_json(input: &str) -> Result<Self, StoreError> {
        serde_json::from_str(input).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

/// Insertion-ordered in-memory store.
///
/// Creating an existing id replaces the record in place. Deleting a node
/// leaves its edges behind; readers must tolerate the dangling ends.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        let mut store = Self::new();
        for node in nodes {
            upsert_node(&mut store.nodes, node);
        }
        for edge in edges {
            upsert_edge(&mut store.edges, edge);
        }
        store
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }
}

fn upsert_node(nodes: &mut Vec<GraphNode>, node: GraphNode) {
    match nodes.iter_mut().find(|existing| existing.node_id == node.node_id) {
        Some(existing) => *existing = node,
        None => nodes.push(node),
    }
}

fn upsert_edge(edges: &mut Vec<GraphEdge>, edge: GraphEdge) {
    match edges.iter_mut().find(|existing| existing.edge_id == edge.edge_id) {
        Some(existing) => *existing = edge,
        None => edges.push(edge),
    }
}

impl GraphStore for MemoryStore {
    fn fetch_nodes(&self) -> StoreResult<Vec<GraphNode>> {
        Ok(self.nodes.clone())
    }

    fn fetch_edges(&self) -> StoreResult<Vec<GraphEdge>> {
        Ok(self.edges.clone())
    }

    fn create_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        upsert_node(&mut self.nodes, node.clone());
        Ok(node.clone())
    }

    fn update_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        let Some(existing) = self.nodes.iter_mut().find(|n| n.node_id == node.node_id) else {
            return Err(StoreError::NotFound {
                kind: "node",
                id: node.node_id.clone(),
            });
        };
        *existing = node.clone();
        Ok(node.clone())
    }

    fn delete_node(&mut self, node_id: &str) -> StoreResult<()> {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.node_id != node_id);
        if self.nodes.len() == before {
            return Err(StoreError::NotFound {
                kind: "node",
                id: node_id.to_string(),
            });
        }
        Ok(())
    }

    fn create_edge(&mut self, edge: &GraphEdge) -> StoreResult<GraphEdge> {
        upsert_edge(&mut self.edges, edge.clone());
        Ok(edge.clone())
    }

    fn delete_edge(&mut self, edge_id: &str) -> StoreResult<()> {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.edge_id != edge_id);
        if self.edges.len() == before {
            return Err(StoreError::NotFound {
                kind: "edge",
                id: edge_id.to_string(),
            });
        }
        Ok(())
    }
}

/// A [`MemoryStore`] persisted to a JSON [`GraphDocument`] after every
/// successful mutation. Logic records and names in the file are preserved.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    logics: Vec<Logic>,
    names: EntityDirectory,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            GraphDocument::from_json(&contents)?
        } else {
            GraphDocument::default()
        };
        tracing::debug!(
            path = %path.display(),
            nodes = document.nodes.len(),
            edges = document.edges.len(),
            "opened graph file"
        );
        Ok(Self {
            path,
            memory: MemoryStore::with_graph(document.nodes, document.edges),
            logics: document.logics,
            names: document.names,
        })
    }

    pub fn logics(&self) -> &[Logic] {
        &self.logics
    }

    pub fn names(&self) -> &EntityDirectory {
        &self.names
    }

    fn persist(&self) -> StoreResult<()> {
        let document = GraphDocument {
            nodes: self.memory.nodes().to_vec(),
            edges: self.memory.edges().to_vec(),
            logics: self.logics.clone(),
            names: self.names.clone(),
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|err| StoreError::Decode(err.to_string()))?;
        std::fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl GraphStore for JsonFileStore {
    fn fetch_nodes(&self) -> StoreResult<Vec<GraphNode>> {
        self.memory.fetch_nodes()
    }

    fn fetch_edges(&self) -> StoreResult<Vec<GraphEdge>> {
        self.memory.fetch_edges()
    }

    fn create_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        let created = self.memory.create_node(node)?;
        self.persist()?;
        Ok(created)
    }

    fn update_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        let updated = self.memory.update_node(node)?;
        self.persist()?;
        Ok(updated)
    }

    fn delete_node(&mut self, node_id: &str) -> StoreResult<()> {
        self.memory.delete_node(node_id)?;
        self.persist()
    }

    fn create_edge(&mut self, edge: &GraphEdge) -> StoreResult<GraphEdge> {
        let created = self.memory.create_edge(edge)?;
        self.persist()?;
        Ok(created)
    }

    fn delete_edge(&mut self, edge_id: &str) -> StoreResult<()> {
        self.memory.delete_edge(edge_id)?;
        self.persist()
    }
}
