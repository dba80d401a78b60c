//! REST clients for the graph backend.
//!
//! Routes: `/graph/nodes`, `/graph/edges`, `/graph/compute-logics`,
//! `/graph/logics/{id}` and the entity listings used for labels, all
//! relative to a base URL such as `http://localhost:8000/api`.

use super::{GraphStore, StoreError, StoreResult};
use crate::classify::{ClassifyError, LogicClassifier};
use crate::labels::EntityDirectory;
use crate::model::{GraphEdge, GraphNode, GraphSnapshot, Logic, LogicAssignment, LogicUpdate, NodeType};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpGraphStore {
    client: Client,
    base_url: String,
}

impl HttpGraphStore {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        decode(check(response, "record", path)?)
    }

    /// Loads every name table used for labels. Listings that fail are logged
    /// and left empty so labels fall back to ids.
    pub fn fetch_names(&self) -> EntityDirectory {
        let mut names = EntityDirectory::default();
        let listings = [
            ("characters", Some(NodeType::Character)),
            ("locations", Some(NodeType::Location)),
            ("evidence", Some(NodeType::Evidence)),
            ("secrets", Some(NodeType::Secret)),
            ("events", None),
        ];
        for (path, node_type) in listings {
            let records: Vec<NamedRecord> = match self.get_json(path) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!(listing = path, error = %err, "name listing unavailable");
                    continue;
                }
            };
            let table = match node_type {
                Some(node_type) => names.table_mut(node_type),
                None => &mut names.events,
            };
            for record in records {
                if let Some(name) = record.display_name() {
                    table.insert(record.id, name);
                }
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
struct NamedRecord {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl NamedRecord {
    fn display_name(&self) -> Option<String> {
        [&self.name, &self.title, &self.description]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .cloned()
    }
}

fn check(response: Response, kind: &'static str, id: &str) -> StoreResult<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(StoreError::Transport(format!("{status} for {kind} {id}")));
    }
    Ok(response)
}

fn decode<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
    response
        .json::<T>()
        .map_err(|err| StoreError::Decode(err.to_string()))
}

impl GraphStore for HttpGraphStore {
    fn fetch_nodes(&self) -> StoreResult<Vec<GraphNode>> {
        self.get_json("graph/nodes")
    }

    fn fetch_edges(&self) -> StoreResult<Vec<GraphEdge>> {
        self.get_json("graph/edges")
    }

    fn create_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        let response = self
            .client
            .post(self.url("graph/nodes"))
            .json(node)
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        decode(check(response, "node", &node.node_id)?)
    }

    fn update_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
        let response = self
            .client
            .put(self.url(&format!("graph/nodes/{}", node.node_id)))
            .json(node)
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        decode(check(response, "node", &node.node_id)?)
    }

    fn delete_node(&mut self, node_id: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("graph/nodes/{node_id}")))
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        check(response, "node", node_id).map(|_| ())
    }

    fn create_edge(&mut self, edge: &GraphEdge) -> StoreResult<GraphEdge> {
        let response = self
            .client
            .post(self.url("graph/edges"))
            .json(edge)
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        decode(check(response, "edge", &edge.edge_id)?)
    }

    fn delete_edge(&mut self, edge_id: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("graph/edges/{edge_id}")))
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        check(response, "edge", edge_id).map(|_| ())
    }
}

/// Classifier backed by the backend's `compute-logics` endpoint. The graph
/// it classifies is the backend's own, so the snapshot argument is unused.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    store: HttpGraphStore,
}

impl HttpClassifier {
    pub fn new(base_url: &str) -> Result<Self, ClassifyError> {
        let store = HttpGraphStore::new(base_url).map_err(|err| ClassifyError::Transport(err.to_string()))?;
        Ok(Self { store })
    }
}

fn classify_error(err: StoreError) -> ClassifyError {
    match err {
        StoreError::NotFound { id, .. } => ClassifyError::UnknownLogic(id),
        StoreError::Decode(message) => ClassifyError::Decode(message),
        other => ClassifyError::Transport(other.to_string()),
    }
}

impl LogicClassifier for HttpClassifier {
    fn compute_logics(&mut self, _snapshot: &GraphSnapshot) -> Result<LogicAssignment, ClassifyError> {
        let response = self
            .store
            .client
            .post(self.store.url("graph/compute-logics"))
            .send()
            .map_err(|err| ClassifyError::Transport(err.to_string()))?;
        let response = check(response, "logic", "compute-logics").map_err(classify_error)?;
        decode(response).map_err(classify_error)
    }

    fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, ClassifyError> {
        // The route replaces the whole record, so merge onto the current one.
        let current: Logic = self
            .store
            .get_json(&format!("graph/logics/{logic_id}"))
            .map_err(classify_error)?;
        let merged = update.apply_to(&current);
        let response = self
            .store
            .client
            .put(self.store.url(&format!("graph/logics/{logic_id}")))
            .json(&merged)
            .send()
            .map_err(|err| ClassifyError::Transport(err.to_string()))?;
        let response = check(response, "logic", logic_id).map_err(classify_error)?;
        decode(response).map_err(classify_error)
    }
}
