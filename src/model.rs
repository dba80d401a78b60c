use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Evidence,
    Secret,
    Location,
    Character,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Evidence,
        NodeType::Secret,
        NodeType::Location,
        NodeType::Character,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Evidence => "Evidence",
            NodeType::Secret => "Secret",
            NodeType::Location => "Location",
            NodeType::Character => "Character",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "evidence" => Some(Self::Evidence),
            "secret" => Some(Self::Secret),
            "location" => Some(Self::Location),
            "character" => Some(Self::Character),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event container membership of a node.
///
/// The wire format uses a nullable, optional `event_id` field. An absent
/// field is `Unset`, an explicit `null` is `Cleared`, and a string is `Set`.
/// Only `Set` places the node inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum EventMembership {
    #[default]
    Unset,
    Cleared,
    Set(String),
}

impl EventMembership {
    pub fn event_id(&self) -> Option<&str> {
        match self {
            EventMembership::Set(id) => Some(id.as_str()),
            EventMembership::Unset | EventMembership::Cleared => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, EventMembership::Unset)
    }

    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(id) if !id.trim().is_empty() => EventMembership::Set(id),
            _ => EventMembership::Cleared,
        }
    }
}

impl Serialize for EventMembership {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventMembership::Set(id) => serializer.serialize_some(id),
            EventMembership::Unset | EventMembership::Cleared => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for EventMembership {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached when the field is present; absence goes through `Default`.
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(EventMembership::from_option(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub node_id: String,
    pub node_type: NodeType,
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "EventMembership::is_unset")]
    pub event_id: EventMembership,
    #[serde(default)]
    pub logic_details: BTreeMap<String, String>,
    #[serde(default)]
    pub logic_related_entities: BTreeMap<String, Vec<String>>,
}

impl GraphNode {
    pub fn new(node_id: impl Into<String>, node_type: NodeType, reference_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
            reference_id: reference_id.into(),
            event_id: EventMembership::Unset,
            logic_details: BTreeMap::new(),
            logic_related_entities: BTreeMap::new(),
        }
    }

    pub fn in_event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = EventMembership::Set(event_id.into());
        self
    }

    pub fn event(&self) -> Option<&str> {
        self.event_id.event_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub edge_id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(default = "default_edge_type")]
    pub edge_type: String,
}

fn default_edge_type() -> String {
    "supports".to_string()
}

impl GraphEdge {
    pub fn new(edge_id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            edge_id: edge_id.into(),
            source_node_id: source.into(),
            target_node_id: target.into(),
            edge_type: default_edge_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logic {
    pub logic_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Partial edit of a logic's display fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl LogicUpdate {
    pub fn apply_to(&self, logic: &Logic) -> Logic {
        Logic {
            logic_id: logic.logic_id.clone(),
            name: self.name.clone().unwrap_or_else(|| logic.name.clone()),
            color: self.color.clone().or_else(|| logic.color.clone()),
        }
    }
}

/// Output of one classifier run. Always replaces the previous one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicAssignment {
    #[serde(default)]
    pub node_to_logic: BTreeMap<String, String>,
    #[serde(default)]
    pub logics: Vec<Logic>,
}

impl LogicAssignment {
    pub fn logic_of(&self, node_id: &str) -> Option<&str> {
        self.node_to_logic.get(node_id).map(String::as_str)
    }

    pub fn logic(&self, logic_id: &str) -> Option<&Logic> {
        self.logics.iter().find(|logic| logic.logic_id == logic_id)
    }

    pub fn logic_name<'a>(&'a self, logic_id: &'a str) -> &'a str {
        self.logic(logic_id)
            .map(|logic| logic.name.as_str())
            .unwrap_or(logic_id)
    }
}

/// Nodes and edges as last reported by the graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.node_id == node_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }
}
