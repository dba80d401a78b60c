//! Display labels for nodes and event containers.
//!
//! Entity names live in record stores the engine does not own. They reach
//! the engine through [`EntityResolver`]; every lookup may miss, in which
//! case the raw id is shown instead.

use crate::model::{GraphNode, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub trait EntityResolver {
    /// Display name of the entity behind a node, if known.
    fn entity_name(&self, node_type: NodeType, reference_id: &str) -> Option<String>;

    /// Title of an event, used as the header of its container.
    fn event_title(&self, event_id: &str) -> Option<String>;

    /// Whether the event still exists. Nodes pointing at a deleted event are
    /// laid out as free nodes.
    fn knows_event(&self, _event_id: &str) -> bool {
        true
    }
}

/// Resolver that knows nothing; every label falls back to ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

impl EntityResolver for NoNames {
    fn entity_name(&self, _node_type: NodeType, _reference_id: &str) -> Option<String> {
        None
    }

    fn event_title(&self, _event_id: &str) -> Option<String> {
        None
    }
}

/// In-memory name tables, one per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDirectory {
    #[serde(default)]
    pub characters: BTreeMap<String, String>,
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
    #[serde(default)]
    pub evidence: BTreeMap<String, String>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub events: BTreeMap<String, String>,
}

impl EntityDirectory {
    pub fn table(&self, node_type: NodeType) -> &BTreeMap<String, String> {
        match node_type {
            NodeType::Evidence => &self.evidence,
            NodeType::Secret => &self.secrets,
            NodeType::Location => &self.locations,
            NodeType::Character => &self.characters,
        }
    }

    pub fn table_mut(&mut self, node_type: NodeType) -> &mut BTreeMap<String, String> {
        match node_type {
            NodeType::Evidence => &mut self.evidence,
            NodeType::Secret => &mut self.secrets,
            NodeType::Location => &mut self.locations,
            NodeType::Character => &mut self.characters,
        }
    }

    pub fn is_empty(&self) -> bool {
        NodeType::ALL
            .iter()
            .all(|node_type| self.table(*node_type).is_empty())
            && self.events.is_empty()
    }
}

impl EntityResolver for EntityDirectory {
    fn entity_name(&self, node_type: NodeType, reference_id: &str) -> Option<String> {
        self.table(node_type)
            .get(reference_id)
            .filter(|name| !name.trim().is_empty())
            .cloned()
    }

    fn event_title(&self, event_id: &str) -> Option<String> {
        self.events
            .get(event_id)
            .filter(|title| !title.trim().is_empty())
            .cloned()
    }

    // An empty events table means the listing was never loaded.
    fn knows_event(&self, event_id: &str) -> bool {
        self.events.is_empty() || self.events.contains_key(event_id)
    }
}

pub fn node_label(node: &GraphNode, resolver: &dyn EntityResolver) -> String {
    let name = resolver
        .entity_name(node.node_type, &node.reference_id)
        .unwrap_or_else(|| {
            tracing::trace!(node = %node.node_id, reference = %node.reference_id, "name lookup missed");
            node.reference_id.clone()
        });
    format!("{}: {}", node.node_type, name)
}

pub fn container_title(event_id: &str, resolver: &dyn EntityResolver) -> String {
    resolver
        .event_title(event_id)
        .unwrap_or_else(|| event_id.to_string())
}

/// Greedy word wrap to at most `max_lines` lines of `max_chars` characters.
/// The last line gets an ellipsis when text is cut.
pub fn wrap_label(text: &str, max_chars: usize, max_lines: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let max_lines = max_lines.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut truncated = false;

    'words: for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let current_len = current.chars().count();
            let needed = if current.is_empty() { word.len() } else { current_len + 1 + word.len() };
            if needed <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }
            if current.is_empty() {
                // Word longer than a whole line: hard-split it.
                let rest = word.split_off(max_chars);
                current.extend(word.iter());
                word = rest;
            }
            lines.push(std::mem::take(&mut current));
            if lines.len() == max_lines {
                truncated = true;
                break 'words;
            }
        }
    }
    if !current.is_empty() {
        if lines.len() < max_lines {
            lines.push(current);
        } else {
            truncated = true;
        }
    }
    if truncated && let Some(last) = lines.last_mut() {
        let mut chars: Vec<char> = last.chars().collect();
        if chars.len() >= max_chars {
            chars.truncate(max_chars.saturating_sub(1));
        }
        *last = chars.into_iter().collect::<String>() + "…";
    }
    lines
}
