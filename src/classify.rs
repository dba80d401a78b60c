//! Logic classifier clients.
//!
//! A classifier partitions the graph into logic chains and owns the logic
//! records. The engine consumes its output wholesale and never creates or
//! deletes logics itself; it may only rename or recolour them.

use crate::model::{GraphSnapshot, Logic, LogicAssignment, LogicUpdate};
use crate::theme::{hash_color, is_valid_color};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier unavailable: {0}")]
    Transport(String),
    #[error("unknown logic: {0}")]
    UnknownLogic(String),
    #[error("invalid logic colour: {0}")]
    InvalidColor(String),
    #[error("unexpected classifier response: {0}")]
    Decode(String),
}

pub trait LogicClassifier {
    /// Full, idempotent recomputation of the node to logic mapping.
    fn compute_logics(&mut self, snapshot: &GraphSnapshot) -> Result<LogicAssignment, ClassifyError>;

    fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, ClassifyError>;
}

impl<T: LogicClassifier + ?Sized> LogicClassifier for Box<T> {
    fn compute_logics(&mut self, snapshot: &GraphSnapshot) -> Result<LogicAssignment, ClassifyError> {
        (**self).compute_logics(snapshot)
    }

    fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, ClassifyError> {
        (**self).update_logic(logic_id, update)
    }
}

/// Local classifier: one logic per undirected connected component.
///
/// Components are numbered `logic_0, logic_1, ...` in node order. Logic
/// records are kept across runs; ids seen for the first time get a default
/// name and a hash colour.
#[derive(Debug, Clone, Default)]
pub struct ComponentClassifier {
    logics: Vec<Logic>,
}

impl ComponentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logics(logics: Vec<Logic>) -> Self {
        Self { logics }
    }

    pub fn logics(&self) -> &[Logic] {
        &self.logics
    }
}

pub fn connected_components(snapshot: &GraphSnapshot) -> Vec<(String, String)> {
    let known: HashSet<&str> = snapshot.nodes.iter().map(|n| n.node_id.as_str()).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &snapshot.edges {
        let (from, to) = (edge.source_node_id.as_str(), edge.target_node_id.as_str());
        if !known.contains(from) || !known.contains(to) {
            tracing::debug!(edge = %edge.edge_id, "skipping dangling edge while classifying");
            continue;
        }
        adjacency.entry(from).or_default().push(to);
        adjacency.entry(to).or_default().push(from);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut assignment = Vec::with_capacity(snapshot.nodes.len());
    let mut counter = 0usize;
    for node in &snapshot.nodes {
        let start = node.node_id.as_str();
        if !visited.insert(start) {
            continue;
        }
        let logic_id = format!("logic_{counter}");
        counter += 1;
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            assignment.push((current.to_string(), logic_id.clone()));
            if let Some(neighbors) = adjacency.get(current) {
                for &next in neighbors.iter().rev() {
                    if visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
    }
    assignment
}

impl LogicClassifier for ComponentClassifier {
    fn compute_logics(&mut self, snapshot: &GraphSnapshot) -> Result<LogicAssignment, ClassifyError> {
        let pairs = connected_components(snapshot);
        let mut seen: Vec<&str> = Vec::new();
        for (_, logic_id) in &pairs {
            if !seen.contains(&logic_id.as_str()) {
                seen.push(logic_id.as_str());
            }
        }
        for logic_id in seen {
            if self.logics.iter().any(|logic| logic.logic_id == logic_id) {
                continue;
            }
            let name = format!("Logic {}", self.logics.len() + 1);
            self.logics.push(Logic {
                logic_id: logic_id.to_string(),
                name,
                color: Some(hash_color(logic_id)),
            });
        }
        Ok(LogicAssignment {
            node_to_logic: pairs.into_iter().collect(),
            logics: self.logics.clone(),
        })
    }

    fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, ClassifyError> {
        let Some(logic) = self.logics.iter_mut().find(|l| l.logic_id == logic_id) else {
            return Err(ClassifyError::UnknownLogic(logic_id.to_string()));
        };
        *logic = update.apply_to(logic);
        Ok(logic.clone())
    }
}

/// Keeps the last successful classifier result.
///
/// A new result replaces the cache wholesale; a failed call leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct CachedClassifier<C> {
    inner: C,
    last: Option<LogicAssignment>,
}

impl<C: LogicClassifier> CachedClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self { inner, last: None }
    }

    pub fn last(&self) -> Option<&LogicAssignment> {
        self.last.as_ref()
    }

    pub fn compute(&mut self, snapshot: &GraphSnapshot) -> Result<&LogicAssignment, ClassifyError> {
        let assignment = self.inner.compute_logics(snapshot)?;
        tracing::debug!(
            nodes = assignment.node_to_logic.len(),
            logics = assignment.logics.len(),
            "classifier result cached"
        );
        Ok(&*self.last.insert(assignment))
    }

    pub fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, ClassifyError> {
        if let Some(color) = update.color.as_deref()
            && !is_valid_color(color)
        {
            return Err(ClassifyError::InvalidColor(color.to_string()));
        }
        if let Some(name) = update.name.as_deref()
            && name.trim().is_empty()
        {
            return Err(ClassifyError::Decode("logic name must not be empty".to_string()));
        }
        let updated = self.inner.update_logic(logic_id, update)?;
        if let Some(last) = self.last.as_mut() {
            match last.logics.iter_mut().find(|l| l.logic_id == logic_id) {
                Some(cached) => *cached = updated.clone(),
                None => last.logics.push(updated.clone()),
            }
        }
        Ok(updated)
    }
}
