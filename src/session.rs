//! One editing session: the graph as last fetched, the classifier cache and
//! the canvas state, driven by triggering actions.
//!
//! A triggering action runs fetch, classify, layout and merge. It is split
//! into [`Session::begin`], which does the collaborator calls and computes
//! the candidate layout, and [`Session::commit`], which merges it. Each
//! begin issues a sequence number and a commit only applies if its number
//! is still the latest issued, so an overlapping older cycle can never
//! overwrite a newer one.

use serde::Serialize;
use thiserror::Error;

use crate::classify::{CachedClassifier, ClassifyError, LogicClassifier};
use crate::config::Config;
use crate::details::{EntityDetails, detail_targets, logic_details_for};
use crate::labels::EntityResolver;
use crate::layout::{Layout, Position, compute_layout};
use crate::model::{EventMembership, GraphEdge, GraphNode, GraphSnapshot, Logic, LogicAssignment, LogicUpdate, NodeType};
use crate::reconcile::{LayoutState, MergeMode, MergeReport, MoveError, reconcile};
use crate::scene::Scene;
use crate::store::{GraphStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Move(#[from] MoveError),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("no event container {0}")]
    UnknownContainer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// First data load of the session.
    Load,
    /// Refetch after a mutation or an external change.
    Refresh,
    /// Explicit user-invoked arrange.
    Arrange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Error,
    Warning,
}

/// Message for the user. Errors must be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Fetched data and candidate layout of a cycle that has not been merged yet.
#[derive(Debug, Clone)]
pub struct PendingCycle {
    pub seq: u64,
    pub trigger: Trigger,
    pub snapshot: GraphSnapshot,
    pub assignment: LogicAssignment,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Applied {
        seq: u64,
        mode: MergeMode,
        /// True when a refresh did not grow the node count.
        refresh_only: bool,
        report: MergeReport,
    },
    Stale {
        seq: u64,
        latest: u64,
    },
}

impl CycleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CycleOutcome::Applied { .. })
    }
}

pub struct Session {
    store: Box<dyn GraphStore>,
    classifier: CachedClassifier<Box<dyn LogicClassifier>>,
    resolver: Box<dyn EntityResolver>,
    config: Config,
    snapshot: GraphSnapshot,
    layout: Layout,
    state: Option<LayoutState>,
    issued: u64,
    applied: u64,
    id_counter: u64,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("nodes", &self.snapshot.nodes.len())
            .field("edges", &self.snapshot.edges.len())
            .field("issued", &self.issued)
            .field("applied", &self.applied)
            .field("state", &self.state.as_ref().map(LayoutState::len))
            .finish()
    }
}

impl Session {
    pub fn new(
        store: Box<dyn GraphStore>,
        classifier: Box<dyn LogicClassifier>,
        resolver: Box<dyn EntityResolver>,
        config: Config,
    ) -> Self {
        Self {
            store,
            classifier: CachedClassifier::new(classifier),
            resolver,
            config,
            snapshot: GraphSnapshot::default(),
            layout: Layout::default(),
            state: None,
            issued: 0,
            applied: 0,
            id_counter: 0,
            notices: Vec::new(),
        }
    }

    /// Resumes from a state saved by an earlier session.
    pub fn with_state(mut self, state: LayoutState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn state(&self) -> Option<&LayoutState> {
        self.state.as_ref()
    }

    pub fn assignment(&self) -> Option<&LogicAssignment> {
        self.classifier.last()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, kind: NoticeKind, message: String) {
        self.notices.push(Notice { kind, message });
    }

    /// Issues a sequence number, fetches the graph, classifies it and
    /// computes the candidate layout.
    ///
    /// A fetch failure is reported and leaves the canvas alone. A classifier
    /// failure falls back to the last good classification.
    pub fn begin(&mut self, trigger: Trigger) -> Result<PendingCycle, SessionError> {
        self.issued += 1;
        let seq = self.issued;

        let snapshot = match self.store.fetch_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(seq, ?trigger, error = %err, "graph fetch failed");
                self.notify(NoticeKind::Error, format!("Could not load the graph: {err}"));
                return Err(err.into());
            }
        };

        let computed = self.classifier.compute(&snapshot).cloned();
        let assignment = match computed {
            Ok(assignment) => assignment,
            Err(err) => {
                tracing::warn!(seq, error = %err, "classifier failed, using last classification");
                self.notify(
                    NoticeKind::Warning,
                    format!("Logic chains could not be recomputed: {err}"),
                );
                self.classifier.last().cloned().unwrap_or_default()
            }
        };

        let layout = compute_layout(&snapshot, &assignment, self.resolver.as_ref(), &self.config.layout);
        Ok(PendingCycle {
            seq,
            trigger,
            snapshot,
            assignment,
            layout,
        })
    }

    /// Merges a pending cycle unless a newer one has been issued since.
    pub fn commit(&mut self, pending: PendingCycle) -> CycleOutcome {
        if pending.seq != self.issued {
            tracing::warn!(
                seq = pending.seq,
                latest = self.issued,
                "discarding stale layout cycle"
            );
            return CycleOutcome::Stale {
                seq: pending.seq,
                latest: self.issued,
            };
        }

        let previous_count = self.state.as_ref().map(|state| state.node_count);
        let mode = match (pending.trigger, &self.state) {
            (Trigger::Arrange, _) | (_, None) => MergeMode::Reconcile,
            _ => MergeMode::Append,
        };
        let refresh_only = mode == MergeMode::Append
            && previous_count.is_some_and(|count| pending.layout.nodes.len() <= count);

        let (state, report) = reconcile(self.state.as_ref(), &pending.layout, mode);
        tracing::info!(
            seq = pending.seq,
            trigger = ?pending.trigger,
            ?mode,
            refresh_only,
            items = state.len(),
            "layout cycle applied"
        );
        self.snapshot = pending.snapshot;
        self.layout = pending.layout;
        self.state = Some(state);
        self.applied = pending.seq;
        CycleOutcome::Applied {
            seq: pending.seq,
            mode,
            refresh_only,
            report,
        }
    }

    pub fn run(&mut self, trigger: Trigger) -> Result<CycleOutcome, SessionError> {
        let pending = self.begin(trigger)?;
        Ok(self.commit(pending))
    }

    pub fn load(&mut self) -> Result<CycleOutcome, SessionError> {
        self.run(Trigger::Load)
    }

    pub fn refresh(&mut self) -> Result<CycleOutcome, SessionError> {
        self.run(Trigger::Refresh)
    }

    pub fn arrange(&mut self) -> Result<CycleOutcome, SessionError> {
        self.run(Trigger::Arrange)
    }

    fn store_call<T>(&mut self, what: &str, result: Result<T, StoreError>) -> Result<T, SessionError> {
        result.map_err(|err| {
            tracing::error!(action = what, error = %err, "graph mutation failed");
            self.notify(NoticeKind::Error, format!("Could not {what}: {err}"));
            SessionError::Store(err)
        })
    }

    pub fn create_node(
        &mut self,
        node_type: NodeType,
        reference_id: &str,
        event: EventMembership,
    ) -> Result<GraphNode, SessionError> {
        let node_id = fresh_id(&mut self.id_counter, "node", |id| self.snapshot.contains_node(id));
        let mut node = GraphNode::new(node_id, node_type, reference_id);
        node.event_id = event;
        let result = self.store.create_node(&node);
        let created = self.store_call("create the node", result)?;
        self.refresh()?;
        Ok(created)
    }

    pub fn update_node(&mut self, node: &GraphNode) -> Result<GraphNode, SessionError> {
        let result = self.store.update_node(node);
        let updated = self.store_call("update the node", result)?;
        self.refresh()?;
        Ok(updated)
    }

    /// Moves a node into an event container, or out of any with `None`.
    pub fn set_event(&mut self, node_id: &str, event_id: Option<&str>) -> Result<GraphNode, SessionError> {
        let Some(node) = self.snapshot.node(node_id) else {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        };
        let mut node = node.clone();
        node.event_id = EventMembership::from_option(event_id.map(str::to_string));
        self.update_node(&node)
    }

    pub fn delete_node(&mut self, node_id: &str) -> Result<(), SessionError> {
        let result = self.store.delete_node(node_id);
        self.store_call("delete the node", result)?;
        self.refresh()?;
        Ok(())
    }

    /// Creates an edge between two canvas items. A container endpoint is
    /// stored as the container's first member.
    pub fn connect(&mut self, source: &str, target: &str, edge_type: &str) -> Result<GraphEdge, SessionError> {
        let resolve = |id: &str| {
            self.layout
                .redirects
                .concrete(id)
                .map(str::to_string)
                .ok_or_else(|| SessionError::UnknownContainer(id.to_string()))
        };
        let source = resolve(source)?;
        let target = resolve(target)?;
        let edge_id = fresh_id(&mut self.id_counter, "edge", |id| {
            self.snapshot.edges.iter().any(|edge| edge.edge_id == id)
        });
        let mut edge = GraphEdge::new(edge_id, source, target);
        if !edge_type.trim().is_empty() {
            edge.edge_type = edge_type.to_string();
        }
        let result = self.store.create_edge(&edge);
        let created = self.store_call("connect the nodes", result)?;
        self.refresh()?;
        Ok(created)
    }

    pub fn delete_edge(&mut self, edge_id: &str) -> Result<(), SessionError> {
        let result = self.store.delete_edge(edge_id);
        self.store_call("delete the edge", result)?;
        self.refresh()?;
        Ok(())
    }

    /// Renames or recolours a logic. Positions are untouched.
    pub fn update_logic(&mut self, logic_id: &str, update: &LogicUpdate) -> Result<Logic, SessionError> {
        self.classifier.update_logic(logic_id, update).map_err(|err| {
            tracing::error!(logic = logic_id, error = %err, "logic update failed");
            self.notify(NoticeKind::Error, format!("Could not update the logic: {err}"));
            SessionError::Classify(err)
        })
    }

    pub fn logic_details(&self, node_id: &str) -> Option<EntityDetails> {
        let empty = LogicAssignment::default();
        let assignment = self.classifier.last().unwrap_or(&empty);
        logic_details_for(&self.snapshot, assignment, node_id)
    }

    /// Writes the detail text for a node's entity within one logic onto
    /// every node of that entity in the logic.
    pub fn update_logic_detail(&mut self, node_id: &str, logic_id: &str, text: &str) -> Result<usize, SessionError> {
        if !self.snapshot.contains_node(node_id) {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        }
        let empty = LogicAssignment::default();
        let assignment = self.classifier.last().unwrap_or(&empty);
        let targets: Vec<GraphNode> = detail_targets(&self.snapshot, assignment, node_id, logic_id)
            .into_iter()
            .cloned()
            .collect();
        for mut node in targets.iter().cloned() {
            node.logic_details.insert(logic_id.to_string(), text.to_string());
            let result = self.store.update_node(&node);
            self.store_call("save the logic detail", result)?;
        }
        self.refresh()?;
        Ok(targets.len())
    }

    /// Records a manual drag of a free node or a container.
    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), SessionError> {
        let Some(state) = self.state.as_mut() else {
            return Err(MoveError::Unknown(id.to_string()).into());
        };
        state.move_item(id, position)?;
        Ok(())
    }

    pub fn scene(&self) -> Scene {
        let empty = LogicAssignment::default();
        let assignment = self.classifier.last().unwrap_or(&empty);
        Scene::build(&self.layout, self.state.as_ref(), assignment, &self.config)
    }
}

/// Next `<prefix>_<n>` id not yet taken. The counter is shared by node
/// and edge ids.
fn fresh_id(counter: &mut u64, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        *counter += 1;
        let id = format!("{prefix}_{counter}");
        if !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ComponentClassifier;
    use crate::labels::NoNames;
    use crate::reconcile::ItemFate;
    use crate::store::{MemoryStore, StoreResult};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Memory store whose reads can be switched off.
    struct FlakyStore {
        inner: MemoryStore,
        down: Rc<Cell<bool>>,
    }

    impl GraphStore for FlakyStore {
        fn fetch_nodes(&self) -> StoreResult<Vec<GraphNode>> {
            if self.down.get() {
                return Err(StoreError::Transport("connection refused".to_string()));
            }
            self.inner.fetch_nodes()
        }
        fn fetch_edges(&self) -> StoreResult<Vec<GraphEdge>> {
            self.inner.fetch_edges()
        }
        fn create_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
            self.inner.create_node(node)
        }
        fn update_node(&mut self, node: &GraphNode) -> StoreResult<GraphNode> {
            self.inner.update_node(node)
        }
        fn delete_node(&mut self, node_id: &str) -> StoreResult<()> {
            self.inner.delete_node(node_id)
        }
        fn create_edge(&mut self, edge: &GraphEdge) -> StoreResult<GraphEdge> {
            self.inner.create_edge(edge)
        }
        fn delete_edge(&mut self, edge_id: &str) -> StoreResult<()> {
            self.inner.delete_edge(edge_id)
        }
    }

    struct BrokenClassifier;

    impl LogicClassifier for BrokenClassifier {
        fn compute_logics(&mut self, _snapshot: &GraphSnapshot) -> Result<LogicAssignment, ClassifyError> {
            Err(ClassifyError::Transport("timed out".to_string()))
        }
        fn update_logic(&mut self, logic_id: &str, _update: &LogicUpdate) -> Result<Logic, ClassifyError> {
            Err(ClassifyError::UnknownLogic(logic_id.to_string()))
        }
    }

    fn graph() -> MemoryStore {
        MemoryStore::with_graph(
            vec![
                GraphNode::new("A", NodeType::Evidence, "ev_a"),
                GraphNode::new("B", NodeType::Secret, "sec_b"),
                GraphNode::new("X", NodeType::Location, "loc_x").in_event("ev1"),
            ],
            vec![GraphEdge::new("e1", "A", "B")],
        )
    }

    fn session_with(store: impl GraphStore + 'static) -> Session {
        Session::new(
            Box::new(store),
            Box::new(ComponentClassifier::new()),
            Box::new(NoNames),
            Config::default(),
        )
    }

    #[test]
    fn first_load_places_everything() {
        let mut session = session_with(graph());
        let outcome = session.load().unwrap();
        let CycleOutcome::Applied { mode, report, .. } = outcome else {
            panic!("load was discarded");
        };
        assert_eq!(mode, MergeMode::Reconcile);
        assert_eq!(report.count(ItemFate::New), 4);
        assert_eq!(session.assignment().unwrap().logic_of("A"), Some("logic_0"));
    }

    #[test]
    fn stale_cycle_is_discarded() {
        let mut session = session_with(graph());
        session.load().unwrap();
        let older = session.begin(Trigger::Refresh).unwrap();
        let newer = session.begin(Trigger::Arrange).unwrap();
        assert!(session.commit(newer).is_applied());
        let outcome = session.commit(older);
        assert_eq!(outcome, CycleOutcome::Stale { seq: 2, latest: 3 });
    }

    #[test]
    fn created_node_is_placed_and_others_stay() {
        let mut session = session_with(graph());
        session.load().unwrap();
        session.move_node("A", Position::new(40.0, 40.0)).unwrap();
        let node = session
            .create_node(NodeType::Character, "ch_new", EventMembership::Unset)
            .unwrap();
        assert_eq!(node.node_id, "node_1");
        let state = session.state().unwrap();
        assert_eq!(state.position("A"), Some(Position::new(40.0, 40.0)));
        assert!(state.position("node_1").is_some());
    }

    #[test]
    fn fetch_failure_keeps_canvas_and_raises_notice() {
        let down = Rc::new(Cell::new(false));
        let mut session = session_with(FlakyStore {
            inner: graph(),
            down: down.clone(),
        });
        session.load().unwrap();
        let before = session.state().cloned();
        down.set(true);
        assert!(matches!(session.refresh(), Err(SessionError::Store(_))));
        assert_eq!(session.state().cloned(), before);
        assert_eq!(session.notices()[0].kind, NoticeKind::Error);
        assert_eq!(session.take_notices().len(), 1);
        assert!(session.notices().is_empty());
    }

    #[test]
    fn classifier_failure_degrades_to_unassigned_nodes() {
        let mut session = Session::new(
            Box::new(graph()),
            Box::new(BrokenClassifier),
            Box::new(NoNames),
            Config::default(),
        );
        assert!(session.load().unwrap().is_applied());
        assert_eq!(session.notices()[0].kind, NoticeKind::Warning);
        assert_eq!(session.layout().chains.len(), 1);
        assert!(session.layout().chains[0].logic_id.is_none());
    }

    #[test]
    fn connecting_to_a_container_stores_a_member() {
        let mut session = session_with(graph());
        session.load().unwrap();
        let edge = session.connect("event_group_ev1", "B", "").unwrap();
        assert_eq!(edge.source_node_id, "X");
        assert_eq!(edge.edge_type, "supports");
        assert!(matches!(
            session.connect("event_group_nope", "B", "supports"),
            Err(SessionError::UnknownContainer(_))
        ));
    }

    #[test]
    fn membership_change_waits_for_arrange() {
        let mut session = session_with(graph());
        session.load().unwrap();
        session.move_node("A", Position::new(40.0, 40.0)).unwrap();
        session.set_event("A", Some("ev1")).unwrap();
        assert_eq!(session.state().unwrap().position("A"), Some(Position::new(40.0, 40.0)));
        let drawn = session.scene();
        let drawn = drawn.node("A").unwrap();
        assert_eq!((drawn.x, drawn.y), (40.0, 40.0));

        session.arrange().unwrap();
        let expected = session.layout().nodes["A"].position;
        assert_eq!(session.state().unwrap().position("A"), Some(expected));
        assert!(session.move_node("A", Position::default()).is_err());
    }

    #[test]
    fn logic_detail_reaches_every_node_of_the_entity() {
        let store = MemoryStore::with_graph(
            vec![
                GraphNode::new("n1", NodeType::Evidence, "ev_knife"),
                GraphNode::new("n2", NodeType::Evidence, "ev_knife"),
                GraphNode::new("n3", NodeType::Character, "ch_cook"),
            ],
            vec![GraphEdge::new("e1", "n1", "n2"), GraphEdge::new("e2", "n2", "n3")],
        );
        let mut session = session_with(store);
        session.load().unwrap();
        let touched = session.update_logic_detail("n2", "logic_0", "Hidden in the oven").unwrap();
        assert_eq!(touched, 2);
        let details = session.logic_details("n1").unwrap();
        assert_eq!(details.logics[0].detail, "Hidden in the oven");
    }

    #[test]
    fn logic_rename_is_cached() {
        let mut session = session_with(graph());
        session.load().unwrap();
        let update = LogicUpdate {
            name: Some("Alibi".to_string()),
            color: None,
        };
        session.update_logic("logic_0", &update).unwrap();
        assert_eq!(session.assignment().unwrap().logic_name("logic_0"), "Alibi");
        assert!(session.update_logic("logic_9", &update).is_err());
        assert_eq!(session.notices().len(), 1);
    }
}
