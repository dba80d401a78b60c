use crate::model::GraphNode;

#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup<'a> {
    pub event_id: &'a str,
    pub members: Vec<&'a GraphNode>,
}

/// Nodes partitioned by event membership. Groups appear in the order their
/// first member appears in the source list; members keep source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventGroups<'a> {
    pub groups: Vec<EventGroup<'a>>,
    pub free: Vec<&'a GraphNode>,
}

impl<'a> EventGroups<'a> {
    pub fn get(&self, event_id: &str) -> Option<&EventGroup<'a>> {
        self.groups.iter().find(|group| group.event_id == event_id)
    }

    pub fn event_of(&self, node_id: &str) -> Option<&'a str> {
        self.groups
            .iter()
            .find(|group| group.members.iter().any(|node| node.node_id == node_id))
            .map(|group| group.event_id)
    }

    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(|group| group.members.len()).sum()
    }
}

pub fn group_by_event(nodes: &[GraphNode]) -> EventGroups<'_> {
    group_by_known_event(nodes, |_| true)
}

/// Like [`group_by_event`], but nodes whose event is not known are treated
/// as free.
pub fn group_by_known_event<'a>(
    nodes: &'a [GraphNode],
    is_known: impl Fn(&str) -> bool,
) -> EventGroups<'a> {
    let mut grouped = EventGroups::default();
    for node in nodes {
        let Some(event_id) = node.event() else {
            grouped.free.push(node);
            continue;
        };
        if !is_known(event_id) {
            tracing::debug!(node = %node.node_id, event = event_id, "event no longer exists, node treated as free");
            grouped.free.push(node);
            continue;
        }
        match grouped.groups.iter_mut().find(|group| group.event_id == event_id) {
            Some(group) => group.members.push(node),
            None => grouped.groups.push(EventGroup {
                event_id,
                members: vec![node],
            }),
        }
    }
    grouped
}
