//! Absolute, styled view of the canvas handed to renderers.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::Config;
use crate::labels::wrap_label;
use crate::layout::redirect::container_id;
use crate::layout::{Affiliation, EdgeLayout, Layout, NodeLayout, Position};
use crate::model::{LogicAssignment, NodeType};
use crate::reconcile::LayoutState;

const LOOP_REACH: f32 = 24.0;
const MAX_LABEL_LINES: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct SceneNode {
    pub id: String,
    pub node_type: NodeType,
    pub lines: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: String,
    pub logic_id: Option<String>,
    /// Logic name, shown as a tooltip.
    pub title: Option<String>,
    pub container: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneContainer {
    pub id: String,
    pub event_id: String,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub color: String,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    fn include(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x + width);
        self.max_y = self.max_y.max(y + height);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Scene {
    pub containers: Vec<SceneContainer>,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Point where the ray from the centre towards `toward` leaves the box.
    fn border_toward(&self, toward: (f32, f32)) -> (f32, f32) {
        let (cx, cy) = self.center();
        let (dx, dy) = (toward.0 - cx, toward.1 - cy);
        if dx == 0.0 && dy == 0.0 {
            return (cx, cy);
        }
        let sx = if dx == 0.0 { f32::INFINITY } else { (self.w / 2.0) / dx.abs() };
        let sy = if dy == 0.0 { f32::INFINITY } else { (self.h / 2.0) / dy.abs() };
        let scale = sx.min(sy);
        (cx + dx * scale, cy + dy * scale)
    }
}

impl Scene {
    /// Resolves canvas positions (state first, candidate layout otherwise)
    /// and styles every item.
    pub fn build(layout: &Layout, state: Option<&LayoutState>, assignment: &LogicAssignment, config: &Config) -> Self {
        let theme = &config.theme;
        let placed = |id: &str, computed: Position| state.and_then(|s| s.position(id)).unwrap_or(computed);

        let mut scene = Scene::default();
        let mut boxes: HashMap<&str, Rect> = HashMap::new();

        for group in &layout.groups {
            let origin = placed(&group.id, group.position);
            boxes.insert(
                group.id.as_str(),
                Rect {
                    x: origin.x,
                    y: origin.y,
                    w: group.width,
                    h: group.height,
                },
            );
            scene.containers.push(SceneContainer {
                id: group.id.clone(),
                event_id: group.event_id.clone(),
                title: group.title.clone(),
                x: origin.x,
                y: origin.y,
                width: group.width,
                height: group.height,
            });
        }

        for node in layout.nodes.values() {
            let Some((position, frame)) = resolve_node(node, state, &boxes) else {
                tracing::debug!(node = %node.id, "container missing, node skipped");
                continue;
            };
            boxes.insert(
                node.id.as_str(),
                Rect {
                    x: position.x,
                    y: position.y,
                    w: node.width,
                    h: node.height,
                },
            );
            scene.nodes.push(SceneNode {
                id: node.id.clone(),
                node_type: node.node_type,
                lines: wrap_label(&node.label, config.layout.max_label_width_chars, MAX_LABEL_LINES),
                x: position.x,
                y: position.y,
                width: node.width,
                height: node.height,
                fill: theme.node_fill(node.node_type).to_string(),
                logic_id: node.logic_id.clone(),
                title: node
                    .logic_id
                    .as_deref()
                    .map(|logic_id| assignment.logic_name(logic_id).to_string()),
                container: frame,
            });
        }

        // Members kept in cells past the computed grid still sit inside.
        let padding = config.layout.group.padding;
        for container in &mut scene.containers {
            for node in scene.nodes.iter().filter(|n| n.container.as_deref() == Some(container.id.as_str())) {
                container.width = container.width.max(node.x + node.width + padding - container.x);
                container.height = container.height.max(node.y + node.height + padding - container.y);
            }
            if let Some(rect) = boxes.get_mut(container.id.as_str()) {
                rect.w = container.width;
                rect.h = container.height;
            }
        }

        for edge in &layout.edges {
            let (Some(from), Some(to)) = (boxes.get(edge.source.as_str()), boxes.get(edge.target.as_str())) else {
                continue;
            };
            scene.edges.push(SceneEdge {
                id: edge.edge_id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.edge_type.clone(),
                color: edge_color(edge, assignment, config),
                points: edge_points(edge, *from, *to),
            });
        }

        let mut bounds: Option<Bounds> = None;
        for rect in scene
            .containers
            .iter()
            .map(|c| Rect { x: c.x, y: c.y, w: c.width, h: c.height })
            .chain(scene.nodes.iter().map(|n| Rect { x: n.x, y: n.y, w: n.width, h: n.height }))
        {
            let b = bounds.get_or_insert(Bounds {
                min_x: rect.x,
                min_y: rect.y,
                max_x: rect.x + rect.w,
                max_y: rect.y + rect.h,
            });
            b.include(rect.x, rect.y, rect.w, rect.h);
        }
        for edge in &scene.edges {
            if let Some(b) = bounds.as_mut() {
                for (x, y) in &edge.points {
                    b.include(*x, *y, 0.0, 0.0);
                }
            }
        }
        scene.bounds = bounds.unwrap_or_default();
        scene
    }

    pub fn node(&self, id: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn container(&self, id: &str) -> Option<&SceneContainer> {
        self.containers.iter().find(|container| container.id == id)
    }
}

/// Absolute position of a node and the container it is drawn in.
///
/// A stored position is read in the frame of its stored affiliation, which
/// after a deferred membership change differs from the layout's. A node
/// whose stored container is gone falls back to its computed position.
fn resolve_node(
    node: &NodeLayout,
    state: Option<&LayoutState>,
    boxes: &HashMap<&str, Rect>,
) -> Option<(Position, Option<String>)> {
    let origin_of = |container: &str| boxes.get(container).map(|rect| Position::new(rect.x, rect.y));
    if let Some(item) = state.and_then(|s| s.item(&node.id)) {
        match &item.affiliation {
            Affiliation::Grouped { event_id } => {
                let container = container_id(event_id);
                if let Some(origin) = origin_of(&container) {
                    return Some((item.position.offset(origin), Some(container)));
                }
            }
            Affiliation::Free | Affiliation::Container => return Some((item.position, None)),
        }
    }
    match node.parent.as_deref() {
        Some(parent) => {
            let origin = origin_of(parent)?;
            Some((node.position.offset(origin), Some(parent.to_string())))
        }
        None => Some((node.position, None)),
    }
}

/// Source logic colour, else the theme's neutral line colour.
fn edge_color(edge: &EdgeLayout, assignment: &LogicAssignment, config: &Config) -> String {
    match edge.logic_id.as_deref() {
        Some(logic_id) => config.theme.logic_color(logic_id, assignment),
        None => config.theme.line_color.clone(),
    }
}

fn edge_points(edge: &EdgeLayout, from: Rect, to: Rect) -> Vec<(f32, f32)> {
    if edge.is_loop() {
        // Loop over the top-right corner.
        let top = from.y;
        let right = from.x + from.w;
        let start = (from.x + from.w * 0.75, top);
        let end = (right, from.y + from.h * 0.25);
        return vec![
            start,
            (start.0, top - LOOP_REACH),
            (right + LOOP_REACH, top - LOOP_REACH),
            (right + LOOP_REACH, end.1),
            end,
        ];
    }
    let start = from.border_toward(to.center());
    let end = to.border_toward(from.center());
    vec![start, end]
}
