use crate::layout::Layout;
use crate::model::LogicAssignment;
use crate::reconcile::LayoutState;
use crate::scene::{Bounds, Scene, SceneContainer, SceneEdge, SceneNode};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Everything a frontend or a test harness needs to draw and diff one cycle.
#[derive(Debug, Serialize)]
pub struct LayoutDump<'a> {
    pub bounds: Bounds,
    pub chains: Vec<ChainDump>,
    pub containers: &'a [SceneContainer],
    pub nodes: &'a [SceneNode],
    pub edges: &'a [SceneEdge],
    pub logics: &'a LogicAssignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a LayoutState>,
}

#[derive(Debug, Serialize)]
pub struct ChainDump {
    pub logic_id: Option<String>,
    pub name: Option<String>,
    pub origin_x: f32,
    pub columns: usize,
    pub levels: usize,
    pub nodes: Vec<String>,
}

impl<'a> LayoutDump<'a> {
    pub fn new(
        scene: &'a Scene,
        layout: &Layout,
        logics: &'a LogicAssignment,
        state: Option<&'a LayoutState>,
    ) -> Self {
        let chains = layout
            .chains
            .iter()
            .map(|chain| ChainDump {
                logic_id: chain.logic_id.clone(),
                name: chain
                    .logic_id
                    .as_deref()
                    .map(|logic_id| logics.logic_name(logic_id).to_string()),
                origin_x: chain.origin_x,
                columns: chain.columns,
                levels: chain.levels,
                nodes: chain.nodes.clone(),
            })
            .collect();
        LayoutDump {
            bounds: scene.bounds,
            chains,
            containers: &scene.containers,
            nodes: &scene.nodes,
            edges: &scene.edges,
            logics,
            state,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout.
pub fn write_layout_dump(path: Option<&Path>, dump: &LayoutDump<'_>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, dump)?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, dump)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
