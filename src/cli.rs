use crate::classify::{ComponentClassifier, LogicClassifier};
use crate::config::load_config;
use crate::labels::{EntityDirectory, EntityResolver};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::model::LogicAssignment;
use crate::reconcile::LayoutState;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::session::{NoticeKind, Session, Trigger};
use crate::store::{GraphStore, JsonFileStore};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "plotweave", version, about = "Lay out and render a narrative knowledge graph")]
pub struct Args {
    /// Graph document (.json) with nodes, edges and optional logics and names
    #[arg(short = 'g', long = "graph", conflicts_with = "server")]
    pub graph: Option<PathBuf>,

    /// Base URL of a graph backend, e.g. http://localhost:8000/api
    #[arg(long = "server")]
    pub server: Option<String>,

    /// Canvas state carried between runs; read if present, always rewritten
    #[arg(short = 's', long = "state")]
    pub state: Option<PathBuf>,

    /// Re-arrange: nodes whose event membership changed are moved
    #[arg(long = "arrange")]
    pub arrange: bool,

    /// Print the logic details of a node as JSON instead of rendering
    #[arg(long = "details", value_name = "NODE_ID")]
    pub details: Option<String>,

    /// Output file (svg/png/json). Defaults to stdout for SVG and JSON.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;

    let (store, classifier, names) = open_sources(&args)?;
    let previous = match args.state.as_deref() {
        Some(path) => read_state(path)?,
        None => None,
    };
    let trigger = choose_trigger(args.arrange, previous.is_some());

    let mut session = Session::new(store, classifier, names, config);
    if let Some(previous) = previous {
        session = session.with_state(previous);
    }

    let outcome = session.run(trigger);
    for notice in session.take_notices() {
        match notice.kind {
            NoticeKind::Error => tracing::error!("{}", notice.message),
            NoticeKind::Warning => tracing::warn!("{}", notice.message),
        }
    }
    let outcome = outcome?;
    tracing::debug!(?outcome, "cycle finished");

    if let Some(node_id) = args.details.as_deref() {
        let details = session
            .logic_details(node_id)
            .with_context(|| format!("unknown node {node_id}"))?;
        println!("{}", serde_json::to_string_pretty(&details)?);
        return save_state(&args, &session);
    }

    let scene = session.scene();
    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&scene, session.config());
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&scene, session.config());
            write_output_png(&svg, &output, &session.config().render)?;
        }
        OutputFormat::Json => {
            let empty = LogicAssignment::default();
            let logics = session.assignment().unwrap_or(&empty);
            let dump = LayoutDump::new(&scene, session.layout(), logics, session.state());
            write_layout_dump(args.output.as_deref(), &dump)?;
        }
    }
    save_state(&args, &session)
}

fn init_tracing() {
    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

/// First run loads, `--arrange` reconciles, anything else appends.
fn choose_trigger(arrange: bool, has_state: bool) -> Trigger {
    match (arrange, has_state) {
        (true, _) => Trigger::Arrange,
        (false, false) => Trigger::Load,
        (false, true) => Trigger::Refresh,
    }
}

type Sources = (Box<dyn GraphStore>, Box<dyn LogicClassifier>, Box<dyn EntityResolver>);

fn open_sources(args: &Args) -> Result<Sources> {
    if let Some(path) = args.graph.as_deref() {
        let store = JsonFileStore::open(path)?;
        let classifier = ComponentClassifier::with_logics(store.logics().to_vec());
        let names: EntityDirectory = store.names().clone();
        return Ok((Box::new(store), Box::new(classifier), Box::new(names)));
    }
    if let Some(url) = args.server.as_deref() {
        return open_server(url);
    }
    Err(anyhow::anyhow!("either --graph or --server is required"))
}

#[cfg(feature = "http")]
fn open_server(url: &str) -> Result<Sources> {
    use crate::store::http::{HttpClassifier, HttpGraphStore};
    let store = HttpGraphStore::new(url)?;
    let names = store.fetch_names();
    let classifier = HttpClassifier::new(url)?;
    Ok((Box::new(store), Box::new(classifier), Box::new(names)))
}

#[cfg(not(feature = "http"))]
fn open_server(_url: &str) -> Result<Sources> {
    Err(anyhow::anyhow!("--server requires the `http` feature"))
}

fn read_state(path: &Path) -> Result<Option<LayoutState>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading state {}", path.display()))?;
    let state = serde_json::from_str(&contents)
        .with_context(|| format!("parsing state {}", path.display()))?;
    Ok(Some(state))
}

fn save_state(args: &Args, session: &Session) -> Result<()> {
    let (Some(path), Some(state)) = (args.state.as_deref(), session.state()) else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json).with_context(|| format!("writing state {}", path.display()))?;
    Ok(())
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
