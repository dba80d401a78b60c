use plotweave::classify::ComponentClassifier;
use plotweave::config::{Config, parse_config};
use plotweave::layout_dump::LayoutDump;
use plotweave::model::LogicAssignment;
use plotweave::render::render_svg;
use plotweave::store::{GraphDocument, MemoryStore};
use plotweave::{LayoutState, Session, Trigger};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    /// Full reconciliation instead of the incremental merge.
    arrange: Option<bool>,
    /// Config document in the CLI's config file format.
    config: Option<serde_json::Value>,
    svg: Option<bool>,
}

#[derive(Serialize)]
struct LayoutOutput<'a> {
    layout: LayoutDump<'a>,
    state: Option<&'a LayoutState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    svg: Option<String>,
    notices: Vec<String>,
}

fn build_config(options: &LayoutOptions) -> Result<Config, String> {
    match &options.config {
        Some(value) => parse_config(&value.to_string()),
        None => Ok(Config::default()),
    }
}

/// One load/refresh/arrange cycle over an in-memory graph document.
fn layout_document(input_json: &str, state_json: Option<&str>, options_json: Option<&str>) -> Result<String, String> {
    let document = GraphDocument::from_json(input_json).map_err(|error| error.to_string())?;
    let options = match options_json {
        Some(raw) => serde_json::from_str::<LayoutOptions>(raw).map_err(|error| error.to_string())?,
        None => LayoutOptions::default(),
    };
    let previous = match state_json {
        Some(raw) if !raw.trim().is_empty() => {
            Some(serde_json::from_str::<LayoutState>(raw).map_err(|error| error.to_string())?)
        }
        _ => None,
    };
    let config = build_config(&options)?;

    let trigger = match (options.arrange.unwrap_or(false), previous.is_some()) {
        (true, _) => Trigger::Arrange,
        (false, false) => Trigger::Load,
        (false, true) => Trigger::Refresh,
    };
    let store = MemoryStore::with_graph(document.nodes, document.edges);
    let classifier = ComponentClassifier::with_logics(document.logics);
    let mut session = Session::new(Box::new(store), Box::new(classifier), Box::new(document.names), config);
    if let Some(previous) = previous {
        session = session.with_state(previous);
    }
    session.run(trigger).map_err(|error| error.to_string())?;

    let scene = session.scene();
    let svg = options
        .svg
        .unwrap_or(false)
        .then(|| render_svg(&scene, session.config()));
    let empty = LogicAssignment::default();
    let logics = session.assignment().unwrap_or(&empty);
    let output = LayoutOutput {
        layout: LayoutDump::new(&scene, session.layout(), logics, None),
        state: session.state(),
        svg,
        notices: session.notices().iter().map(|notice| notice.message.clone()).collect(),
    };
    serde_json::to_string(&output).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_graph(
    input_json: &str,
    state_json: Option<String>,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    layout_document(input_json, state_json.as_deref(), options_json.as_deref())
        .map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::layout_document;

    const GRAPH: &str = r#"{
        "nodes": [
            {"node_id": "A", "node_type": "Evidence", "reference_id": "ev_knife"},
            {"node_id": "B", "node_type": "Character", "reference_id": "ch_cook", "event_id": "ev_dinner"},
            {"node_id": "C", "node_type": "Secret", "reference_id": "sec_debt", "event_id": null}
        ],
        "edges": [
            {"edge_id": "e1", "source_node_id": "A", "target_node_id": "B", "edge_type": "supports"},
            {"edge_id": "e2", "source_node_id": "A", "target_node_id": "C", "edge_type": "refutes"}
        ],
        "names": {"characters": {"ch_cook": "The cook"}}
    }"#;

    #[test]
    fn lays_out_and_resumes_from_state() {
        let first = layout_document(GRAPH, None, Some(r#"{"svg": true}"#)).expect("first cycle");
        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert!(value["svg"].as_str().unwrap().contains("Character: The cook"));
        assert_eq!(value["layout"]["edges"][0]["source"], "A");
        assert_eq!(value["layout"]["edges"][0]["target"], "event_group_ev_dinner");

        let mut state = value["state"].clone();
        state["items"]["A"]["position"] = serde_json::json!({"x": 40.0, "y": 40.0});
        let second = layout_document(GRAPH, Some(&state.to_string()), None).expect("second cycle");
        let value: serde_json::Value = serde_json::from_str(&second).unwrap();
        assert_eq!(value["state"]["items"]["A"]["position"]["x"], 40.0);
        assert!(value.get("svg").is_none());
    }
}
