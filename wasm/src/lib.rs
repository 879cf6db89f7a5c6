use orthoflow::config::parse_config;
use orthoflow::layout_dump::LayoutDump;
use orthoflow::{Direction, Graph, GraphSpec, IdGenerator, LayoutAlgorithm, compute_layout};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

/// Shorthand overrides on top of an optional full config document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    config: Option<serde_json::Value>,
    algorithm: Option<LayoutAlgorithm>,
    direction: Option<Direction>,
}

fn layout_to_json(graph_json: &str, options: LayoutOptions) -> Result<String, String> {
    let mut config = match options.config {
        Some(raw) => parse_config(&raw.to_string()).map_err(|error| format!("{error:#}"))?,
        None => Default::default(),
    };
    if let Some(algorithm) = options.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(direction) = options.direction {
        config.direction = direction;
    }

    let spec: GraphSpec = serde_json::from_str(graph_json).map_err(|error| error.to_string())?;
    let graph =
        Graph::from_spec(&spec, &mut IdGenerator::default()).map_err(|error| error.to_string())?;
    let layout = compute_layout(&graph, &config);
    LayoutDump::from_layout(&layout, &config)
        .to_json()
        .map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_json(graph_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<LayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        LayoutOptions::default()
    };
    layout_to_json(graph_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{LayoutOptions, layout_to_json};

    const GRAPH: &str = r#"{
        "nodes": [{"id": "a"}, {"id": "b", "shape": "decision"}, {"id": "c"}],
        "edges": [
            {"source": "a", "target": "b"},
            {"source": "b", "target": "c", "label": "yes"},
            {"source": "b", "target": "a", "label": "reject"}
        ]
    }"#;

    #[test]
    fn lays_out_graph_with_loop() {
        let json = layout_to_json(GRAPH, LayoutOptions::default()).expect("graph should lay out");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["edges"].as_array().unwrap().len(), 3);
        assert_eq!(value["edges"][2]["isLoop"], true);
    }

    #[test]
    fn options_override_direction() {
        let options: LayoutOptions =
            serde_json::from_str(r#"{"direction": "LR", "config": {"levelGap": 300}}"#).unwrap();
        let json = layout_to_json(GRAPH, options).unwrap();
        assert!(json.contains("\"direction\": \"LeftRight\""));
    }

    #[test]
    fn reports_unknown_endpoint() {
        let err = layout_to_json(
            r#"{"nodes": [{"id": "a"}], "edges": [{"source": "a", "target": "nope"}]}"#,
            LayoutOptions::default(),
        )
        .unwrap_err();
        assert!(err.contains("nope"));
    }
}
