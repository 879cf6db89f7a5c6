use crate::config::LayoutConfig;
use crate::layout::{EdgeSide, Layout, LayoutWarning};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub direction: String,
    pub algorithm: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub warnings: Vec<LayoutWarning>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub shape: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub manual: bool,
    pub rank: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub points: Vec<[f32; 2]>,
    pub arrow_angle: f32,
    pub label: Option<String>,
    pub label_anchor: Option<[f32; 2]>,
    pub source_side: EdgeSide,
    pub target_side: EdgeSide,
    pub is_loop: bool,
    pub bends: usize,
    pub length: f32,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout, config: &LayoutConfig) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                shape: format!("{:?}", node.shape).to_lowercase(),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                manual: node.manual,
                rank: node.rank,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.from.clone(),
                to: edge.to.clone(),
                points: edge.points.iter().map(|(x, y)| [*x, *y]).collect(),
                arrow_angle: edge.arrow_angle,
                label: edge.label.clone(),
                label_anchor: edge
                    .label_anchor
                    .map(|anchor| [anchor.position.0, anchor.position.1]),
                source_side: edge.source_side,
                target_side: edge.target_side,
                is_loop: edge.is_loop,
                bends: edge.bends,
                length: edge.length,
            })
            .collect();

        LayoutDump {
            direction: format!("{:?}", config.direction),
            algorithm: format!("{:?}", config.algorithm),
            x: layout.bounds.x,
            y: layout.bounds.y,
            width: layout.bounds.width,
            height: layout.bounds.height,
            nodes,
            edges,
            warnings: layout.warnings.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pretty JSON to `path`, or stdout when `path` is `None`.
pub fn write_layout_dump(
    path: Option<&Path>,
    layout: &Layout,
    config: &LayoutConfig,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout, config);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Graph, ShapeClass};
    use crate::layout::compute_layout;

    #[test]
    fn dump_carries_routes_and_anchors() {
        let mut graph = Graph::new();
        graph.add_node("a", ShapeClass::Rectangle, 160.0, 60.0).unwrap();
        graph.add_node("b", ShapeClass::Ellipse, 60.0, 60.0).unwrap();
        graph.add_edge("ab", "a", "b", Some("next".into())).unwrap();
        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);
        let dump = LayoutDump::from_layout(&layout, &config);
        assert_eq!(dump.nodes.len(), 2);
        assert_eq!(dump.nodes[1].shape, "ellipse");
        assert!(dump.edges[0].label_anchor.is_some());

        let json: serde_json::Value = serde_json::from_str(&dump.to_json().unwrap()).unwrap();
        assert_eq!(json["edges"][0]["sourceSide"], "bottom");
        assert_eq!(json["edges"][0]["isLoop"], false);
        assert_eq!(json["direction"], "TopDown");
    }
}
