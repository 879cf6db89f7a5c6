use std::path::Path;

use orthoflow::geometry::{
    Point, Rect, is_orthogonal_step, segment_intersects_rect, segments_intersect,
};
use orthoflow::layout::routing::{OrthogonalRouter, RouteRequest};
use orthoflow::layout::{EdgeSide, Layout, LayoutWarning};
use orthoflow::layout_dump::LayoutDump;
use orthoflow::{
    Direction, Engine, Graph, GraphSpec, IdGenerator, LayoutAlgorithm, LayoutConfig, ShapeClass,
    compute_layout,
};

fn chain(ids: &[&str]) -> Graph {
    let mut graph = Graph::new();
    for id in ids {
        graph.add_node(id, ShapeClass::Rectangle, 160.0, 60.0).unwrap();
    }
    for pair in ids.windows(2) {
        graph
            .add_edge(&format!("{}-{}", pair[0], pair[1]), pair[0], pair[1], None)
            .unwrap();
    }
    graph
}

fn center(layout: &Layout, id: &str) -> Point {
    let node = layout.node(id).unwrap();
    (node.x, node.y)
}

fn assert_valid_routes(layout: &Layout, fixture: &str) {
    for edge in &layout.edges {
        assert!(edge.points.len() >= 2, "{fixture}: {} has a short route", edge.id);
        for seg in edge.points.windows(2) {
            assert!(
                is_orthogonal_step(seg[0], seg[1]),
                "{fixture}: {} is not orthogonal: {:?}",
                edge.id,
                edge.points
            );
        }
        assert!(edge.arrow_angle.is_finite());
    }
}

#[test]
fn chain_stacks_and_routes_straight() {
    let graph = chain(&["A", "B", "C"]);
    let config = LayoutConfig::default();
    let layout = compute_layout(&graph, &config);

    let (a, b, c) = (center(&layout, "A"), center(&layout, "B"), center(&layout, "C"));
    assert_eq!(a.0, b.0);
    assert_eq!(b.0, c.0);
    assert!((b.1 - a.1 - config.level_gap).abs() < 1e-4);
    assert!((c.1 - b.1 - config.level_gap).abs() < 1e-4);

    let ab = layout.edge("A-B").unwrap();
    assert_eq!(ab.points.len(), 2);
    assert_eq!(ab.points[0].0, ab.points[1].0);
    assert_eq!(ab.bends, 0);
    assert!(!ab.is_loop);
}

fn fan_out_graph() -> Graph {
    let mut graph = Graph::new();
    for (id, pos) in [
        ("D", (0.0, 0.0)),
        ("G", (150.0, 200.0)),
        ("E", (-150.0, 200.0)),
        ("F", (0.0, 200.0)),
    ] {
        let idx = graph.add_node(id, ShapeClass::Rectangle, 160.0, 60.0).unwrap();
        graph.set_position(idx, pos);
        graph.set_manual(idx, true);
    }
    // Insertion order deliberately differs from the left-to-right order.
    for target in ["G", "E", "F"] {
        graph.add_edge(&format!("D-{target}"), "D", target, None).unwrap();
    }
    graph
}

#[test]
fn fan_out_offsets_follow_target_order() {
    let layout = compute_layout(&fan_out_graph(), &LayoutConfig::default());
    let offset = |id: &str| layout.edge(id).unwrap().source_offset;
    assert_eq!(offset("D-E"), -70.0);
    assert_eq!(offset("D-F"), 0.0);
    assert_eq!(offset("D-G"), 70.0);
    for edge in &layout.edges {
        assert_eq!(edge.source_side, EdgeSide::Bottom);
        assert_eq!(edge.points[0], (edge.source_offset, 30.0));
    }
    assert_valid_routes(&layout, "fan-out");
}

#[test]
fn layered_fan_out_follows_layer_order() {
    let mut graph = chain(&["D"]);
    for id in ["E", "F", "G"] {
        graph.add_node(id, ShapeClass::Rectangle, 160.0, 60.0).unwrap();
        graph.add_edge(&format!("D-{id}"), "D", id, None).unwrap();
    }
    let config = LayoutConfig {
        level_gap: 400.0,
        ..LayoutConfig::default()
    };
    let layout = compute_layout(&graph, &config);
    let mut by_x: Vec<(f32, f32)> = ["D-E", "D-F", "D-G"]
        .iter()
        .map(|id| {
            let edge = layout.edge(id).unwrap();
            (center(&layout, &edge.to).0, edge.source_offset)
        })
        .collect();
    by_x.sort_by(|a, b| a.0.total_cmp(&b.0));
    let offsets: Vec<f32> = by_x.iter().map(|(_, offset)| *offset).collect();
    assert_eq!(offsets, vec![-70.0, 0.0, 70.0]);
}

/// Loop runs out past `loop_offset` and through no node but its own ends.
fn assert_loop_avoids_nodes(layout: &Layout, loop_id: &str, config: &LayoutConfig) {
    let back = layout.edge(loop_id).unwrap();
    assert!(back.is_loop);
    let from = center(layout, &back.from);
    let deviation = back
        .points
        .iter()
        .map(|p| (p.0 - from.0).abs())
        .fold(0.0f32, f32::max);
    assert!(deviation > config.routing.loop_offset);

    for node in &layout.nodes {
        if node.id == back.from || node.id == back.to {
            continue;
        }
        let body = node.bounds().inflate(-1.0);
        for seg in back.points.windows(2) {
            assert!(
                !segment_intersects_rect(seg[0], seg[1], &body),
                "loop {loop_id} runs through {}: {:?}",
                node.id,
                back.points
            );
        }
    }
}

fn assert_loop_clears_forward_edges(layout: &Layout, loop_id: &str, config: &LayoutConfig) {
    assert_loop_avoids_nodes(layout, loop_id, config);
    let back = layout.edge(loop_id).unwrap();
    for forward in layout.edges.iter().filter(|edge| !edge.is_loop) {
        for a in back.points.windows(2) {
            for b in forward.points.windows(2) {
                assert!(
                    !segments_intersect(a[0], a[1], b[0], b[1]),
                    "loop {loop_id} crosses {}: {:?}",
                    forward.id,
                    back.points
                );
            }
        }
    }
}

#[test]
fn keyword_back_edge_routes_in_loop_lane() {
    for label in ["驳回", "reject"] {
        let mut graph = chain(&["A", "B", "C"]);
        graph.add_edge("C-A", "C", "A", Some(label.into())).unwrap();
        let config = LayoutConfig::default();
        let layout = compute_layout(&graph, &config);
        assert_loop_clears_forward_edges(&layout, "C-A", &config);
        assert!(layout.warnings.contains(&LayoutWarning::NoRootFallback {
            node_id: "A".into()
        }));
    }
}

#[test]
fn geometric_back_edge_without_keyword_is_a_loop() {
    let mut graph = chain(&["A", "B", "C", "D"]);
    graph.add_edge("D-B", "D", "B", Some("again".into())).unwrap();
    let config = LayoutConfig::default();
    let layout = compute_layout(&graph, &config);
    assert_loop_clears_forward_edges(&layout, "D-B", &config);
}

#[test]
fn branch_reject_loop_clears_siblings() {
    // start -> check (decision) -> yes | no, and no -> check rejected.
    let mut graph = Graph::new();
    graph.add_node("start", ShapeClass::Rectangle, 160.0, 60.0).unwrap();
    graph.add_node("check", ShapeClass::Diamond, 80.0, 80.0).unwrap();
    graph.add_node("yes", ShapeClass::Rectangle, 160.0, 60.0).unwrap();
    graph.add_node("no", ShapeClass::Rectangle, 160.0, 60.0).unwrap();
    graph.add_edge("start-check", "start", "check", None).unwrap();
    graph.add_edge("check-yes", "check", "yes", None).unwrap();
    graph.add_edge("check-no", "check", "no", None).unwrap();
    graph.add_edge("no-check", "no", "check", Some("reject".into())).unwrap();
    let config = LayoutConfig::default();
    let layout = compute_layout(&graph, &config);

    let rank = |id: &str| layout.node(id).and_then(|node| node.rank);
    assert_eq!(rank("check"), Some(1));
    assert_eq!(rank("yes"), Some(2));
    assert_eq!(rank("no"), Some(2));
    for id in ["start-check", "check-yes", "check-no"] {
        assert!(!layout.edge(id).unwrap().is_loop, "{id} should run forward");
    }
    // The decision's right vertex is taken by a branch, so the loop lands
    // on another vertex and still goes through a lane.
    let back = layout.edge("no-check").unwrap();
    assert_ne!(back.target_side, EdgeSide::Right);
    assert_loop_clears_forward_edges(&layout, "no-check", &config);
    assert_valid_routes(&layout, "branch");
}

#[test]
fn pinned_sibling_is_not_cut_by_loop() {
    let mut graph = Graph::new();
    for (id, pos) in [("A", (0.0, 0.0)), ("B", (-110.0, 150.0)), ("C", (110.0, 150.0))] {
        let idx = graph.add_node(id, ShapeClass::Rectangle, 160.0, 60.0).unwrap();
        graph.set_position(idx, pos);
        graph.set_manual(idx, true);
    }
    graph.add_edge("A-B", "A", "B", None).unwrap();
    graph.add_edge("A-C", "A", "C", None).unwrap();
    graph.add_edge("B-A", "B", "A", Some("reject".into())).unwrap();
    let config = LayoutConfig::default();
    let layout = compute_layout(&graph, &config);
    assert_loop_clears_forward_edges(&layout, "B-A", &config);
    assert_valid_routes(&layout, "sibling");
}

#[test]
fn diamond_branches_with_reject_keep_forward_edges_forward() {
    // A -> B, A -> C, B -> D, C -> D and B -> A rejected.
    let mut graph = Graph::new();
    for id in ["A", "B", "C", "D"] {
        graph.add_node(id, ShapeClass::Rectangle, 160.0, 60.0).unwrap();
    }
    for (from, to) in [("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")] {
        graph.add_edge(&format!("{from}-{to}"), from, to, None).unwrap();
    }
    graph.add_edge("B-A", "B", "A", Some("reject".into())).unwrap();
    let config = LayoutConfig::default();
    let layout = compute_layout(&graph, &config);

    let rank = |id: &str| layout.node(id).and_then(|node| node.rank);
    assert_eq!(rank("A"), Some(0));
    assert_eq!((rank("B"), rank("C")), (Some(1), Some(1)));
    assert_eq!(rank("D"), Some(2));
    for edge in layout.edges.iter().filter(|edge| edge.id != "B-A") {
        assert!(!edge.is_loop, "{} should run forward", edge.id);
    }
    // B's right side faces the ring of forward edges, so one crossing is
    // unavoidable; the loop must still keep out of C and D.
    assert_loop_avoids_nodes(&layout, "B-A", &config);
    assert_valid_routes(&layout, "diamond");
}

#[test]
fn parallel_segments_get_spaced() {
    let config = LayoutConfig::default();
    let spacing = config.routing.edge_spacing;
    let mut router = OrthogonalRouter::new(config.routing.clone());
    let request = |source: Point, target: Point| RouteRequest {
        edge_id: "parallel",
        source,
        target,
        source_side: EdgeSide::Bottom,
        target_side: EdgeSide::Top,
        source_bounds: Rect::from_center((source.0, source.1 - 30.0), 160.0, 60.0),
        target_bounds: Rect::from_center((target.0, target.1 + 30.0), 160.0, 60.0),
        is_loop: false,
    };
    let mut warnings = Vec::new();
    let first = router.route(&request((0.0, 0.0), (300.0, 200.0)), &[], &mut warnings);
    let second = router.route(&request((40.0, 6.0), (340.0, 206.0)), &[], &mut warnings);

    let middle_y = |points: &[Point]| points[1].1;
    assert_eq!(first.points.len(), 4);
    assert_eq!(second.points.len(), 4);
    assert!((middle_y(&second.points) - middle_y(&first.points)).abs() >= spacing - 1e-3);
    assert!(warnings.is_empty());
}

#[test]
fn left_right_chain_runs_along_x() {
    let graph = chain(&["A", "B"]);
    let config = LayoutConfig {
        direction: Direction::LeftRight,
        level_gap: 300.0,
        ..LayoutConfig::default()
    };
    let layout = compute_layout(&graph, &config);
    let (a, b) = (center(&layout, "A"), center(&layout, "B"));
    assert_eq!(a.1, b.1);
    assert!((b.0 - a.0 - 300.0).abs() < 1e-4);
    let edge = layout.edge("A-B").unwrap();
    assert_eq!((edge.source_side, edge.target_side), (EdgeSide::Right, EdgeSide::Left));
    assert_eq!(edge.points, vec![(80.0, 0.0), (220.0, 0.0)]);
}

#[test]
fn force_layout_is_deterministic_and_routed() {
    let mut graph = chain(&["A", "B", "C", "D"]);
    graph.add_edge("A-D", "A", "D", None).unwrap();
    let config = LayoutConfig {
        algorithm: LayoutAlgorithm::Force,
        ..LayoutConfig::default()
    };
    let first = compute_layout(&graph, &config);
    let second = compute_layout(&graph, &config);
    for (a, b) in first.nodes.iter().zip(second.nodes.iter()) {
        assert_eq!((a.x, a.y), (b.x, b.y));
        assert!(a.rank.is_none());
    }
    assert_valid_routes(&first, "force");
}

#[test]
fn engine_reroutes_after_removal() {
    let mut engine = Engine::new(fan_out_graph(), LayoutConfig::default());
    let before = engine.run();
    assert_eq!(before.edge("D-E").unwrap().source_offset, -70.0);

    engine.remove_edge("D-F").unwrap();
    let after = engine.run();
    assert_eq!(after.edges.len(), 2);
    assert_eq!(after.edge("D-E").unwrap().source_offset, -60.0);
    assert_eq!(after.edge("D-G").unwrap().source_offset, 60.0);
}

fn load_fixture(path: &Path) -> Graph {
    let input = std::fs::read_to_string(path).expect("fixture read failed");
    let spec: GraphSpec = serde_json::from_str(&input).expect("fixture parse failed");
    Graph::from_spec(&spec, &mut IdGenerator::default()).expect("fixture graph invalid")
}

#[test]
fn layout_all_fixtures() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures");

    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = ["approval_flow.json", "fan_out.json", "pinned_cycle.json"];

    for rel in candidates {
        let path = root.join(rel);
        assert!(path.exists(), "fixture missing: {rel}");
        let graph = load_fixture(&path);
        for algorithm in [LayoutAlgorithm::Layered, LayoutAlgorithm::Force] {
            let config = LayoutConfig {
                algorithm,
                ..LayoutConfig::default()
            };
            let layout = compute_layout(&graph, &config);
            assert_eq!(layout.nodes.len(), graph.node_count(), "{rel}");
            assert_eq!(layout.edges.len(), graph.edge_count(), "{rel}");
            assert_valid_routes(&layout, rel);
            let json = LayoutDump::from_layout(&layout, &config).to_json().unwrap();
            assert!(json.contains("\"edges\""));
        }
    }
}

#[test]
fn approval_fixture_marks_rejection_as_loop() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let graph = load_fixture(&root.join("approval_flow.json"));
    let layout = compute_layout(&graph, &LayoutConfig::default());
    assert!(layout.edge("e4").unwrap().is_loop);
    for id in ["e1", "e2", "e3", "e5"] {
        let edge = layout.edge(id).unwrap();
        assert!(!edge.is_loop, "{id} should run forward");
        let from = layout.node(&edge.from).and_then(|node| node.rank);
        let to = layout.node(&edge.to).and_then(|node| node.rank);
        assert!(to > from, "{id} ranks {from:?} -> {to:?}");
    }
    assert!(layout.warnings.is_empty());
    assert!(layout.edge("e3").unwrap().label_anchor.is_some());
    assert!(layout.edge("e1").unwrap().label_anchor.is_none());
}

#[test]
fn pinned_fixture_keeps_manual_nodes_and_warns() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let graph = load_fixture(&root.join("pinned_cycle.json"));
    let layout = compute_layout(&graph, &LayoutConfig::default());
    assert_eq!(center(&layout, "start"), (0.0, 0.0));
    assert_eq!(center(&layout, "fix"), (420.0, 180.0));
    assert!(layout.warnings.contains(&LayoutWarning::MissingPosition {
        node_id: "ghost".into()
    }));
}
