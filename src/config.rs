use crate::ir::Direction;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Labels that mark an edge as flowing backwards regardless of geometry.
pub const DEFAULT_LOOP_KEYWORDS: &str = r"(?i)\b(return|returned|reject|rejected|withdraw|withdrawn|back)\b|驳回|退回|撤回|返回|拒绝";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    #[default]
    Layered,
    Force,
}

impl LayoutAlgorithm {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "layered" | "dag" | "hierarchical" => Some(Self::Layered),
            "force" | "physics" => Some(Self::Force),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    pub iterations: usize,
    pub node_repulsion: f32,
    pub edge_attraction: f32,
    pub damping: f32,
    pub center_gravity: f32,
    /// Radius of the circle unpositioned nodes are seeded on.
    pub seed_radius: f32,
    /// Per-iteration displacement cap.
    pub max_step: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            node_repulsion: 8000.0,
            edge_attraction: 0.02,
            damping: 0.85,
            center_gravity: 0.01,
            seed_radius: 200.0,
            max_step: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub min_clearance: f32,
    pub loop_offset: f32,
    pub same_side_clearance: f32,
    /// Cross-axis slack within which opposite ports are joined by one
    /// straight segment.
    pub align_tolerance: f32,
    /// Spacing between parallel segments after collision avoidance.
    pub edge_spacing: f32,
    /// Grid for the final snap; 0 disables snapping.
    pub grid_size: f32,
    pub loop_keywords: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_clearance: 20.0,
            loop_offset: 40.0,
            same_side_clearance: 40.0,
            align_tolerance: 4.0,
            edge_spacing: 12.0,
            grid_size: 0.0,
            loop_keywords: DEFAULT_LOOP_KEYWORDS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub offset: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self { offset: 12.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub algorithm: LayoutAlgorithm,
    pub node_gap: f32,
    pub level_gap: f32,
    pub order_passes: usize,
    pub force: ForceConfig,
    pub routing: RoutingConfig,
    pub label: LabelConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopDown,
            algorithm: LayoutAlgorithm::Layered,
            node_gap: 60.0,
            level_gap: 120.0,
            order_passes: 4,
            force: ForceConfig::default(),
            routing: RoutingConfig::default(),
            label: LabelConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ForceConfigFile {
    iterations: Option<usize>,
    node_repulsion: Option<f32>,
    edge_attraction: Option<f32>,
    damping: Option<f32>,
    center_gravity: Option<f32>,
    seed_radius: Option<f32>,
    max_step: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    min_clearance: Option<f32>,
    loop_offset: Option<f32>,
    same_side_clearance: Option<f32>,
    align_tolerance: Option<f32>,
    edge_spacing: Option<f32>,
    grid_size: Option<f32>,
    loop_keywords: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    direction: Option<String>,
    algorithm: Option<String>,
    node_gap: Option<f32>,
    level_gap: Option<f32>,
    #[serde(alias = "crossingPasses")]
    order_passes: Option<usize>,
    force: Option<ForceConfigFile>,
    routing: Option<RoutingConfigFile>,
    label_offset: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Overlay a camelCase JSON/JSON5 document onto the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<LayoutConfig> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = LayoutConfig::default();

    if let Some(token) = parsed.direction.as_deref() {
        config.direction = Direction::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown direction: {token}"))?;
    }
    if let Some(token) = parsed.algorithm.as_deref() {
        config.algorithm = LayoutAlgorithm::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown layout algorithm: {token}"))?;
    }
    if let Some(v) = parsed.node_gap {
        config.node_gap = v;
    }
    if let Some(v) = parsed.level_gap {
        config.level_gap = v;
    }
    if let Some(v) = parsed.order_passes {
        config.order_passes = v;
    }
    if let Some(v) = parsed.label_offset {
        config.label.offset = v;
    }
    if let Some(force) = parsed.force {
        if let Some(v) = force.iterations {
            config.force.iterations = v;
        }
        if let Some(v) = force.node_repulsion {
            config.force.node_repulsion = v;
        }
        if let Some(v) = force.edge_attraction {
            config.force.edge_attraction = v;
        }
        if let Some(v) = force.damping {
            config.force.damping = v;
        }
        if let Some(v) = force.center_gravity {
            config.force.center_gravity = v;
        }
        if let Some(v) = force.seed_radius {
            config.force.seed_radius = v;
        }
        if let Some(v) = force.max_step {
            config.force.max_step = v;
        }
    }
    if let Some(routing) = parsed.routing {
        if let Some(v) = routing.min_clearance {
            config.routing.min_clearance = v;
        }
        if let Some(v) = routing.loop_offset {
            config.routing.loop_offset = v;
        }
        if let Some(v) = routing.same_side_clearance {
            config.routing.same_side_clearance = v;
        }
        if let Some(v) = routing.align_tolerance {
            config.routing.align_tolerance = v;
        }
        if let Some(v) = routing.edge_spacing {
            config.routing.edge_spacing = v;
        }
        if let Some(v) = routing.grid_size {
            config.routing.grid_size = v;
        }
        if let Some(v) = routing.loop_keywords {
            regex::Regex::new(&v)?;
            config.routing.loop_keywords = v;
        }
    }
    Ok(config)
}
