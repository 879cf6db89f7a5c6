use crate::config::{LayoutAlgorithm, LayoutConfig, load_config};
use crate::ir::{Direction, Graph, GraphSpec, IdGenerator};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "orthoflow",
    version,
    about = "Orthogonal graph layout and connector routing"
)]
pub struct Args {
    /// Input graph (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON/JSON5 file (camelCase keys)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout engine, overrides the config file
    #[arg(short = 'a', long = "algorithm", value_enum)]
    pub algorithm: Option<AlgorithmArg>,

    /// Primary axis, overrides the config file
    #[arg(short = 'd', long = "direction", value_enum)]
    pub direction: Option<DirectionArg>,

    /// Log debug output to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum AlgorithmArg {
    Layered,
    Force,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DirectionArg {
    #[value(name = "TD", alias = "TB")]
    Td,
    #[value(name = "LR")]
    Lr,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let input = read_input(args.input.as_deref())?;
    let graph = parse_graph(&input)?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );

    let layout = compute_layout(&graph, &config);
    write_layout_dump(args.output.as_deref(), &layout, &config)?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn apply_overrides(config: &mut LayoutConfig, args: &Args) {
    if let Some(algorithm) = args.algorithm {
        config.algorithm = match algorithm {
            AlgorithmArg::Layered => LayoutAlgorithm::Layered,
            AlgorithmArg::Force => LayoutAlgorithm::Force,
        };
    }
    if let Some(direction) = args.direction {
        config.direction = match direction {
            DirectionArg::Td => Direction::TopDown,
            DirectionArg::Lr => Direction::LeftRight,
        };
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn parse_graph(input: &str) -> Result<Graph> {
    let spec: GraphSpec = serde_json::from_str(input).context("parsing graph JSON")?;
    let mut ids = IdGenerator::default();
    Ok(Graph::from_spec(&spec, &mut ids)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_and_reports_construction_errors() {
        let graph = parse_graph(
            r#"{"nodes": [{"id": "a"}, {"id": "b", "shape": "diamond"}],
                "edges": [{"source": "a", "target": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edge_index("edge-0").is_some());

        let err = parse_graph(
            r#"{"nodes": [{"id": "a"}], "edges": [{"source": "a", "target": "ghost"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from(["orthoflow", "--algorithm", "force", "--direction", "LR"]);
        let mut config = LayoutConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.algorithm, LayoutAlgorithm::Force);
        assert_eq!(config.direction, Direction::LeftRight);
    }
}
