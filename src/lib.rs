#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutAlgorithm, LayoutConfig};
pub use engine::Engine;
pub use ir::{Direction, Graph, GraphError, GraphSpec, IdGenerator, ShapeClass};
pub use layout::{Layout, compute_layout};
