//! OpenOrd graph layout
//!
//! This crate computes 2D positions for the nodes of large graphs with the
//! OpenOrd multi-stage force-directed algorithm. Repulsion between nodes is
//! approximated by a two-resolution density grid instead of pairwise forces,
//! and a five-stage annealing schedule controls temperature, attraction and
//! the cutting of long edges. It works with any graph implementing
//! petgraph's visitor traits.
//!
//! # Example
//!
//! ```
//! use openord::{GraphDescription, LayoutEngine, OpenOrdLayout};
//! use petgraph::graph::UnGraph;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! // Create a graph, weights are attraction strengths
//! let graph = UnGraph::<(), f64>::from_edges([(0, 1, 1.0), (1, 2, 2.0), (2, 0, 1.0)]);
//!
//! // Create a layout engine
//! let engine = OpenOrdLayout::new(7);
//!
//! // Use the LayoutEngine trait (simple, single call):
//! let positions = engine.layout(&graph).unwrap();
//! assert_eq!(positions.len(), 3);
//!
//! // Or describe the graph once and drive the run iteration by iteration
//! let description = GraphDescription::weighted(&graph).unwrap().unwrap();
//! let mut run = engine.start_run(0, &description);
//! let mut rng = StdRng::seed_from_u64(7);
//! run.scatter(&mut rng, engine.initial_spread);
//! while run.iterate(&mut rng).unwrap() {}
//! let positions = run.positions();
//! ```

mod engine;
mod geometry;

pub mod openord;

// Re-export core types and traits
pub use engine::LayoutEngine;
pub use geometry::Vec2;

// Re-export petgraph visitor traits for graph abstraction
pub use petgraph::visit::{GraphBase, IntoEdgeReferences, IntoNeighborsDirected, IntoNodeIdentifiers};
pub use petgraph::Direction;

// Re-export OpenOrd layout types
pub use openord::{
    AnnealingSchedule, AsWeight, DensityConfig, DensityField, DescriptionError, EdgeCutConfig,
    EdgeCutPolicy, GraphDescription, LayoutError, LayoutRunState, OpenOrdError, OpenOrdLayout,
    ScheduleConfig, Stage, StageParams,
};
