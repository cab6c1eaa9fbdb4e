mod density;
mod description;
mod edge_cut;
mod queue;
mod run;
mod schedule;

use crate::{LayoutEngine, Vec2};
use petgraph::visit::{IntoEdgeReferences, IntoNodeIdentifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

pub use density::{DensityConfig, DensityField, Node};
pub use description::{AsWeight, DescriptionError, GraphDescription};
pub use edge_cut::{EdgeCutConfig, EdgeCutPolicy};
pub use queue::{EmptyQueue, FifoQueue};
pub use run::LayoutRunState;
pub use schedule::{AnnealingSchedule, ScheduleConfig, Stage, StageParams};

/// Broken invariants of a running layout
///
/// These come from misuse of the density field rather than from the input
/// graph, and end the run that hit them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A node drifted off the grid, kernel footprint included
    #[error("node at cell ({x}, {y}) is outside the density grid")]
    OutOfBounds { x: i64, y: i64 },

    /// A fine removal found no occupant to remove
    #[error("no occupant to remove from cell ({x}, {y})")]
    EmptyQueue { x: usize, y: usize },
}

/// Errors of a complete layout
#[derive(Debug, Error)]
pub enum OpenOrdError<N>
where
    N: fmt::Debug,
{
    #[error(transparent)]
    Description(#[from] DescriptionError<N>),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Configuration for the OpenOrd multi-stage force-directed layout
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct OpenOrdLayout {
    /// Iteration budget and force parameters of each stage
    pub schedule: ScheduleConfig,

    /// Grid resolution, viewport and density tuning
    pub density: DensityConfig,

    /// Long edge cutting
    pub edge_cut: EdgeCutConfig,

    /// Side of the square around the origin nodes start in
    pub initial_spread: f64,

    /// Seed of the jitter generator
    pub seed: u64,

    /// Number of workers the node set is partitioned over by the caller,
    /// informational only
    pub workers: usize,
}

impl Default for OpenOrdLayout {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            density: DensityConfig::default(),
            edge_cut: EdgeCutConfig::default(),
            initial_spread: 100.0,
            seed: 42,
            workers: 1,
        }
    }
}

impl OpenOrdLayout {
    /// Create a layout with default parameters and the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Start a run over `description`, to be driven by the caller
    ///
    /// Nodes start at the origin; use [`LayoutRunState::scatter`] or
    /// [`LayoutRunState::place`] before the first iteration.
    pub fn start_run<'a, N>(
        &self,
        id: usize,
        description: &'a GraphDescription<N>,
    ) -> LayoutRunState<'a, N>
    where
        N: Copy + Eq + Hash,
    {
        LayoutRunState::new(id, description, self)
    }

    /// Lay out an already described graph (reusable across runs)
    pub fn layout_description<N>(
        &self,
        description: &GraphDescription<N>,
    ) -> Result<HashMap<N, Vec2>, LayoutError>
    where
        N: Copy + Eq + Hash,
    {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut run = self.start_run(0, description);
        run.scatter(&mut rng, self.initial_spread);
        run.run(&mut rng)?;
        Ok(run.positions())
    }
}

// Any graph whose edge data can act as a weight, `()` counting as one
impl<G> LayoutEngine<G> for OpenOrdLayout
where
    G: IntoNodeIdentifiers + IntoEdgeReferences,
    G::EdgeWeight: AsWeight,
    G::NodeId: Copy + Eq + Hash + fmt::Debug,
{
    type NodeId = G::NodeId;
    type Error = OpenOrdError<G::NodeId>;

    fn layout(&self, graph: G) -> Result<HashMap<Self::NodeId, Vec2>, Self::Error> {
        let Some(description) = GraphDescription::weighted(graph)? else {
            return Ok(HashMap::new());
        };
        Ok(self.layout_description(&description)?)
    }
}
