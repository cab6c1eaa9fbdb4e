use crate::Vec2;
use std::collections::HashMap;
use std::hash::Hash;

/// A layout engine that can compute positions for graph nodes
///
/// This trait is generic over the graph type `G`, so each engine states the
/// graph capabilities it needs through petgraph's visitor traits.
pub trait LayoutEngine<G> {
    /// The type used to identify nodes in the graph
    type NodeId: Copy + Eq + Hash;

    /// The error returned when the graph cannot be laid out
    type Error;

    /// Compute node positions for the given graph
    ///
    /// # Errors
    /// Returns an error if the graph is rejected (e.g. invalid edge weights)
    /// or if the layout computation hits a broken invariant
    fn layout(&self, graph: G) -> Result<HashMap<Self::NodeId, Vec2>, Self::Error>;
}
