use petgraph::visit::{EdgeRef, IntoEdgeReferences, IntoNeighborsDirected, IntoNodeIdentifiers};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Errors found while scanning the edges of a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptionError<N>
where
    N: fmt::Debug,
{
    /// An edge carries a negative (or NaN) weight
    #[error("edge {from:?} -> {to:?} has invalid weight {weight}")]
    InvalidWeight { from: N, to: N, weight: f64 },

    /// An edge of a weighted graph has no weight
    #[error("edge {from:?} -> {to:?} has no weight")]
    MissingWeight { from: N, to: N },
}

/// Edge data usable as an attraction weight
pub trait AsWeight {
    /// The weight, or `None` if this edge has none
    fn as_weight(&self) -> Option<f64>;
}

impl AsWeight for () {
    fn as_weight(&self) -> Option<f64> {
        Some(1.0)
    }
}

macro_rules! impl_as_weight {
    ($($ty:ty),*) => {
        $(
            impl AsWeight for $ty {
                fn as_weight(&self) -> Option<f64> {
                    Some(*self as f64)
                }
            }
        )*
    };
}

impl_as_weight!(f32, f64, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl<T: AsWeight> AsWeight for Option<T> {
    fn as_weight(&self) -> Option<f64> {
        self.as_ref().and_then(AsWeight::as_weight)
    }
}

impl<T: AsWeight + ?Sized> AsWeight for &T {
    fn as_weight(&self) -> Option<f64> {
        (**self).as_weight()
    }
}

/// Dense, indexed view of a graph, built once and shared by layout runs
///
/// Node ids are mapped onto `0..len()` in the graph's enumeration order.
/// Edges are stored as symmetric neighbor lists with weights divided by the
/// highest weight found, so attraction strength is always in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct GraphDescription<N> {
    index_of: HashMap<N, usize>,
    nodes: Vec<N>,
    neighbors: Vec<Vec<(usize, f64)>>,
    edge_count: usize,
    highest_weight: f64,
}

impl<N> GraphDescription<N>
where
    N: Copy + Eq + Hash + fmt::Debug,
{
    /// Describe a graph whose edges all have weight one
    ///
    /// Returns `Ok(None)` for a graph without nodes.
    pub fn unweighted<G>(graph: G) -> Result<Option<Self>, DescriptionError<N>>
    where
        G: IntoNodeIdentifiers<NodeId = N> + IntoEdgeReferences,
    {
        let edges = graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), Some(1.0)));
        Self::scan(graph.node_identifiers(), edges, false)
    }

    /// Describe a graph using the weights carried on its edges
    ///
    /// Returns `Ok(None)` for a graph without nodes.
    pub fn weighted<G>(graph: G) -> Result<Option<Self>, DescriptionError<N>>
    where
        G: IntoNodeIdentifiers<NodeId = N> + IntoEdgeReferences,
        G::EdgeWeight: AsWeight,
    {
        let edges = graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight().as_weight()));
        Self::scan(graph.node_identifiers(), edges, true)
    }

    /// Describe a graph by walking its edge list and looking up each weight
    /// by endpoint pair
    pub fn with_lookup<G, F>(graph: G, mut weight: F) -> Result<Option<Self>, DescriptionError<N>>
    where
        G: IntoNodeIdentifiers<NodeId = N> + IntoEdgeReferences,
        F: FnMut(N, N) -> Option<f64>,
    {
        let edges = graph.edge_references().map(|edge| {
            let (from, to) = (edge.source(), edge.target());
            (from, to, weight(from, to))
        });
        Self::scan(graph.node_identifiers(), edges, true)
    }

    /// Describe a graph by walking the outgoing neighbors of every node and
    /// looking up each weight by endpoint pair
    pub fn with_adjacency_lookup<G, F>(
        graph: G,
        mut weight: F,
    ) -> Result<Option<Self>, DescriptionError<N>>
    where
        G: IntoNodeIdentifiers<NodeId = N> + IntoNeighborsDirected,
        F: FnMut(N, N) -> Option<f64>,
    {
        let edges = graph
            .node_identifiers()
            .flat_map(move |from| {
                graph
                    .neighbors_directed(from, Direction::Outgoing)
                    .map(move |to| (from, to))
            })
            .map(|(from, to)| (from, to, weight(from, to)));
        Self::scan(graph.node_identifiers(), edges, true)
    }

    fn scan<I, E>(nodes: I, edges: E, weighted: bool) -> Result<Option<Self>, DescriptionError<N>>
    where
        I: IntoIterator<Item = N>,
        E: IntoIterator<Item = (N, N, Option<f64>)>,
    {
        let mut index_of = HashMap::new();
        let mut ids = Vec::new();
        for node in nodes {
            index_of.entry(node).or_insert_with(|| {
                ids.push(node);
                ids.len() - 1
            });
        }
        if ids.is_empty() {
            return Ok(None);
        }

        let mut adjacency = vec![BTreeMap::new(); ids.len()];
        let mut highest = 0.0f64;
        for (from, to, weight) in edges {
            let weight = weight.ok_or(DescriptionError::MissingWeight { from, to })?;
            if weight.is_nan() || weight < 0.0 {
                return Err(DescriptionError::InvalidWeight { from, to, weight });
            }
            highest = highest.max(weight);

            let (Some(&u), Some(&v)) = (index_of.get(&from), index_of.get(&to)) else {
                continue;
            };
            if u != v {
                adjacency[u].insert(v, weight);
                adjacency[v].insert(u, weight);
            }
        }

        let highest_weight = if weighted && highest > 0.0 { highest } else { 1.0 };
        let neighbors: Vec<Vec<_>> = adjacency
            .into_iter()
            .map(|edges| {
                edges
                    .into_iter()
                    .map(|(v, w)| (v, w / highest_weight))
                    .collect()
            })
            .collect();
        let edge_count = neighbors.iter().map(Vec::len).sum::<usize>() / 2;

        Ok(Some(Self {
            index_of,
            nodes: ids,
            neighbors,
            edge_count,
            highest_weight,
        }))
    }
}

impl<N> GraphDescription<N>
where
    N: Copy + Eq + Hash,
{
    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false, empty graphs have no description
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dense index of `node`
    pub fn index_of(&self, node: N) -> Option<usize> {
        self.index_of.get(&node).copied()
    }

    /// Node ids, by dense index
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Neighbors of the node at `index` with their normalized weights
    pub fn neighbors(&self, index: usize) -> &[(usize, f64)] {
        &self.neighbors[index]
    }

    /// Number of distinct undirected edges, self loops excluded
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Largest edge weight, used to normalize attraction
    pub fn highest_weight(&self) -> f64 {
        self.highest_weight
    }
}
