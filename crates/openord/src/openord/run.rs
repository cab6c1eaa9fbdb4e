use super::density::{DensityField, Node};
use super::description::GraphDescription;
use super::edge_cut::EdgeCutPolicy;
use super::schedule::{AnnealingSchedule, Stage};
use super::{LayoutError, OpenOrdLayout};
use crate::Vec2;
use rand::Rng;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// State of one layout run over a graph description
///
/// The run is advanced by an external loop calling [`iterate`], one full
/// pass over the nodes per call. Every node update removes the node from the
/// density field, picks the lower-energy of an analytic and a jittered
/// candidate position, and inserts it back.
///
/// [`iterate`]: LayoutRunState::iterate
#[derive(Debug)]
pub struct LayoutRunState<'a, N> {
    id: usize,
    workers: usize,
    description: &'a GraphDescription<N>,
    nodes: Vec<Node>,
    density: DensityField,
    schedule: AnnealingSchedule,
    edge_cut: EdgeCutPolicy,
    first_add: bool,
    fine_first_add: bool,
    fixed_until: usize,
    total_iterations: usize,
    edges_cut: usize,
    // Reused per node update
    attracting: Vec<(usize, f64)>,
    start: Option<Instant>,
    stop: Option<Instant>,
}

impl<'a, N> LayoutRunState<'a, N>
where
    N: Copy + Eq + Hash,
{
    pub fn new(id: usize, description: &'a GraphDescription<N>, config: &OpenOrdLayout) -> Self {
        let edge_cut = EdgeCutPolicy::new(&config.edge_cut, description.edge_count());
        if edge_cut.is_enabled() {
            debug!(
                "Run {id}: cutting edges of {} over squared length {}",
                description.edge_count(),
                edge_cut.length()
            );
        }

        Self {
            id,
            workers: config.workers,
            description,
            nodes: (0..description.len()).map(Node::new).collect(),
            density: DensityField::new(config.density.clone()),
            schedule: AnnealingSchedule::new(config.schedule.clone()),
            edge_cut,
            first_add: true,
            fine_first_add: true,
            fixed_until: 0,
            total_iterations: 0,
            edges_cut: 0,
            attracting: Vec::new(),
            start: None,
            stop: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Worker count the caller partitions work over, informational only
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn description(&self) -> &'a GraphDescription<N> {
        self.description
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn density(&self) -> &DensityField {
        &self.density
    }

    pub fn schedule(&self) -> &AnnealingSchedule {
        &self.schedule
    }

    pub fn stage(&self) -> Stage {
        self.schedule.stage()
    }

    pub fn edge_cut(&self) -> &EdgeCutPolicy {
        &self.edge_cut
    }

    /// Full passes completed so far
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    /// Edges left out of node updates by the edge cut so far, counted once
    /// per edge and iteration
    pub fn edges_cut(&self) -> usize {
        self.edges_cut
    }

    pub fn is_finished(&self) -> bool {
        self.schedule.is_finished()
    }

    /// Wall time between the first iteration and the last one (or now)
    pub fn elapsed(&self) -> Duration {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => stop - start,
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Spread every movable node uniformly over a square of side `spread`
    /// centered on the origin
    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R, spread: f64) {
        for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
            node.position = Vec2::new(
                (rng.random::<f64>() - 0.5) * spread,
                (rng.random::<f64>() - 0.5) * spread,
            );
        }
    }

    /// Set the starting position of `node`, optionally pinning it
    ///
    /// Returns false if `node` is not part of the description. Only
    /// meaningful before the first iteration.
    pub fn place(&mut self, node: N, position: Vec2, fixed: bool) -> bool {
        let Some(index) = self.description.index_of(node) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.position = position;
        node.fixed = fixed;
        true
    }

    /// Keep pinned nodes in place until `iterations` passes have completed
    pub fn fix_until(&mut self, iterations: usize) {
        self.fixed_until = iterations;
    }

    fn is_held(&self, index: usize) -> bool {
        self.nodes[index].fixed && self.total_iterations < self.fixed_until
    }

    /// Current position of every node
    pub fn positions(&self) -> HashMap<N, Vec2> {
        self.description
            .nodes()
            .iter()
            .zip(&self.nodes)
            .map(|(&id, node)| (id, node.position))
            .collect()
    }

    /// Run one pass over all nodes and advance the schedule
    ///
    /// Returns whether further iterations remain. A returned error leaves
    /// the density field inconsistent and ends the run.
    pub fn iterate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<bool, LayoutError> {
        if self.schedule.is_finished() {
            return Ok(false);
        }

        let started = Instant::now();
        if self.start.is_none() {
            info!(
                "Run {id}: laying out {nodes} nodes, {edges} edges",
                id = self.id,
                nodes = self.nodes.len(),
                edges = self.description.edge_count()
            );
            self.start = Some(started);
        }

        let stage = self.schedule.stage();
        let fine = stage.fine_density();
        for index in 0..self.nodes.len() {
            self.update_node(index, stage, fine, rng)?;
        }
        self.first_add = false;
        if fine {
            self.fine_first_add = false;
        }
        self.total_iterations += 1;
        self.schedule.record_elapsed(started.elapsed());

        self.edge_cut.decay(stage);
        trace!(
            "Run {id}: {stage} iteration {iteration}, cut length {length}",
            id = self.id,
            iteration = self.schedule.iteration(),
            length = self.edge_cut.length()
        );
        if let Some(next) = self.schedule.advance() {
            debug!(
                "Run {id}: {stage} done in {elapsed:?}, entering {next}",
                id = self.id,
                elapsed = self.schedule.elapsed(stage)
            );
        }
        if self.schedule.stage() > Stage::Cooldown {
            self.edge_cut.settle();
        }

        if self.schedule.is_finished() {
            self.stop = Some(Instant::now());
            info!(
                "Run {id}: finished {iterations} iterations in {elapsed:?}, {cut} edges cut",
                id = self.id,
                iterations = self.total_iterations,
                elapsed = self.elapsed(),
                cut = self.edges_cut
            );
        }
        Ok(!self.schedule.is_finished())
    }

    /// Iterate until the schedule is exhausted
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), LayoutError> {
        while self.iterate(rng)? {}
        Ok(())
    }

    fn update_node<R: Rng + ?Sized>(
        &mut self,
        index: usize,
        stage: Stage,
        fine: bool,
        rng: &mut R,
    ) -> Result<(), LayoutError> {
        self.density
            .remove(&self.nodes[index], self.first_add, self.fine_first_add, fine)?;

        if self.is_held(index) {
            return self.density.insert(&mut self.nodes[index], fine);
        }

        let params = *self.schedule.current();
        self.collect_attracting(index, stage);

        let analytic = self.solve_analytic(index, params.damping);
        let jump = 0.01 * params.temperature;
        let jittered = analytic
            + Vec2::new(
                (0.5 - rng.random::<f64>()) * jump,
                (0.5 - rng.random::<f64>()) * jump,
            );

        let analytic_energy = self.energy(analytic, stage, params.attraction, fine);
        let jittered_energy = self.energy(jittered, stage, params.attraction, fine);

        let node = &mut self.nodes[index];
        if analytic_energy < jittered_energy {
            node.position = analytic;
            node.energy = analytic_energy;
        } else {
            node.position = jittered;
            node.energy = jittered_energy;
        }
        self.density.insert(node, fine)
    }

    /// Gather the neighbors of `index` that take part in attraction
    fn collect_attracting(&mut self, index: usize, stage: Stage) {
        let description = self.description;
        let position = self.nodes[index].position;
        self.attracting.clear();
        for &(neighbor, weight) in description.neighbors(index) {
            let distance = position.distance_squared(self.nodes[neighbor].position);
            if self.edge_cut.cuts(stage, distance) {
                // Both endpoints see the edge, only the lower one counts it
                if index < neighbor {
                    self.edges_cut += 1;
                }
                continue;
            }
            self.attracting.push((neighbor, weight));
        }
    }

    /// Move toward the weighted centroid of the attracting neighbors
    fn solve_analytic(&self, index: usize, damping: f64) -> Vec2 {
        let position = self.nodes[index].position;
        let mut total = 0.0;
        let mut centroid = Vec2::zero();
        for &(neighbor, weight) in &self.attracting {
            total += weight;
            centroid = centroid + self.nodes[neighbor].position * weight;
        }
        if total <= 0.0 {
            return position;
        }
        position * (1.0 - damping) + centroid * (damping / total)
    }

    /// Attraction energy at `position` plus the sampled density there
    fn energy(&self, position: Vec2, stage: Stage, attraction: f64, fine: bool) -> f64 {
        let factor = attraction.powi(4) * 2e-2;
        let attraction_energy: f64 = self
            .attracting
            .iter()
            .map(|&(neighbor, weight)| {
                let distance = position.distance_squared(self.nodes[neighbor].position);
                weight * factor * stage.attraction_distance(distance)
            })
            .sum();
        attraction_energy + self.density.sample(position, fine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::{NodeIndex, UnGraph};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_log::test;

    fn path(n: u32) -> UnGraph<(), ()> {
        UnGraph::from_edges((0..n - 1).map(|i| (i, i + 1)))
    }

    fn short_schedule() -> OpenOrdLayout {
        let mut config = OpenOrdLayout::default();
        for stage in Stage::ALL {
            config.schedule.params_mut(stage).iterations = 3;
        }
        config
    }

    #[test]
    fn nodes_start_at_origin_until_scattered() {
        let graph = path(3);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = OpenOrdLayout::default();
        let mut run = LayoutRunState::new(0, &description, &config);
        assert!(run.nodes().iter().all(|n| n.position == Vec2::zero()));

        let mut rng = StdRng::seed_from_u64(1);
        run.scatter(&mut rng, 10.0);
        for node in run.nodes() {
            assert!(node.position.x.abs() <= 5.0 && node.position.y.abs() <= 5.0);
        }
    }

    #[test]
    fn iterate_walks_the_schedule() {
        let graph = path(4);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = short_schedule();
        let mut run = LayoutRunState::new(3, &description, &config);
        let mut rng = StdRng::seed_from_u64(7);
        run.scatter(&mut rng, 50.0);

        let mut stages = Vec::new();
        loop {
            stages.push(run.stage());
            if !run.iterate(&mut rng).unwrap() {
                break;
            }
        }
        assert_eq!(stages.len(), 15);
        assert_eq!(stages[0], Stage::Liquid);
        assert_eq!(stages[14], Stage::Simmer);
        assert!(run.is_finished());
        assert_eq!(run.total_iterations(), 15);
        assert_eq!(run.id(), 3);

        // Once finished, iterating is a no-op
        let before = run.positions();
        assert!(!run.iterate(&mut rng).unwrap());
        assert_eq!(run.positions(), before);
        assert_eq!(run.total_iterations(), 15);
    }

    #[test]
    fn density_moves_to_fine_grid_in_simmer() {
        let graph = path(3);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = short_schedule();
        let mut run = LayoutRunState::new(0, &description, &config);
        let mut rng = StdRng::seed_from_u64(11);
        run.scatter(&mut rng, 50.0);
        run.run(&mut rng).unwrap();

        // Every node left the coarse grid when it entered the fine one
        let size = config.density.grid_size;
        let coarse_mass: f64 = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .map(|(x, y)| run.density().coarse_value(x, y))
            .sum();
        assert!(coarse_mass.abs() < 1e-6);

        let mut occupants: Vec<usize> = run
            .nodes()
            .iter()
            .flat_map(|node| {
                let cell = |c: f64| ((c + 2000.5) * 0.25).floor() as usize;
                run.density()
                    .occupants(cell(node.sub_position.x), cell(node.sub_position.y))
                    .filter(move |&i| i == node.index)
            })
            .collect();
        occupants.sort_unstable();
        assert_eq!(occupants, vec![0, 1, 2]);
    }

    #[test]
    fn pinned_nodes_hold_until_released() {
        let graph = path(3);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = short_schedule();
        let mut run = LayoutRunState::new(0, &description, &config);
        let mut rng = StdRng::seed_from_u64(5);
        run.scatter(&mut rng, 50.0);

        let pinned = Vec2::new(30.0, -20.0);
        assert!(run.place(NodeIndex::new(0), pinned, true));
        assert!(!run.place(NodeIndex::new(9), pinned, true));
        run.fix_until(4);

        for _ in 0..4 {
            run.iterate(&mut rng).unwrap();
            assert_eq!(run.positions()[&NodeIndex::new(0)], pinned);
        }
        run.run(&mut rng).unwrap();
        assert_ne!(run.positions()[&NodeIndex::new(0)], pinned);
    }

    #[test]
    fn same_seed_same_layout() {
        let graph = path(5);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = short_schedule();

        let layout = |seed| {
            let mut run = LayoutRunState::new(0, &description, &config);
            let mut rng = StdRng::seed_from_u64(seed);
            run.scatter(&mut rng, 50.0);
            run.run(&mut rng).unwrap();
            run.positions()
        };
        assert_eq!(layout(9), layout(9));
    }

    #[test]
    fn out_of_bounds_ends_the_run() {
        let graph = path(2);
        let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
        let config = short_schedule();
        let mut run = LayoutRunState::new(0, &description, &config);
        run.place(NodeIndex::new(0), Vec2::new(1990.0, 0.0), true);
        run.place(NodeIndex::new(1), Vec2::new(1990.0, 0.0), true);
        run.fix_until(usize::MAX);

        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            run.iterate(&mut rng),
            Err(LayoutError::OutOfBounds { .. })
        ));
    }
}
