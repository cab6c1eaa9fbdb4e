use openord::{
    DescriptionError, GraphDescription, LayoutEngine, OpenOrdError, OpenOrdLayout, Stage, Vec2,
};
use petgraph::graph::{NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_log::test;

fn ring(n: u32) -> UnGraph<(), ()> {
    UnGraph::from_edges((0..n).map(|i| (i, (i + 1) % n)))
}

#[test]
fn four_cycle_runs_through_every_stage() {
    let graph = ring(4);
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::default();
    let mut run = engine.start_run(0, &description);
    let mut rng = StdRng::seed_from_u64(engine.seed);
    run.scatter(&mut rng, engine.initial_spread);

    let mut seen = Vec::new();
    loop {
        if seen.last() != Some(&run.stage()) {
            seen.push(run.stage());
        }
        if !run.iterate(&mut rng).unwrap() {
            break;
        }
    }

    assert_eq!(seen, Stage::ALL);
    assert!(run.is_finished());
    assert_eq!(run.stage(), Stage::Simmer);
    assert_eq!(run.total_iterations(), engine.schedule.total_iterations());
    assert_eq!(run.schedule().iteration(), engine.schedule.simmer.iterations);

    let positions: Vec<Vec2> = run.positions().into_values().collect();
    assert_eq!(positions.len(), 4);
    let half = engine.density.view_size / 2.0;
    for (i, a) in positions.iter().enumerate() {
        assert!(a.is_finite());
        assert!(a.x.abs() < half && a.y.abs() < half, "{a:?} left the viewport");
        for b in &positions[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn layout_engine_places_every_node() {
    let graph = UnGraph::<(), f64>::from_edges([(0, 1, 3.0), (1, 2, 1.0), (2, 3, 1.0), (3, 1, 0.5)]);
    let positions = OpenOrdLayout::new(3).layout(&graph).unwrap();
    assert_eq!(positions.len(), 4);
    for index in graph.node_indices() {
        assert!(positions[&index].is_finite());
    }
}

#[test]
fn negative_weight_fails_before_layout() {
    let graph = UnGraph::<(), f64>::from_edges([(0, 1, -1.0)]);
    let err = OpenOrdLayout::default().layout(&graph).unwrap_err();
    assert!(matches!(
        err,
        OpenOrdError::Description(DescriptionError::InvalidWeight { weight, .. }) if weight == -1.0
    ));
}

#[test]
fn empty_graph_has_empty_layout() {
    let graph = UnGraph::<(), ()>::new_undirected();
    let positions = OpenOrdLayout::default().layout(&graph).unwrap();
    assert!(positions.is_empty());
}

#[test]
fn same_seed_same_layout() {
    let graph = ring(6);
    let engine = OpenOrdLayout::new(11);
    assert_eq!(engine.layout(&graph).unwrap(), engine.layout(&graph).unwrap());
}

#[test]
fn description_is_reusable_across_runs() {
    let graph = ring(5);
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::new(5);
    let first = engine.layout_description(&description).unwrap();
    let second = engine.layout_description(&description).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, engine.layout(&graph).unwrap());
}

/// Drive a run over `ring(n)` with node 0 placed far from the others and
/// report whether the edge cut kicked in during the first iteration
fn cuts_far_edge(n: u32) -> (bool, usize) {
    let graph = ring(n);
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::default();
    let mut run = engine.start_run(0, &description);
    let mut rng = StdRng::seed_from_u64(1);
    run.scatter(&mut rng, 20.0);
    run.place(NodeIndex::new(0), Vec2::new(1000.0, 0.0), false);

    run.iterate(&mut rng).unwrap();
    (run.edge_cut().is_enabled(), run.edges_cut())
}

#[test]
fn thirty_edges_cut_ten_edges_do_not() {
    // Only the two edges touching node 0 are long, each counted once
    let (enabled, cut) = cuts_far_edge(30);
    assert!(enabled);
    assert_eq!(cut, 2);

    let (enabled, cut) = cuts_far_edge(10);
    assert!(!enabled);
    assert_eq!(cut, 0);
}

#[test]
fn small_graph_never_cuts_over_a_full_run() {
    let graph = ring(10);
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::default();
    let mut run = engine.start_run(0, &description);
    let mut rng = StdRng::seed_from_u64(2);
    run.scatter(&mut rng, 2000.0);
    run.run(&mut rng).unwrap();
    assert_eq!(run.edges_cut(), 0);
}

#[test]
fn cut_length_only_shrinks() {
    let graph = ring(30);
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::default();
    let mut run = engine.start_run(0, &description);
    let mut rng = StdRng::seed_from_u64(3);
    run.scatter(&mut rng, engine.initial_spread);

    let floor = run.edge_cut().floor();
    let mut previous = run.edge_cut().length();
    while run.iterate(&mut rng).unwrap() {
        let length = run.edge_cut().length();
        assert!(length <= previous);
        assert!(length >= floor);
        previous = length;
    }
    assert!(run.edge_cut().length() < run.edge_cut().start());
    assert_eq!(run.edge_cut().length(), floor);
}

#[test]
fn node_next_to_the_wall_keeps_running() {
    let mut graph = UnGraph::<(), ()>::new_undirected();
    let node = graph.add_node(());
    let description = GraphDescription::unweighted(&graph).unwrap().unwrap();
    let engine = OpenOrdLayout::default();
    let wall = 1959.5;

    for seed in 0..20 {
        let mut run = engine.start_run(0, &description);
        run.place(node, Vec2::new(1957.0, 0.0), false);
        let mut rng = StdRng::seed_from_u64(seed);
        run.run(&mut rng).unwrap();

        let position = run.positions()[&node];
        assert!(position.x < wall, "seed {seed}: {position:?} crossed the wall");
    }
}
