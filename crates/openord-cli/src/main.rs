use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use openord::{DescriptionError, GraphDescription, OpenOrdLayout, Vec2};
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Lay out a graph given as an edge list and print one `id x y` line per node
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Edge list, one `from to [weight]` per line; reads stdin when omitted
    input: Option<PathBuf>,

    /// Read the third column of each edge as its weight
    #[arg(long)]
    weighted: bool,

    /// Seed of the jitter generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Edge cutting aggressiveness in [0, 1], 0 disables it
    #[arg(long, default_value_t = 0.8)]
    edge_cut: f64,

    /// Side of the square nodes are scattered in before the first iteration
    #[arg(long, default_value_t = 100.0)]
    spread: f64,

    /// Informational worker count
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Write coordinates here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// Graph read from an edge list, with node names by index
struct EdgeList {
    graph: UnGraph<(), Option<f64>>,
    names: Vec<String>,
}

impl EdgeList {
    fn name(&self, node: NodeIndex) -> &str {
        &self.names[node.index()]
    }
}

fn read_edge_list(reader: impl BufRead, weighted: bool) -> Result<EdgeList> {
    let mut graph = UnGraph::default();
    let mut names = Vec::new();
    let mut index: HashMap<String, NodeIndex> = HashMap::new();
    let mut node = |name: &str, graph: &mut UnGraph<(), Option<f64>>| {
        *index.entry(name.to_string()).or_insert_with(|| {
            names.push(name.to_string());
            graph.add_node(())
        })
    };

    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", number + 1))?;
        let line = line.split('#').next().unwrap_or_default();
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => {}
            [single] => {
                node(*single, &mut graph);
            }
            [from, to, rest @ ..] => {
                if rest.len() > 1 {
                    bail!("Line {}: expected `from to [weight]`", number + 1);
                }
                let weight = match rest.first() {
                    Some(w) if weighted => Some(
                        w.parse::<f64>()
                            .with_context(|| format!("Line {}: invalid weight {w:?}", number + 1))?,
                    ),
                    None if weighted => None,
                    _ => Some(1.0),
                };
                let from = node(*from, &mut graph);
                let to = node(*to, &mut graph);
                graph.add_edge(from, to, weight);
            }
        }
    }

    Ok(EdgeList { graph, names })
}

fn describe(edges: &EdgeList, weighted: bool) -> Result<Option<GraphDescription<NodeIndex>>> {
    let description = if weighted {
        GraphDescription::weighted(&edges.graph)
    } else {
        GraphDescription::unweighted(&edges.graph)
    };

    match description {
        Ok(description) => Ok(description),
        Err(DescriptionError::InvalidWeight { from, to, weight }) => bail!(
            "Edge {} -> {} has invalid weight {weight}",
            edges.name(from),
            edges.name(to)
        ),
        Err(DescriptionError::MissingWeight { from, to }) => bail!(
            "Edge {} -> {} has no weight",
            edges.name(from),
            edges.name(to)
        ),
    }
}

fn write_positions(
    mut out: impl Write,
    edges: &EdgeList,
    positions: &HashMap<NodeIndex, Vec2>,
) -> io::Result<()> {
    for node in edges.graph.node_indices() {
        if let Some(position) = positions.get(&node) {
            writeln!(out, "{}\t{}\t{}", edges.name(node), position.x, position.y)?;
        }
    }
    out.flush()
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let edges = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {path:?}"))?;
            read_edge_list(BufReader::new(file), args.weighted)?
        }
        None => read_edge_list(io::stdin().lock(), args.weighted)?,
    };
    debug!(
        "Read {} nodes and {} edges",
        edges.graph.node_count(),
        edges.graph.edge_count()
    );

    let layout = OpenOrdLayout {
        seed: args.seed,
        initial_spread: args.spread,
        workers: args.workers,
        edge_cut: openord::EdgeCutConfig {
            amount: args.edge_cut,
            ..Default::default()
        },
        ..Default::default()
    };

    let positions = match describe(&edges, args.weighted)? {
        Some(description) => layout
            .layout_description(&description)
            .context("Layout failed")?,
        None => {
            info!("Empty graph, nothing to lay out");
            HashMap::new()
        }
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {path:?}"))?;
            write_positions(BufWriter::new(file), &edges, &positions)
        }
        None => write_positions(io::stdout().lock(), &edges, &positions),
    }
    .context("Failed to write positions")?;

    Ok(())
}
