use super::schedule::Stage;

/// Tuning of the long edge cut
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeCutConfig {
    /// Cutting stays off unless the graph has more edges than this
    pub min_edges: usize,

    /// Aggressiveness in `[0, 1]`, zero turns cutting off
    pub amount: f64,

    /// Squared edge length the cut bounds are derived from
    pub max_length: f64,

    /// Iterations over which the bound decays from its start to its floor
    pub decay_iterations: usize,
}

impl Default for EdgeCutConfig {
    fn default() -> Self {
        Self {
            min_edges: 20,
            amount: 0.8,
            max_length: 40000.0,
            decay_iterations: 400,
        }
    }
}

/// Time-decaying bound on the squared length of edges that attract
///
/// While active, an edge longer than the bound is ignored by the attraction
/// term of a single node update. The graph itself is never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCutPolicy {
    enabled: bool,
    start: f64,
    end: f64,
    length: f64,
    rate: f64,
}

impl EdgeCutPolicy {
    pub fn new(config: &EdgeCutConfig, edge_count: usize) -> Self {
        let end = (config.max_length * (1.0 - config.amount)).max(1.0);
        let start = 4.0 * end;
        let rate = (start - end) / config.decay_iterations.max(1) as f64;

        Self {
            enabled: config.amount > 0.0 && edge_count > config.min_edges,
            start,
            end,
            length: start,
            rate,
        }
    }

    /// Whether any edge can be cut during this run
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current bound on squared edge length
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Bound the run starts with
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Lowest value the bound decays to
    pub fn floor(&self) -> f64 {
        self.end
    }

    /// Per-iteration decrement
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Whether an edge of the given squared length is excluded in `stage`
    pub fn cuts(&self, stage: Stage, distance_squared: f64) -> bool {
        self.enabled && stage.cuts_edges() && distance_squared > self.length
    }

    /// Shrink the bound after an iteration of `stage`
    pub fn decay(&mut self, stage: Stage) {
        let step = match stage {
            Stage::Expansion => self.rate,
            Stage::Cooldown => 2.0 * self.rate,
            _ => return,
        };
        self.length = (self.length - step).max(self.end);
    }

    /// Drop the bound to its floor, done once cooldown completes
    pub fn settle(&mut self) {
        self.length = self.end;
    }
}
