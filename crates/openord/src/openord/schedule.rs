use std::fmt;
use std::time::Duration;

/// Annealing stages, in the order a run goes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Liquid,
    Expansion,
    Cooldown,
    Crunch,
    Simmer,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Liquid,
        Stage::Expansion,
        Stage::Cooldown,
        Stage::Crunch,
        Stage::Simmer,
    ];

    /// Stage following this one, `None` for the terminal stage
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Liquid => Some(Stage::Expansion),
            Stage::Expansion => Some(Stage::Cooldown),
            Stage::Cooldown => Some(Stage::Crunch),
            Stage::Crunch => Some(Stage::Simmer),
            Stage::Simmer => None,
        }
    }

    /// Whether density is sampled from the fine occupant grid
    pub fn fine_density(self) -> bool {
        self == Stage::Simmer
    }

    /// Whether long edges may be dropped from attraction
    pub fn cuts_edges(self) -> bool {
        matches!(self, Stage::Liquid | Stage::Expansion | Stage::Cooldown)
    }

    /// Shape the squared edge length into the attraction energy term
    ///
    /// Early stages use steeper powers so clusters collapse quickly.
    pub fn attraction_distance(self, distance_squared: f64) -> f64 {
        match self {
            Stage::Liquid => distance_squared.powi(4),
            Stage::Expansion => distance_squared.powi(2),
            _ => distance_squared,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Liquid => "liquid",
            Stage::Expansion => "expansion",
            Stage::Cooldown => "cooldown",
            Stage::Crunch => "crunch",
            Stage::Simmer => "simmer",
        };
        f.write_str(name)
    }
}

/// Force parameters of a stage
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageParams {
    /// Number of full passes over the nodes
    pub iterations: usize,

    /// Scales the random jump length
    pub temperature: f64,

    /// Attraction multiplier along edges
    pub attraction: f64,

    /// Fraction of the way a node moves toward its neighbors' centroid
    pub damping: f64,
}

impl StageParams {
    pub fn new(iterations: usize, temperature: f64, attraction: f64, damping: f64) -> Self {
        Self {
            iterations,
            temperature,
            attraction,
            damping,
        }
    }

    /// Default parameters of `stage`
    pub fn default_for(stage: Stage) -> Self {
        match stage {
            Stage::Liquid => Self::new(200, 2000.0, 2.0, 1.0),
            Stage::Expansion => Self::new(200, 2000.0, 10.0, 1.0),
            Stage::Cooldown => Self::new(200, 2000.0, 1.0, 0.1),
            Stage::Crunch => Self::new(50, 250.0, 1.0, 0.25),
            Stage::Simmer => Self::new(100, 250.0, 0.5, 0.0),
        }
    }
}

/// Parameter records of all five stages
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleConfig {
    pub liquid: StageParams,
    pub expansion: StageParams,
    pub cooldown: StageParams,
    pub crunch: StageParams,
    pub simmer: StageParams,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            liquid: StageParams::default_for(Stage::Liquid),
            expansion: StageParams::default_for(Stage::Expansion),
            cooldown: StageParams::default_for(Stage::Cooldown),
            crunch: StageParams::default_for(Stage::Crunch),
            simmer: StageParams::default_for(Stage::Simmer),
        }
    }
}

impl ScheduleConfig {
    pub fn params(&self, stage: Stage) -> &StageParams {
        match stage {
            Stage::Liquid => &self.liquid,
            Stage::Expansion => &self.expansion,
            Stage::Cooldown => &self.cooldown,
            Stage::Crunch => &self.crunch,
            Stage::Simmer => &self.simmer,
        }
    }

    pub fn params_mut(&mut self, stage: Stage) -> &mut StageParams {
        match stage {
            Stage::Liquid => &mut self.liquid,
            Stage::Expansion => &mut self.expansion,
            Stage::Cooldown => &mut self.cooldown,
            Stage::Crunch => &mut self.crunch,
            Stage::Simmer => &mut self.simmer,
        }
    }

    /// Iterations of a complete run
    pub fn total_iterations(&self) -> usize {
        Stage::ALL.iter().map(|&s| self.params(s).iterations).sum()
    }
}

/// Five-stage annealing state machine
///
/// Each stage runs for its configured number of iterations and then hands
/// over to the next one; `Simmer` is terminal. The active parameters are a
/// snapshot of the stage record that is annealed a little on every
/// iteration.
#[derive(Debug, Clone)]
pub struct AnnealingSchedule {
    config: ScheduleConfig,
    stage: Stage,
    iteration: usize,
    current: StageParams,
    elapsed: [Duration; 5],
    finished: bool,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

impl AnnealingSchedule {
    pub fn new(config: ScheduleConfig) -> Self {
        let mut schedule = Self {
            current: *config.params(Stage::Liquid),
            config,
            stage: Stage::Liquid,
            iteration: 0,
            elapsed: [Duration::ZERO; 5],
            finished: false,
        };
        schedule.skip_empty_stages();
        schedule
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Iterations completed in the current stage
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Active parameters
    pub fn current(&self) -> &StageParams {
        &self.current
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Whether the last iteration of `Simmer` has completed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wall time spent in `stage` so far
    pub fn elapsed(&self, stage: Stage) -> Duration {
        self.elapsed[stage.index()]
    }

    pub(crate) fn record_elapsed(&mut self, elapsed: Duration) {
        self.elapsed[self.stage.index()] += elapsed;
    }

    /// Complete one iteration of the current stage
    ///
    /// Returns the stage that was entered, if the iteration exhausted the
    /// current stage's budget.
    pub fn advance(&mut self) -> Option<Stage> {
        if self.finished {
            return None;
        }

        self.iteration += 1;
        self.anneal();

        if self.iteration < self.config.params(self.stage).iterations {
            return None;
        }
        let entered = self.enter_next();
        self.skip_empty_stages();
        if self.finished {
            return None;
        }
        entered.map(|_| self.stage)
    }

    /// Per-iteration drift of the active parameters
    fn anneal(&mut self) {
        let current = &mut self.current;
        match self.stage {
            Stage::Expansion => {
                if current.attraction > 1.0 {
                    current.attraction -= 0.05;
                }
                if current.damping > 0.1 {
                    current.damping -= 0.005;
                }
            }
            Stage::Cooldown => {
                if current.temperature > 50.0 {
                    current.temperature -= 10.0;
                }
            }
            Stage::Simmer => {
                if current.temperature > 50.0 {
                    current.temperature -= 2.0;
                }
            }
            Stage::Liquid | Stage::Crunch => {}
        }
    }

    fn enter_next(&mut self) -> Option<Stage> {
        match self.stage.next() {
            Some(next) => {
                self.stage = next;
                self.iteration = 0;
                self.current = *self.config.params(next);
                Some(next)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn skip_empty_stages(&mut self) {
        while !self.finished && self.config.params(self.stage).iterations == 0 {
            self.enter_next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn stage_order() {
        let mut stage = Stage::Liquid;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, Stage::ALL);
        assert!(Stage::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn runs_every_stage_for_its_budget() {
        let mut schedule = AnnealingSchedule::default();
        let mut transitions = Vec::new();
        let mut iterations = 0;
        while !schedule.is_finished() {
            if let Some(stage) = schedule.advance() {
                transitions.push((iterations + 1, stage));
            }
            iterations += 1;
        }

        assert_eq!(iterations, 750);
        assert_eq!(iterations, schedule.config().total_iterations());
        assert_eq!(
            transitions,
            vec![
                (200, Stage::Expansion),
                (400, Stage::Cooldown),
                (600, Stage::Crunch),
                (650, Stage::Simmer),
            ]
        );
        assert_eq!(schedule.stage(), Stage::Simmer);
        assert_eq!(schedule.advance(), None);
        assert_eq!(schedule.stage(), Stage::Simmer);
    }

    #[test]
    fn entering_a_stage_loads_its_parameters() {
        let mut schedule = AnnealingSchedule::default();
        assert_eq!(*schedule.current(), StageParams::default_for(Stage::Liquid));
        for _ in 0..200 {
            schedule.advance();
        }
        assert_eq!(schedule.stage(), Stage::Expansion);
        assert_eq!(*schedule.current(), StageParams::default_for(Stage::Expansion));
    }

    #[test]
    fn expansion_relaxes_attraction_and_damping() {
        let mut schedule = AnnealingSchedule::default();
        for _ in 0..200 {
            schedule.advance();
        }
        let mut previous = *schedule.current();
        for _ in 0..199 {
            schedule.advance();
            let current = *schedule.current();
            assert!(current.attraction <= previous.attraction);
            assert!(current.damping <= previous.damping);
            previous = current;
        }
        assert!(previous.attraction <= 1.0 + 1e-9 && previous.attraction > 0.9);
        assert!(previous.damping < 0.1 + 1e-9 && previous.damping > 0.09);
    }

    #[test]
    fn cooldown_and_simmer_lower_temperature_to_a_floor() {
        let mut schedule = AnnealingSchedule::default();
        for _ in 0..599 {
            schedule.advance();
        }
        assert_eq!(schedule.stage(), Stage::Cooldown);
        assert_eq!(schedule.current().temperature, 50.0);

        for _ in 0..51 {
            schedule.advance();
        }
        assert_eq!(schedule.stage(), Stage::Simmer);
        assert_eq!(schedule.current().temperature, 250.0);
        for _ in 0..99 {
            schedule.advance();
        }
        assert!(!schedule.is_finished());
        assert_eq!(schedule.current().temperature, 52.0);
    }

    #[test]
    fn empty_stages_are_passed_through() {
        let mut config = ScheduleConfig::default();
        config.liquid.iterations = 0;
        config.crunch.iterations = 0;
        config.expansion.iterations = 1;
        config.cooldown.iterations = 1;
        config.simmer.iterations = 1;

        let mut schedule = AnnealingSchedule::new(config);
        assert_eq!(schedule.stage(), Stage::Expansion);
        assert_eq!(schedule.advance(), Some(Stage::Cooldown));
        assert_eq!(schedule.advance(), Some(Stage::Simmer));
        assert_eq!(schedule.advance(), None);
        assert!(schedule.is_finished());
    }

    #[test]
    fn trailing_empty_stages_finish_without_entering() {
        let mut config = ScheduleConfig::default();
        for stage in Stage::ALL {
            config.params_mut(stage).iterations = 1;
        }
        config.crunch.iterations = 0;
        config.simmer.iterations = 0;

        let mut schedule = AnnealingSchedule::new(config);
        assert_eq!(schedule.advance(), Some(Stage::Expansion));
        assert_eq!(schedule.advance(), Some(Stage::Cooldown));
        assert_eq!(schedule.advance(), None);
        assert!(schedule.is_finished());
        assert_eq!(schedule.advance(), None);
    }
}
