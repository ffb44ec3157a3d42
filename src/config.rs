use crate::InputError;

/// Initial ordering of agents before the first planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialPrioritization {
    /// Agents in input order.
    Fifo,
    /// Longest start-goal distance first.
    LongestFirst,
    /// Shortest start-goal distance first.
    ShortestFirst,
    /// Uniform random permutation (seeded).
    Random,
}

/// Policy applied when some agent fails to find a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rescheduling {
    /// Give up after the first failed ordering.
    No,
    /// Move the failed agent to the front of the priority list.
    Ruled,
    /// Re-shuffle uniformly, rejecting previously tried orderings.
    Random,
}

/// Planner options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Allow straight-line moves between non-adjacent cells when the swept
    /// segment is free.
    pub allow_any_angle: bool,
    /// Heuristic inflation factor, >= 1. Values above 1 trade optimality
    /// for speed.
    pub h_weight: f64,
    /// Rotation time multiplier, >= 0. Zero ignores heading changes.
    pub t_weight: f64,
    /// How long other agents must avoid each agent's start area.
    pub start_safe_interval: f64,
    pub initial_prioritization: InitialPrioritization,
    pub rescheduling: Rescheduling,
    /// Wall-clock budget for the whole job, in seconds.
    pub time_limit: f64,
    /// Seed for the random ordering policies.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_any_angle: true,
            h_weight: 1.0,
            t_weight: 0.0,
            start_safe_interval: 0.0,
            initial_prioritization: InitialPrioritization::Fifo,
            rescheduling: Rescheduling::No,
            time_limit: f64::INFINITY,
            seed: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), InputError> {
        if !(self.h_weight >= 1.0) {
            return Err(InputError::BadOption {
                option: "hweight",
                reason: format!("must be >= 1, got {}", self.h_weight),
            });
        }
        if !(self.t_weight >= 0.0) {
            return Err(InputError::BadOption {
                option: "tweight",
                reason: format!("must be >= 0, got {}", self.t_weight),
            });
        }
        if !(self.start_safe_interval >= 0.0) {
            return Err(InputError::BadOption {
                option: "startsafeinterval",
                reason: format!("must be >= 0, got {}", self.start_safe_interval),
            });
        }
        if !(self.time_limit > 0.0) {
            return Err(InputError::BadOption {
                option: "timelimit",
                reason: format!("must be positive, got {}", self.time_limit),
            });
        }
        Ok(())
    }
}
