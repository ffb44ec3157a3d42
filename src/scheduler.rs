use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::search::{AgentPlan, AnyAngleSipp};
use crate::{
    Config, DynamicObstacle, GridMap, InitialPrioritization, LineOfSight, Rescheduling, Task,
    VelocityConstraints,
};

/// Why the job ended without a full solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every allowed priority ordering was tried.
    PrioritisationExhausted,
    /// The wall-clock budget ran out.
    Timeout,
}

/// Aggregate outcome of a planning job.
#[derive(Debug, Clone, Default)]
pub struct PlanningResult {
    /// True iff every agent was planned in the final iteration.
    pub pathfound: bool,
    pub failure: Option<FailureKind>,
    pub agents: usize,
    pub agents_solved: usize,
    /// Outer-loop iterations (priority orderings tried).
    pub tries: usize,
    /// Sum of per-agent goal arrival times.
    pub pathlength: f64,
    /// Latest goal arrival over all solved agents.
    pub makespan: f64,
    pub runtime: Duration,
    /// Per-agent plans, indexed like the task's agent list.
    pub plans: Vec<AgentPlan>,
}

/// Prioritised planning over a fixed agent ordering, with re-ordering and
/// replanning when some agent fails.
///
/// Each iteration rebuilds the constraint store from the dynamic obstacles,
/// reserves every unplanned agent's start area, then plans agents one by one
/// in priority order, registering each produced path as a constraint for the
/// rest.
pub struct PriorityScheduler {
    config: Config,
    sipp: AnyAngleSipp,
    los: LineOfSight,
    current: Vec<usize>,
    history: Vec<Vec<usize>>,
    rng: StdRng,
}

impl PriorityScheduler {
    pub fn new(config: Config) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        PriorityScheduler {
            config,
            sipp: AnyAngleSipp::new(),
            los: LineOfSight::new(0.0),
            current: Vec::new(),
            history: Vec::new(),
            rng,
        }
    }

    /// Runs the whole job: iterate priority orderings until all agents are
    /// planned, the orderings are exhausted, or the time budget runs out.
    pub fn plan(
        &mut self,
        map: &GridMap,
        task: &Task,
        obstacles: &[DynamicObstacle],
    ) -> PlanningResult {
        let started = Instant::now();
        let n = task.len();
        self.set_priorities(task);
        self.history.clear();

        let mut result = PlanningResult {
            agents: n,
            plans: vec![AgentPlan::default(); n],
            ..Default::default()
        };
        let mut solved = false;

        loop {
            let mut constraints = VelocityConstraints::new(map.width(), map.height());
            for obstacle in obstacles {
                constraints.add_obstacle(obstacle);
            }
            result.plans = vec![AgentPlan::default(); n];

            if self.config.start_safe_interval > 0.0 {
                for agent in task.agents() {
                    self.los.set_size(agent.size);
                    let cells = self.los.cells(agent.start_i, agent.start_j);
                    constraints.add_start_constraint(
                        agent.start_i,
                        agent.start_j,
                        self.config.start_safe_interval,
                        &cells,
                        agent.size,
                    );
                }
            }

            let mut bad_agent = 0;
            let mut planned = 0usize;
            let mut timed_out = false;
            for &agent_index in &self.current {
                let agent = &task.agents()[agent_index];
                if self.config.start_safe_interval > 0.0 {
                    self.los.set_size(agent.size);
                    let cells = self.los.cells(agent.start_i, agent.start_j);
                    constraints.remove_start_constraint(&cells);
                }
                let plan = self
                    .sipp
                    .find_path(agent, map, &mut constraints, &self.config);
                let found = plan.pathfound;
                if found {
                    constraints.add_agent_path(&plan.primary, agent.size);
                    debug!(
                        agent = agent.id,
                        arrival = plan.pathlength,
                        "agent planned"
                    );
                }
                result.plans[agent_index] = plan;
                if !found {
                    bad_agent = agent_index;
                    break;
                }
                planned += 1;
                if started.elapsed().as_secs_f64() > self.config.time_limit {
                    timed_out = true;
                    break;
                }
            }

            result.tries += 1;
            solved = planned == n;
            info!(
                tries = result.tries,
                solved,
                "priority ordering {:?}",
                self.current
            );
            if solved {
                break;
            }
            if timed_out || started.elapsed().as_secs_f64() > self.config.time_limit {
                result.failure = Some(FailureKind::Timeout);
                break;
            }
            if !self.change_priorities(bad_agent) {
                result.failure = Some(FailureKind::PrioritisationExhausted);
                break;
            }
        }

        result.pathfound = solved;
        result.agents_solved = result.plans.iter().filter(|p| p.pathfound).count();
        result.pathlength = result
            .plans
            .iter()
            .filter(|p| p.pathfound)
            .map(|p| p.pathlength)
            .sum();
        result.makespan = result
            .plans
            .iter()
            .filter(|p| p.pathfound)
            .map(|p| OrderedFloat(p.pathlength))
            .max()
            .map(|m| m.0)
            .unwrap_or(0.0);
        result.runtime = started.elapsed();
        result
    }

    fn set_priorities(&mut self, task: &Task) {
        let n = task.len();
        self.current = (0..n).collect();
        match self.config.initial_prioritization {
            InitialPrioritization::Fifo => {}
            InitialPrioritization::LongestFirst => {
                // Equally distant agents go in descending input order.
                self.current.sort_by_key(|&k| {
                    std::cmp::Reverse((OrderedFloat(task.agents()[k].task_distance()), k))
                });
            }
            InitialPrioritization::ShortestFirst => {
                self.current
                    .sort_by_key(|&k| OrderedFloat(task.agents()[k].task_distance()));
            }
            InitialPrioritization::Random => {
                self.current.shuffle(&mut self.rng);
            }
        }
    }

    /// Mutates the priority ordering after `bad_agent` failed, recording the
    /// failed ordering first. Returns false when no untried ordering is
    /// allowed by the policy.
    fn change_priorities(&mut self, bad_agent: usize) -> bool {
        match self.config.rescheduling {
            Rescheduling::No => false,
            Rescheduling::Ruled => {
                self.history.push(self.current.clone());
                if let Some(at) = self.current.iter().position(|&a| a == bad_agent) {
                    self.current.remove(at);
                    self.current.insert(0, bad_agent);
                }
                // Reject the new ordering if it repeats any recorded one;
                // the last position never needs comparing, since it is
                // implied by the rest.
                for tried in &self.history {
                    let mut duplicate = true;
                    for (j, &agent) in tried.iter().enumerate() {
                        if j + 1 == tried.len() {
                            break;
                        }
                        if self.current[j] != agent {
                            duplicate = false;
                            break;
                        }
                    }
                    if duplicate {
                        return false;
                    }
                }
                true
            }
            Rescheduling::Random => {
                self.history.push(self.current.clone());
                const MAX_TRIES: usize = 1_000_000;
                for _ in 0..MAX_TRIES {
                    self.current.shuffle(&mut self.rng);
                    if !self.history.contains(&self.current) {
                        return true;
                    }
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Agent;

    fn agent(id: u32, start: (i32, i32), goal: (i32, i32)) -> Agent {
        Agent {
            id,
            start_i: start.0,
            start_j: start.1,
            goal_i: goal.0,
            goal_j: goal.1,
            size: 0.4,
            mspeed: 1.0,
            rspeed: 10.0,
        }
    }

    #[test]
    fn initial_orderings() {
        let task = Task::new(vec![
            agent(0, (0, 0), (0, 3)),
            agent(1, (1, 0), (1, 1)),
            agent(2, (2, 0), (2, 2)),
        ]);
        let mut scheduler = PriorityScheduler::new(Config {
            initial_prioritization: InitialPrioritization::LongestFirst,
            ..Config::default()
        });
        scheduler.set_priorities(&task);
        assert_eq!(scheduler.current, vec![0, 2, 1]);

        scheduler.config.initial_prioritization = InitialPrioritization::ShortestFirst;
        scheduler.set_priorities(&task);
        assert_eq!(scheduler.current, vec![1, 2, 0]);

        scheduler.config.initial_prioritization = InitialPrioritization::Fifo;
        scheduler.set_priorities(&task);
        assert_eq!(scheduler.current, vec![0, 1, 2]);
    }

    #[test]
    fn longest_first_breaks_distance_ties_by_descending_index() {
        // Agents 0 and 1 tie at distance 2; agent 2 is shorter.
        let task = Task::new(vec![
            agent(0, (0, 0), (0, 2)),
            agent(1, (1, 0), (1, 2)),
            agent(2, (2, 0), (2, 1)),
        ]);
        let mut scheduler = PriorityScheduler::new(Config {
            initial_prioritization: InitialPrioritization::LongestFirst,
            ..Config::default()
        });
        scheduler.set_priorities(&task);
        assert_eq!(scheduler.current, vec![1, 0, 2]);

        // All distances equal: the whole ordering reverses.
        let tied = Task::new(vec![
            agent(0, (0, 0), (0, 3)),
            agent(1, (1, 0), (1, 3)),
            agent(2, (2, 0), (2, 3)),
        ]);
        scheduler.set_priorities(&tied);
        assert_eq!(scheduler.current, vec![2, 1, 0]);
    }

    #[test]
    fn ruled_rescheduling_promotes_failed_agent_once() {
        let mut scheduler = PriorityScheduler::new(Config {
            rescheduling: Rescheduling::Ruled,
            ..Config::default()
        });
        scheduler.current = vec![0, 1, 2];
        assert!(scheduler.change_priorities(2));
        assert_eq!(scheduler.current, vec![2, 0, 1]);
        // Promoting 2 again reproduces a recorded prefix: no ordering left.
        assert!(!scheduler.change_priorities(2));
    }

    #[test]
    fn no_rescheduling_gives_up() {
        let mut scheduler = PriorityScheduler::new(Config::default());
        scheduler.current = vec![0, 1];
        assert!(!scheduler.change_priorities(1));
        assert!(scheduler.history.is_empty());
    }
}
