use std::time::{Duration, Instant};

use fxhash::FxHashMap;
use tracing::debug;

use crate::geometry::{euclid, line_cells};
use crate::search::{Node, OpenList, Waypoint};
use crate::{Agent, Config, GridMap, LineOfSight, VelocityConstraints, EPSILON};

/// Outcome of one single-agent search.
#[derive(Debug, Clone, Default)]
pub struct AgentPlan {
    pub pathfound: bool,
    /// Waypoint-level plan: corners and waits.
    pub primary: Vec<Waypoint>,
    /// Dense per-cell rasterisation of the primary path.
    pub secondary: Vec<(i32, i32)>,
    /// Arrival time at the goal.
    pub pathlength: f64,
    pub nodes_created: usize,
    pub steps: usize,
    pub runtime: Duration,
}

/// Arrival heading in degrees for the move `from -> to`, in `[0, 360)`.
fn heading_between(from: (i32, i32), to: (i32, i32)) -> f64 {
    let dist = euclid((from.0 as f64, from.1 as f64), (to.0 as f64, to.1 as f64));
    if dist < EPSILON {
        return 0.0;
    }
    let mut heading = ((to.1 - from.1) as f64 / dist).acos().to_degrees();
    if from.0 < to.0 {
        heading += 180.0;
    }
    heading
}

/// Shortest angular distance between two headings.
fn spin_degrees(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    d.min(360.0 - d)
}

#[derive(Debug, Clone, Copy)]
struct ClosedEntry {
    interval_start: f64,
    g: f64,
    heading: f64,
}

/// Any-angle safe-interval A* for one agent against the registered
/// constraints. The searcher owns its buffers and is reused across agents.
pub struct AnyAngleSipp {
    open: OpenList,
    /// Arena of expanded nodes; parent links are indices into it, so they
    /// stay valid as the arena grows.
    nodes: Vec<Node>,
    /// Expanded states per cell, for duplicate pruning on pop.
    closed: FxHashMap<usize, Vec<ClosedEntry>>,
    los: LineOfSight,
}

impl Default for AnyAngleSipp {
    fn default() -> Self {
        Self::new()
    }
}

impl AnyAngleSipp {
    pub fn new() -> Self {
        AnyAngleSipp {
            open: OpenList::new(),
            nodes: Vec::new(),
            closed: FxHashMap::default(),
            los: LineOfSight::new(0.0),
        }
    }

    /// Plans a path for `agent` against `constraints`. On success the plan
    /// is time-parameterised from t = 0 at the start cell to the goal
    /// arrival, after which the agent can stay forever.
    pub fn find_path(
        &mut self,
        agent: &Agent,
        map: &GridMap,
        constraints: &mut VelocityConstraints,
        config: &Config,
    ) -> AgentPlan {
        let started = Instant::now();
        self.open.reset(map.height(), config.t_weight, agent.rspeed);
        self.nodes.clear();
        self.closed.clear();
        self.los.set_size(agent.size);
        constraints.set_params(agent.size, agent.mspeed);
        constraints.reset_safe_intervals();

        let start = agent.start();
        let goal = agent.goal();
        let mut plan = AgentPlan::default();

        if !self.los.traversable(start.0, start.1, map)
            || !self.los.traversable(goal.0, goal.1, map)
        {
            debug!(agent = agent.id, "start or goal not traversable");
            plan.runtime = started.elapsed();
            return plan;
        }

        constraints.update_cell_safe_intervals(start.0, start.1);
        let Some(start_interval) = constraints.safe_interval(start.0, start.1, 0) else {
            plan.runtime = started.elapsed();
            return plan;
        };
        if start_interval.start > EPSILON {
            // The start area is already occupied at t = 0.
            debug!(agent = agent.id, "start cell occupied at t=0");
            plan.runtime = started.elapsed();
            return plan;
        }

        let h0 = config.h_weight
            * euclid(
                (start.0 as f64, start.1 as f64),
                (goal.0 as f64, goal.1 as f64),
            )
            / agent.mspeed;
        self.open.push(Node {
            i: start.0,
            j: start.1,
            g: 0.0,
            f: h0,
            interval: start_interval,
            heading: 0.0,
            parent: None,
        });

        let mut goal_id = None;
        while let Some(current) = self.open.pop_min() {
            if self.is_closed_dominated(&current, map, config, agent) {
                continue;
            }
            let current_id = self.nodes.len();
            self.nodes.push(current);
            if (current.i, current.j) == goal && current.interval.is_unbounded() {
                goal_id = Some(current_id);
                break;
            }
            self.expand(current_id, agent, map, constraints, config);
        }

        plan.nodes_created = self.nodes.len() + self.open.len();
        plan.steps = self.nodes.len();
        match goal_id {
            Some(id) => {
                plan.pathfound = true;
                plan.pathlength = self.nodes[id].g;
                plan.primary = self.primary_path(id, agent);
                plan.secondary = secondary_path(&plan.primary);
            }
            None => {
                debug!(agent = agent.id, "open list exhausted, no path");
            }
        }
        plan.runtime = started.elapsed();
        plan
    }

    /// True iff an already expanded state at the same cell and interval is
    /// at least as good once the heading difference is charged.
    fn is_closed_dominated(
        &mut self,
        node: &Node,
        map: &GridMap,
        config: &Config,
        agent: &Agent,
    ) -> bool {
        let key = node.i as usize * map.width() + node.j as usize;
        let entries = self.closed.entry(key).or_default();
        for e in entries.iter() {
            let spin = config.t_weight * (node.heading - e.heading).abs() / (agent.rspeed * 180.0);
            if e.g - (node.g + spin) < EPSILON
                && (e.interval_start - node.interval.start).abs() < EPSILON
            {
                return true;
            }
        }
        entries.push(ClosedEntry {
            interval_start: node.interval.start,
            g: node.g,
            heading: node.heading,
        });
        false
    }

    fn expand(
        &mut self,
        current_id: usize,
        agent: &Agent,
        map: &GridMap,
        constraints: &mut VelocityConstraints,
        config: &Config,
    ) {
        let current = self.nodes[current_id];
        let goal = agent.goal();
        for (di, dj) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let (ni, nj) = (current.i + di, current.j + dj);
            if !self.los.traversable(ni, nj, map) {
                continue;
            }
            let h_value = config.h_weight
                * euclid((ni as f64, nj as f64), (goal.0 as f64, goal.1 as f64))
                / agent.mspeed;
            let heading = heading_between((current.i, current.j), (ni, nj));
            let spin = spin_degrees(current.heading, heading);
            let depart = current.g + config.t_weight * spin / (agent.rspeed * 180.0);
            if depart <= current.interval.end + EPSILON {
                for (interval, eat) in constraints.find_intervals(
                    (current.i, current.j),
                    depart,
                    current.interval.end,
                    (ni, nj),
                ) {
                    self.open.push(Node {
                        i: ni,
                        j: nj,
                        g: eat,
                        f: eat + h_value,
                        interval,
                        heading,
                        parent: Some(current_id),
                    });
                }
            }

            // Any-angle parent reset: try to reach the neighbour straight
            // from the grandparent, paying the rotation relative to it.
            if !config.allow_any_angle {
                continue;
            }
            let Some(grandparent_id) = current.parent else {
                continue;
            };
            let grandparent = self.nodes[grandparent_id];
            if (grandparent.i, grandparent.j) == (ni, nj) {
                continue;
            }
            if !self
                .los
                .check_line(grandparent.i, grandparent.j, ni, nj, map)
            {
                continue;
            }
            let heading = heading_between((grandparent.i, grandparent.j), (ni, nj));
            let spin = spin_degrees(grandparent.heading, heading);
            let depart = grandparent.g + config.t_weight * spin / (agent.rspeed * 180.0);
            if depart > grandparent.interval.end + EPSILON {
                continue;
            }
            for (interval, eat) in constraints.find_intervals(
                (grandparent.i, grandparent.j),
                depart,
                grandparent.interval.end,
                (ni, nj),
            ) {
                self.open.push(Node {
                    i: ni,
                    j: nj,
                    g: eat,
                    f: eat + h_value,
                    interval,
                    heading,
                    parent: Some(grandparent_id),
                });
            }
        }
    }

    /// Walks parent links back to the initial state and inserts synthetic
    /// wait states wherever the plan pauses before departing.
    fn primary_path(&self, goal_id: usize, agent: &Agent) -> Vec<Waypoint> {
        let mut ids = vec![goal_id];
        while let Some(parent) = self.nodes[*ids.last().unwrap()].parent {
            ids.push(parent);
        }
        ids.reverse();
        let mut path: Vec<Waypoint> = ids
            .into_iter()
            .map(|id| {
                let n = self.nodes[id];
                Waypoint {
                    i: n.i,
                    j: n.j,
                    g: n.g,
                    heading: n.heading,
                }
            })
            .collect();

        let mut k = 1;
        while k < path.len() {
            let travel = euclid(
                (path[k - 1].i as f64, path[k - 1].j as f64),
                (path[k].i as f64, path[k].j as f64),
            ) / agent.mspeed;
            if path[k].g - path[k - 1].g - travel > EPSILON {
                let mut wait = path[k - 1];
                wait.g = path[k].g - travel;
                path.insert(k, wait);
                k += 2;
            } else {
                k += 1;
            }
        }
        path
    }
}

/// Rasterises consecutive primary waypoints into a dense cell sequence.
fn secondary_path(primary: &[Waypoint]) -> Vec<(i32, i32)> {
    let Some(first) = primary.first() else {
        return Vec::new();
    };
    let mut cells = vec![(first.i, first.j)];
    for pair in primary.windows(2) {
        for cell in line_cells(pair[0].i, pair[0].j, pair[1].i, pair[1].j)
            .into_iter()
            .skip(1)
        {
            cells.push(cell);
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn agent(start: (i32, i32), goal: (i32, i32)) -> Agent {
        Agent {
            id: 0,
            start_i: start.0,
            start_j: start.1,
            goal_i: goal.0,
            goal_j: goal.1,
            size: 0.4,
            mspeed: 1.0,
            rspeed: 1.0,
        }
    }

    fn cardinal_config() -> Config {
        Config {
            allow_any_angle: false,
            ..Config::default()
        }
    }

    #[test]
    fn headings_follow_the_compass_convention() {
        for (to, expected) in [
            ((0, 1), 0.0),
            ((-1, 0), 90.0),
            ((0, -1), 180.0),
            ((1, 0), 270.0),
        ] {
            assert!(
                (heading_between((0, 0), to) - expected).abs() < 1e-9,
                "heading to {:?}",
                to
            );
        }
    }

    #[test]
    fn empty_grid_cardinal_distance() {
        let map = GridMap::open(5, 5);
        let mut constraints = VelocityConstraints::new(5, 5);
        let mut sipp = AnyAngleSipp::new();
        let plan = sipp.find_path(&agent((0, 0), (4, 4)), &map, &mut constraints, &cardinal_config());
        assert!(plan.pathfound);
        assert!((plan.pathlength - 8.0).abs() < 1e-6);
        assert_eq!(plan.secondary.len(), 9);
        assert_eq!(plan.secondary.first(), Some(&(0, 0)));
        assert_eq!(plan.secondary.last(), Some(&(4, 4)));
    }

    #[test]
    fn any_angle_shortcuts_the_diagonal() {
        let map = GridMap::open(5, 5);
        let mut constraints = VelocityConstraints::new(5, 5);
        let mut sipp = AnyAngleSipp::new();
        let plan = sipp.find_path(
            &agent((0, 0), (4, 4)),
            &map,
            &mut constraints,
            &Config::default(),
        );
        assert!(plan.pathfound);
        assert!((plan.pathlength - 32f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn rotation_penalty_keeps_the_straight_path() {
        let map = GridMap::open(3, 3);
        let mut constraints = VelocityConstraints::new(3, 3);
        let mut sipp = AnyAngleSipp::new();
        let config = Config {
            allow_any_angle: false,
            t_weight: 1.0,
            ..Config::default()
        };
        let plan = sipp.find_path(&agent((0, 0), (0, 2)), &map, &mut constraints, &config);
        assert!(plan.pathfound);
        // The agent starts facing east; straight east costs exactly the
        // travel time, any detour pays for its turns.
        assert!((plan.pathlength - 2.0).abs() < 1e-6);
        assert!(plan.primary.iter().all(|wp| wp.i == 0));
    }

    #[test]
    fn blocked_goal_region_fails() {
        // Goal walled off in the corner.
        let map = GridMap::from_cells(
            3,
            3,
            vec![
                0, 0, 0, //
                0, 1, 1, //
                0, 1, 0,
            ],
        )
        .unwrap();
        let mut constraints = VelocityConstraints::new(3, 3);
        let mut sipp = AnyAngleSipp::new();
        let plan = sipp.find_path(&agent((0, 0), (2, 2)), &map, &mut constraints, &cardinal_config());
        assert!(!plan.pathfound);
        assert!(plan.steps > 0);
    }

    #[test]
    fn waits_are_made_explicit_in_the_primary_path() {
        let map = GridMap::open(10, 1);
        let mut constraints = VelocityConstraints::new(10, 1);
        // A foreign disc sweeps the corridor right to left and vanishes.
        constraints.add_obstacle(&crate::DynamicObstacle {
            id: 0,
            size: 0.5,
            sections: vec![crate::ObstacleSection {
                start_i: 0,
                start_j: 9,
                goal_i: 0,
                goal_j: 1,
                t_start: 0.0,
                t_end: 8.0,
            }],
        });
        let mut sipp = AnyAngleSipp::new();
        let mut a = agent((0, 0), (0, 9));
        a.size = 0.5;
        let plan = sipp.find_path(&a, &map, &mut constraints, &cardinal_config());
        assert!(plan.pathfound);
        // The agent must let the obstacle pass: clear of the corridor at
        // t = 8, then nine cells of travel.
        assert!((plan.pathlength - 17.0).abs() < 1e-6);
        // The pause shows up as two consecutive waypoints on the start cell.
        assert_eq!(plan.primary[0].g, 0.0);
        assert_eq!((plan.primary[1].i, plan.primary[1].j), (0, 0));
        assert!(plan.primary[1].g > 7.0);
        // No waypoint travels faster than the agent can.
        for pair in plan.primary.windows(2) {
            let dist = euclid(
                (pair[0].i as f64, pair[0].j as f64),
                (pair[1].i as f64, pair[1].j as f64),
            );
            assert!(pair[1].g - pair[0].g >= dist / a.mspeed - EPSILON);
        }
    }
}
