use crate::{GridMap, InputError};

/// A disc-shaped agent with kinodynamic parameters.
///
/// `size` is the disc radius in cell units, `mspeed` the translational speed
/// in cells per time unit, `rspeed` the rotational speed in degrees per time
/// unit.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub id: u32,
    pub start_i: i32,
    pub start_j: i32,
    pub goal_i: i32,
    pub goal_j: i32,
    pub size: f64,
    pub mspeed: f64,
    pub rspeed: f64,
}

impl Agent {
    pub fn start(&self) -> (i32, i32) {
        (self.start_i, self.start_j)
    }

    pub fn goal(&self) -> (i32, i32) {
        (self.goal_i, self.goal_j)
    }

    /// Euclidean start-goal distance, used by the ordering policies.
    pub fn task_distance(&self) -> f64 {
        let di = (self.start_i - self.goal_i) as f64;
        let dj = (self.start_j - self.goal_j) as f64;
        di.hypot(dj)
    }
}

/// One straight constant-speed segment of a dynamic obstacle's trajectory.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleSection {
    pub start_i: i32,
    pub start_j: i32,
    pub goal_i: i32,
    pub goal_j: i32,
    pub t_start: f64,
    pub t_end: f64,
}

/// A moving disc following a known piecewise-linear trajectory. It exists
/// only while its sections are active.
#[derive(Debug, Clone)]
pub struct DynamicObstacle {
    pub id: u32,
    pub size: f64,
    pub sections: Vec<ObstacleSection>,
}

/// The set of agents to plan for.
#[derive(Debug, Clone)]
pub struct Task {
    agents: Vec<Agent>,
}

impl Task {
    pub fn new(agents: Vec<Agent>) -> Self {
        Task { agents }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Rejects tasks the planner cannot meaningfully run on: empty agent
    /// lists, duplicate ids, off-map or blocked endpoints, non-positive
    /// speeds, radii outside `(0, 1]`.
    pub fn validate(&self, map: &GridMap) -> Result<(), InputError> {
        if self.agents.is_empty() {
            return Err(InputError::NoAgents);
        }
        for (k, agent) in self.agents.iter().enumerate() {
            if self.agents[..k].iter().any(|a| a.id == agent.id) {
                return Err(InputError::DuplicateAgent(agent.id));
            }
            if !map.is_free(agent.start_i, agent.start_j) {
                return Err(InputError::BadStart {
                    id: agent.id,
                    i: agent.start_i,
                    j: agent.start_j,
                });
            }
            if !map.is_free(agent.goal_i, agent.goal_j) {
                return Err(InputError::BadGoal {
                    id: agent.id,
                    i: agent.goal_i,
                    j: agent.goal_j,
                });
            }
            if !(agent.size > 0.0 && agent.size <= 1.0) {
                return Err(InputError::BadSize {
                    id: agent.id,
                    size: agent.size,
                });
            }
            if !(agent.mspeed > 0.0) || !(agent.rspeed > 0.0) {
                return Err(InputError::BadSpeed {
                    id: agent.id,
                    mspeed: agent.mspeed,
                    rspeed: agent.rspeed,
                });
            }
        }
        Ok(())
    }
}

/// Checks that obstacle trajectories are well-formed: sections in forward
/// time order, each starting where the previous one ended.
pub fn validate_obstacles(obstacles: &[DynamicObstacle]) -> Result<(), InputError> {
    for obs in obstacles {
        if obs.sections.is_empty() || !(obs.size > 0.0) {
            return Err(InputError::BadObstacle { id: obs.id });
        }
        for pair in obs.sections.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if (a.goal_i, a.goal_j) != (b.start_i, b.start_j) || b.t_start < a.t_end {
                return Err(InputError::BadObstacle { id: obs.id });
            }
        }
        if obs.sections.iter().any(|s| !(s.t_end >= s.t_start)) {
            return Err(InputError::BadObstacle { id: obs.id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn validation_catches_blocked_start() {
        let map = GridMap::from_cells(2, 1, vec![0, 1]).unwrap();
        let task = Task::new(vec![agent(0, (0, 1), (0, 0))]);
        assert!(matches!(
            task.validate(&map),
            Err(InputError::BadStart { id: 0, .. })
        ));
    }

    #[test]
    fn validation_catches_duplicate_ids() {
        let map = GridMap::open(3, 3);
        let task = Task::new(vec![agent(7, (0, 0), (1, 1)), agent(7, (2, 2), (0, 2))]);
        assert!(matches!(
            task.validate(&map),
            Err(InputError::DuplicateAgent(7))
        ));
    }

    #[test]
    fn obstacle_chain_must_connect() {
        let broken = DynamicObstacle {
            id: 0,
            size: 0.5,
            sections: vec![
                ObstacleSection {
                    start_i: 0,
                    start_j: 0,
                    goal_i: 0,
                    goal_j: 3,
                    t_start: 0.0,
                    t_end: 3.0,
                },
                ObstacleSection {
                    start_i: 1,
                    start_j: 3,
                    goal_i: 1,
                    goal_j: 0,
                    t_start: 3.0,
                    t_end: 6.0,
                },
            ],
        };
        assert!(validate_obstacles(&[broken]).is_err());
    }
}
