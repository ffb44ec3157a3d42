use tracing::warn;
use tuple::{T2, A2};

use crate::geometry::euclid;
use crate::search::Waypoint;
use crate::{PlanningResult, Task, EPSILON};

/// A residual collision between two produced paths.
#[derive(Debug, Clone, Copy)]
pub struct Conflict {
    /// The two agents involved, as indices into the task's agent list.
    pub agents: A2<usize>,
    /// Collision point (midpoint of the two centres).
    pub i: f64,
    pub j: f64,
    pub time: f64,
}

/// Post-hoc verification of a planning result: samples every produced path
/// on a shared clock and reports any pair of discs that overlap.
///
/// A sampling check can miss sub-sample contacts of small fast agents; it is
/// a diagnostic, not a certificate.
pub struct ConflictAuditor {
    resolution: f64,
}

impl Default for ConflictAuditor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictAuditor {
    pub fn new() -> Self {
        ConflictAuditor { resolution: 0.1 }
    }

    pub fn with_resolution(resolution: f64) -> Self {
        ConflictAuditor { resolution }
    }

    /// Samples all solved agents' paths and returns every detected overlap.
    pub fn audit(&self, task: &Task, result: &PlanningResult) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let horizon = result
            .plans
            .iter()
            .filter(|p| p.pathfound)
            .map(|p| p.pathlength)
            .fold(0.0f64, f64::max);
        let steps = (horizon / self.resolution).ceil() as usize + 1;

        let solved: Vec<usize> = (0..result.plans.len())
            .filter(|&k| result.plans[k].pathfound)
            .collect();
        for step in 0..steps {
            let t = step as f64 * self.resolution;
            for (a_pos, &a) in solved.iter().enumerate() {
                for &b in &solved[a_pos + 1..] {
                    let pa = sample(&result.plans[a].primary, t);
                    let pb = sample(&result.plans[b].primary, t);
                    let clearance = task.agents()[a].size + task.agents()[b].size;
                    if euclid(pa, pb) + EPSILON < clearance {
                        conflicts.push(Conflict {
                            agents: T2(a, b),
                            i: 0.5 * (pa.0 + pb.0),
                            j: 0.5 * (pa.1 + pb.1),
                            time: t,
                        });
                    }
                }
            }
        }
        if !conflicts.is_empty() {
            warn!(count = conflicts.len(), "residual conflicts detected");
        }
        conflicts
    }
}

/// Position along a primary path at time `t`: the start before departure,
/// linear interpolation inside a section, the goal after arrival.
fn sample(primary: &[Waypoint], t: f64) -> (f64, f64) {
    match primary {
        [] => (0.0, 0.0),
        [only] => (only.i as f64, only.j as f64),
        _ => {
            if t <= primary[0].g {
                return (primary[0].i as f64, primary[0].j as f64);
            }
            for pair in primary.windows(2) {
                let (from, to) = (pair[0], pair[1]);
                if t <= to.g {
                    let span = to.g - from.g;
                    let ratio = if span < EPSILON {
                        1.0
                    } else {
                        (t - from.g) / span
                    };
                    return (
                        from.i as f64 + ratio * (to.i - from.i) as f64,
                        from.j as f64 + ratio * (to.j - from.j) as f64,
                    );
                }
            }
            let last = primary.last().unwrap();
            (last.i as f64, last.j as f64)
        }
    }
}
