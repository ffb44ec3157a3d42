//! Any-angle safe-interval path planning for multiple circular agents with
//! kinodynamic turn costs.
//!
//! Agents are discs with a translational and a rotational speed moving on a
//! grid among dynamic obstacles with known trajectories. Each agent is
//! planned by an any-angle SIPP search ([`AnyAngleSipp`]) over (cell, safe
//! interval) states, against the time-space footprints of obstacles and of
//! already planned agents ([`VelocityConstraints`]). A prioritised outer
//! loop ([`PriorityScheduler`]) sequences the searches and re-orders agents
//! when one of them fails; [`ConflictAuditor`] verifies the produced paths
//! after the fact.
//!
//! Prioritised planning is incomplete: callers should expect
//! [`FailureKind::PrioritisationExhausted`] and expose the re-ordering
//! policy ([`Rescheduling`]) to operators.

mod audit;
mod config;
mod error;
mod geometry;
mod interval;
mod io;
mod map;
mod scheduler;
mod search;
mod task;
mod velocity;

pub use audit::{Conflict, ConflictAuditor};
pub use config::{Config, InitialPrioritization, Rescheduling};
pub use error::InputError;
pub use geometry::{line_cells, LineOfSight};
pub use interval::{Interval, SafeIntervalStore, EPSILON};
pub use io::{load_job, load_job_file, Job};
pub use map::GridMap;
pub use scheduler::{FailureKind, PlanningResult, PriorityScheduler};
pub use search::{AgentPlan, AnyAngleSipp, Waypoint};
pub use task::{Agent, DynamicObstacle, ObstacleSection, Task};
pub use velocity::{MotionSection, VelocityConstraints};
