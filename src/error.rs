use thiserror::Error;

/// Errors raised while loading or validating a planning job.
///
/// Planning failures (no path, exhausted priority orderings, timeout) are
/// not errors; they are reported through [`crate::PlanningResult`].
#[derive(Debug, Error)]
pub enum InputError {
    #[error("map dimensions must be positive")]
    EmptyMap,

    #[error("grid size mismatch: expected {expected} cells, got {got}")]
    GridSizeMismatch { expected: usize, got: usize },

    #[error("malformed grid row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("task contains no agents")]
    NoAgents,

    #[error("duplicate agent id {0}")]
    DuplicateAgent(u32),

    #[error("agent {id}: start ({i},{j}) is outside the map or blocked")]
    BadStart { id: u32, i: i32, j: i32 },

    #[error("agent {id}: goal ({i},{j}) is outside the map or blocked")]
    BadGoal { id: u32, i: i32, j: i32 },

    #[error("agent {id}: size must lie in (0, 1], got {size}")]
    BadSize { id: u32, size: f64 },

    #[error("agent {id}: speeds must be positive (mspeed {mspeed}, rspeed {rspeed})")]
    BadSpeed { id: u32, mspeed: f64, rspeed: f64 },

    #[error("obstacle {id}: sections must form a connected, forward-in-time chain")]
    BadObstacle { id: u32 },

    #[error("option {option}: {reason}")]
    BadOption {
        option: &'static str,
        reason: String,
    },

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
