//! XML job format: one document carrying the map, the agents, the dynamic
//! obstacles and the algorithm options.
//!
//! ```xml
//! <root>
//!   <map>
//!     <width>4</width>
//!     <height>2</height>
//!     <grid>
//!       <row>0 0 0 0</row>
//!       <row>0 1 1 0</row>
//!     </grid>
//!   </map>
//!   <agents>
//!     <agent id="0" start_i="0" start_j="0" goal_i="0" goal_j="3"
//!            size="0.4" mspeed="1.0" rspeed="10.0"/>
//!   </agents>
//!   <dynamicobstacles>
//!     <obstacle size="0.5">
//!       <section start_i="1" start_j="3" goal_i="1" goal_j="0"
//!                t_start="0.0" t_end="6.0"/>
//!     </obstacle>
//!   </dynamicobstacles>
//!   <algorithm>
//!     <allowanyangle>true</allowanyangle>
//!     <rescheduling>RULED</rescheduling>
//!   </algorithm>
//! </root>
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::task::validate_obstacles;
use crate::{
    Agent, Config, DynamicObstacle, GridMap, InitialPrioritization, InputError, ObstacleSection,
    Rescheduling, Task,
};

/// Everything needed to run one planning job.
#[derive(Debug, Clone)]
pub struct Job {
    pub map: GridMap,
    pub task: Task,
    pub obstacles: Vec<DynamicObstacle>,
    pub config: Config,
}

#[derive(Debug, Deserialize)]
struct JobXml {
    map: MapXml,
    agents: AgentsXml,
    #[serde(default)]
    dynamicobstacles: Option<ObstaclesXml>,
    #[serde(default)]
    algorithm: Option<AlgorithmXml>,
}

#[derive(Debug, Deserialize)]
struct MapXml {
    width: usize,
    height: usize,
    grid: GridXml,
}

#[derive(Debug, Deserialize)]
struct GridXml {
    #[serde(rename = "row", default)]
    rows: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AgentsXml {
    #[serde(rename = "agent", default)]
    agents: Vec<AgentXml>,
}

fn default_size() -> f64 {
    0.5
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct AgentXml {
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@start_i")]
    start_i: i32,
    #[serde(rename = "@start_j")]
    start_j: i32,
    #[serde(rename = "@goal_i")]
    goal_i: i32,
    #[serde(rename = "@goal_j")]
    goal_j: i32,
    #[serde(rename = "@size", default = "default_size")]
    size: f64,
    #[serde(rename = "@mspeed", default = "default_speed")]
    mspeed: f64,
    #[serde(rename = "@rspeed", default = "default_speed")]
    rspeed: f64,
}

#[derive(Debug, Deserialize)]
struct ObstaclesXml {
    #[serde(rename = "obstacle", default)]
    obstacles: Vec<ObstacleXml>,
}

#[derive(Debug, Deserialize)]
struct ObstacleXml {
    #[serde(rename = "@id", default)]
    id: u32,
    #[serde(rename = "@size", default = "default_size")]
    size: f64,
    #[serde(rename = "section", default)]
    sections: Vec<SectionXml>,
}

#[derive(Debug, Deserialize)]
struct SectionXml {
    #[serde(rename = "@start_i")]
    start_i: i32,
    #[serde(rename = "@start_j")]
    start_j: i32,
    #[serde(rename = "@goal_i")]
    goal_i: i32,
    #[serde(rename = "@goal_j")]
    goal_j: i32,
    #[serde(rename = "@t_start")]
    t_start: f64,
    #[serde(rename = "@t_end")]
    t_end: f64,
}

#[derive(Debug, Deserialize)]
struct AlgorithmXml {
    #[serde(default)]
    allowanyangle: Option<bool>,
    #[serde(default)]
    hweight: Option<f64>,
    #[serde(default)]
    tweight: Option<f64>,
    #[serde(default)]
    startsafeinterval: Option<f64>,
    #[serde(default)]
    initialprioritization: Option<String>,
    #[serde(default)]
    rescheduling: Option<String>,
    #[serde(default)]
    timelimit: Option<f64>,
    #[serde(default)]
    seed: Option<u64>,
}

/// Parses and validates a job document.
pub fn load_job(xml: &str) -> Result<Job, InputError> {
    let parsed: JobXml = quick_xml::de::from_str(xml)?;

    let map = build_map(&parsed.map)?;
    let task = Task::new(
        parsed
            .agents
            .agents
            .iter()
            .map(|a| Agent {
                id: a.id,
                start_i: a.start_i,
                start_j: a.start_j,
                goal_i: a.goal_i,
                goal_j: a.goal_j,
                size: a.size,
                mspeed: a.mspeed,
                rspeed: a.rspeed,
            })
            .collect(),
    );
    task.validate(&map)?;

    let obstacles: Vec<DynamicObstacle> = parsed
        .dynamicobstacles
        .map(|o| {
            o.obstacles
                .into_iter()
                .map(|obs| DynamicObstacle {
                    id: obs.id,
                    size: obs.size,
                    sections: obs
                        .sections
                        .iter()
                        .map(|s| ObstacleSection {
                            start_i: s.start_i,
                            start_j: s.start_j,
                            goal_i: s.goal_i,
                            goal_j: s.goal_j,
                            t_start: s.t_start,
                            t_end: s.t_end,
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();
    validate_obstacles(&obstacles)?;

    let config = build_config(parsed.algorithm)?;
    config.validate()?;

    Ok(Job {
        map,
        task,
        obstacles,
        config,
    })
}

pub fn load_job_file(path: &Path) -> Result<Job, InputError> {
    load_job(&fs::read_to_string(path)?)
}

fn build_map(xml: &MapXml) -> Result<GridMap, InputError> {
    let mut cells = Vec::with_capacity(xml.width * xml.height);
    if xml.grid.rows.len() != xml.height {
        return Err(InputError::GridSizeMismatch {
            expected: xml.height,
            got: xml.grid.rows.len(),
        });
    }
    for (row_index, row) in xml.grid.rows.iter().enumerate() {
        let tokens: Vec<&str> = row.split_whitespace().collect();
        if tokens.len() != xml.width {
            return Err(InputError::MalformedRow {
                row: row_index,
                reason: format!("expected {} cells, got {}", xml.width, tokens.len()),
            });
        }
        for token in tokens {
            let cell: u8 = token.parse().map_err(|_| InputError::MalformedRow {
                row: row_index,
                reason: format!("invalid cell value {token:?}"),
            })?;
            cells.push(cell);
        }
    }
    GridMap::from_cells(xml.width, xml.height, cells)
}

fn build_config(xml: Option<AlgorithmXml>) -> Result<Config, InputError> {
    let mut config = Config::default();
    let Some(xml) = xml else {
        return Ok(config);
    };
    if let Some(v) = xml.allowanyangle {
        config.allow_any_angle = v;
    }
    if let Some(v) = xml.hweight {
        config.h_weight = v;
    }
    if let Some(v) = xml.tweight {
        config.t_weight = v;
    }
    if let Some(v) = xml.startsafeinterval {
        config.start_safe_interval = v;
    }
    if let Some(v) = xml.timelimit {
        config.time_limit = v;
    }
    if let Some(v) = xml.seed {
        config.seed = v;
    }
    if let Some(name) = xml.initialprioritization {
        config.initial_prioritization = match name.to_ascii_uppercase().as_str() {
            "FIFO" => InitialPrioritization::Fifo,
            "LONGESTF" => InitialPrioritization::LongestFirst,
            "SHORTESTF" => InitialPrioritization::ShortestFirst,
            "RANDOM" => InitialPrioritization::Random,
            _ => {
                return Err(InputError::BadOption {
                    option: "initialprioritization",
                    reason: format!("unknown policy {name:?}"),
                })
            }
        };
    }
    if let Some(name) = xml.rescheduling {
        config.rescheduling = match name.to_ascii_uppercase().as_str() {
            "NO" => Rescheduling::No,
            "RULED" => Rescheduling::Ruled,
            "RANDOM" => Rescheduling::Random,
            _ => {
                return Err(InputError::BadOption {
                    option: "rescheduling",
                    reason: format!("unknown policy {name:?}"),
                })
            }
        };
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const JOB: &str = r#"
        <root>
          <map>
            <width>4</width>
            <height>2</height>
            <grid>
              <row>0 0 0 0</row>
              <row>0 1 1 0</row>
            </grid>
          </map>
          <agents>
            <agent id="0" start_i="0" start_j="0" goal_i="0" goal_j="3" size="0.4"/>
            <agent id="1" start_i="1" start_j="0" goal_i="1" goal_j="3" mspeed="2.0"/>
          </agents>
          <dynamicobstacles>
            <obstacle size="0.3">
              <section start_i="0" start_j="3" goal_i="0" goal_j="0" t_start="0.0" t_end="6.0"/>
            </obstacle>
          </dynamicobstacles>
          <algorithm>
            <allowanyangle>false</allowanyangle>
            <hweight>1.5</hweight>
            <initialprioritization>SHORTESTF</initialprioritization>
            <rescheduling>RULED</rescheduling>
          </algorithm>
        </root>"#;

    #[test]
    fn parses_a_complete_job() {
        let job = load_job(JOB).unwrap();
        assert_eq!(job.map.width(), 4);
        assert!(!job.map.is_free(1, 1));
        assert_eq!(job.task.len(), 2);
        assert_eq!(job.task.agents()[0].size, 0.4);
        assert_eq!(job.task.agents()[1].mspeed, 2.0);
        assert_eq!(job.task.agents()[1].size, 0.5);
        assert_eq!(job.obstacles.len(), 1);
        assert_eq!(job.obstacles[0].sections[0].t_end, 6.0);
        assert!(!job.config.allow_any_angle);
        assert_eq!(job.config.h_weight, 1.5);
        assert_eq!(
            job.config.initial_prioritization,
            InitialPrioritization::ShortestFirst
        );
        assert_eq!(job.config.rescheduling, Rescheduling::Ruled);
    }

    #[test]
    fn rejects_blocked_endpoints() {
        let bad = JOB.replace(r#"goal_i="0" goal_j="3""#, r#"goal_i="1" goal_j="1""#);
        assert!(matches!(
            load_job(&bad),
            Err(InputError::BadGoal { id: 0, .. })
        ));
    }

    #[test]
    fn rejects_unknown_policies() {
        let bad = JOB.replace("RULED", "SOMETIMES");
        assert!(matches!(
            load_job(&bad),
            Err(InputError::BadOption {
                option: "rescheduling",
                ..
            })
        ));
    }

    #[test]
    fn rejects_ragged_grids() {
        let bad = JOB.replace("<row>0 1 1 0</row>", "<row>0 1 1</row>");
        assert!(matches!(load_job(&bad), Err(InputError::MalformedRow { .. })));
    }
}
