//! Single-agent any-angle SIPP search.

mod sipp;

pub use sipp::{AgentPlan, AnyAngleSipp};

use crate::{Interval, EPSILON};

/// One corner of a primary path: cell, arrival time, arrival heading in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub i: i32,
    pub j: i32,
    pub g: f64,
    pub heading: f64,
}

/// A search state: a cell paired with one of its safe intervals, reached at
/// time `g` with a known arrival heading. `parent` indexes the search's
/// node arena; `None` marks the initial state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub i: i32,
    pub j: i32,
    pub g: f64,
    pub f: f64,
    pub interval: Interval,
    pub heading: f64,
    pub parent: Option<usize>,
}

/// Open list partitioned by row, each row ordered by `F` ascending with
/// larger `g` breaking ties, so that among equally promising states the
/// deeper one pops first. Insertion applies the rotation-aware domination
/// rule: two states at the same cell and interval are comparable only after
/// charging the heading difference the loser would pay on its next move.
pub(crate) struct OpenList {
    rows: Vec<Vec<Node>>,
    len: usize,
    tweight: f64,
    rspeed: f64,
}

impl OpenList {
    pub fn new() -> Self {
        OpenList {
            rows: Vec::new(),
            len: 0,
            tweight: 0.0,
            rspeed: 1.0,
        }
    }

    pub fn reset(&mut self, height: usize, tweight: f64, rspeed: f64) {
        self.rows.clear();
        self.rows.resize_with(height, Vec::new);
        self.len = 0;
        self.tweight = tweight;
        self.rspeed = rspeed;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, node: Node) {
        let (tweight, rspeed) = (self.tweight, self.rspeed);
        let row = &mut self.rows[node.i as usize];
        if row.is_empty() {
            row.push(node);
            self.len += 1;
            return;
        }
        let mut pos: Option<usize> = None;
        let mut k = 0;
        while k < row.len() {
            let e = row[k];
            if pos.is_none() && e.f >= node.f {
                if (e.f - node.f).abs() < EPSILON {
                    if node.g > e.g {
                        pos = Some(k);
                    }
                } else {
                    pos = Some(k);
                }
            }
            if e.j == node.j && (e.interval.start - node.interval.start).abs() < EPSILON {
                let spin = tweight * (node.heading - e.heading).abs() / (rspeed * 180.0);
                if e.g - (node.g + spin) < EPSILON {
                    // The existing state dominates the incoming one.
                    return;
                }
                if node.g - (e.g + spin) < EPSILON {
                    // The incoming state dominates; overwrite in place when
                    // it would land exactly here, erase otherwise.
                    if pos == Some(k) {
                        row[k] = node;
                        return;
                    }
                    row.remove(k);
                    self.len -= 1;
                    if let Some(p) = pos {
                        if k < p {
                            pos = Some(p - 1);
                        }
                    }
                    continue;
                }
            }
            k += 1;
        }
        let at = pos.unwrap_or(row.len());
        row.insert(at, node);
        self.len += 1;
    }

    /// Pops the most promising state: the row-head with the least `F`,
    /// larger `g` winning ties.
    pub fn pop_min(&mut self) -> Option<Node> {
        let mut best: Option<usize> = None;
        for r in 0..self.rows.len() {
            let Some(head) = self.rows[r].first() else {
                continue;
            };
            match best {
                None => best = Some(r),
                Some(b) => {
                    let cur = self.rows[b][0];
                    if head.f < cur.f - EPSILON
                        || ((head.f - cur.f).abs() <= EPSILON && head.g >= cur.g)
                    {
                        best = Some(r);
                    }
                }
            }
        }
        let row = best?;
        self.len -= 1;
        Some(self.rows[row].remove(0))
    }
}
