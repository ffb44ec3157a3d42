use fxhash::{FxHashMap, FxHashSet};

use crate::geometry::{euclid, point_segment_distance, segment_segment_distance};
use crate::search::Waypoint;
use crate::{DynamicObstacle, Interval, SafeIntervalStore, EPSILON};

/// Registration band around a section's segment, in cells. Wide enough that
/// any traversal able to come within collision range of the section shares
/// at least one registered cell with it (agent radii are capped at 1).
const SECTION_BAND: f64 = 2.0;

type Vec2 = (f64, f64);

fn sub(a: Vec2, b: Vec2) -> Vec2 {
    (a.0 - b.0, a.1 - b.1)
}

fn add(a: Vec2, b: Vec2) -> Vec2 {
    (a.0 + b.0, a.1 + b.1)
}

fn scale(a: Vec2, k: f64) -> Vec2 {
    (a.0 * k, a.1 * k)
}

fn dot(a: Vec2, b: Vec2) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

fn norm2(a: Vec2) -> f64 {
    dot(a, a)
}

/// Pushes the real roots of `a x^2 + b x + c = 0` onto `out`.
fn quad_roots(a: f64, b: f64, c: f64, out: &mut Vec<f64>) {
    if a.abs() < 1e-12 {
        if b.abs() > 1e-12 {
            out.push(-c / b);
        }
        return;
    }
    let disc = b * b - 4.0 * a * c;
    if disc <= 0.0 {
        return;
    }
    let s = disc.sqrt();
    out.push((-b - s) / (2.0 * a));
    out.push((-b + s) / (2.0 * a));
}

/// One straight constant-speed piece of a moving disc's trajectory. The
/// terminal piece of a planned agent stays at the goal with `t1 = +inf`.
#[derive(Debug, Clone, Copy)]
pub struct MotionSection {
    pub from: Vec2,
    pub to: Vec2,
    pub t0: f64,
    pub t1: f64,
    pub size: f64,
}

impl MotionSection {
    fn velocity(&self) -> Vec2 {
        let dt = self.t1 - self.t0;
        if !dt.is_finite() || dt < EPSILON {
            return (0.0, 0.0);
        }
        scale(sub(self.to, self.from), 1.0 / dt)
    }

    /// The time window during which the section's disc centre passes within
    /// `radius` of the point `c`, if any.
    fn window_near_point(&self, c: Vec2, radius: f64) -> Option<Interval> {
        let w = self.velocity();
        let rel = sub(self.from, c);
        if norm2(w) < 1e-12 {
            if norm2(rel).sqrt() < radius - EPSILON {
                return Some(Interval::new(self.t0, self.t1));
            }
            return None;
        }
        // |rel + w s|^2 = radius^2 with s = t - t0.
        let mut roots = Vec::with_capacity(2);
        quad_roots(
            norm2(w),
            2.0 * dot(rel, w),
            norm2(rel) - radius * radius,
            &mut roots,
        );
        if roots.len() < 2 {
            return None;
        }
        let lo = (self.t0 + roots[0]).max(self.t0);
        let hi = (self.t0 + roots[1]).min(self.t1);
        if hi - lo < EPSILON {
            return None;
        }
        Some(Interval::new(lo, hi))
    }
}

/// Tracks every registered moving disc and derives, for the current agent,
/// per-cell forbidden windows and per-traversal departure constraints.
///
/// Rebuilt once per scheduler iteration; the safe-interval lists are reset
/// and lazily re-materialised once per single-agent search, because they
/// depend on the current agent's radius and speed.
pub struct VelocityConstraints {
    width: usize,
    height: usize,
    sections: Vec<MotionSection>,
    /// Per cell: indices into `sections` whose band covers the cell.
    cell_sections: Vec<Vec<u32>>,
    /// Start-area occupancy: covered cell -> duration.
    start_windows: FxHashMap<usize, f64>,
    /// Start-area discs for the traversal sweep: centre cell -> (duration, radius).
    start_discs: FxHashMap<usize, (f64, f64)>,
    store: SafeIntervalStore,
    /// Current agent parameters.
    size: f64,
    mspeed: f64,
}

impl VelocityConstraints {
    pub fn new(width: usize, height: usize) -> Self {
        VelocityConstraints {
            width,
            height,
            sections: Vec::new(),
            cell_sections: vec![Vec::new(); width * height],
            start_windows: FxHashMap::default(),
            start_discs: FxHashMap::default(),
            store: SafeIntervalStore::new(width, height),
            size: 0.0,
            mspeed: 1.0,
        }
    }

    fn cell_index(&self, i: i32, j: i32) -> usize {
        i as usize * self.width + j as usize
    }

    /// Sets the parameters of the agent about to plan. Foreign trajectories
    /// are translated into forbidden windows for a disc of this radius and
    /// speed, so the caller must reset the safe intervals afterwards.
    pub fn set_params(&mut self, size: f64, mspeed: f64) {
        self.size = size;
        self.mspeed = mspeed;
    }

    fn register(&mut self, sec: MotionSection) {
        let id = self.sections.len() as u32;
        let band = sec.size + SECTION_BAND;
        for (ci, cj) in self.band_cells(sec.from, sec.to, band) {
            let idx = self.cell_index(ci, cj);
            self.cell_sections[idx].push(id);
        }
        self.sections.push(sec);
    }

    fn band_cells(&self, a: Vec2, b: Vec2, band: f64) -> Vec<(i32, i32)> {
        let lo_i = ((a.0.min(b.0) - band).floor() as i32).max(0);
        let hi_i = ((a.0.max(b.0) + band).ceil() as i32).min(self.height as i32 - 1);
        let lo_j = ((a.1.min(b.1) - band).floor() as i32).max(0);
        let hi_j = ((a.1.max(b.1) + band).ceil() as i32).min(self.width as i32 - 1);
        let mut cells = Vec::new();
        for ci in lo_i..=hi_i {
            for cj in lo_j..=hi_j {
                if point_segment_distance((ci as f64, cj as f64), a, b) <= band {
                    cells.push((ci, cj));
                }
            }
        }
        cells
    }

    /// Registers a dynamic obstacle. It exists only while its sections are
    /// active.
    pub fn add_obstacle(&mut self, obstacle: &DynamicObstacle) {
        for sec in &obstacle.sections {
            self.register(MotionSection {
                from: (sec.start_i as f64, sec.start_j as f64),
                to: (sec.goal_i as f64, sec.goal_j as f64),
                t0: sec.t_start,
                t1: sec.t_end,
                size: obstacle.size,
            });
        }
    }

    /// Registers a planned agent's primary path. The agent occupies its
    /// goal forever after arrival.
    pub fn add_agent_path(&mut self, primary: &[Waypoint], size: f64) {
        for pair in primary.windows(2) {
            self.register(MotionSection {
                from: (pair[0].i as f64, pair[0].j as f64),
                to: (pair[1].i as f64, pair[1].j as f64),
                t0: pair[0].g,
                t1: pair[1].g,
                size,
            });
        }
        if let Some(last) = primary.last() {
            let at = (last.i as f64, last.j as f64);
            self.register(MotionSection {
                from: at,
                to: at,
                t0: last.g,
                t1: f64::INFINITY,
                size,
            });
        }
    }

    /// Marks the start area of a not-yet-planned agent occupied during
    /// `[0, duration]` so earlier agents do not camp there.
    pub fn add_start_constraint(
        &mut self,
        i: i32,
        j: i32,
        duration: f64,
        cells: &[(i32, i32)],
        size: f64,
    ) {
        for &(ci, cj) in cells {
            if ci >= 0 && cj >= 0 && (ci as usize) < self.height && (cj as usize) < self.width {
                let idx = self.cell_index(ci, cj);
                self.start_windows.insert(idx, duration);
            }
        }
        let idx = self.cell_index(i, j);
        self.start_discs.insert(idx, (duration, size));
    }

    /// Clears a start area previously added for these cells.
    pub fn remove_start_constraint(&mut self, cells: &[(i32, i32)]) {
        for &(ci, cj) in cells {
            if ci >= 0 && cj >= 0 && (ci as usize) < self.height && (cj as usize) < self.width {
                let idx = self.cell_index(ci, cj);
                self.start_windows.remove(&idx);
                self.start_discs.remove(&idx);
            }
        }
    }

    /// Restores every cell to the lazy, unconstrained state. Called at the
    /// start of each single-agent search.
    pub fn reset_safe_intervals(&mut self) {
        self.store.reset();
    }

    /// Forces materialisation of the cell's safe intervals under the
    /// current agent parameters.
    pub fn update_cell_safe_intervals(&mut self, i: i32, j: i32) {
        if self.store.is_materialized(i, j) {
            return;
        }
        let idx = i as usize * self.width + j as usize;
        let Self {
            store,
            cell_sections,
            sections,
            start_windows,
            size,
            ..
        } = self;
        store.materialize(i, j);
        let centre = (i as f64, j as f64);
        for &sid in &cell_sections[idx] {
            let sec = &sections[sid as usize];
            if let Some(win) = sec.window_near_point(centre, *size + sec.size) {
                store.add_forbidden(i, j, win);
            }
        }
        if let Some(&duration) = start_windows.get(&idx) {
            store.add_forbidden(i, j, Interval::new(0.0, duration));
        }
    }

    /// The k-th safe interval at `(i, j)`, materialising the cell first.
    pub fn safe_interval(&mut self, i: i32, j: i32, k: usize) -> Option<Interval> {
        self.update_cell_safe_intervals(i, j);
        self.store.get(i, j, k)
    }

    /// For each safe interval of the target cell, the earliest arrival time
    /// at which the segment `from -> to` can be traversed without meeting
    /// any registered constraint, arriving inside that interval.
    ///
    /// `depart` is the earliest possible departure from `from` (the parent's
    /// arrival time plus any rotation time); `depart_limit` is the end of
    /// the parent's safe interval, bounding how long the agent may wait.
    pub fn find_intervals(
        &mut self,
        from: (i32, i32),
        depart: f64,
        depart_limit: f64,
        to: (i32, i32),
    ) -> Vec<(Interval, f64)> {
        self.update_cell_safe_intervals(to.0, to.1);
        let p = (from.0 as f64, from.1 as f64);
        let q = (to.0 as f64, to.1 as f64);
        let t_move = euclid(p, q) / self.mspeed;
        let forbidden = self.forbidden_departure_windows(p, q, t_move);

        let mut out = Vec::new();
        let mut k = 0;
        while let Some(interval) = self.store.get(to.0, to.1, k) {
            k += 1;
            let mut tau = (depart + t_move).max(interval.start) - t_move;
            for w in &forbidden {
                if w.end < tau - EPSILON {
                    continue;
                }
                if tau < w.start - EPSILON {
                    break;
                }
                tau = w.end;
            }
            if tau > depart_limit + EPSILON || !tau.is_finite() {
                // Later intervals need even later departures.
                break;
            }
            let arrival = tau + t_move;
            if arrival > interval.end + EPSILON {
                continue;
            }
            out.push((interval, arrival));
        }
        out
    }

    /// Merged forbidden departure windows for traversing `p -> q` at the
    /// current agent speed, against every registered section and start disc
    /// near the swept band.
    fn forbidden_departure_windows(&self, p: Vec2, q: Vec2, t_move: f64) -> Vec<Interval> {
        let mut windows = Vec::new();
        let mut seen = FxHashSet::default();
        for (ci, cj) in self.band_cells(p, q, self.size + SECTION_BAND) {
            let idx = self.cell_index(ci, cj);
            for &sid in &self.cell_sections[idx] {
                if seen.insert(sid) {
                    let sec = self.sections[sid as usize];
                    forbidden_departures(
                        &sec,
                        p,
                        q,
                        self.mspeed,
                        t_move,
                        self.size + sec.size,
                        &mut windows,
                    );
                }
            }
            if let Some(&(duration, size)) = self.start_discs.get(&idx) {
                let disc = MotionSection {
                    from: (ci as f64, cj as f64),
                    to: (ci as f64, cj as f64),
                    t0: 0.0,
                    t1: duration,
                    size,
                };
                forbidden_departures(
                    &disc,
                    p,
                    q,
                    self.mspeed,
                    t_move,
                    self.size + size,
                    &mut windows,
                );
            }
        }
        windows.sort_by(|a, b| a.start.total_cmp(&b.start));
        let mut merged: Vec<Interval> = Vec::with_capacity(windows.len());
        for w in windows {
            match merged.last_mut() {
                Some(last) if w.start <= last.end + EPSILON => last.end = last.end.max(w.end),
                _ => merged.push(w),
            }
        }
        merged
    }
}

/// Appends the departure-time windows for which traversing `p -> q` (speed
/// `v`, duration `t_move`) collides with `sec` at combined radius `radius`.
///
/// The traversal starting at departure time tau collides iff the two disc
/// centres come within `radius` at some instant where both motions are
/// active. The boundary departures of that set satisfy one of a handful of
/// quadratics (distance equal to `radius` at a window endpoint, at the
/// interior closest approach, or a degenerate overlap window); collecting
/// their roots and classifying the gaps with an exact minimum-distance
/// predicate yields the forbidden set without iteration.
fn forbidden_departures(
    sec: &MotionSection,
    p: Vec2,
    q: Vec2,
    v: f64,
    t_move: f64,
    radius: f64,
    out: &mut Vec<Interval>,
) {
    if segment_segment_distance(p, q, sec.from, sec.to) >= radius - EPSILON {
        return;
    }
    let dir = scale(sub(q, p), 1.0 / euclid(p, q));
    let u = scale(dir, v);
    let w = sec.velocity();
    // Relative separation at absolute time t for departure tau:
    //   delta(t) = (k0 - u tau) + d t
    let k0 = add(sub(p, sec.from), scale(w, sec.t0));
    let d = sub(u, w);
    let r2 = radius * radius;

    let collides = |tau: f64| -> bool {
        let a = tau.max(sec.t0);
        let b = (tau + t_move).min(sec.t1);
        if b < a {
            return false;
        }
        let base = sub(k0, scale(u, tau));
        let d2 = norm2(d);
        let min_d2 = if d2 < 1e-12 {
            norm2(add(base, scale(d, a)))
        } else {
            let t_star = (-dot(base, d) / d2).clamp(a, b);
            norm2(add(base, scale(d, t_star)))
        };
        min_d2 + EPSILON < r2
    };

    let mut candidates = vec![sec.t0 - t_move];
    if sec.t1.is_finite() {
        candidates.push(sec.t1);
    }
    // Distance equals radius with the self disc at the segment start (t = tau)
    // or end (t = tau + t_move): delta is k0 - w tau, shifted by d t_move.
    for shift in [0.0, t_move] {
        let k = add(k0, scale(d, shift));
        quad_roots(norm2(w), -2.0 * dot(k, w), norm2(k) - r2, &mut candidates);
    }
    // Distance equals radius at the section's own endpoints (t = t0, t = t1).
    let mut section_ends = vec![sec.t0];
    if sec.t1.is_finite() {
        section_ends.push(sec.t1);
    }
    for t_end in section_ends {
        let k = add(k0, scale(d, t_end));
        quad_roots(norm2(u), -2.0 * dot(k, u), norm2(k) - r2, &mut candidates);
    }
    // Interior closest approach equals radius.
    let d2 = norm2(d);
    if d2 > 1e-12 {
        let dhat = scale(d, 1.0 / d2.sqrt());
        let a = norm2(u) - dot(u, dhat) * dot(u, dhat);
        let b = -2.0 * dot(k0, u) + 2.0 * dot(k0, dhat) * dot(u, dhat);
        let c = norm2(k0) - dot(k0, dhat) * dot(k0, dhat) - r2;
        quad_roots(a, b, c, &mut candidates);
    }

    candidates.sort_by(f64::total_cmp);
    candidates.dedup_by(|a, b| (*a - *b).abs() < EPSILON);

    // Classify each gap between consecutive candidates by its midpoint; the
    // region left of the first candidate can never collide (the traversal
    // ends before the section starts).
    let mut open_start: Option<f64> = None;
    for k in 0..candidates.len() {
        let probe = if k + 1 < candidates.len() {
            0.5 * (candidates[k] + candidates[k + 1])
        } else {
            candidates[k] + 1.0
        };
        let colliding = collides(probe);
        match (colliding, open_start) {
            (true, None) => open_start = Some(candidates[k]),
            (false, Some(start)) => {
                out.push(Interval::new(start, candidates[k]));
                open_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open_start {
        out.push(Interval::new(start, f64::INFINITY));
    }
}
