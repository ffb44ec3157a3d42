/// Tolerance for all time comparisons. Windows narrower than this collapse;
/// gaps narrower than this coalesce.
pub const EPSILON: f64 = 1e-8;

/// A time window `[start, end]`; `end` may be `f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub const UNBOUNDED: Interval = Interval {
        start: 0.0,
        end: f64::INFINITY,
    };

    pub fn new(start: f64, end: f64) -> Self {
        Interval { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start - EPSILON && t <= self.end + EPSILON
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_infinite()
    }

    fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Per-cell ordered lists of collision-free time windows.
///
/// Every cell starts as `[0, +inf)` and is fragmented by
/// [`SafeIntervalStore::add_forbidden`]. Cells are materialised lazily by
/// the owning constraint store; until then they carry no list at all.
#[derive(Debug, Clone)]
pub struct SafeIntervalStore {
    width: usize,
    lists: Vec<Vec<Interval>>,
    materialized: Vec<bool>,
}

impl SafeIntervalStore {
    pub fn new(width: usize, height: usize) -> Self {
        SafeIntervalStore {
            width,
            lists: vec![Vec::new(); width * height],
            materialized: vec![false; width * height],
        }
    }

    fn index(&self, i: i32, j: i32) -> usize {
        debug_assert!(i >= 0 && j >= 0 && (j as usize) < self.width);
        i as usize * self.width + j as usize
    }

    /// Drops all materialised state; every cell reverts to `[0, +inf)`.
    pub fn reset(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
        self.materialized.fill(false);
    }

    pub fn is_materialized(&self, i: i32, j: i32) -> bool {
        self.materialized[self.index(i, j)]
    }

    /// Marks the cell materialised with the unconstrained interval; the
    /// caller then subtracts its forbidden windows.
    pub fn materialize(&mut self, i: i32, j: i32) {
        let idx = self.index(i, j);
        self.lists[idx].clear();
        self.lists[idx].push(Interval::UNBOUNDED);
        self.materialized[idx] = true;
    }

    /// The k-th safe interval at `(i, j)`, if it exists.
    pub fn get(&self, i: i32, j: i32, k: usize) -> Option<Interval> {
        let idx = self.index(i, j);
        debug_assert!(self.materialized[idx]);
        self.lists[idx].get(k).copied()
    }

    pub fn intervals(&self, i: i32, j: i32) -> &[Interval] {
        let idx = self.index(i, j);
        debug_assert!(self.materialized[idx]);
        &self.lists[idx]
    }

    /// Subtracts the closed window from the cell's safe set, splitting a
    /// safe interval when the window lies strictly inside it.
    pub fn add_forbidden(&mut self, i: i32, j: i32, window: Interval) {
        if window.length() < EPSILON {
            return;
        }
        let idx = self.index(i, j);
        debug_assert!(self.materialized[idx]);
        let old = std::mem::take(&mut self.lists[idx]);
        let mut new = Vec::with_capacity(old.len() + 1);
        for safe in old {
            if window.end < safe.start - EPSILON || window.start > safe.end + EPSILON {
                new.push(safe);
                continue;
            }
            let left = Interval::new(safe.start, window.start.min(safe.end));
            if left.length() >= EPSILON {
                new.push(left);
            }
            let right = Interval::new(window.end.max(safe.start), safe.end);
            if right.length() >= EPSILON {
                new.push(right);
            }
        }
        // Coalesce pieces separated by less than the tolerance.
        let mut merged: Vec<Interval> = Vec::with_capacity(new.len());
        for piece in new {
            match merged.last_mut() {
                Some(last) if piece.start - last.end < EPSILON => last.end = last.end.max(piece.end),
                _ => merged.push(piece),
            }
        }
        self.lists[idx] = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_ordered_disjoint(intervals: &[Interval]) {
        for pair in intervals.windows(2) {
            assert!(
                pair[0].end < pair[1].start,
                "intervals out of order or overlapping: {:?}",
                pair
            );
        }
    }

    #[test]
    fn fresh_cell_is_unbounded() {
        let mut store = SafeIntervalStore::new(4, 4);
        store.materialize(1, 2);
        assert_eq!(store.get(1, 2, 0), Some(Interval::UNBOUNDED));
        assert_eq!(store.get(1, 2, 1), None);
    }

    #[test]
    fn interior_window_splits() {
        let mut store = SafeIntervalStore::new(2, 2);
        store.materialize(0, 0);
        store.add_forbidden(0, 0, Interval::new(3.0, 5.0));
        assert_eq!(store.get(0, 0, 0), Some(Interval::new(0.0, 3.0)));
        assert_eq!(store.get(0, 0, 1).unwrap().start, 5.0);
        assert!(store.get(0, 0, 1).unwrap().is_unbounded());
    }

    #[test]
    fn windows_stay_ordered_and_disjoint() {
        let mut store = SafeIntervalStore::new(1, 1);
        store.materialize(0, 0);
        for window in [
            Interval::new(8.0, 9.0),
            Interval::new(1.0, 2.0),
            Interval::new(4.0, 6.0),
            Interval::new(5.0, 7.0),
            Interval::new(0.5, 1.5),
        ] {
            store.add_forbidden(0, 0, window);
            assert_ordered_disjoint(store.intervals(0, 0));
        }
        let intervals = store.intervals(0, 0);
        assert_eq!(intervals.len(), 4);
        assert_eq!(intervals[0], Interval::new(0.0, 0.5));
        assert_eq!(intervals[1], Interval::new(2.0, 4.0));
        assert_eq!(intervals[2], Interval::new(7.0, 8.0));
        assert_eq!(intervals[3].start, 9.0);
    }

    #[test]
    fn sliver_windows_and_gaps_collapse() {
        let mut store = SafeIntervalStore::new(1, 1);
        store.materialize(0, 0);
        // A window thinner than the tolerance is a no-op.
        store.add_forbidden(0, 0, Interval::new(2.0, 2.0 + EPSILON / 2.0));
        assert_eq!(store.intervals(0, 0).len(), 1);
        // A window eating almost all of an interval kills the sliver.
        store.add_forbidden(0, 0, Interval::new(EPSILON / 4.0, 10.0));
        let intervals = store.intervals(0, 0);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, 10.0);
    }

    #[test]
    fn reset_restores_lazy_state() {
        let mut store = SafeIntervalStore::new(2, 1);
        store.materialize(0, 1);
        store.add_forbidden(0, 1, Interval::new(0.0, 4.0));
        store.reset();
        assert!(!store.is_materialized(0, 1));
        store.materialize(0, 1);
        assert_eq!(store.get(0, 1, 0), Some(Interval::UNBOUNDED));
    }
}
