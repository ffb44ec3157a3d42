use crate::GridMap;

/// Euclidean distance between two points.
pub(crate) fn euclid(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Distance from point `p` to the segment `a`-`b`.
pub(crate) fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return euclid(p, a);
    }
    let t = ((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len2;
    let t = t.clamp(0.0, 1.0);
    euclid(p, (a.0 + t * abx, a.1 + t * aby))
}

/// Minimum distance between segments `a`-`b` and `c`-`d`.
pub(crate) fn segment_segment_distance(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    d: (f64, f64),
) -> f64 {
    if segments_intersect(a, b, c, d) {
        return 0.0;
    }
    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn segments_intersect(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Cells traversed by the straight line between the centres of `(i1, j1)`
/// and `(i2, j2)`, Bresenham order, both endpoints included. Used to
/// rasterise path segments into dense cell sequences.
pub fn line_cells(i1: i32, j1: i32, i2: i32, j2: i32) -> Vec<(i32, i32)> {
    let mut line = Vec::new();
    let delta_i = (i1 - i2).abs();
    let delta_j = (j1 - j2).abs();
    let step_i = if i1 < i2 { 1 } else { -1 };
    let step_j = if j1 < j2 { 1 } else { -1 };
    let mut error = 0;
    let (mut i, mut j) = (i1, j1);
    if delta_i > delta_j {
        while i != i2 {
            line.push((i, j));
            error += delta_j;
            if (error << 1) > delta_i {
                j += step_j;
                error -= delta_i;
            }
            i += step_i;
        }
    } else {
        while j != j2 {
            line.push((i, j));
            error += delta_i;
            if (error << 1) > delta_j {
                i += step_i;
                error -= delta_j;
            }
            j += step_j;
        }
    }
    line.push((i2, j2));
    line
}

/// Supercover of the segment between cell centres: every cell whose unit
/// square the continuous segment passes through.
fn supercover_cells(i1: i32, j1: i32, i2: i32, j2: i32) -> Vec<(i32, i32)> {
    let mut cells = vec![(i1, j1)];
    let di = (i2 - i1).abs() as i64;
    let dj = (j2 - j1).abs() as i64;
    let step_i = (i2 - i1).signum();
    let step_j = (j2 - j1).signum();
    let (mut i, mut j) = (i1, j1);
    // Boundaries crossed so far per axis; the k-th row boundary is crossed
    // at parameter (2k - 1) / (2 di), compared by cross-multiplication.
    let (mut ci, mut cj) = (0i64, 0i64);
    while ci < di || cj < dj {
        let next_i = (2 * ci + 1) * dj;
        let next_j = (2 * cj + 1) * di;
        if cj == dj || (ci < di && next_i < next_j) {
            i += step_i;
            ci += 1;
        } else if ci == di || next_j < next_i {
            j += step_j;
            cj += 1;
        } else {
            // Exact corner crossing: include both side cells.
            cells.push((i + step_i, j));
            cells.push((i, j + step_j));
            i += step_i;
            j += step_j;
            ci += 1;
            cj += 1;
        }
        cells.push((i, j));
    }
    cells
}

/// Geometric queries for a disc-shaped agent on the grid. The radius is set
/// once per agent via [`LineOfSight::set_size`]; queries are not re-entrant
/// across radii.
#[derive(Debug, Clone)]
pub struct LineOfSight {
    size: f64,
    /// Offsets of cells whose centre lies within the disc.
    disc: Vec<(i32, i32)>,
}

impl LineOfSight {
    pub fn new(size: f64) -> Self {
        let mut los = LineOfSight {
            size: 0.0,
            disc: Vec::new(),
        };
        los.set_size(size);
        los
    }

    pub fn set_size(&mut self, size: f64) {
        self.size = size;
        self.disc.clear();
        let reach = size.ceil() as i32;
        for di in -reach..=reach {
            for dj in -reach..=reach {
                if ((di * di + dj * dj) as f64).sqrt() <= size {
                    self.disc.push((di, dj));
                }
            }
        }
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// True iff the agent's disc centred at `(i, j)` fits on free cells.
    pub fn traversable(&self, i: i32, j: i32, map: &GridMap) -> bool {
        self.disc
            .iter()
            .all(|&(di, dj)| map.is_free(i + di, j + dj))
    }

    /// Cells covered by the disc centred at `(i, j)`; used to mark and
    /// clear start-area constraints.
    pub fn cells(&self, i: i32, j: i32) -> Vec<(i32, i32)> {
        self.disc.iter().map(|&(di, dj)| (i + di, j + dj)).collect()
    }

    /// True iff the disc swept along the segment `(i1, j1)` to `(i2, j2)`
    /// stays on free cells: the supercover of the centre line plus every
    /// cell whose centre lies within the radius band must be free.
    pub fn check_line(&self, i1: i32, j1: i32, i2: i32, j2: i32, map: &GridMap) -> bool {
        for (ci, cj) in supercover_cells(i1, j1, i2, j2) {
            if !map.is_free(ci, cj) {
                return false;
            }
        }
        if self.size == 0.0 {
            return true;
        }
        let a = (i1 as f64, j1 as f64);
        let b = (i2 as f64, j2 as f64);
        let band = self.size;
        let lo_i = (i1.min(i2) as f64 - band).floor() as i32;
        let hi_i = (i1.max(i2) as f64 + band).ceil() as i32;
        let lo_j = (j1.min(j2) as f64 - band).floor() as i32;
        let hi_j = (j1.max(j2) as f64 + band).ceil() as i32;
        for ci in lo_i..=hi_i {
            for cj in lo_j..=hi_j {
                if point_segment_distance((ci as f64, cj as f64), a, b) <= band
                    && !map.is_free(ci, cj)
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_cells_cardinal() {
        assert_eq!(line_cells(0, 0, 0, 3), vec![(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert_eq!(line_cells(2, 1, 0, 1), vec![(2, 1), (1, 1), (0, 1)]);
    }

    #[test]
    fn line_cells_diagonal() {
        let cells = line_cells(0, 0, 3, 3);
        assert_eq!(cells.first(), Some(&(0, 0)));
        assert_eq!(cells.last(), Some(&(3, 3)));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn supercover_hits_both_corner_cells() {
        let cells = supercover_cells(0, 0, 2, 2);
        assert!(cells.contains(&(0, 1)) || cells.contains(&(1, 0)));
        assert!(cells.contains(&(1, 1)));
        assert!(cells.contains(&(2, 2)));
    }

    #[test]
    fn small_disc_covers_own_cell_only() {
        let los = LineOfSight::new(0.4);
        assert_eq!(los.cells(3, 4), vec![(3, 4)]);
    }

    #[test]
    fn unit_disc_covers_cross() {
        let los = LineOfSight::new(1.0);
        let cells = los.cells(5, 5);
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&(4, 5)) && cells.contains(&(6, 5)));
        assert!(cells.contains(&(5, 4)) && cells.contains(&(5, 6)));
    }

    #[test]
    fn traversability_respects_bounds() {
        let map = GridMap::open(3, 3);
        let los = LineOfSight::new(1.0);
        assert!(los.traversable(1, 1, &map));
        assert!(!los.traversable(0, 0, &map));
    }

    #[test]
    fn check_line_sees_walls() {
        // Wall in the middle column except the top row.
        let map = GridMap::from_cells(3, 3, vec![0, 0, 0, 0, 1, 0, 0, 1, 0]).unwrap();
        let los = LineOfSight::new(0.3);
        assert!(los.check_line(0, 0, 0, 2, &map));
        assert!(!los.check_line(2, 0, 2, 2, &map));
        assert!(!los.check_line(2, 0, 0, 2, &map));
    }
}
