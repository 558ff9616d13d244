use nalgebra::Vector3;
use std::collections::HashMap;

// ============================================================================
// SPATIAL ACCELERATION
// ============================================================================

/// A simple spatial hash grid to accelerate neighbour lookups.
///
/// Points are bucketed into cubic cells of `cell_size`; a radius query scans
/// just enough surrounding cells to cover the radius.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    points: Vec<Vector3<f64>>,
    grid: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl SpatialIndex {
    pub fn new(points: &[Vector3<f64>], cell_size: f64) -> Self {
        // Guard against zero/negative sizes coming from degenerate configs.
        let cell_size = if cell_size.is_finite() && cell_size > 1e-6 { cell_size } else { 1.0 };

        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            grid.entry(Self::key(p, cell_size)).or_default().push(i);
        }
        Self {
            cell_size,
            points: points.to_vec(),
            grid,
        }
    }

    fn key(pos: &Vector3<f64>, cell_size: f64) -> (i64, i64, i64) {
        (
            (pos.x / cell_size).floor() as i64,
            (pos.y / cell_size).floor() as i64,
            (pos.z / cell_size).floor() as i64,
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices of points within `radius` of `pos` (inclusive), in ascending order.
    pub fn within(&self, pos: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let (cx, cy, cz) = Self::key(pos, self.cell_size);
        let reach = (radius / self.cell_size).ceil().max(1.0) as i64;
        let radius_sq = radius * radius;

        let mut hits = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    if let Some(indices) = self.grid.get(&(cx + dx, cy + dy, cz + dz)) {
                        for &i in indices {
                            if (self.points[i] - pos).norm_squared() <= radius_sq {
                                hits.push(i);
                            }
                        }
                    }
                }
            }
        }
        hits.sort_unstable();
        hits
    }

    /// Closest indexed point strictly closer than `radius`, if any.
    pub fn nearest_within(&self, pos: &Vector3<f64>, radius: f64) -> Option<(usize, f64)> {
        self.within(pos, radius)
            .into_iter()
            .map(|i| (i, (self.points[i] - pos).norm()))
            .filter(|&(_, d)| d < radius)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    /// Distance to the closest indexed point (full scan fallback when the grid
    /// neighbourhood is empty).
    pub fn min_distance(&self, pos: &Vector3<f64>) -> Option<f64> {
        if let Some((_, d)) = self.nearest_within(pos, self.cell_size) {
            return Some(d);
        }
        self.points
            .iter()
            .map(|p| (p - pos).norm())
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_query_spans_multiple_cells() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.5, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
        ];
        let index = SpatialIndex::new(&points, 1.0);
        assert_eq!(index.within(&Vector3::zeros(), 3.0), vec![0, 1]);
        assert_eq!(index.within(&Vector3::new(9.5, 0.0, 0.0), 1.0), vec![2]);
    }

    #[test]
    fn nearest_and_min_distance() {
        let points = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 3.0, 0.0)];
        let index = SpatialIndex::new(&points, 1.5);
        let (i, d) = index.nearest_within(&Vector3::zeros(), 2.0).unwrap();
        assert_eq!(i, 0);
        assert!((d - 1.0).abs() < 1e-12);
        assert!(index.nearest_within(&Vector3::new(0.0, 0.0, 5.0), 2.0).is_none());
        let far = index.min_distance(&Vector3::new(0.0, 0.0, 10.0)).unwrap();
        assert!((far - 101.0_f64.sqrt()).abs() < 1e-12);
    }
}
