//! Least-squares fits of planes and lines through small point sets.
//!
//! Both fits diagonalise the 3x3 scatter matrix of the centred points: the
//! plane normal is the eigenvector of the smallest eigenvalue, the line
//! direction the eigenvector of the largest.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

const DEGENERATE_EPS: f64 = 1e-12;

/// Best-fit plane through a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFit {
    pub centroid: Vector3<f64>,
    /// Unit normal in canonical orientation (see [`canonical_direction`]).
    pub normal: Vector3<f64>,
    /// Largest absolute point-to-plane distance.
    pub max_deviation: f64,
}

/// Best-fit line through a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub point: Vector3<f64>,
    /// Unit direction in canonical orientation.
    pub direction: Vector3<f64>,
}

impl LineFit {
    pub fn projection(&self, p: &Vector3<f64>) -> f64 {
        (p - self.point).dot(&self.direction)
    }

    pub fn distance(&self, p: &Vector3<f64>) -> f64 {
        perpendicular_distance(p, &self.point, &self.direction)
    }
}

pub fn centroid(points: &[Vector3<f64>]) -> Option<Vector3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().sum();
    Some(sum / points.len() as f64)
}

fn scatter(points: &[Vector3<f64>], c: &Vector3<f64>) -> Matrix3<f64> {
    points.iter().fold(Matrix3::zeros(), |acc, p| {
        let d = p - c;
        acc + d * d.transpose()
    })
}

/// Flips `v` so that its largest-magnitude component is positive.
/// Gives every fitted direction a reproducible sign.
pub fn canonical_direction(v: &Vector3<f64>) -> Vector3<f64> {
    let mut best = 0;
    for i in 1..3 {
        if v[i].abs() > v[best].abs() + 1e-9 {
            best = i;
        }
    }
    if v[best] < 0.0 {
        -v
    } else {
        *v
    }
}

/// Least-squares plane. Needs at least three points that are not collinear.
pub fn fit_plane(points: &[Vector3<f64>]) -> Option<PlaneFit> {
    if points.len() < 3 {
        return None;
    }
    let c = centroid(points)?;
    let eigen = SymmetricEigen::new(scatter(points, &c));

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    // The two in-plane eigenvalues must carry real spread.
    if eigen.eigenvalues[order[1]] < DEGENERATE_EPS {
        return None;
    }

    let normal = canonical_direction(&eigen.eigenvectors.column(order[0]).normalize());
    let max_deviation = points
        .iter()
        .map(|p| (p - c).dot(&normal).abs())
        .fold(0.0, f64::max);

    Some(PlaneFit {
        centroid: c,
        normal,
        max_deviation,
    })
}

/// Least-squares line. Needs at least two distinct points.
pub fn fit_line(points: &[Vector3<f64>]) -> Option<LineFit> {
    if points.len() < 2 {
        return None;
    }
    let c = centroid(points)?;
    let eigen = SymmetricEigen::new(scatter(points, &c));
    let (imax, lmax) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if *lmax < DEGENERATE_EPS {
        return None;
    }
    Some(LineFit {
        point: c,
        direction: canonical_direction(&eigen.eigenvectors.column(imax).normalize()),
    })
}

pub fn perpendicular_distance(p: &Vector3<f64>, line_point: &Vector3<f64>, direction: &Vector3<f64>) -> f64 {
    let d = p - line_point;
    (d - direction * d.dot(direction)).norm()
}

/// True when every point lies within `tolerance` of the line through the two
/// most distant points of the set (sets of fewer than 3 points count as collinear).
pub fn are_collinear(points: &[Vector3<f64>], tolerance: f64) -> bool {
    if points.len() < 3 {
        return true;
    }
    let p0 = points[0];
    let far = points
        .iter()
        .max_by(|a, b| (*a - p0).norm_squared().total_cmp(&(*b - p0).norm_squared()));
    let Some(p1) = far else { return true };
    let axis = p1 - p0;
    if axis.norm() < tolerance {
        return true;
    }
    let dir = axis.normalize();
    points
        .iter()
        .all(|p| perpendicular_distance(p, &p0, &dir) <= tolerance)
}
