//! Periodicity fit over ring centroids.
//!
//! The stacking vector `c` comes from consecutive rings inside channels; the
//! in-plane pair `a1`/`a2` comes from the offsets between channel axes. Both
//! are refined as integer least-squares fits so that second- or third-nearest
//! neighbours contribute as exact multiples of the primitive vectors.

use crate::analysis::geometry::AnalyzedChannel;
use crate::config::LatticeFitConfig;
use crate::error::CoreError;
use crate::math::fitting;
use crate::math::lll;
use crate::math::transform::RigidTransform;
use nalgebra::{Matrix2, Matrix3, Matrix3x2, Vector2, Vector3};

/// Primitive translations of the honeycomb host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeVectors {
    pub a1: Vector3<f64>,
    pub a2: Vector3<f64>,
    pub c: Vector3<f64>,
}

impl LatticeVectors {
    /// Distance between stacked layers, used when no spacing is configured.
    pub fn layer_spacing(&self) -> f64 {
        self.c.norm()
    }

    /// Columns `[a1 a2 c]`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.a1, self.a2, self.c])
    }

    pub fn cell_volume(&self) -> f64 {
        self.a1.cross(&self.a2).dot(&self.c).abs()
    }

    pub fn translation(&self, shift: [i32; 3]) -> Vector3<f64> {
        self.a1 * shift[0] as f64 + self.a2 * shift[1] as f64 + self.c * shift[2] as f64
    }

    /// Copies `points` shifted by the integer lattice translation `shift`.
    pub fn translate(&self, points: &[Vector3<f64>], shift: [i32; 3]) -> Vec<Vector3<f64>> {
        let t = self.translation(shift);
        points.iter().map(|p| p + t).collect()
    }

    /// All copies of `points` over a `repeats[0] x repeats[1] x repeats[2]`
    /// block of cells, the original cell first.
    pub fn periodic_images(&self, points: &[Vector3<f64>], repeats: [u32; 3]) -> Vec<Vector3<f64>> {
        let mut out = Vec::with_capacity(points.len() * repeats.iter().map(|&r| r as usize).product::<usize>());
        for i in 0..repeats[0] as i32 {
            for j in 0..repeats[1] as i32 {
                for k in 0..repeats[2] as i32 {
                    out.extend(self.translate(points, [i, j, k]));
                }
            }
        }
        out
    }
}

pub struct LatticeVectorCalculator {
    config: LatticeFitConfig,
}

impl LatticeVectorCalculator {
    pub fn new(config: LatticeFitConfig) -> Self {
        Self { config }
    }

    /// Least-squares stacking vector from consecutive ring centroids of every
    /// channel. Each difference `d_i` is modelled as `n_i * c` with `n_i` a
    /// positive integer, so skipped rings still count.
    ///
    /// # Errors
    /// [`CoreError::DegenerateLattice`] when no channel has two stacked rings.
    pub fn stacking_vector(&self, channels: &[AnalyzedChannel]) -> Result<Vector3<f64>, CoreError> {
        let diffs: Vec<Vector3<f64>> = channels
            .iter()
            .flat_map(|ch| ch.geometry.windows(2).map(|w| w[1].centroid - w[0].centroid))
            .filter(|d| d.norm() > self.config.collinearity_tolerance)
            .collect();

        let base = diffs
            .iter()
            .min_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))
            .copied()
            .ok_or_else(|| CoreError::DegenerateLattice("no pair of stacked rings to fit a stacking vector".into()))?;

        let base_sq = base.norm_squared();
        let mut weighted = Vector3::zeros();
        let mut norm = 0.0;
        for d in &diffs {
            let oriented = if d.dot(&base) < 0.0 { -d } else { *d };
            let n = (oriented.dot(&base) / base_sq).round().max(1.0);
            weighted += oriented * n;
            norm += n * n;
        }

        let c = fitting::canonical_direction(&(weighted / norm));
        log::debug!("stacking vector from {} ring pair(s): |c| = {:.4} Å", diffs.len(), c.norm());
        Ok(c)
    }

    /// Fits `a1`, `a2` and `c`.
    ///
    /// # Errors
    /// [`CoreError::DegenerateLattice`] with fewer than three non-collinear
    /// ring centroids, or when all channel axes coincide in projection.
    pub fn fit(&self, channels: &[AnalyzedChannel]) -> Result<LatticeVectors, CoreError> {
        let tol = self.config.collinearity_tolerance;
        let centroids: Vec<Vector3<f64>> = channels.iter().flat_map(|ch| ch.centroids()).collect();
        if centroids.len() < 3 || fitting::are_collinear(&centroids, tol) {
            return Err(CoreError::DegenerateLattice(format!(
                "need at least 3 non-collinear ring centroids, got {} ({})",
                centroids.len(),
                if centroids.len() < 3 { "too few" } else { "all collinear" }
            )));
        }

        let c = self.stacking_vector(channels)?;
        let n = c.normalize();

        // One in-plane point per channel: the mean of its projected centroids.
        let anchors: Vec<Vector3<f64>> = channels
            .iter()
            .filter_map(|ch| fitting::centroid(&ch.centroids()))
            .map(|p| p - n * p.dot(&n))
            .collect();

        let mut diffs = Vec::new();
        for i in 0..anchors.len() {
            for j in (i + 1)..anchors.len() {
                let d = anchors[j] - anchors[i];
                if d.norm() > tol {
                    diffs.push(d);
                }
            }
        }
        let by_length = |a: &&Vector3<f64>, b: &&Vector3<f64>| a.norm_squared().total_cmp(&b.norm_squared());

        let a1 = diffs.iter().min_by(by_length).copied().ok_or_else(|| {
            CoreError::DegenerateLattice("channel axes do not separate in the plane normal to c".into())
        })?;
        let a1 = fitting::canonical_direction(&a1);

        let a2 = match diffs
            .iter()
            .filter(|d| a1.cross(*d).norm() / a1.norm() > tol)
            .min_by(by_length)
        {
            Some(d) => *d,
            None => {
                log::debug!("single in-plane direction; closing the hexagon with a 60° rotation");
                RigidTransform::from_axis_angle(&n, 60f64.to_radians(), Vector3::zeros()).apply_vector(&a1)
            }
        };

        let (a1, a2) = refine_in_plane(&a1, &a2, &diffs, tol);
        let (mut a1, mut a2) = lll::reduce_in_plane(&a1, &a2, &n);
        if a1.cross(&a2).dot(&c) < 0.0 {
            std::mem::swap(&mut a1, &mut a2);
        }

        log::debug!(
            "lattice vectors: |a1| = {:.4}, |a2| = {:.4}, |c| = {:.4} Å",
            a1.norm(),
            a2.norm(),
            c.norm()
        );
        Ok(LatticeVectors { a1, a2, c })
    }
}

/// Integer least squares: every difference is rounded onto the current basis,
/// then `[a1 a2]` is re-solved as `A = S_dn * S_nn^-1` over all well-matched
/// differences. Returns the seed pair when the system is singular.
fn refine_in_plane(
    a1: &Vector3<f64>,
    a2: &Vector3<f64>,
    diffs: &[Vector3<f64>],
    tol: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let gram = Matrix2::new(a1.dot(a1), a1.dot(a2), a2.dot(a1), a2.dot(a2));
    let Some(gram_inv) = gram.try_inverse() else {
        return (*a1, *a2);
    };
    let match_tol = tol.max(0.25 * a1.norm().min(a2.norm()));

    let mut s_dn = Matrix3x2::zeros();
    let mut s_nn = Matrix2::zeros();
    for d in diffs {
        let coeff = gram_inv * Vector2::new(d.dot(a1), d.dot(a2));
        let m = coeff.map(f64::round);
        if m == Vector2::zeros() {
            continue;
        }
        let residual = d - (a1 * m.x + a2 * m.y);
        if residual.norm() > match_tol {
            continue;
        }
        s_dn += d * m.transpose();
        s_nn += m * m.transpose();
    }

    match s_nn.try_inverse() {
        Some(inv) => {
            let refined = s_dn * inv;
            (refined.column(0).into_owned(), refined.column(1).into_owned())
        }
        None => (*a1, *a2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::detector::Axis;
    use crate::analysis::geometry::RingGeometry;

    fn channel_at(id: usize, x: f64, y: f64, layers: usize, spacing: f64) -> AnalyzedChannel {
        let geometry = (0..layers)
            .map(|k| RingGeometry {
                centroid: Vector3::new(x, y, k as f64 * spacing),
                normal: Vector3::z(),
                diameter: 2.84,
                inradius: 1.23,
                interior_angles_deg: [120.0; 6],
                max_angle_deviation_deg: 0.0,
                tilt_deg: 0.0,
                self_intersecting: false,
            })
            .collect();
        AnalyzedChannel {
            id,
            rings: Vec::new(),
            geometry,
            axis: Axis {
                origin: Vector3::new(x, y, 0.0),
                direction: Vector3::z(),
            },
            inter_plane_distances: vec![spacing; layers.saturating_sub(1)],
            length: spacing * layers.saturating_sub(1) as f64,
            mean_diameter: 2.84,
        }
    }

    #[test]
    fn stacking_vector_accepts_integer_multiples() {
        let mut ch = channel_at(0, 0.0, 0.0, 2, 3.35);
        // A missing ring doubles one gap.
        ch.geometry.push(RingGeometry {
            centroid: Vector3::new(0.0, 0.0, 10.05),
            ..ch.geometry[0]
        });
        let c = LatticeVectorCalculator::new(LatticeFitConfig::default())
            .stacking_vector(&[ch])
            .unwrap();
        assert!((c - Vector3::new(0.0, 0.0, 3.35)).norm() < 1e-9);
    }

    #[test]
    fn two_channels_close_the_hexagon() {
        let a = 2.46;
        let channels = vec![channel_at(0, 0.0, 0.0, 2, 3.35), channel_at(1, a, 0.0, 2, 3.35)];
        let v = LatticeVectorCalculator::new(LatticeFitConfig::default()).fit(&channels).unwrap();
        assert!((v.a1.norm() - a).abs() < 1e-9);
        assert!((v.a2.norm() - a).abs() < 1e-9);
        assert!((v.a1.angle(&v.a2).to_degrees() - 60.0).abs() < 1e-6 || (v.a1.angle(&v.a2).to_degrees() - 120.0).abs() < 1e-6);
        assert!((v.layer_spacing() - 3.35).abs() < 1e-9);
        assert!(v.a1.cross(&v.a2).dot(&v.c) > 0.0);
    }

    #[test]
    fn single_channel_is_degenerate() {
        let calc = LatticeVectorCalculator::new(LatticeFitConfig::default());
        let err = calc.fit(&[channel_at(0, 0.0, 0.0, 5, 3.35)]).unwrap_err();
        assert!(matches!(err, CoreError::DegenerateLattice(_)));
        assert!(calc.stacking_vector(&[channel_at(0, 0.0, 0.0, 1, 3.35)]).is_err());
    }

    #[test]
    fn periodic_images_cover_the_block() {
        let v = LatticeVectors {
            a1: Vector3::new(2.0, 0.0, 0.0),
            a2: Vector3::new(0.0, 2.0, 0.0),
            c: Vector3::new(0.0, 0.0, 3.0),
        };
        let images = v.periodic_images(&[Vector3::zeros()], [2, 2, 1]);
        assert_eq!(images.len(), 4);
        assert_eq!(images[0], Vector3::zeros());
        assert!(images.contains(&Vector3::new(2.0, 2.0, 0.0)));
        assert!((v.cell_volume() - 12.0).abs() < 1e-12);
    }
}
