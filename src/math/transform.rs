//! Rigid (distance-preserving) transforms over point sets.

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3};

/// Rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    iso: Isometry3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    pub fn translation(offset: Vector3<f64>) -> Self {
        Self {
            iso: Isometry3::from_parts(Translation3::from(offset), UnitQuaternion::identity()),
        }
    }

    /// Rotation of `angle` radians about `axis`, then translation by `offset`.
    /// A zero axis yields a pure translation.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64, offset: Vector3<f64>) -> Self {
        let rotation = Unit::try_new(*axis, 1e-12)
            .map(|a| UnitQuaternion::from_axis_angle(&a, angle))
            .unwrap_or_else(UnitQuaternion::identity);
        Self {
            iso: Isometry3::from_parts(Translation3::from(offset), rotation),
        }
    }

    pub fn apply_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.iso.transform_point(&Point3::from(*p)).coords
    }

    /// Rotates a direction; translation does not apply.
    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.iso.transform_vector(v)
    }

    pub fn inverse(&self) -> Self {
        Self {
            iso: self.iso.inverse(),
        }
    }

    /// `self` first, then `next`.
    pub fn then(&self, next: &RigidTransform) -> Self {
        Self {
            iso: next.iso * self.iso,
        }
    }
}

/// Stateless entry points used by the placer to move channels into a
/// canonical frame and back.
pub struct CoordinateTransformer;

impl CoordinateTransformer {
    pub fn apply(transform: &RigidTransform, points: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        points.iter().map(|p| transform.apply_point(p)).collect()
    }

    pub fn inverse(transform: &RigidTransform) -> RigidTransform {
        transform.inverse()
    }

    /// Frame in which `origin` sits at 0, `direction` points along +z and
    /// `reference` lies in the +x half of the xz plane.
    ///
    /// If `reference` is parallel to `direction`, the world axis least aligned
    /// with `direction` is used instead. Returns `None` for a zero direction.
    pub fn align_axis(
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
        reference: &Vector3<f64>,
    ) -> Option<RigidTransform> {
        let z = Unit::try_new(*direction, 1e-12)?.into_inner();

        let mut x = reference - z * reference.dot(&z);
        if x.norm() < 1e-9 {
            let fallback = [Vector3::x(), Vector3::y(), Vector3::z()]
                .into_iter()
                .min_by(|a, b| a.dot(&z).abs().total_cmp(&b.dot(&z).abs()))?;
            x = fallback - z * fallback.dot(&z);
        }
        let x = x.normalize();
        let y = z.cross(&x);

        let basis = Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
        let rotation = RigidTransform {
            iso: Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis)),
            ),
        };

        Some(RigidTransform::translation(-origin).then(&rotation))
    }
}
