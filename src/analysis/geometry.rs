use crate::analysis::detector::{Axis, RawChannel};
use crate::analysis::rings::{Ring, RING_SIZE};
use crate::config::GeometryConfig;
use crate::error::{PlacementWarning, RingDefect};
use nalgebra::{Vector2, Vector3};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Shape metrics of one ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingGeometry {
    pub centroid: Vector3<f64>,
    /// Unit plane normal, oriented along the channel axis.
    pub normal: Vector3<f64>,
    pub diameter: f64,
    pub inradius: f64,
    pub interior_angles_deg: [f64; RING_SIZE],
    pub max_angle_deviation_deg: f64,
    /// Angle between the ring normal and the channel axis.
    pub tilt_deg: f64,
    pub self_intersecting: bool,
}

impl RingGeometry {
    pub fn plane_distance(&self, p: &Vector3<f64>) -> f64 {
        (p - self.centroid).dot(&self.normal).abs()
    }
}

/// A channel with per-ring geometry, ready for placement.
#[derive(Debug, Clone)]
pub struct AnalyzedChannel {
    pub id: usize,
    pub rings: Vec<Ring>,
    /// Parallel to `rings`.
    pub geometry: Vec<RingGeometry>,
    /// Origin sits on the first surviving ring's centroid.
    pub axis: Axis,
    /// Distance between ring `i` and ring `i + 1` along their shared normal.
    pub inter_plane_distances: Vec<f64>,
    pub length: f64,
    pub mean_diameter: f64,
}

impl AnalyzedChannel {
    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    pub fn centroids(&self) -> Vec<Vector3<f64>> {
        self.geometry.iter().map(|g| g.centroid).collect()
    }

    /// Axial coordinate of each ring plane, measured from the first ring.
    pub fn ring_positions(&self) -> Vec<f64> {
        let mut positions = Vec::with_capacity(self.geometry.len());
        if !self.geometry.is_empty() {
            positions.push(0.0);
        }
        let mut acc = 0.0;
        for d in &self.inter_plane_distances {
            acc += d;
            positions.push(acc);
        }
        positions
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

pub struct ChannelGeometryAnalyzer {
    config: GeometryConfig,
}

impl ChannelGeometryAnalyzer {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    fn check(&self, g: RingGeometry) -> Result<RingGeometry, RingDefect> {
        if g.self_intersecting {
            Err(RingDefect::SelfIntersecting)
        } else if g.max_angle_deviation_deg > self.config.angle_tolerance_deg {
            Err(RingDefect::AngleDeviation(g.max_angle_deviation_deg))
        } else if g.tilt_deg > self.config.max_tilt_deg {
            Err(RingDefect::Tilted(g.tilt_deg))
        } else {
            Ok(g)
        }
    }

    /// Measures every ring, drops malformed ones with a warning and derives
    /// the channel length and mean diameter from the survivors.
    pub fn analyze(&self, channel: &RawChannel) -> (AnalyzedChannel, Vec<PlacementWarning>) {
        let mut warnings = Vec::new();
        let mut rings = Vec::with_capacity(channel.rings.len());
        let mut geometry = Vec::with_capacity(channel.rings.len());

        for (ring_index, ring) in channel.rings.iter().enumerate() {
            let measured = measure_ring(ring, &channel.axis).ok_or(RingDefect::Degenerate);
            match measured.and_then(|g| self.check(g)) {
                Ok(g) => {
                    rings.push(ring.clone());
                    geometry.push(g);
                }
                Err(defect) => {
                    let warning = PlacementWarning::MalformedRing {
                        channel_id: channel.id,
                        ring_index,
                        defect,
                    };
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        let inter_plane_distances: Vec<f64> = geometry
            .windows(2)
            .map(|pair| {
                let shared = (pair[0].normal + pair[1].normal).normalize();
                (pair[1].centroid - pair[0].centroid).dot(&shared).abs()
            })
            .collect();
        let length: f64 = inter_plane_distances.iter().sum();
        let mean_diameter = if geometry.is_empty() {
            0.0
        } else {
            geometry.iter().map(|g| g.diameter).sum::<f64>() / geometry.len() as f64
        };

        let axis = Axis {
            origin: geometry.first().map_or(channel.axis.origin, |g| g.centroid),
            direction: channel.axis.direction,
        };

        log::debug!(
            "channel {}: {} ring(s), length {:.3} Å, mean diameter {:.3} Å",
            channel.id,
            rings.len(),
            length,
            mean_diameter
        );

        (
            AnalyzedChannel {
                id: channel.id,
                rings,
                geometry,
                axis,
                inter_plane_distances,
                length,
                mean_diameter,
            },
            warnings,
        )
    }
}

/// Plane fit plus shape metrics. `None` if the vertices do not span a plane.
pub fn measure_ring(ring: &Ring, axis: &Axis) -> Option<RingGeometry> {
    let plane = ring.plane()?;
    let normal = if plane.normal.dot(&axis.direction) < 0.0 {
        -plane.normal
    } else {
        plane.normal
    };

    let interior_angles_deg = ring.interior_angles_deg();
    let max_angle_deviation_deg = interior_angles_deg
        .iter()
        .map(|a| (a - 120.0).abs())
        .fold(0.0, f64::max);
    let tilt_deg = normal.dot(&axis.direction).abs().clamp(0.0, 1.0).acos().to_degrees();

    Some(RingGeometry {
        centroid: plane.centroid,
        normal,
        diameter: ring.diameter(),
        inradius: ring.inradius(),
        interior_angles_deg,
        max_angle_deviation_deg,
        tilt_deg,
        self_intersecting: is_self_intersecting(&ring.vertices(), &plane.centroid, &normal),
    })
}

fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn segments_intersect(p1: &Vector2<f64>, p2: &Vector2<f64>, q1: &Vector2<f64>, q2: &Vector2<f64>) -> bool {
    const EPS: f64 = 1e-9;
    let d1 = cross2(&(q2 - q1), &(p1 - q1));
    let d2 = cross2(&(q2 - q1), &(p2 - q1));
    let d3 = cross2(&(p2 - p1), &(q1 - p1));
    let d4 = cross2(&(p2 - p1), &(q2 - p1));
    (d1 > EPS && d2 < -EPS || d1 < -EPS && d2 > EPS) && (d3 > EPS && d4 < -EPS || d3 < -EPS && d4 > EPS)
}

/// Projects the cycle into its plane and tests every pair of non-adjacent edges.
fn is_self_intersecting(vertices: &[Vector3<f64>; RING_SIZE], centroid: &Vector3<f64>, normal: &Vector3<f64>) -> bool {
    let seed = if normal.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = (seed - normal * seed.dot(normal)).normalize();
    let v = normal.cross(&u);
    let flat: Vec<Vector2<f64>> = vertices
        .iter()
        .map(|p| {
            let d = p - centroid;
            Vector2::new(d.dot(&u), d.dot(&v))
        })
        .collect();

    for i in 0..RING_SIZE {
        for j in (i + 2)..RING_SIZE {
            if (j + 1) % RING_SIZE == i {
                continue;
            }
            if segments_intersect(&flat[i], &flat[(i + 1) % RING_SIZE], &flat[j], &flat[(j + 1) % RING_SIZE]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::structure::{AtomRecord, BondWindow, Lattice};

    fn ring_at(lattice: &Lattice, first: usize) -> Ring {
        Ring::from_ids(lattice, std::array::from_fn(|k| first + k)).unwrap()
    }

    fn channel_from(records: &[AtomRecord], rings: usize) -> (Lattice, RawChannel) {
        let lattice = Lattice::from_records(records, BondWindow::default()).unwrap();
        let rings = (0..rings).map(|r| ring_at(&lattice, r * 6)).collect();
        let channel = RawChannel {
            id: 0,
            rings,
            axis: Axis {
                origin: Vector3::zeros(),
                direction: Vector3::z(),
            },
        };
        (lattice, channel)
    }

    fn hexagon(z: f64, out: &mut Vec<AtomRecord>) {
        for k in 0..6 {
            let a = (30.0 + 60.0 * k as f64).to_radians();
            out.push(AtomRecord::new("C", 1.42 * a.cos(), 1.42 * a.sin(), z));
        }
    }

    #[test]
    fn length_and_diameter_of_regular_stack() {
        let mut records = Vec::new();
        for layer in 0..3 {
            hexagon(layer as f64 * 3.35, &mut records);
        }
        let (_, channel) = channel_from(&records, 3);
        let (analyzed, warnings) = ChannelGeometryAnalyzer::new(GeometryConfig::default()).analyze(&channel);

        assert!(warnings.is_empty());
        assert_eq!(analyzed.ring_count(), 3);
        assert!((analyzed.length - 6.7).abs() < 1e-9);
        assert!((analyzed.mean_diameter - 2.84).abs() < 1e-9);
        assert_eq!(analyzed.ring_positions().len(), 3);
        assert!(analyzed.geometry.iter().all(|g| g.tilt_deg < 1e-6));
    }

    #[test]
    fn bowtie_ring_is_dropped_with_warning() {
        let mut records = Vec::new();
        hexagon(0.0, &mut records);
        // Vertex order 0,1,2,3,5,4 crosses the polygon over itself.
        let mut bad = Vec::new();
        hexagon(3.35, &mut bad);
        bad.swap(4, 5);
        records.extend(bad);
        hexagon(6.7, &mut records);

        let (_, channel) = channel_from(&records, 3);
        let (analyzed, warnings) = ChannelGeometryAnalyzer::new(GeometryConfig::default()).analyze(&channel);

        assert_eq!(analyzed.ring_count(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            PlacementWarning::MalformedRing {
                ring_index: 1,
                defect: RingDefect::SelfIntersecting,
                ..
            }
        ));
        assert!((analyzed.length - 6.7).abs() < 1e-9);
    }

    #[test]
    fn collapsed_ring_is_reported_as_degenerate() {
        let mut records = Vec::new();
        hexagon(0.0, &mut records);
        // All six vertices on one line: no plane to fit.
        for k in 0..6 {
            records.push(AtomRecord::new("C", 1.42 * k as f64, 0.0, 3.35));
        }
        hexagon(6.7, &mut records);

        let (_, channel) = channel_from(&records, 3);
        let (analyzed, warnings) = ChannelGeometryAnalyzer::new(GeometryConfig::default()).analyze(&channel);

        assert_eq!(analyzed.ring_count(), 2);
        assert!(matches!(
            warnings[0],
            PlacementWarning::MalformedRing {
                ring_index: 1,
                defect: RingDefect::Degenerate,
                ..
            }
        ));
    }

    #[test]
    fn ring_tilted_off_the_axis_is_dropped() {
        let mut records = Vec::new();
        hexagon(0.0, &mut records);
        // Regular hexagon rotated 45° about x.
        let (s, c) = 45f64.to_radians().sin_cos();
        for k in 0..6 {
            let a = (30.0 + 60.0 * k as f64).to_radians();
            let (x, y) = (1.42 * a.cos(), 1.42 * a.sin());
            records.push(AtomRecord::new("C", x, y * c, 3.35 + y * s));
        }
        hexagon(6.7, &mut records);

        let (_, channel) = channel_from(&records, 3);
        let (analyzed, warnings) = ChannelGeometryAnalyzer::new(GeometryConfig::default()).analyze(&channel);

        assert_eq!(analyzed.ring_count(), 2);
        match warnings[0] {
            PlacementWarning::MalformedRing {
                defect: RingDefect::Tilted(tilt),
                ..
            } => assert!((tilt - 45.0).abs() < 1e-6),
            ref other => panic!("unexpected warning {other:?}"),
        }
    }
}
