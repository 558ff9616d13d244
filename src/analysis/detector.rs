use crate::analysis::rings::{self, Ring};
use crate::config::DetectorConfig;
use crate::core::connectivity::BondGraph;
use crate::core::structure::Lattice;
use crate::error::CoreError;
use crate::math::fitting;
use nalgebra::Vector3;
use std::cmp::Ordering;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Straight line a channel runs along. `direction` is a unit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub origin: Vector3<f64>,
    pub direction: Vector3<f64>,
}

impl Axis {
    pub fn projection(&self, p: &Vector3<f64>) -> f64 {
        (p - self.origin).dot(&self.direction)
    }

    pub fn distance(&self, p: &Vector3<f64>) -> f64 {
        fitting::perpendicular_distance(p, &self.origin, &self.direction)
    }

    /// Point on the axis at signed axial coordinate `t`.
    pub fn point_at(&self, t: f64) -> Vector3<f64> {
        self.origin + self.direction * t
    }
}

/// Rings chained along one axis, before geometric enrichment.
/// Rings are ordered by increasing projection on `axis`.
#[derive(Debug, Clone)]
pub struct RawChannel {
    pub id: usize,
    pub rings: Vec<Ring>,
    pub axis: Axis,
}

/// Chain under construction. `members` index into the planar ring list.
struct Chain {
    members: Vec<usize>,
    axis: Axis,
    anchor: Vector3<f64>,
}

/// Cached per-ring data used while chaining.
struct RingSeed {
    ring: Ring,
    centroid: Vector3<f64>,
    normal: Vector3<f64>,
}

fn lexicographic(a: &Vector3<f64>, b: &Vector3<f64>) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct ChannelDetector {
    config: DetectorConfig,
}

impl ChannelDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Finds hexagonal rings in the bond graph and stacks them into channels.
    ///
    /// # Errors
    /// [`CoreError::Detection`] when the lattice has no bonds, fewer than two
    /// planar rings, or no pair of rings that stack along a common axis.
    pub fn detect(&self, lattice: &Lattice) -> Result<Vec<RawChannel>, CoreError> {
        if lattice.bonds().is_empty() {
            let window = lattice.bond_window();
            return Err(CoreError::Detection(format!(
                "no bonds within [{}, {}] Å among {} atoms",
                window.min,
                window.max,
                lattice.len()
            )));
        }

        let graph = BondGraph::from_lattice(lattice);
        let cycles = rings::find_hexagonal_rings(&graph, lattice);
        let cycle_count = cycles.len();

        let mut seeds: Vec<RingSeed> = cycles
            .into_iter()
            .filter_map(|ring| {
                let plane = ring.plane()?;
                (plane.max_deviation <= self.config.planarity_tolerance).then(|| RingSeed {
                    centroid: ring.centroid(),
                    normal: plane.normal,
                    ring,
                })
            })
            .collect();
        log::debug!(
            "{} of {} 6-cycles are planar within {:.3} Å",
            seeds.len(),
            cycle_count,
            self.config.planarity_tolerance
        );

        if seeds.len() < 2 {
            return Err(CoreError::Detection(format!(
                "found {} planar hexagonal ring(s); at least two are needed to form a channel",
                seeds.len()
            )));
        }

        seeds.sort_by(|a, b| lexicographic(&a.centroid, &b.centroid));
        let chains = self.chain_rings(&seeds);

        let mut channels: Vec<RawChannel> = chains
            .into_iter()
            .flat_map(|chain| self.split_chain(&seeds, chain))
            .collect();

        if channels.is_empty() {
            return Err(CoreError::Detection(format!(
                "none of the {} rings stack along a common axis",
                seeds.len()
            )));
        }

        channels.sort_by(|a, b| lexicographic(&a.rings[0].centroid(), &b.rings[0].centroid()));
        for (id, channel) in channels.iter_mut().enumerate() {
            channel.id = id;
        }

        log::info!(
            "detected {} channel(s) from {} rings",
            channels.len(),
            channels.iter().map(|c| c.rings.len()).sum::<usize>()
        );
        Ok(channels)
    }

    /// Greedy assignment of rings (already in lexicographic centroid order)
    /// to the nearest compatible chain.
    fn chain_rings(&self, seeds: &[RingSeed]) -> Vec<Chain> {
        let cos_limit = self.config.normal_alignment_deg.to_radians().cos();
        let mut chains: Vec<Chain> = Vec::new();

        for (index, seed) in seeds.iter().enumerate() {
            let best = chains
                .iter()
                .enumerate()
                .filter_map(|(ci, chain)| {
                    if seed.normal.dot(&chain.axis.direction).abs() < cos_limit {
                        return None;
                    }
                    let radial = chain.axis.distance(&seed.centroid);
                    if radial > self.config.axis_tolerance {
                        return None;
                    }
                    let t = chain.axis.projection(&seed.centroid);
                    let axial = chain
                        .members
                        .iter()
                        .map(|&m| (chain.axis.projection(&seeds[m].centroid) - t).abs())
                        .fold(f64::INFINITY, f64::min);
                    if axial < self.config.min_ring_gap {
                        return None;
                    }
                    Some((ci, radial, axial))
                })
                .min_by(|a, b| {
                    a.1.total_cmp(&b.1)
                        .then(a.2.total_cmp(&b.2))
                        .then_with(|| lexicographic(&chains[a.0].anchor, &chains[b.0].anchor))
                });

            match best {
                Some((ci, _, _)) => {
                    let chain = &mut chains[ci];
                    chain.members.push(index);
                    let centroids: Vec<Vector3<f64>> =
                        chain.members.iter().map(|&m| seeds[m].centroid).collect();
                    if let Some(line) = fitting::fit_line(&centroids) {
                        chain.axis = Axis {
                            origin: line.point,
                            direction: line.direction,
                        };
                    }
                }
                None => chains.push(Chain {
                    members: vec![index],
                    axis: Axis {
                        origin: seed.centroid,
                        direction: seed.normal,
                    },
                    anchor: seed.centroid,
                }),
            }
        }

        log::debug!("chaining produced {} candidate chain(s)", chains.len());
        chains
    }

    /// Orders a chain along its axis and cuts it where a gap is much larger
    /// than the chain's stacking step (its smallest gap). Pieces with fewer
    /// than two rings are dropped.
    fn split_chain(&self, seeds: &[RingSeed], chain: Chain) -> Vec<RawChannel> {
        if chain.members.len() < 2 {
            return Vec::new();
        }

        let axis = chain.axis;
        let mut ordered: Vec<(f64, usize)> = chain
            .members
            .iter()
            .map(|&m| (axis.projection(&seeds[m].centroid), m))
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let gaps: Vec<f64> = ordered.windows(2).map(|w| w[1].0 - w[0].0).collect();
        let step = gaps
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
            .max(self.config.min_ring_gap);
        let limit = self.config.max_gap_ratio * step;

        let mut pieces: Vec<Vec<usize>> = vec![vec![ordered[0].1]];
        for (gap, &(_, m)) in gaps.iter().zip(ordered.iter().skip(1)) {
            if *gap > limit {
                log::debug!("splitting chain at a {:.3} Å gap (limit {:.3} Å)", gap, limit);
                pieces.push(Vec::new());
            }
            if let Some(piece) = pieces.last_mut() {
                piece.push(m);
            }
        }

        pieces
            .into_iter()
            .filter(|piece| piece.len() >= 2)
            .filter_map(|piece| {
                let centroids: Vec<Vector3<f64>> = piece.iter().map(|&m| seeds[m].centroid).collect();
                let line = fitting::fit_line(&centroids)?;
                let mut direction = line.direction;
                // Point from the first ring to the last.
                if (centroids[centroids.len() - 1] - centroids[0]).dot(&direction) < 0.0 {
                    direction = -direction;
                }
                let fitted = Axis {
                    origin: line.point,
                    direction,
                };
                let origin = fitted.point_at(fitted.projection(&centroids[0]));
                Some(RawChannel {
                    id: 0,
                    rings: piece.iter().map(|&m| seeds[m].ring.clone()).collect(),
                    axis: Axis { origin, direction },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::structure::{AtomRecord, BondWindow};

    fn stacked_hexagons(layers: usize, spacing: f64) -> Vec<AtomRecord> {
        let mut out = Vec::new();
        for layer in 0..layers {
            for k in 0..6 {
                let a = (30.0 + 60.0 * k as f64).to_radians();
                out.push(AtomRecord::new("C", 1.42 * a.cos(), 1.42 * a.sin(), layer as f64 * spacing));
            }
        }
        out
    }

    #[test]
    fn stacked_rings_form_one_channel() {
        let lattice = Lattice::from_records(&stacked_hexagons(4, 3.35), BondWindow::default()).unwrap();
        let channels = ChannelDetector::new(DetectorConfig::default()).detect(&lattice).unwrap();
        assert_eq!(channels.len(), 1);
        let channel = &channels[0];
        assert_eq!(channel.rings.len(), 4);
        assert!((channel.axis.direction - Vector3::z()).norm() < 1e-9);
        assert!(channel.axis.origin.norm() < 1e-9);
        let z: Vec<f64> = channel.rings.iter().map(|r| r.centroid().z).collect();
        assert!(z.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn large_gap_splits_the_stack() {
        let mut records = stacked_hexagons(2, 3.35);
        for k in 0..6 {
            let a = (30.0 + 60.0 * k as f64).to_radians();
            records.push(AtomRecord::new("C", 1.42 * a.cos(), 1.42 * a.sin(), 20.0));
        }
        let lattice = Lattice::from_records(&records, BondWindow::default()).unwrap();
        let channels = ChannelDetector::new(DetectorConfig::default()).detect(&lattice).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].rings.len(), 2);
        assert!(channels[0].rings.iter().all(|r| r.centroid().z < 3.36));
    }

    #[test]
    fn gap_between_two_stacks_yields_two_channels() {
        let mut records = stacked_hexagons(2, 3.35);
        for z in [20.0, 23.35] {
            for k in 0..6 {
                let a = (30.0 + 60.0 * k as f64).to_radians();
                records.push(AtomRecord::new("C", 1.42 * a.cos(), 1.42 * a.sin(), z));
            }
        }
        let lattice = Lattice::from_records(&records, BondWindow::default()).unwrap();
        let channels = ChannelDetector::new(DetectorConfig::default()).detect(&lattice).unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels.iter().all(|c| c.rings.len() == 2));
        assert!(channels[1].rings[0].centroid().z > 19.9);
    }

    #[test]
    fn mildly_uneven_stacking_stays_one_channel() {
        let mut records = Vec::new();
        for z in [0.0, 3.35, 7.0, 10.35] {
            for k in 0..6 {
                let a = (30.0 + 60.0 * k as f64).to_radians();
                records.push(AtomRecord::new("C", 1.42 * a.cos(), 1.42 * a.sin(), z));
            }
        }
        let lattice = Lattice::from_records(&records, BondWindow::default()).unwrap();
        let channels = ChannelDetector::new(DetectorConfig::default()).detect(&lattice).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].rings.len(), 4);
    }

    #[test]
    fn no_bonds_is_a_detection_error() {
        let records = vec![
            AtomRecord::new("C", 0.0, 0.0, 0.0),
            AtomRecord::new("C", 5.0, 0.0, 0.0),
        ];
        let lattice = Lattice::from_records(&records, BondWindow::default()).unwrap();
        let err = ChannelDetector::new(DetectorConfig::default()).detect(&lattice).unwrap_err();
        assert!(matches!(err, CoreError::Detection(_)));
    }

    #[test]
    fn a_single_ring_is_not_a_channel() {
        let lattice = Lattice::from_records(&stacked_hexagons(1, 3.35), BondWindow::default()).unwrap();
        assert!(ChannelDetector::new(DetectorConfig::default()).detect(&lattice).is_err());
    }
}
