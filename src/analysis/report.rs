use crate::analysis::geometry::AnalyzedChannel;
use crate::core::spatial::SpatialIndex;
use crate::core::structure::{AtomOrigin, Structure};
use crate::error::PlacementWarning;
use nalgebra::Vector3;
use std::fmt;

/// Distances around one placed guest.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestDetail {
    pub id: usize,
    pub element: String,
    pub channel_id: usize,
    pub layer_index: usize,
    pub position: Vector3<f64>,
    /// Closest ring plane of the guest's own channel.
    pub min_plane_distance: Option<f64>,
    pub min_host_distance: Option<f64>,
    pub min_guest_distance: Option<f64>,
}

/// Summary of one intercalation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementReport {
    pub guests: Vec<GuestDetail>,
    pub slots_attempted: usize,
    pub slots_skipped: usize,
    pub malformed_rings: usize,
}

impl PlacementReport {
    pub fn build(
        structure: &Structure,
        channels: &[AnalyzedChannel],
        warnings: &[PlacementWarning],
        slots_attempted: usize,
    ) -> Self {
        let host_positions: Vec<Vector3<f64>> = structure.host_atoms().iter().map(|a| a.atom.position).collect();
        let host_index = SpatialIndex::new(&host_positions, 3.0);
        let guests = structure.guest_atoms();

        let details = guests
            .iter()
            .enumerate()
            .filter_map(|(i, sa)| {
                let AtomOrigin::Guest { channel_id, layer_index } = sa.origin else {
                    return None;
                };
                let p = sa.atom.position;
                let min_plane_distance = channels
                    .iter()
                    .find(|c| c.id == channel_id)
                    .and_then(|c| c.geometry.iter().map(|g| g.plane_distance(&p)).min_by(f64::total_cmp));
                let min_guest_distance = guests
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, other)| other.atom.distance_to(&p))
                    .min_by(f64::total_cmp);
                Some(GuestDetail {
                    id: sa.atom.id,
                    element: sa.atom.element.clone(),
                    channel_id,
                    layer_index,
                    position: p,
                    min_plane_distance,
                    min_host_distance: host_index.min_distance(&p),
                    min_guest_distance,
                })
            })
            .collect();

        Self {
            guests: details,
            slots_attempted,
            slots_skipped: warnings.iter().filter(|w| w.is_skipped_slot()).count(),
            malformed_rings: warnings
                .iter()
                .filter(|w| matches!(w, PlacementWarning::MalformedRing { .. }))
                .count(),
        }
    }

    /// One-line partial-success summary.
    pub fn summary(&self) -> String {
        format!(
            "{} of {} intercalation slots skipped due to collisions",
            self.slots_skipped, self.slots_attempted
        )
    }

    /// Smallest guest-to-anything distance over the whole run.
    pub fn closest_contact(&self) -> Option<f64> {
        self.guests
            .iter()
            .flat_map(|g| [g.min_host_distance, g.min_guest_distance])
            .flatten()
            .min_by(f64::total_cmp)
    }
}

fn fmt_distance(d: Option<f64>) -> String {
    d.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

impl fmt::Display for PlacementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Intercalation Report ---")?;
        writeln!(f, "• Guests placed:   {}", self.guests.len())?;
        writeln!(f, "• Slots:           {}", self.summary())?;
        writeln!(f, "• Malformed rings: {}", self.malformed_rings)?;
        if let Some(d) = self.closest_contact() {
            writeln!(f, "• Closest contact: {d:.3} Å")?;
        }
        if !self.guests.is_empty() {
            writeln!(f, "{:>6} {:>3} {:>7} {:>5} {:>9} {:>9} {:>9}", "id", "el", "channel", "layer", "d_plane", "d_host", "d_guest")?;
            for g in &self.guests {
                writeln!(
                    f,
                    "{:>6} {:>3} {:>7} {:>5} {:>9} {:>9} {:>9}",
                    g.id,
                    g.element,
                    g.channel_id,
                    g.layer_index,
                    fmt_distance(g.min_plane_distance),
                    fmt_distance(g.min_host_distance),
                    fmt_distance(g.min_guest_distance)
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::detector::{Axis, RawChannel};
    use crate::analysis::geometry::ChannelGeometryAnalyzer;
    use crate::analysis::rings::Ring;
    use crate::config::GeometryConfig;
    use crate::core::structure::{AtomPosition, AtomRecord, BondWindow, Lattice, PlacedAtom};
    use crate::error::RingDefect;
    use crate::synthesis::assembler::StructureAssembler;

    const SIDE: f64 = 1.42;
    const SPACING: f64 = 3.35;

    fn column() -> (Lattice, AnalyzedChannel) {
        let mut records = Vec::new();
        for layer in 0..2 {
            for k in 0..6 {
                let a = (30.0 + 60.0 * k as f64).to_radians();
                records.push(AtomRecord::new("C", SIDE * a.cos(), SIDE * a.sin(), layer as f64 * SPACING));
            }
        }
        let lattice = Lattice::from_records(&records, BondWindow::default()).unwrap();
        let rings = (0..2)
            .map(|r| Ring::from_ids(&lattice, std::array::from_fn(|k| r * 6 + k)).unwrap())
            .collect();
        let raw = RawChannel {
            id: 0,
            rings,
            axis: Axis {
                origin: Vector3::zeros(),
                direction: Vector3::z(),
            },
        };
        let (channel, _) = ChannelGeometryAnalyzer::new(GeometryConfig::default()).analyze(&raw);
        (lattice, channel)
    }

    fn guest(slot: usize, position: Vector3<f64>) -> PlacedAtom {
        PlacedAtom {
            atom: AtomPosition::new(0, "Ar", position),
            channel_id: 0,
            layer_index: 0,
            slot,
        }
    }

    #[test]
    fn centred_guest_distances() {
        let (lattice, channel) = column();
        let structure = StructureAssembler::assemble(&lattice, vec![guest(0, Vector3::new(0.0, 0.0, 1.675))]).unwrap();

        let report = PlacementReport::build(&structure, &[channel], &[], 1);

        assert_eq!(report.guests.len(), 1);
        let g = &report.guests[0];
        assert_eq!(g.id, 12);
        assert_eq!(g.channel_id, 0);
        assert!((g.min_plane_distance.unwrap() - 1.675).abs() < 1e-9);
        let expected_host = (SIDE * SIDE + 1.675 * 1.675).sqrt();
        assert!((g.min_host_distance.unwrap() - expected_host).abs() < 1e-9);
        assert_eq!(g.min_guest_distance, None);
        assert!((report.closest_contact().unwrap() - expected_host).abs() < 1e-9);
        assert_eq!(report.summary(), "0 of 1 intercalation slots skipped due to collisions");
    }

    #[test]
    fn closest_contact_picks_the_guest_pair() {
        let (lattice, channel) = column();
        let guests = vec![
            guest(0, Vector3::new(0.0, 0.0, 1.675)),
            guest(1, Vector3::new(0.5, 0.0, 1.675)),
        ];
        let structure = StructureAssembler::assemble(&lattice, guests).unwrap();

        let report = PlacementReport::build(&structure, &[channel], &[], 2);

        for g in &report.guests {
            assert!((g.min_guest_distance.unwrap() - 0.5).abs() < 1e-12);
        }
        assert!((report.closest_contact().unwrap() - 0.5).abs() < 1e-12);
        let table = report.to_string();
        assert!(table.contains("--- Intercalation Report ---"));
        assert!(table.contains("d_plane"));
    }

    #[test]
    fn distant_guest_still_gets_a_host_distance() {
        let (lattice, channel) = column();
        // Far beyond one grid cell of every host atom.
        let structure = StructureAssembler::assemble(&lattice, vec![guest(0, Vector3::new(0.0, 0.0, 10.0))]).unwrap();

        let report = PlacementReport::build(&structure, &[channel], &[], 1);

        let g = &report.guests[0];
        let expected = (SIDE * SIDE + (10.0 - SPACING) * (10.0 - SPACING)).sqrt();
        assert!((g.min_host_distance.unwrap() - expected).abs() < 1e-9);
        assert!((g.min_plane_distance.unwrap() - (10.0 - SPACING)).abs() < 1e-9);
    }

    #[test]
    fn warnings_are_counted_by_kind() {
        let (lattice, channel) = column();
        let structure = StructureAssembler::assemble(&lattice, Vec::new()).unwrap();
        let warnings = [
            PlacementWarning::SlotSkipped {
                channel_id: 0,
                layer_index: 0,
                slot: 0,
                attempts: 4,
            },
            PlacementWarning::CrossChannelOverlap {
                channel_id: 1,
                layer_index: 0,
                slot: 2,
                other_channel_id: 0,
                distance: 1.1,
            },
            PlacementWarning::MalformedRing {
                channel_id: 0,
                ring_index: 1,
                defect: RingDefect::SelfIntersecting,
            },
        ];

        let report = PlacementReport::build(&structure, &[channel], &warnings, 40);

        assert!(report.guests.is_empty());
        assert_eq!(report.slots_skipped, 2);
        assert_eq!(report.malformed_rings, 1);
        assert_eq!(report.closest_contact(), None);
        assert_eq!(report.summary(), "2 of 40 intercalation slots skipped due to collisions");
    }
}
