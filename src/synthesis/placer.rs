use crate::analysis::geometry::AnalyzedChannel;
use crate::chemistry::guest::{IntercalationSpec, PlacementPattern};
use crate::core::spatial::SpatialIndex;
use crate::core::structure::{AtomPosition, PlacedAtom};
use crate::error::PlacementWarning;
use crate::math::transform::CoordinateTransformer;
use nalgebra::Vector3;
use std::f64::consts::TAU;

/// Slack on the layer-count boundary, so `Lc == k * s` keeps its last layer.
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// Number of guest layers that fit in a channel of length `length`.
///
/// Layers sit at `s/2 + k*s`; the count is `floor((Lc - s) / s) + 1` for
/// `Lc >= s` and zero otherwise.
pub fn layer_count(length: f64, spacing: f64) -> usize {
    if !(spacing > 0.0) || length + POSITION_TOLERANCE < spacing {
        return 0;
    }
    ((length - spacing) / spacing + POSITION_TOLERANCE).floor() as usize + 1
}

/// Axial coordinates (from the first ring plane) of every guest layer.
pub fn layer_positions(length: f64, spacing: f64) -> Vec<f64> {
    (0..layer_count(length, spacing))
        .map(|k| spacing * 0.5 + k as f64 * spacing)
        .collect()
}

/// Output of one channel's placement.
#[derive(Debug, Clone, Default)]
pub struct PlacementRun {
    pub channel_id: usize,
    pub atoms: Vec<PlacedAtom>,
    pub warnings: Vec<PlacementWarning>,
    pub slots_attempted: usize,
}

/// One angular slot of a layer before collision checks.
#[derive(Debug, Clone, Copy)]
struct Slot {
    angle: f64,
    radius: f64,
    /// Angular step between neighbouring slots; retries subdivide it.
    step: f64,
}

/// Places guests into a single analysed channel. Holds only shared,
/// read-only state, so one placer serves every channel of a run.
pub struct IntercalationPlacer<'a> {
    spec: &'a IntercalationSpec,
    spacing: f64,
    host: &'a SpatialIndex,
}

impl<'a> IntercalationPlacer<'a> {
    /// `spacing` is the resolved layer spacing, `host` indexes every host atom.
    pub fn new(spec: &'a IntercalationSpec, spacing: f64, host: &'a SpatialIndex) -> Self {
        Self { spec, spacing, host }
    }

    fn slots(&self, layer_index: usize, radius: f64) -> Vec<Slot> {
        let n = self.spec.max_atoms_per_layer();
        match self.spec.pattern() {
            PlacementPattern::Ring | PlacementPattern::Staggered => {
                let step = TAU / n as f64;
                let phase = if self.spec.pattern() == PlacementPattern::Staggered && layer_index % 2 == 1 {
                    step * 0.5
                } else {
                    0.0
                };
                (0..n)
                    .map(|j| Slot {
                        angle: phase + j as f64 * step,
                        radius,
                        step,
                    })
                    .collect()
            }
            PlacementPattern::Centered => {
                let ring = n - 1;
                let step = if ring > 0 { TAU / ring as f64 } else { TAU };
                std::iter::once(Slot {
                    angle: 0.0,
                    radius: 0.0,
                    step,
                })
                .chain((0..ring).map(|j| Slot {
                    angle: j as f64 * step,
                    radius,
                    step,
                }))
                .collect()
            }
        }
    }

    /// Fills every layer of `channel`. Deterministic: the output depends only
    /// on the channel, the spec, the spacing and the host index.
    pub fn place(&self, channel: &AnalyzedChannel) -> PlacementRun {
        let mut run = PlacementRun {
            channel_id: channel.id,
            ..PlacementRun::default()
        };
        let (Some(first), Some(first_ring)) = (channel.geometry.first(), channel.rings.first()) else {
            return run;
        };

        let reference = first_ring.edge_midpoint(0) - first.centroid;
        let Some(frame) = CoordinateTransformer::align_axis(&first.centroid, &channel.axis.direction, &reference) else {
            log::warn!("channel {}: degenerate axis, nothing placed", channel.id);
            return run;
        };
        let back = CoordinateTransformer::inverse(&frame);

        let local_centres = CoordinateTransformer::apply(&frame, &channel.centroids());
        let ring_positions = channel.ring_positions();
        let threshold = self.spec.collision_threshold();
        let attempts = self.spec.max_attempts();

        for (layer_index, z) in layer_positions(channel.length, self.spacing).into_iter().enumerate() {
            let (centre, inradius) = interpolate(&ring_positions, &local_centres, channel, z);
            let radius = (inradius - self.spec.clearance_margin()).max(0.0);

            for (slot_index, slot) in self.slots(layer_index, radius).into_iter().enumerate() {
                run.slots_attempted += 1;
                let tries = if slot.radius > 0.0 { attempts } else { 1 };

                let accepted = (0..tries).find_map(|m| {
                    let angle = slot.angle + m as f64 * slot.step / attempts as f64;
                    let local = centre + Vector3::new(slot.radius * angle.cos(), slot.radius * angle.sin(), 0.0);
                    let world = back.apply_point(&local);
                    self.is_free(&world, &run.atoms, threshold).then_some(world)
                });

                match accepted {
                    Some(position) => {
                        let id = run.atoms.len();
                        run.atoms.push(PlacedAtom {
                            atom: AtomPosition::new(id, self.spec.element(), position),
                            channel_id: channel.id,
                            layer_index,
                            slot: slot_index,
                        });
                    }
                    None => {
                        let warning = PlacementWarning::SlotSkipped {
                            channel_id: channel.id,
                            layer_index,
                            slot: slot_index,
                            attempts: tries,
                        };
                        log::debug!("{}", warning);
                        run.warnings.push(warning);
                    }
                }
            }
        }

        log::debug!(
            "channel {}: placed {} of {} slots at spacing {:.3} Å",
            channel.id,
            run.atoms.len(),
            run.slots_attempted,
            self.spacing
        );
        run
    }

    fn is_free(&self, p: &Vector3<f64>, placed: &[PlacedAtom], threshold: f64) -> bool {
        self.host.nearest_within(p, threshold).is_none()
            && placed.iter().all(|g| g.atom.distance_to(p) >= threshold)
    }
}

/// Local channel centre (in the aligned frame) and inradius at axial
/// coordinate `z`, linearly interpolated between the two bounding rings.
fn interpolate(
    ring_positions: &[f64],
    local_centres: &[Vector3<f64>],
    channel: &AnalyzedChannel,
    z: f64,
) -> (Vector3<f64>, f64) {
    let last = ring_positions.len().saturating_sub(1);
    let upper = ring_positions.iter().position(|&p| p >= z).unwrap_or(last).max(1).min(last);
    let lower = upper.saturating_sub(1);

    let span = ring_positions[upper] - ring_positions[lower];
    let t = if span > 0.0 {
        ((z - ring_positions[lower]) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let centre = local_centres[lower].lerp(&local_centres[upper], t);
    let r_lower = channel.geometry[lower].inradius;
    let r_upper = channel.geometry[upper].inradius;
    (centre, r_lower + (r_upper - r_lower) * t)
}

/// Drops guests that collide with a guest of another channel.
///
/// Guests are visited in `(channel, layer, slot)` order and compared only
/// against earlier survivors, so the result does not depend on the order in
/// which channels finished.
pub fn resolve_cross_channel_overlaps(
    runs: Vec<PlacementRun>,
    threshold: f64,
) -> (Vec<PlacedAtom>, Vec<PlacementWarning>) {
    let mut warnings = Vec::new();
    let mut guests: Vec<PlacedAtom> = Vec::new();
    for run in runs {
        guests.extend(run.atoms);
        warnings.extend(run.warnings);
    }
    guests.sort_by_key(|g| (g.channel_id, g.layer_index, g.slot));

    let positions: Vec<Vector3<f64>> = guests.iter().map(|g| g.atom.position).collect();
    let index = SpatialIndex::new(&positions, threshold);
    let mut keep = vec![true; guests.len()];

    for i in 0..guests.len() {
        let clash = index
            .within(&positions[i], threshold)
            .into_iter()
            .filter(|&j| j < i && keep[j] && guests[j].channel_id != guests[i].channel_id)
            .map(|j| (j, (positions[j] - positions[i]).norm()))
            .find(|&(_, d)| d < threshold);

        if let Some((j, distance)) = clash {
            keep[i] = false;
            let warning = PlacementWarning::CrossChannelOverlap {
                channel_id: guests[i].channel_id,
                layer_index: guests[i].layer_index,
                slot: guests[i].slot,
                other_channel_id: guests[j].channel_id,
                distance,
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }

    let survivors = guests
        .into_iter()
        .zip(keep)
        .filter_map(|(g, k)| k.then_some(g))
        .collect();
    (survivors, warnings)
}
