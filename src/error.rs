//! Error and warning types shared by every stage of the pipeline.
//!
//! Fatal conditions abort the current analysis and surface as [`CoreError`].
//! Non-fatal conditions accumulate as [`PlacementWarning`] entries next to a
//! successful result so callers can report partial success.

use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`CoreError`], for callers that branch on the kind
/// rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    Detection,
    DegenerateLattice,
    Config,
}

/// Fatal error conditions raised by the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Malformed host input: empty atom set, non-finite coordinates, invalid bond
    /// window, disconnected bond graph when connectivity is required.
    #[error("input error: {0}")]
    Input(String),

    /// No viable channel could be extracted from the lattice.
    #[error("detection error: {0}")]
    Detection(String),

    /// Not enough geometric data to fit lattice translation vectors.
    #[error("degenerate lattice: {0}")]
    DegenerateLattice(String),

    /// A configuration value is out of its permitted range.
    #[error("configuration error: `{field}` {reason}")]
    Config { field: &'static str, reason: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Input(_) => ErrorKind::Input,
            CoreError::Detection(_) => ErrorKind::Detection,
            CoreError::DegenerateLattice(_) => ErrorKind::DegenerateLattice,
            CoreError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Helper for constructing a [`CoreError::Config`] variant.
    ///
    /// # Arguments
    ///
    /// * `field` - Name of the offending field, as the caller spells it.
    /// * `reason` - Free-form explanation of the violated constraint.
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a ring was removed from its channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RingDefect {
    /// Vertices do not span a plane.
    Degenerate,
    SelfIntersecting,
    /// Largest deviation of an interior angle from 120°.
    AngleDeviation(f64),
    /// Angle between the ring normal and the channel axis.
    Tilted(f64),
}

impl fmt::Display for RingDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingDefect::Degenerate => write!(f, "degenerate"),
            RingDefect::SelfIntersecting => write!(f, "self-intersecting"),
            RingDefect::AngleDeviation(deg) => write!(f, "angle deviation {deg:.1}°"),
            RingDefect::Tilted(deg) => write!(f, "tilted {deg:.1}° off the axis"),
        }
    }
}

/// Non-fatal condition recorded during analysis or placement.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementWarning {
    /// A guest slot could not be filled after all retry angles collided.
    SlotSkipped {
        channel_id: usize,
        layer_index: usize,
        slot: usize,
        attempts: usize,
    },
    /// A ring failed the hexagon shape check and was removed from its channel.
    MalformedRing {
        channel_id: usize,
        ring_index: usize,
        defect: RingDefect,
    },
    /// A guest sat too close to a guest of another channel and was dropped.
    CrossChannelOverlap {
        channel_id: usize,
        layer_index: usize,
        slot: usize,
        other_channel_id: usize,
        distance: f64,
    },
}

impl PlacementWarning {
    /// True for warnings that correspond to an unfilled guest slot.
    pub fn is_skipped_slot(&self) -> bool {
        matches!(
            self,
            PlacementWarning::SlotSkipped { .. } | PlacementWarning::CrossChannelOverlap { .. }
        )
    }

    pub fn channel_id(&self) -> usize {
        match self {
            PlacementWarning::SlotSkipped { channel_id, .. }
            | PlacementWarning::MalformedRing { channel_id, .. }
            | PlacementWarning::CrossChannelOverlap { channel_id, .. } => *channel_id,
        }
    }
}

impl fmt::Display for PlacementWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementWarning::SlotSkipped {
                channel_id,
                layer_index,
                slot,
                attempts,
            } => write!(
                f,
                "channel {channel_id}, layer {layer_index}: slot {slot} skipped after {attempts} colliding attempts"
            ),
            PlacementWarning::MalformedRing {
                channel_id,
                ring_index,
                defect,
            } => write!(f, "channel {channel_id}: ring {ring_index} dropped ({defect})"),
            PlacementWarning::CrossChannelOverlap {
                channel_id,
                layer_index,
                slot,
                other_channel_id,
                distance,
            } => write!(
                f,
                "channel {channel_id}, layer {layer_index}: slot {slot} dropped, {distance:.3} Å from a guest of channel {other_channel_id}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_helper_reports_field_and_kind() {
        let err = CoreError::config("layer_spacing", "must be > 0, got 0");
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(
            err.to_string(),
            "configuration error: `layer_spacing` must be > 0, got 0"
        );
    }

    #[test]
    fn skipped_slot_classification() {
        let skipped = PlacementWarning::SlotSkipped {
            channel_id: 2,
            layer_index: 1,
            slot: 3,
            attempts: 4,
        };
        let ring = PlacementWarning::MalformedRing {
            channel_id: 0,
            ring_index: 1,
            defect: RingDefect::AngleDeviation(31.0),
        };
        assert!(skipped.is_skipped_slot());
        assert!(!ring.is_skipped_slot());
        assert_eq!(skipped.channel_id(), 2);
        assert!(skipped.to_string().contains("slot 3 skipped"));
        assert!(ring.to_string().contains("angle deviation 31.0°"));

        let flat = PlacementWarning::MalformedRing {
            channel_id: 0,
            ring_index: 2,
            defect: RingDefect::Degenerate,
        };
        assert_eq!(flat.to_string(), "channel 0: ring 2 dropped (degenerate)");
    }
}
