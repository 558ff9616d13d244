// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
pub mod analysis;
pub mod chemistry;
pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod math;
pub mod synthesis;

// ============================================================================
// RE-EXPORTS (Public API)
// ============================================================================
pub use crate::analysis::detector::{Axis, ChannelDetector, RawChannel};
pub use crate::analysis::geometry::{AnalyzedChannel, ChannelGeometryAnalyzer, RingGeometry};
pub use crate::analysis::lattice_vectors::{LatticeVectorCalculator, LatticeVectors};
pub use crate::analysis::report::PlacementReport;
pub use crate::analysis::rings::Ring;
pub use crate::chemistry::guest::{GuestParams, IntercalationSpec, IntercalationSpecBuilder, PlacementPattern};
pub use crate::config::PipelineConfig;
pub use crate::core::connectivity::BondGraph;
pub use crate::core::structure::{AtomPosition, AtomRecord, BondWindow, CoordinateLimits, Lattice, PlacedAtom, Structure};
pub use crate::error::{CoreError, ErrorKind, PlacementWarning, RingDefect};
pub use crate::io::{parser, writer};
pub use crate::math::transform::{CoordinateTransformer, RigidTransform};
pub use crate::synthesis::assembler::StructureAssembler;
pub use crate::synthesis::placer::{IntercalationPlacer, PlacementRun};

use crate::core::spatial::SpatialIndex;
use crate::core::structure::AtomSource;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared flag a caller flips to stop a run between channels.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// HIGH-LEVEL INTERFACE
// ============================================================================

/// Analysed channels of one host plus the rings dropped on the way.
#[derive(Debug, Clone)]
pub struct ChannelAnalysis {
    pub channels: Vec<AnalyzedChannel>,
    pub warnings: Vec<PlacementWarning>,
}

/// Everything one intercalation request produced.
#[derive(Debug, Clone)]
pub struct IntercalationOutcome {
    pub structure: Structure,
    pub channels: Vec<AnalyzedChannel>,
    pub warnings: Vec<PlacementWarning>,
    /// `None` when the host has too little periodicity to fit.
    pub lattice_vectors: Option<LatticeVectors>,
    pub layer_spacing: f64,
    pub slots_attempted: usize,
    /// True if the token fired before every channel was placed.
    pub cancelled: bool,
}

impl IntercalationOutcome {
    pub fn skipped_slots(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_skipped_slot()).count()
    }

    pub fn report(&self) -> PlacementReport {
        PlacementReport::build(&self.structure, &self.channels, &self.warnings, self.slots_attempted)
    }

    /// e.g. "3 of 40 intercalation slots skipped due to collisions".
    pub fn summary(&self) -> String {
        self.report().summary()
    }
}

/// Detection and geometry analysis without placement.
///
/// # Errors
/// [`CoreError::Config`] for an invalid config or one whose bond window differs
/// from the lattice's, [`CoreError::Input`] for a fragmented host when
/// `require_connected_host` is set, and [`CoreError::Detection`] when no
/// channel is found.
pub fn detect_channels(lattice: &Lattice, config: &PipelineConfig) -> Result<ChannelAnalysis, CoreError> {
    config.validate()?;
    let window = lattice.bond_window();
    if window != config.bond_window {
        return Err(CoreError::config(
            "bond_window",
            format!(
                "lattice was bonded with [{}, {}] Å but the config asks for [{}, {}] Å",
                window.min, window.max, config.bond_window.min, config.bond_window.max
            ),
        ));
    }
    if config.require_connected_host {
        BondGraph::from_lattice(lattice).ensure_connected()?;
    }

    let raw = ChannelDetector::new(config.detector).detect(lattice)?;
    let analyzer = ChannelGeometryAnalyzer::new(config.geometry);
    let analysed: Vec<(AnalyzedChannel, Vec<PlacementWarning>)> =
        raw.par_iter().map(|channel| analyzer.analyze(channel)).collect();

    let mut channels = Vec::with_capacity(analysed.len());
    let mut warnings = Vec::new();
    for (channel, w) in analysed {
        channels.push(channel);
        warnings.extend(w);
    }
    Ok(ChannelAnalysis { channels, warnings })
}

/// The master pipeline: detect, analyse, fit, place, merge.
///
/// Channels are placed in parallel; the token is checked before each one.
/// A cancelled run still returns the channels placed so far.
pub fn intercalate(
    lattice: &Lattice,
    spec: &IntercalationSpec,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<IntercalationOutcome, CoreError> {
    // 1. DETECTION PHASE
    let ChannelAnalysis { channels, mut warnings } = detect_channels(lattice, config)?;

    // 2. LATTICE PHASE
    let calculator = LatticeVectorCalculator::new(config.lattice);
    let lattice_vectors = match calculator.fit(&channels) {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("lattice vectors unavailable: {}", e);
            None
        }
    };
    let layer_spacing = match (spec.layer_spacing(), &lattice_vectors) {
        (Some(s), _) => s,
        (None, Some(v)) => v.layer_spacing(),
        (None, None) => calculator.stacking_vector(&channels)?.norm(),
    };
    log::info!(
        "placing {} into {} channel(s) at {:.4} Å spacing",
        spec.element(),
        channels.len(),
        layer_spacing
    );

    // 3. PLACEMENT PHASE
    let host_index = SpatialIndex::new(&lattice.positions(), spec.collision_threshold());
    let placer = IntercalationPlacer::new(spec, layer_spacing, &host_index);
    let runs: Vec<Option<PlacementRun>> = channels
        .par_iter()
        .map(|channel| (!cancel.is_cancelled()).then(|| placer.place(channel)))
        .collect();
    let cancelled = runs.iter().any(Option::is_none);
    let runs: Vec<PlacementRun> = runs.into_iter().flatten().collect();
    let slots_attempted: usize = runs.iter().map(|r| r.slots_attempted).sum();

    let (guests, placement_warnings) =
        synthesis::placer::resolve_cross_channel_overlaps(runs, spec.collision_threshold());
    warnings.extend(placement_warnings);

    // 4. ASSEMBLY PHASE
    let structure = StructureAssembler::assemble(lattice, guests)?;

    let outcome = IntercalationOutcome {
        structure,
        channels,
        warnings,
        lattice_vectors,
        layer_spacing,
        slots_attempted,
        cancelled,
    };
    if outcome.skipped_slots() > 0 {
        log::warn!("{}", outcome.summary());
    }
    if cancelled {
        log::warn!("run cancelled; returning {} placed guest(s)", outcome.structure.guest_count());
    }
    Ok(outcome)
}
