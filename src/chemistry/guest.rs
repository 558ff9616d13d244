//! Guest species: per-element parameter presets and the validated
//! [`IntercalationSpec`] that drives a placement run.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_ATOMS_PER_LAYER: usize = 12;
pub const MAX_RETRY_ATTEMPTS: usize = 12;

// ============================================================================
// ELEMENT PRESETS
// ============================================================================

/// Bulk parameters of a guest element, derived from its fcc lattice constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuestParams {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Cubic lattice constant of the bulk solid (Å).
    pub lattice_param: f64,
}

/// Room-temperature (Al) and low-temperature (Ar, Xe) fcc lattice constants.
pub const GUEST_PRESETS: &[GuestParams] = &[
    GuestParams { symbol: "Al", name: "Aluminium", lattice_param: 4.0495 },
    GuestParams { symbol: "Ar", name: "Argon", lattice_param: 5.256 },
    GuestParams { symbol: "Xe", name: "Xenon", lattice_param: 6.197 },
];

impl GuestParams {
    /// Case-insensitive lookup in [`GUEST_PRESETS`].
    pub fn lookup(symbol: &str) -> Option<&'static GuestParams> {
        GUEST_PRESETS
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    /// Nearest-neighbour distance in the fcc solid.
    pub fn dist_between_atoms(&self) -> f64 {
        self.lattice_param / 2f64.sqrt()
    }

    /// Spacing of close-packed (111) layers.
    pub fn dist_between_layers(&self) -> f64 {
        self.lattice_param / 3f64.sqrt()
    }

    pub fn min_recommended_dist(&self) -> f64 {
        self.dist_between_atoms() * 0.92
    }

    pub fn min_allowed_dist(&self) -> f64 {
        self.dist_between_atoms() * 0.7
    }
}

// ============================================================================
// PLACEMENT PATTERN
// ============================================================================

/// Angular arrangement of the guest slots inside one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementPattern {
    /// N slots evenly spaced on a circle (0°, 360/N°, ...).
    #[default]
    Ring,
    /// As `Ring`, with odd layers rotated by half a step (A/B stacking).
    Staggered,
    /// One slot on the axis, the remaining N-1 evenly spaced on the circle.
    Centered,
}

impl FromStr for PlacementPattern {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ring" => Ok(Self::Ring),
            "staggered" => Ok(Self::Staggered),
            "centered" | "centred" => Ok(Self::Centered),
            other => Err(CoreError::config(
                "pattern",
                format!("must be one of ring|staggered|centered, got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for PlacementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlacementPattern::Ring => "ring",
            PlacementPattern::Staggered => "staggered",
            PlacementPattern::Centered => "centered",
        };
        f.write_str(s)
    }
}

// ============================================================================
// INTERCALATION SPEC
// ============================================================================

/// Validated placement request. Only constructible through
/// [`IntercalationSpecBuilder::build`], so every instance satisfies its ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct IntercalationSpec {
    element: String,
    layer_spacing: Option<f64>,
    collision_threshold: f64,
    max_atoms_per_layer: usize,
    pattern: PlacementPattern,
    clearance_margin: f64,
    max_attempts: usize,
}

impl IntercalationSpec {
    pub fn builder(element: impl Into<String>) -> IntercalationSpecBuilder {
        IntercalationSpecBuilder::new(element)
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    /// `None` means "use the fitted stacking distance".
    pub fn layer_spacing(&self) -> Option<f64> {
        self.layer_spacing
    }

    pub fn collision_threshold(&self) -> f64 {
        self.collision_threshold
    }

    pub fn max_atoms_per_layer(&self) -> usize {
        self.max_atoms_per_layer
    }

    pub fn pattern(&self) -> PlacementPattern {
        self.pattern
    }

    pub fn clearance_margin(&self) -> f64 {
        self.clearance_margin
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

#[derive(Debug, Clone)]
pub struct IntercalationSpecBuilder {
    element: String,
    layer_spacing: Option<f64>,
    collision_threshold: f64,
    max_atoms_per_layer: usize,
    pattern: PlacementPattern,
    clearance_margin: f64,
    max_attempts: usize,
}

impl IntercalationSpecBuilder {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            layer_spacing: None,
            collision_threshold: 2.0,
            max_atoms_per_layer: 6,
            pattern: PlacementPattern::Ring,
            clearance_margin: 0.5,
            max_attempts: 4,
        }
    }

    /// Seeds spacing and threshold from a bulk-element preset.
    pub fn from_preset(params: &GuestParams) -> Self {
        Self::new(params.symbol)
            .layer_spacing(params.dist_between_layers())
            .collision_threshold(params.min_allowed_dist())
    }

    pub fn layer_spacing(mut self, spacing: f64) -> Self {
        self.layer_spacing = Some(spacing);
        self
    }

    pub fn default_layer_spacing(mut self) -> Self {
        self.layer_spacing = None;
        self
    }

    pub fn collision_threshold(mut self, threshold: f64) -> Self {
        self.collision_threshold = threshold;
        self
    }

    pub fn max_atoms_per_layer(mut self, count: usize) -> Self {
        self.max_atoms_per_layer = count;
        self
    }

    pub fn pattern(mut self, pattern: PlacementPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn clearance_margin(mut self, margin: f64) -> Self {
        self.clearance_margin = margin;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// # Errors
    /// [`CoreError::Config`] naming the first field out of range. Values are
    /// never clamped.
    pub fn build(self) -> Result<IntercalationSpec, CoreError> {
        let element = self.element.trim().to_string();
        let valid_symbol = !element.is_empty()
            && element.len() <= 3
            && element.chars().all(|c| c.is_ascii_alphabetic())
            && element.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if !valid_symbol {
            return Err(CoreError::config(
                "element",
                format!("must be an element symbol like 'Al', got '{}'", self.element),
            ));
        }

        if let Some(spacing) = self.layer_spacing {
            if !(spacing.is_finite() && spacing > 0.0) {
                return Err(CoreError::config("layer_spacing", format!("must be > 0, got {spacing}")));
            }
        }

        if !(self.collision_threshold.is_finite() && self.collision_threshold > 0.0) {
            return Err(CoreError::config(
                "collision_threshold",
                format!("must be > 0, got {}", self.collision_threshold),
            ));
        }

        if !(1..=MAX_ATOMS_PER_LAYER).contains(&self.max_atoms_per_layer) {
            return Err(CoreError::config(
                "max_atoms_per_layer",
                format!("must be in [1, {MAX_ATOMS_PER_LAYER}], got {}", self.max_atoms_per_layer),
            ));
        }

        if !(self.clearance_margin.is_finite() && self.clearance_margin >= 0.0) {
            return Err(CoreError::config(
                "clearance_margin",
                format!("must be >= 0, got {}", self.clearance_margin),
            ));
        }

        if !(1..=MAX_RETRY_ATTEMPTS).contains(&self.max_attempts) {
            return Err(CoreError::config(
                "max_attempts",
                format!("must be in [1, {MAX_RETRY_ATTEMPTS}], got {}", self.max_attempts),
            ));
        }

        Ok(IntercalationSpec {
            element,
            layer_spacing: self.layer_spacing,
            collision_threshold: self.collision_threshold,
            max_atoms_per_layer: self.max_atoms_per_layer,
            pattern: self.pattern,
            clearance_margin: self.clearance_margin,
            max_attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn zero_spacing_is_rejected_not_clamped() {
        let err = IntercalationSpec::builder("Al").layer_spacing(0.0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("layer_spacing"));
    }

    #[test]
    fn ranges_are_enforced() {
        assert!(IntercalationSpec::builder("Al").max_atoms_per_layer(0).build().is_err());
        assert!(IntercalationSpec::builder("Al").max_atoms_per_layer(13).build().is_err());
        assert!(IntercalationSpec::builder("Al").collision_threshold(-1.0).build().is_err());
        assert!(IntercalationSpec::builder("Al").clearance_margin(f64::NAN).build().is_err());
        assert!(IntercalationSpec::builder("al").build().is_err());
        assert!(IntercalationSpec::builder("").build().is_err());
        assert!(IntercalationSpec::builder("Xe").max_atoms_per_layer(12).build().is_ok());
    }

    #[test]
    fn preset_seeds_spacing_and_threshold() {
        let al = GuestParams::lookup("al").unwrap();
        let spec = IntercalationSpecBuilder::from_preset(al).build().unwrap();
        assert_eq!(spec.element(), "Al");
        assert!((spec.layer_spacing().unwrap() - 4.0495 / 3f64.sqrt()).abs() < 1e-12);
        assert!((spec.collision_threshold() - 0.7 * 4.0495 / 2f64.sqrt()).abs() < 1e-12);
        assert!(GuestParams::lookup("Kr").is_none());

        let fitted = IntercalationSpecBuilder::from_preset(al).default_layer_spacing().build().unwrap();
        assert_eq!(fitted.layer_spacing(), None);
        assert!(al.min_recommended_dist() > al.min_allowed_dist());
    }

    #[test]
    fn pattern_parses_from_cli_strings() {
        assert_eq!("Staggered".parse::<PlacementPattern>().unwrap(), PlacementPattern::Staggered);
        assert_eq!("centred".parse::<PlacementPattern>().unwrap(), PlacementPattern::Centered);
        assert!("spiral".parse::<PlacementPattern>().is_err());
    }
}
