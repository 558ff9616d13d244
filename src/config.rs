//! Tunable tolerances for the detection → analysis → fitting pipeline.
//!
//! Every section carries `#[serde(default)]`, so a JSON file only needs the
//! keys it overrides:
//!
//! ```json
//! { "detector": { "axis_tolerance": 0.8 }, "require_connected_host": true }
//! ```

use crate::core::structure::{AtomRecord, BondWindow, Lattice};
use crate::error::CoreError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Max perpendicular distance (Å) from a ring centroid to a chain's axis line (δ).
    pub axis_tolerance: f64,
    /// Max angle between a ring normal and the chain axis.
    pub normal_alignment_deg: f64,
    /// Max point-to-plane deviation (Å) for a 6-cycle to count as a ring.
    pub planarity_tolerance: f64,
    /// Rings closer than this along the axis are duplicates, not stacked neighbours.
    pub min_ring_gap: f64,
    /// A chain splits where a gap exceeds this multiple of its smallest gap.
    pub max_gap_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            axis_tolerance: 0.5,
            normal_alignment_deg: 20.0,
            planarity_tolerance: 0.25,
            min_ring_gap: 0.5,
            max_gap_ratio: 1.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Max deviation of any interior angle from 120°.
    pub angle_tolerance_deg: f64,
    /// Max angle between a ring normal and the refitted channel axis.
    pub max_tilt_deg: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            angle_tolerance_deg: 20.0,
            max_tilt_deg: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeFitConfig {
    /// Distance (Å) under which centroids count as collinear / vectors as parallel.
    pub collinearity_tolerance: f64,
}

impl Default for LatticeFitConfig {
    fn default() -> Self {
        Self {
            collinearity_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bond_window: BondWindow,
    pub detector: DetectorConfig,
    pub geometry: GeometryConfig,
    pub lattice: LatticeFitConfig,
    /// Reject hosts whose bond graph falls apart into several fragments.
    pub require_connected_host: bool,
}

fn positive(field: &'static str, value: f64) -> Result<(), CoreError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::config(field, format!("must be > 0, got {value}")))
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.bond_window
            .validate()
            .map_err(|e| CoreError::config("bond_window", e.to_string()))?;

        let d = &self.detector;
        positive("detector.axis_tolerance", d.axis_tolerance)?;
        positive("detector.planarity_tolerance", d.planarity_tolerance)?;
        positive("detector.min_ring_gap", d.min_ring_gap)?;
        if !(d.normal_alignment_deg > 0.0 && d.normal_alignment_deg <= 90.0) {
            return Err(CoreError::config(
                "detector.normal_alignment_deg",
                format!("must be in (0, 90], got {}", d.normal_alignment_deg),
            ));
        }
        if !(d.max_gap_ratio.is_finite() && d.max_gap_ratio >= 1.0) {
            return Err(CoreError::config(
                "detector.max_gap_ratio",
                format!("must be >= 1, got {}", d.max_gap_ratio),
            ));
        }

        let a = self.geometry.angle_tolerance_deg;
        if !(a > 0.0 && a < 120.0) {
            return Err(CoreError::config(
                "geometry.angle_tolerance_deg",
                format!("must be in (0, 120), got {a}"),
            ));
        }
        let t = self.geometry.max_tilt_deg;
        if !(t > 0.0 && t <= 90.0) {
            return Err(CoreError::config(
                "geometry.max_tilt_deg",
                format!("must be in (0, 90], got {t}"),
            ));
        }

        positive("lattice.collinearity_tolerance", self.lattice.collinearity_tolerance)
    }

    /// Bonds `records` with this config's window, so the lattice and the
    /// config always agree.
    pub fn build_lattice(&self, records: &[AtomRecord]) -> Result<Lattice, CoreError> {
        Lattice::from_records(records, self.bond_window)
    }

    /// Loads and validates a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {:?}", path))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid pipeline config in {:?}", path))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "detector": {{ "axis_tolerance": 0.8 }}, "require_connected_host": true }}"#).unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.detector.axis_tolerance, 0.8);
        assert_eq!(config.detector.min_ring_gap, 0.5);
        assert!(config.require_connected_host);
        assert_eq!(config.bond_window, BondWindow::default());
    }

    #[test]
    fn out_of_range_values_name_the_field() {
        let mut config = PipelineConfig::default();
        config.detector.max_gap_ratio = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detector.max_gap_ratio"));

        let mut config = PipelineConfig::default();
        config.bond_window = BondWindow::new(1.7, 1.2);
        assert!(config.validate().unwrap_err().to_string().contains("bond_window"));
    }

    #[test]
    fn lattice_inherits_the_config_window() {
        let config = PipelineConfig {
            bond_window: BondWindow::new(1.0, 1.5),
            ..PipelineConfig::default()
        };
        let records = vec![AtomRecord::new("C", 0.0, 0.0, 0.0), AtomRecord::new("C", 1.42, 0.0, 0.0)];
        let lattice = config.build_lattice(&records).unwrap();
        assert_eq!(lattice.bond_window(), config.bond_window);
        assert_eq!(lattice.bonds().len(), 1);
    }
}
