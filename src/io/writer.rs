//! Export targets for assembled structures.
//!
//! The assembler never sees these; callers pick a [`StructureSink`] and hand
//! it the finished [`Structure`] plus the run's warnings.

use crate::core::structure::{CoordinateLimits, Structure, StructureRecord};
use crate::error::PlacementWarning;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub trait StructureSink {
    fn write_structure(&mut self, structure: &Structure, warnings: &[PlacementWarning]) -> Result<()>;
}

fn selected_records(structure: &Structure, limits: Option<&CoordinateLimits>) -> Vec<StructureRecord> {
    match limits {
        Some(l) => structure.records_within(l).collect(),
        None => structure.records().collect(),
    }
}

/// Plain XYZ. The comment line carries the host/guest split.
pub struct XyzSink<W: Write> {
    out: W,
    limits: Option<CoordinateLimits>,
}

impl<W: Write> XyzSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, limits: None }
    }

    pub fn with_limits(mut self, limits: CoordinateLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StructureSink for XyzSink<W> {
    fn write_structure(&mut self, structure: &Structure, warnings: &[PlacementWarning]) -> Result<()> {
        let records = selected_records(structure, self.limits.as_ref());
        writeln!(self.out, "{}", records.len())?;
        writeln!(
            self.out,
            "host={} guests={} warnings={}",
            structure.host_count(),
            structure.guest_count(),
            warnings.len()
        )?;
        for r in &records {
            writeln!(self.out, "{:<3} {:>14.8} {:>14.8} {:>14.8}", r.element, r.x, r.y, r.z)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    host_count: usize,
    guest_count: usize,
    atoms: &'a [StructureRecord],
    warnings: Vec<String>,
}

/// Pretty-printed JSON with per-atom channel / layer tags and warning text.
pub struct JsonSink<W: Write> {
    out: W,
    limits: Option<CoordinateLimits>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, limits: None }
    }

    pub fn with_limits(mut self, limits: CoordinateLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StructureSink for JsonSink<W> {
    fn write_structure(&mut self, structure: &Structure, warnings: &[PlacementWarning]) -> Result<()> {
        let records = selected_records(structure, self.limits.as_ref());
        let doc = JsonDocument {
            host_count: structure.host_count(),
            guest_count: structure.guest_count(),
            atoms: &records,
            warnings: warnings.iter().map(ToString::to_string).collect(),
        };
        serde_json::to_writer_pretty(&mut self.out, &doc).context("Failed to serialise structure")?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes to `path`, choosing the sink from its extension (`.xyz` or `.json`).
pub fn to_path(
    structure: &Structure,
    warnings: &[PlacementWarning],
    path: &Path,
    limits: Option<CoordinateLimits>,
) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext != "xyz" && ext != "json" {
        bail!("Unsupported output format '.{}' (expected .xyz or .json)", ext);
    }
    let file = File::create(path).with_context(|| format!("Could not create output file: {:?}", path))?;
    let out = BufWriter::new(file);

    let mut sink: Box<dyn StructureSink> = match ext.as_str() {
        "xyz" => {
            let sink = XyzSink::new(out);
            Box::new(match limits {
                Some(l) => sink.with_limits(l),
                None => sink,
            })
        }
        _ => {
            let sink = JsonSink::new(out);
            Box::new(match limits {
                Some(l) => sink.with_limits(l),
                None => sink,
            })
        }
    };
    sink.write_structure(structure, warnings)
        .with_context(|| format!("Failed to write {:?}", path))
}
