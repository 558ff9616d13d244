use crate::core::spatial::SpatialIndex;
use crate::error::CoreError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ============================================================================
// TRAITS
// ============================================================================

/// Anything that can hand out an ordered list of positioned atoms.
pub trait AtomSource {
    fn atoms(&self) -> &[AtomPosition];

    fn positions(&self) -> Vec<Vector3<f64>> {
        self.atoms().iter().map(|a| a.position).collect()
    }
}

// ============================================================================
// INPUT RECORDS
// ============================================================================

/// One `(element, x, y, z)` row handed over by an import collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomRecord {
    pub element: String,
    pub position: Vector3<f64>,
}

impl AtomRecord {
    pub fn new(element: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            element: element.into(),
            position: Vector3::new(x, y, z),
        }
    }
}

/// Inclusive bond-length window in Å. Atom pairs whose distance falls inside
/// are considered bonded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondWindow {
    pub min: f64,
    pub max: f64,
}

impl Default for BondWindow {
    /// Aromatic C-C bonds sit at 1.42 Å; the window tolerates strained walls.
    fn default() -> Self {
        Self { min: 1.2, max: 1.7 }
    }
}

impl BondWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(CoreError::Input("bond window bounds must be finite".into()));
        }
        if self.min < 0.0 || self.min >= self.max {
            return Err(CoreError::Input(format!(
                "bond window must satisfy 0 <= min < max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, distance: f64) -> bool {
        distance >= self.min && distance <= self.max
    }
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AtomPosition {
    pub id: usize,
    pub element: String,
    pub position: Vector3<f64>,
}

impl AtomPosition {
    pub fn new(id: usize, element: impl Into<String>, position: Vector3<f64>) -> Self {
        Self {
            id,
            element: element.into(),
            position,
        }
    }

    pub fn distance_to(&self, other: &Vector3<f64>) -> f64 {
        (self.position - other).norm()
    }
}

/// The host framework: ordered atoms plus the bonds found inside the window.
/// Built once per loaded structure and read-only afterward.
#[derive(Debug, Clone)]
pub struct Lattice {
    atoms: Vec<AtomPosition>,
    bonds: Vec<(usize, usize)>,
    bond_window: BondWindow,
}

impl Lattice {
    /// Builds a lattice from collaborator records, assigning ids in input order.
    ///
    /// # Errors
    /// Returns [`CoreError::Input`] for an empty record set, blank element symbols,
    /// non-finite coordinates or an invalid bond window.
    pub fn from_records(records: &[AtomRecord], bond_window: BondWindow) -> Result<Self, CoreError> {
        bond_window.validate()?;
        if records.is_empty() {
            return Err(CoreError::Input("lattice has no atoms".into()));
        }

        let mut atoms = Vec::with_capacity(records.len());
        for (id, record) in records.iter().enumerate() {
            let element = record.element.trim();
            if element.is_empty() {
                return Err(CoreError::Input(format!("atom {id} has an empty element symbol")));
            }
            if !record.position.iter().all(|c| c.is_finite()) {
                return Err(CoreError::Input(format!("atom {id} has a non-finite coordinate")));
            }
            atoms.push(AtomPosition::new(id, element, record.position));
        }

        let bonds = Self::find_bonds(&atoms, &bond_window);
        log::debug!(
            "lattice built: {} atoms, {} bonds in [{:.3}, {:.3}] Å",
            atoms.len(),
            bonds.len(),
            bond_window.min,
            bond_window.max
        );

        Ok(Self {
            atoms,
            bonds,
            bond_window,
        })
    }

    /// Pairwise search accelerated by a hash grid with the window's upper bound
    /// as cell size. Pairs come out sorted as `(i, j)` with `i < j`.
    fn find_bonds(atoms: &[AtomPosition], window: &BondWindow) -> Vec<(usize, usize)> {
        let positions: Vec<Vector3<f64>> = atoms.iter().map(|a| a.position).collect();
        let index = SpatialIndex::new(&positions, window.max);

        let mut bonds = Vec::new();
        for (i, pos) in positions.iter().enumerate() {
            for j in index.within(pos, window.max) {
                if j > i && window.contains((positions[j] - pos).norm()) {
                    bonds.push((i, j));
                }
            }
        }
        bonds.sort_unstable();
        bonds.dedup();
        bonds
    }

    pub fn atoms(&self) -> &[AtomPosition] {
        &self.atoms
    }

    pub fn atom(&self, id: usize) -> Option<&AtomPosition> {
        self.atoms.get(id)
    }

    pub fn bonds(&self) -> &[(usize, usize)] {
        &self.bonds
    }

    pub fn bond_window(&self) -> BondWindow {
        self.bond_window
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl AtomSource for Lattice {
    fn atoms(&self) -> &[AtomPosition] {
        &self.atoms
    }
}

/// A guest atom produced by a placement run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedAtom {
    pub atom: AtomPosition,
    pub channel_id: usize,
    pub layer_index: usize,
    /// Angular slot inside the layer; keeps the merge order fully data-derived.
    pub slot: usize,
}

/// Where an atom of the final structure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomOrigin {
    Host,
    Guest { channel_id: usize, layer_index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureAtom {
    pub atom: AtomPosition,
    pub origin: AtomOrigin,
}

/// Flat export record: `(element, x, y, z, sourceChannelId?, layerIndex?)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureRecord {
    pub id: usize,
    pub element: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub source_channel: Option<usize>,
    pub layer_index: Option<usize>,
}

/// Merged host + guest structure. Host atoms form a prefix in their original order.
#[derive(Debug, Clone)]
pub struct Structure {
    atoms: Vec<StructureAtom>,
    host_count: usize,
}

impl Structure {
    pub(crate) fn from_parts(atoms: Vec<StructureAtom>, host_count: usize) -> Self {
        Self { atoms, host_count }
    }

    pub fn atoms(&self) -> &[StructureAtom] {
        &self.atoms
    }

    pub fn host_atoms(&self) -> &[StructureAtom] {
        &self.atoms[..self.host_count]
    }

    pub fn guest_atoms(&self) -> &[StructureAtom] {
        &self.atoms[self.host_count..]
    }

    pub fn host_count(&self) -> usize {
        self.host_count
    }

    pub fn guest_count(&self) -> usize {
        self.atoms.len() - self.host_count
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Stable, enumerable export view of the structure.
    pub fn records(&self) -> impl Iterator<Item = StructureRecord> + '_ {
        self.atoms.iter().map(|sa| {
            let (source_channel, layer_index) = match sa.origin {
                AtomOrigin::Host => (None, None),
                AtomOrigin::Guest {
                    channel_id,
                    layer_index,
                } => (Some(channel_id), Some(layer_index)),
            };
            StructureRecord {
                id: sa.atom.id,
                element: sa.atom.element.clone(),
                x: sa.atom.position.x,
                y: sa.atom.position.y,
                z: sa.atom.position.z,
                source_channel,
                layer_index,
            }
        })
    }

    /// Records that fall inside an axis-aligned box.
    pub fn records_within<'a>(
        &'a self,
        limits: &'a CoordinateLimits,
    ) -> impl Iterator<Item = StructureRecord> + 'a {
        self.records().filter(move |r| limits.contains(&Vector3::new(r.x, r.y, r.z)))
    }
}

/// Axis-aligned box used to cut exported records down to a region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateLimits {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for CoordinateLimits {
    fn default() -> Self {
        Self {
            x_min: f64::NEG_INFINITY,
            x_max: f64::INFINITY,
            y_min: f64::NEG_INFINITY,
            y_max: f64::INFINITY,
            z_min: f64::NEG_INFINITY,
            z_max: f64::INFINITY,
        }
    }
}

impl CoordinateLimits {
    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        p.x >= self.x_min
            && p.x <= self.x_max
            && p.y >= self.y_min
            && p.y <= self.y_max
            && p.z >= self.z_min
            && p.z <= self.z_max
    }
}
