use crate::core::connectivity::BondGraph;
use crate::core::structure::{AtomPosition, AtomSource, Lattice};
use crate::math::fitting::{self, PlaneFit};
use nalgebra::Vector3;
use std::collections::BTreeMap;

pub const RING_SIZE: usize = 6;

// ============================================================================
// RING
// ============================================================================

/// Six bonded host atoms forming a closed cycle, stored in cycle order.
///
/// Canonical order starts at the smallest atom id and walks towards the
/// smaller of its two ring neighbours, so the same cycle always yields the
/// same vertex sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    atoms: [AtomPosition; RING_SIZE],
}

impl Ring {
    /// Builds a ring from atom ids given in cycle order. Returns `None` if an
    /// id is unknown to the lattice.
    pub fn from_ids(lattice: &Lattice, ids: [usize; RING_SIZE]) -> Option<Self> {
        let mut atoms = Vec::with_capacity(RING_SIZE);
        for id in canonical_cycle(ids) {
            atoms.push(lattice.atom(id)?.clone());
        }
        let atoms: [AtomPosition; RING_SIZE] = atoms.try_into().ok()?;
        Some(Self { atoms })
    }

    pub fn ids(&self) -> [usize; RING_SIZE] {
        std::array::from_fn(|k| self.atoms[k].id)
    }

    pub fn vertices(&self) -> [Vector3<f64>; RING_SIZE] {
        std::array::from_fn(|k| self.atoms[k].position)
    }

    pub fn centroid(&self) -> Vector3<f64> {
        self.vertices().iter().sum::<Vector3<f64>>() / RING_SIZE as f64
    }

    /// Least-squares plane through the six vertices.
    pub fn plane(&self) -> Option<PlaneFit> {
        fitting::fit_plane(&self.vertices())
    }

    /// Largest vertex-vertex distance.
    pub fn diameter(&self) -> f64 {
        let v = self.vertices();
        let mut best: f64 = 0.0;
        for i in 0..RING_SIZE {
            for j in (i + 1)..RING_SIZE {
                best = best.max((v[i] - v[j]).norm());
            }
        }
        best
    }

    /// Midpoint of edge `k`, between vertex `k` and vertex `k + 1`.
    pub fn edge_midpoint(&self, k: usize) -> Vector3<f64> {
        let v = self.vertices();
        (v[k % RING_SIZE] + v[(k + 1) % RING_SIZE]) * 0.5
    }

    /// Smallest centroid-to-edge-midpoint distance.
    pub fn inradius(&self) -> f64 {
        let c = self.centroid();
        (0..RING_SIZE)
            .map(|k| (self.edge_midpoint(k) - c).norm())
            .fold(f64::INFINITY, f64::min)
    }

    /// Interior angle at every vertex in degrees, from the two incident edges.
    pub fn interior_angles_deg(&self) -> [f64; RING_SIZE] {
        let v = self.vertices();
        std::array::from_fn(|k| {
            let prev = v[(k + RING_SIZE - 1) % RING_SIZE] - v[k];
            let next = v[(k + 1) % RING_SIZE] - v[k];
            let denom = prev.norm() * next.norm();
            if denom < 1e-12 {
                return 0.0;
            }
            (prev.dot(&next) / denom).clamp(-1.0, 1.0).acos().to_degrees()
        })
    }
}

impl AtomSource for Ring {
    fn atoms(&self) -> &[AtomPosition] {
        &self.atoms
    }
}

/// Rotates a cycle so it starts at its smallest id, then picks the direction
/// whose second vertex is the smaller neighbour.
fn canonical_cycle(mut cycle: [usize; RING_SIZE]) -> [usize; RING_SIZE] {
    let start = (0..RING_SIZE).min_by_key(|&k| cycle[k]).unwrap_or(0);
    cycle.rotate_left(start);
    if cycle[1] > cycle[RING_SIZE - 1] {
        cycle[1..].reverse();
    }
    cycle
}

// ============================================================================
// CYCLE ENUMERATION
// ============================================================================

/// Every simple 6-cycle of the bond graph, deduplicated by vertex set and
/// returned in ascending order of the sorted id tuple.
///
/// The search starts once from each atom and only walks through atoms with a
/// larger id, which bounds the depth at six and visits each cycle exactly twice
/// (once per direction).
pub fn find_hexagonal_rings(graph: &BondGraph, lattice: &Lattice) -> Vec<Ring> {
    let adjacency = graph.adjacency();
    let mut unique: BTreeMap<[usize; RING_SIZE], [usize; RING_SIZE]> = BTreeMap::new();
    let mut path = Vec::with_capacity(RING_SIZE);

    for start in 0..adjacency.len() {
        path.clear();
        path.push(start);
        extend_path(&adjacency, start, &mut path, &mut unique);
    }

    log::debug!("ring search: {} distinct 6-cycles", unique.len());
    unique
        .into_values()
        .filter_map(|cycle| Ring::from_ids(lattice, cycle))
        .collect()
}

fn extend_path(
    adjacency: &[Vec<usize>],
    start: usize,
    path: &mut Vec<usize>,
    unique: &mut BTreeMap<[usize; RING_SIZE], [usize; RING_SIZE]>,
) {
    let Some(&last) = path.last() else { return };

    if path.len() == RING_SIZE {
        if adjacency[last].binary_search(&start).is_ok() {
            let mut cycle = [0usize; RING_SIZE];
            cycle.copy_from_slice(path);
            let mut key = cycle;
            key.sort_unstable();
            unique.entry(key).or_insert_with(|| canonical_cycle(cycle));
        }
        return;
    }

    for &next in &adjacency[last] {
        if next > start && !path.contains(&next) {
            path.push(next);
            extend_path(adjacency, start, path, unique);
            path.pop();
        }
    }
}
