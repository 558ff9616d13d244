#![allow(dead_code)]

use honeycomb_intercalator::{AtomRecord, BondWindow, Lattice};
use nalgebra::Vector3;

pub const BOND: f64 = 1.42;
pub const STACKING: f64 = 3.35;

/// Vertices of a flat hexagon with the given circumradius (= side length).
pub fn hexagon(centre: Vector3<f64>, side: f64) -> Vec<Vector3<f64>> {
    (0..6)
        .map(|k| {
            let a = (30.0 + 60.0 * k as f64).to_radians();
            centre + Vector3::new(side * a.cos(), side * a.sin(), 0.0)
        })
        .collect()
}

fn push_unique(out: &mut Vec<Vector3<f64>>, p: Vector3<f64>) {
    if !out.iter().any(|q| (q - p).norm() < 1e-6) {
        out.push(p);
    }
}

fn records(points: &[Vector3<f64>]) -> Vec<AtomRecord> {
    points.iter().map(|p| AtomRecord::new("C", p.x, p.y, p.z)).collect()
}

/// Single column of stacked hexagons.
pub fn column(layers: usize, side: f64, spacing: f64) -> Vec<AtomRecord> {
    let mut points = Vec::new();
    for layer in 0..layers {
        points.extend(hexagon(Vector3::new(0.0, 0.0, layer as f64 * spacing), side));
    }
    records(&points)
}

/// In-plane primitive vectors of the graphene sheet built by [`patch`].
pub fn graphene_vectors() -> (Vector3<f64>, Vector3<f64>) {
    let a = 3f64.sqrt() * BOND;
    (Vector3::new(a, 0.0, 0.0), Vector3::new(0.5 * a, 0.5 * 3f64.sqrt() * a, 0.0))
}

/// Seven-hexagon graphene flake (one hexagon and its six neighbours),
/// AA-stacked `layers` times.
pub fn patch(layers: usize) -> Vec<AtomRecord> {
    let (a1, a2) = graphene_vectors();
    let centres = [Vector3::zeros(), a1, -a1, a2, -a2, a1 - a2, a2 - a1];

    let mut points = Vec::new();
    for layer in 0..layers {
        let lift = Vector3::new(0.0, 0.0, layer as f64 * STACKING);
        for c in &centres {
            for v in hexagon(c + lift, BOND) {
                push_unique(&mut points, v);
            }
        }
    }
    records(&points)
}

pub fn lattice(records: &[AtomRecord]) -> Lattice {
    Lattice::from_records(records, BondWindow::default()).expect("fixture lattice")
}
