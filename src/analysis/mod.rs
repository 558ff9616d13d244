pub mod detector;
pub mod geometry;
pub mod lattice_vectors;
pub mod report;
pub mod rings;
