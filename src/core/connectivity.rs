use crate::core::structure::Lattice;
use crate::error::CoreError;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

// ============================================================================
// GRAPH REPRESENTATION
// ============================================================================

/// Bond connectivity of the host lattice.
/// Node weights are atom ids, edge weights are bond lengths in Å.
pub struct BondGraph {
    pub graph: UnGraph<usize, f64>,
}

impl BondGraph {
    /// Builds the graph from the lattice's precomputed bond list.
    /// Node `i` always carries atom id `i`.
    pub fn from_lattice(lattice: &Lattice) -> Self {
        let num_atoms = lattice.len();
        let mut graph = UnGraph::<usize, f64>::with_capacity(num_atoms, lattice.bonds().len());

        // Add all nodes first to maintain index mapping
        let node_indices: Vec<NodeIndex> = (0..num_atoms).map(|i| graph.add_node(i)).collect();

        for &(i, j) in lattice.bonds() {
            let length = (lattice.atoms()[i].position - lattice.atoms()[j].position).norm();
            graph.add_edge(node_indices[i], node_indices[j], length);
        }
        Self { graph }
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Atom ids bonded to `atom`, ascending.
    pub fn neighbors(&self, atom: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(atom))
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Adjacency lists for every atom, ascending within each list.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        (0..self.atom_count()).map(|i| self.neighbors(i)).collect()
    }

    /// Finds all connected components (subgraphs) in the graph.
    /// Returns a list of vectors, where each vector contains the atom ids of a fragment.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.graph.node_count()];
        let mut all_components = Vec::new();

        for i in 0..self.graph.node_count() {
            if !visited[i] {
                let mut component = Vec::new();
                let mut bfs = Bfs::new(&self.graph, NodeIndex::new(i));
                while let Some(nx) = bfs.next(&self.graph) {
                    let atom_index = self.graph[nx];
                    if !visited[atom_index] {
                        visited[atom_index] = true;
                        component.push(atom_index);
                    }
                }

                // Sort for determinism
                component.sort_unstable();
                if !component.is_empty() {
                    all_components.push(component);
                }
            }
        }
        all_components
    }

    /// Fails with [`CoreError::Input`] when the host is not one bonded framework.
    pub fn ensure_connected(&self) -> Result<(), CoreError> {
        let components = self.connected_components();
        if components.len() > 1 {
            let largest = components.iter().map(Vec::len).max().unwrap_or(0);
            return Err(CoreError::Input(format!(
                "bond graph is disconnected: {} fragments, largest has {} of {} atoms",
                components.len(),
                largest,
                self.atom_count()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::structure::{AtomRecord, BondWindow};

    fn two_dimers() -> Lattice {
        let records = vec![
            AtomRecord::new("C", 0.0, 0.0, 0.0),
            AtomRecord::new("C", 1.4, 0.0, 0.0),
            AtomRecord::new("C", 10.0, 0.0, 0.0),
            AtomRecord::new("C", 11.4, 0.0, 0.0),
        ];
        Lattice::from_records(&records, BondWindow::default()).unwrap()
    }

    #[test]
    fn components_are_sorted_and_complete() {
        let graph = BondGraph::from_lattice(&two_dimers());
        assert_eq!(graph.bond_count(), 2);
        assert_eq!(graph.connected_components(), vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(graph.neighbors(2), vec![3]);
    }

    #[test]
    fn disconnected_host_is_an_input_error() {
        let graph = BondGraph::from_lattice(&two_dimers());
        let err = graph.ensure_connected().unwrap_err();
        assert!(err.to_string().contains("2 fragments"));
    }
}
