use crate::core::structure::{AtomOrigin, AtomSource, PlacedAtom, Structure, StructureAtom};
use crate::error::CoreError;
use std::collections::HashSet;

/// Merges host atoms and placed guests into one immutable [`Structure`].
/// Knows nothing about export formats.
pub struct StructureAssembler;

impl StructureAssembler {
    /// Host atoms first, unchanged and in input order, then guests sorted by
    /// `(channel, layer, slot)`. Ids are reassigned `0..n`.
    ///
    /// # Errors
    /// [`CoreError::Input`] if two guests claim the same slot or an id repeats.
    pub fn assemble<S: AtomSource + ?Sized>(host: &S, mut guests: Vec<PlacedAtom>) -> Result<Structure, CoreError> {
        guests.sort_by_key(|g| (g.channel_id, g.layer_index, g.slot));
        if let Some(pair) = guests
            .windows(2)
            .find(|w| (w[0].channel_id, w[0].layer_index, w[0].slot) == (w[1].channel_id, w[1].layer_index, w[1].slot))
        {
            return Err(CoreError::Input(format!(
                "duplicate guest in channel {}, layer {}, slot {}",
                pair[0].channel_id, pair[0].layer_index, pair[0].slot
            )));
        }

        let host_atoms = host.atoms();
        let host_count = host_atoms.len();
        let mut atoms = Vec::with_capacity(host_count + guests.len());

        for (id, atom) in host_atoms.iter().enumerate() {
            let mut atom = atom.clone();
            atom.id = id;
            atoms.push(StructureAtom {
                atom,
                origin: AtomOrigin::Host,
            });
        }
        for (offset, guest) in guests.into_iter().enumerate() {
            let mut atom = guest.atom;
            atom.id = host_count + offset;
            atoms.push(StructureAtom {
                atom,
                origin: AtomOrigin::Guest {
                    channel_id: guest.channel_id,
                    layer_index: guest.layer_index,
                },
            });
        }

        let mut seen = HashSet::with_capacity(atoms.len());
        if let Some(dup) = atoms.iter().find(|a| !seen.insert(a.atom.id)) {
            return Err(CoreError::Input(format!("duplicate atom id {}", dup.atom.id)));
        }

        log::debug!("assembled {} host + {} guest atoms", host_count, atoms.len() - host_count);
        Ok(Structure::from_parts(atoms, host_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::structure::{AtomPosition, AtomRecord, BondWindow, Lattice};
    use nalgebra::Vector3;

    fn guest(channel_id: usize, layer_index: usize, slot: usize) -> PlacedAtom {
        PlacedAtom {
            atom: AtomPosition::new(99, "Al", Vector3::new(channel_id as f64, layer_index as f64, slot as f64)),
            channel_id,
            layer_index,
            slot,
        }
    }

    fn host() -> Lattice {
        let records = vec![AtomRecord::new("C", 0.0, 0.0, 0.0), AtomRecord::new("C", 1.42, 0.0, 0.0)];
        Lattice::from_records(&records, BondWindow::default()).unwrap()
    }

    #[test]
    fn guests_follow_host_in_key_order() {
        let structure =
            StructureAssembler::assemble(&host(), vec![guest(1, 0, 0), guest(0, 1, 0), guest(0, 0, 1), guest(0, 0, 0)])
                .unwrap();
        assert_eq!(structure.host_count(), 2);
        assert_eq!(structure.guest_count(), 4);
        let keys: Vec<(Option<usize>, Option<usize>)> =
            structure.records().map(|r| (r.source_channel, r.layer_index)).collect();
        assert_eq!(
            keys,
            vec![(None, None), (None, None), (Some(0), Some(0)), (Some(0), Some(0)), (Some(0), Some(1)), (Some(1), Some(0))]
        );
        let ids: Vec<usize> = structure.records().map(|r| r.id).collect();
        assert_eq!(ids, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_slot_is_an_input_error() {
        let err = StructureAssembler::assemble(&host(), vec![guest(0, 0, 0), guest(0, 0, 0)]).unwrap_err();
        assert!(matches!(err, CoreError::Input(_)));
    }
}
