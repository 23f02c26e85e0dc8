use std::collections::HashMap;

use glam::IVec2;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::organisms::components::OrganismId;
use crate::organisms::systems::Organism;

/// Every live organism, with a lookup by root position
#[derive(Debug, Default)]
pub struct OrganismRegistry {
    organisms: SlotMap<OrganismId, Organism>,
    by_position: HashMap<IVec2, SmallVec<[OrganismId; 2]>>,
    next_serial: u64,
}

impl OrganismRegistry {
    /// Register an organism, stamping its id and spawn serial
    pub fn insert(&mut self, mut organism: Organism) -> OrganismId {
        self.next_serial += 1;
        organism.serial = self.next_serial;
        let position = organism.position;
        let id = self.organisms.insert_with_key(|key| {
            organism.id = key;
            organism
        });
        self.by_position.entry(position).or_default().push(id);
        id
    }

    pub fn remove(&mut self, id: OrganismId) -> Option<Organism> {
        let organism = self.organisms.remove(id)?;
        if let Some(ids) = self.by_position.get_mut(&organism.position) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_position.remove(&organism.position);
            }
        }
        Some(organism)
    }

    pub fn get(&self, id: OrganismId) -> Option<&Organism> {
        self.organisms.get(id)
    }

    pub fn get_mut(&mut self, id: OrganismId) -> Option<&mut Organism> {
        self.organisms.get_mut(id)
    }

    pub fn contains(&self, id: OrganismId) -> bool {
        self.organisms.contains_key(id)
    }

    pub fn organisms_at(&self, pos: IVec2) -> &[OrganismId] {
        self.by_position
            .get(&pos)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Snapshot of current ids in spawn order; organisms spawned while
    /// iterating it wait for the next tick
    pub fn ids(&self) -> Vec<OrganismId> {
        let mut ids: Vec<_> = self.organisms.iter().map(|(id, o)| (o.serial, id)).collect();
        ids.sort_unstable_by_key(|(serial, _)| *serial);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrganismId, &Organism)> {
        self.organisms.iter()
    }

    pub fn len(&self) -> usize {
        self.organisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organisms.is_empty()
    }

    /// Serial handed to the most recently registered organism
    pub fn last_serial(&self) -> u64 {
        self.next_serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organisms::species::SpeciesKind;
    use crate::organisms::tuning::UptakeTuning;

    fn organism_at(x: i32, y: i32) -> Organism {
        Organism::new(SpeciesKind::Plant, IVec2::new(x, y), 0.0, &UptakeTuning::default())
    }

    #[test]
    fn position_index_follows_insert_and_remove() {
        let mut registry = OrganismRegistry::default();
        let a = registry.insert(organism_at(1, 1));
        let b = registry.insert(organism_at(1, 1));
        let c = registry.insert(organism_at(2, 1));

        assert_eq!(registry.organisms_at(IVec2::new(1, 1)), &[a, b]);
        assert_eq!(registry.get(b).unwrap().id, b);
        assert_eq!(registry.ids(), vec![a, b, c]);

        registry.remove(a);
        assert_eq!(registry.organisms_at(IVec2::new(1, 1)), &[b]);
        registry.remove(b);
        assert!(registry.organisms_at(IVec2::new(1, 1)).is_empty());
        assert!(registry.get(a).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn serials_keep_increasing_across_reuse() {
        let mut registry = OrganismRegistry::default();
        let a = registry.insert(organism_at(0, 0));
        registry.remove(a);
        let b = registry.insert(organism_at(0, 0));
        assert_ne!(a, b);
        assert_eq!(registry.get(b).unwrap().serial, 2);
        assert_eq!(registry.last_serial(), 2);
    }
}
