//! Visual-state arena.
//!
//! The scheduler writes one record per entity per tick, addressed by
//! [`EntityId`]; the renderer reads by the same id. Entities never hold
//! references to renderer objects.

use crate::entity::{DerivedState, EntityId};

#[derive(Debug, Clone, Default)]
pub struct VisualArena {
    records: Vec<Option<DerivedState>>,
    writes: u64,
    skipped: u64,
}

impl VisualArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            writes: 0,
            skipped: 0,
        }
    }

    /// Appends a record and returns its id.
    pub fn insert(&mut self, initial: DerivedState) -> EntityId {
        let id = EntityId(self.records.len() as u32);
        self.records.push(Some(initial));
        id
    }

    /// Overwrites the record for `id`.
    ///
    /// A missing or retired record is skipped silently: during mount and
    /// unmount a stale id is expected, not a fault. Returns whether the
    /// write landed.
    pub fn write(&mut self, id: EntityId, state: DerivedState) -> bool {
        match self.records.get_mut(id.index()) {
            Some(slot @ Some(_)) => {
                *slot = Some(state);
                self.writes += 1;
                true
            }
            _ => {
                self.skipped += 1;
                false
            }
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&DerivedState> {
        self.records.get(id.index()).and_then(|r| r.as_ref())
    }

    /// Retires a record; later writes to it are skipped.
    pub fn retire(&mut self, id: EntityId) {
        if let Some(slot) = self.records.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Retires every record (scene teardown).
    pub fn clear(&mut self) {
        for slot in &mut self.records {
            *slot = None;
        }
    }

    /// Live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &DerivedState)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|s| (EntityId(i as u32), s)))
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total successful writes.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Writes dropped because the record was missing.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn state(intensity: f64) -> DerivedState {
        DerivedState {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: 1.0,
            intensity,
            opacity: 1.0,
        }
    }

    #[test]
    fn test_write_and_read_by_index() {
        let mut arena = VisualArena::default();
        let a = arena.insert(state(0.1));
        let b = arena.insert(state(0.2));

        assert!(arena.write(b, state(1.5)));
        assert_eq!(arena.get(a).map(|s| s.intensity), Some(0.1));
        assert_eq!(arena.get(b).map(|s| s.intensity), Some(1.5));
        assert_eq!(arena.writes(), 1);
    }

    #[test]
    fn test_missing_record_is_skipped() {
        let mut arena = VisualArena::default();
        let a = arena.insert(state(0.1));
        arena.retire(a);

        assert!(!arena.write(a, state(2.0)));
        assert!(!arena.write(EntityId(99), state(2.0)));
        assert!(arena.get(a).is_none());
        assert_eq!(arena.skipped(), 2);
    }

    #[test]
    fn test_clear_retires_everything() {
        let mut arena = VisualArena::default();
        arena.insert(state(0.1));
        arena.insert(state(0.2));
        arena.clear();

        assert!(arena.is_empty());
        assert_eq!(arena.iter().count(), 0);
    }
}
