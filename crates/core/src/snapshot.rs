//! Immutable, deduplicated area sets.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::area::{Area, AreaType};
use crate::types::{Generation, Timestamp};

/// The set of areas produced by one recomputation generation.
///
/// No two areas share `(type, path)`. Snapshots are shared via `Arc`
/// and never mutated after construction.
#[derive(Debug, Clone, Serialize)]
pub struct AreaSnapshot {
    generation: Generation,
    created_at: Timestamp,
    areas: Vec<Arc<Area>>,
}

impl AreaSnapshot {
    /// Build a snapshot, keeping the first occurrence of every
    /// `(type, path)` pair and dropping later duplicates.
    pub fn from_areas(generation: Generation, areas: impl IntoIterator<Item = Area>) -> Self {
        let mut seen: HashSet<(AreaType, PathBuf)> = HashSet::new();
        let mut unique = Vec::new();

        for area in areas {
            let key = (area.area_type(), area.path().to_path_buf());
            if seen.insert(key) {
                unique.push(Arc::new(area));
            } else {
                tracing::warn!(generation, area = %area, "Dropping duplicate area");
            }
        }

        Self {
            generation,
            created_at: chrono::Utc::now(),
            areas: unique,
        }
    }

    /// Recomputation generation that produced this snapshot.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// When the snapshot was assembled.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// All areas, unique by type and path.
    pub fn areas(&self) -> &[Arc<Area>] {
        &self.areas
    }

    /// Areas of a single type, in factory order.
    pub fn of_type(&self, area_type: AreaType) -> impl Iterator<Item = &Arc<Area>> + '_ {
        self.areas.iter().filter(move |a| a.area_type() == area_type)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaFlag;

    fn area(area_type: AreaType, path: &str) -> Area {
        Area::new(area_type, path).unwrap()
    }

    #[test]
    fn duplicates_are_dropped_keeping_first() {
        let snapshot = AreaSnapshot::from_areas(
            3,
            vec![
                area(AreaType::Sdcard, "/storage/emulated/0").with_flag(AreaFlag::Primary),
                area(AreaType::PublicData, "/storage/emulated/0/Android/data"),
                area(AreaType::Sdcard, "/storage/emulated/0/"),
            ],
        );

        assert_eq!(snapshot.generation(), 3);
        assert_eq!(snapshot.len(), 2);
        let sdcard: Vec<_> = snapshot.of_type(AreaType::Sdcard).collect();
        assert_eq!(sdcard.len(), 1);
        assert!(sdcard[0].has_flag(AreaFlag::Primary));
    }

    #[test]
    fn same_path_different_type_is_kept() {
        let snapshot = AreaSnapshot::from_areas(
            0,
            vec![
                area(AreaType::DataSystem, "/data/system"),
                area(AreaType::DataSystemCe, "/data/system"),
            ],
        );
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = AreaSnapshot::from_areas(0, Vec::new());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.of_type(AreaType::Sdcard).count(), 0);
    }
}
