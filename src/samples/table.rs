// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::keys::KeyMap;

/// The ordered candidate files for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    files: Vec<PathBuf>,
}

impl SampleSet {
    /// Creates a sample set. Files are sorted by name so selection is deterministic.
    pub fn new(mut files: Vec<PathBuf>) -> SampleSet {
        files.sort();
        files.dedup();
        SampleSet { files }
    }

    /// Selects the file to play: the first one in sorted order.
    pub fn select(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The shared key -> sample set table.
///
/// The set of keys is fixed at construction. Each key has its own slot holding an
/// immutable `Arc<SampleSet>`; writers publish a complete new set by swapping the
/// pointer, and readers take a snapshot by cloning it. A reader therefore sees
/// either the old or the new list for a key, never a mix.
pub struct SampleTable {
    slots: HashMap<String, RwLock<Arc<SampleSet>>>,
}

impl SampleTable {
    /// Creates an empty table with one slot per playable key.
    pub fn new(keys: &KeyMap) -> SampleTable {
        SampleTable {
            slots: keys
                .playable()
                .map(|key| {
                    (
                        key.name().to_string(),
                        RwLock::new(Arc::new(SampleSet::default())),
                    )
                })
                .collect(),
        }
    }

    /// Returns a snapshot of the given key's samples. Unknown keys and the STOP
    /// key always have an empty set.
    pub fn get(&self, key: &str) -> Arc<SampleSet> {
        match self.slots.get(key) {
            Some(slot) => slot.read().clone(),
            None => Arc::new(SampleSet::default()),
        }
    }

    /// Publishes a new sample set for the key. Returns true if the membership
    /// of the set differs from what was there before.
    pub(super) fn replace(&self, key: &str, set: SampleSet) -> bool {
        let Some(slot) = self.slots.get(key) else {
            return false;
        };

        let mut current = slot.write();
        if **current == set {
            return false;
        }
        *current = Arc::new(set);
        true
    }

    /// The total number of samples across all keys.
    pub fn total(&self) -> usize {
        self.slots.values().map(|slot| slot.read().len()).sum()
    }

    /// The file each key would play right now.
    pub fn selected(&self) -> HashSet<PathBuf> {
        self.slots
            .values()
            .filter_map(|slot| slot.read().select().map(Path::to_path_buf))
            .collect()
    }
}
