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

//! Logical sampler keys and their binding to MIDI notes.
//!
//! Every key owns a folder named after it under the samples root. Exactly one
//! key is the STOP key, which silences playback instead of starting it.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
};

/// The highest valid MIDI note number.
const MAX_NOTE: u8 = 127;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyMapError {
    #[error("key map must contain at least one key")]
    Empty,
    #[error("note {0} is out of the MIDI range 0-127")]
    NoteOutOfRange(u16),
    #[error("note {note} is bound to both {first} and {second}")]
    DuplicateNote {
        note: u8,
        first: String,
        second: String,
    },
    #[error("key name {0} is used more than once")]
    DuplicateName(String),
    #[error("key name {0:?} is not a valid folder name")]
    InvalidName(String),
    #[error("stop key {0} is not part of the key map")]
    UnknownStopKey(String),
}

/// A logical sampler slot bound to one MIDI note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    name: String,
    note: u8,
    stop: bool,
}

impl Key {
    /// The stable name of the key. Also the name of its sample folder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The MIDI note that triggers this key.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Returns true if this is the STOP key.
    pub fn is_stop(&self) -> bool {
        self.stop
    }

    /// The folder holding this key's samples under the given root.
    pub fn folder(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Note {})", self.name, self.note)
    }
}

/// A total, injective mapping from configured notes to keys.
#[derive(Debug, Clone)]
pub struct KeyMap {
    keys: Vec<Key>,
    by_note: HashMap<u8, usize>,
    stop: usize,
}

impl KeyMap {
    /// Creates a key map from (name, note) pairs, in the given order.
    pub fn new(bindings: Vec<(String, u16)>, stop_key: &str) -> Result<KeyMap, KeyMapError> {
        if bindings.is_empty() {
            return Err(KeyMapError::Empty);
        }

        let mut keys: Vec<Key> = Vec::with_capacity(bindings.len());
        let mut by_note: HashMap<u8, usize> = HashMap::new();
        let mut names: HashSet<String> = HashSet::new();

        for (name, note) in bindings {
            if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
                return Err(KeyMapError::InvalidName(name));
            }
            let note = u8::try_from(note)
                .ok()
                .filter(|note| *note <= MAX_NOTE)
                .ok_or(KeyMapError::NoteOutOfRange(note))?;
            if !names.insert(name.clone()) {
                return Err(KeyMapError::DuplicateName(name));
            }
            if let Some(existing) = by_note.get(&note) {
                return Err(KeyMapError::DuplicateNote {
                    note,
                    first: keys[*existing].name.clone(),
                    second: name,
                });
            }

            by_note.insert(note, keys.len());
            keys.push(Key {
                stop: name == stop_key,
                name,
                note,
            });
        }

        let stop = keys
            .iter()
            .position(|key| key.stop)
            .ok_or_else(|| KeyMapError::UnknownStopKey(stop_key.to_string()))?;

        Ok(KeyMap {
            keys,
            by_note,
            stop,
        })
    }

    /// Creates `count` keys named `<prefix>1..<prefix>N` bound to consecutive
    /// notes starting at `base_note`.
    pub fn sequential(
        prefix: &str,
        base_note: u16,
        count: u16,
        stop_key: &str,
    ) -> Result<KeyMap, KeyMapError> {
        KeyMap::new(
            (0..count)
                .map(|i| (format!("{}{}", prefix, i + 1), base_note.saturating_add(i)))
                .collect(),
            stop_key,
        )
    }

    /// Returns the key bound to the given note, if any.
    pub fn key_for_note(&self, note: u8) -> Option<&Key> {
        self.by_note.get(&note).map(|index| &self.keys[*index])
    }

    /// Returns the key with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.name == name)
    }

    /// The designated STOP key.
    pub fn stop_key(&self) -> &Key {
        &self.keys[self.stop]
    }

    /// All keys in configuration order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// All keys that can hold samples, i.e. everything but the STOP key.
    pub fn playable(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|key| !key.stop)
    }
}

impl Default for KeyMap {
    /// Key1..Key12 on notes 50..61 with Key1 as the STOP key.
    fn default() -> Self {
        KeyMap::sequential("Key", 50, 12, "Key1").expect("default key map is valid")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_key_map() {
        let keys = KeyMap::default();

        assert_eq!(12, keys.keys().len());
        assert_eq!("Key1", keys.stop_key().name());
        assert_eq!(50, keys.stop_key().note());
        assert_eq!(Some("Key12"), keys.key_for_note(61).map(Key::name));
        assert_eq!(11, keys.playable().count());
        assert!(keys.key_for_note(49).is_none());
        assert!(keys.key_for_note(62).is_none());
    }

    #[test]
    fn test_note_mapping_is_injective() {
        let result = KeyMap::new(
            vec![("Stop".into(), 10), ("A".into(), 11), ("B".into(), 11)],
            "Stop",
        );
        assert_eq!(
            Err(KeyMapError::DuplicateNote {
                note: 11,
                first: "A".into(),
                second: "B".into()
            }),
            result.map(|_| ())
        );
    }

    #[test]
    fn test_invalid_key_maps() {
        assert_eq!(
            Err(KeyMapError::Empty),
            KeyMap::new(vec![], "Key1").map(|_| ())
        );
        assert_eq!(
            Err(KeyMapError::UnknownStopKey("Nope".into())),
            KeyMap::sequential("Key", 50, 3, "Nope").map(|_| ())
        );
        assert_eq!(
            Err(KeyMapError::NoteOutOfRange(128)),
            KeyMap::sequential("Key", 126, 3, "Key1").map(|_| ())
        );
        assert_eq!(
            Err(KeyMapError::DuplicateName("A".into())),
            KeyMap::new(vec![("A".into(), 1), ("A".into(), 2)], "A").map(|_| ())
        );
        assert_eq!(
            Err(KeyMapError::InvalidName("../up".into())),
            KeyMap::new(vec![("../up".into(), 1)], "../up").map(|_| ())
        );
    }

    #[test]
    fn test_folder() {
        let keys = KeyMap::default();
        let key = keys.get("Key5").expect("Key5 exists");
        assert_eq!(PathBuf::from("/srv/uploads/Key5"), key.folder(Path::new("/srv/uploads")));
        assert_eq!("Key5 (Note 54)", key.to_string());
    }
}
