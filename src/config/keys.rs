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
use serde::Deserialize;

use super::ConfigError;
use crate::keys::KeyMap;

const DEFAULT_PREFIX: &str = "Key";
const DEFAULT_BASE_NOTE: u16 = 50;
const DEFAULT_COUNT: u16 = 12;
const DEFAULT_STOP_KEY: &str = "Key1";

/// An explicit key to note binding.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub note: u16,
}

/// A YAML representation of the key layout. Either a run of sequential keys
/// (`<prefix>1..<prefix>N` from `base_note`) or an explicit list of bindings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Keys {
    /// The prefix for sequential key names.
    prefix: Option<String>,

    /// The note bound to the first sequential key.
    base_note: Option<u16>,

    /// The number of sequential keys.
    count: Option<u16>,

    /// The name of the STOP key.
    stop_key: Option<String>,

    /// Explicit bindings. Overrides the sequential layout when present.
    bindings: Option<Vec<Binding>>,
}

impl Keys {
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }

    pub fn base_note(&self) -> u16 {
        self.base_note.unwrap_or(DEFAULT_BASE_NOTE)
    }

    pub fn count(&self) -> u16 {
        self.count.unwrap_or(DEFAULT_COUNT)
    }

    pub fn stop_key(&self) -> &str {
        self.stop_key.as_deref().unwrap_or(DEFAULT_STOP_KEY)
    }

    /// Builds and validates the key map.
    pub fn to_key_map(&self) -> Result<KeyMap, ConfigError> {
        let key_map = match &self.bindings {
            Some(bindings) => KeyMap::new(
                bindings
                    .iter()
                    .map(|binding| (binding.name.clone(), binding.note))
                    .collect(),
                self.stop_key(),
            )?,
            None => KeyMap::sequential(
                self.prefix(),
                self.base_note(),
                self.count(),
                self.stop_key(),
            )?,
        };
        Ok(key_map)
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::keys::KeyMapError;

    fn parse(yaml: &str) -> Keys {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_sequential_keys() {
        let keys = parse(
            r#"
            prefix: Pad
            base_note: 36
            count: 4
            stop_key: Pad4
        "#,
        )
        .to_key_map()
        .unwrap();

        assert_eq!(4, keys.keys().len());
        assert_eq!("Pad1", keys.key_for_note(36).unwrap().name());
        assert!(keys.key_for_note(39).unwrap().is_stop());
        assert!(keys.key_for_note(40).is_none());
    }

    #[test]
    fn test_explicit_bindings() {
        let keys = parse(
            r#"
            stop_key: Silence
            bindings:
              - name: Silence
                note: 21
              - name: Airhorn
                note: 108
        "#,
        )
        .to_key_map()
        .unwrap();

        assert_eq!("Silence", keys.stop_key().name());
        assert_eq!("Airhorn", keys.key_for_note(108).unwrap().name());
    }

    #[test]
    fn test_invalid_key_maps() {
        let result = parse("stop_key: Key13").to_key_map();
        assert!(matches!(
            result,
            Err(ConfigError::Keys(KeyMapError::UnknownStopKey(_)))
        ));

        let result = parse("base_note: 120").to_key_map();
        assert!(matches!(
            result,
            Err(ConfigError::Keys(KeyMapError::NoteOutOfRange(128)))
        ));
    }
}
