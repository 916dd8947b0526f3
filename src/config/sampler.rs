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
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::{ConfigError, Display, Keys};

const DEFAULT_SAMPLES_DIR: &str = "./uploads";
const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// The top level sampler configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sampler {
    /// The samples root. Each key has a folder under it.
    samples_dir: Option<PathBuf>,

    /// The MIDI input device. Defaults to the first input port.
    midi_device: Option<String>,

    /// The audio output device. Defaults to the host default.
    audio_device: Option<String>,

    /// How often to rescan the samples root, e.g. "2s" or "500ms".
    rescan_interval: Option<String>,

    /// The key layout.
    #[serde(default)]
    keys: Keys,

    /// The status display.
    #[serde(default)]
    display: Display,
}

impl Sampler {
    /// Deserializes the sampler configuration from a file.
    pub fn deserialize(path: &Path) -> Result<Sampler, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Sampler>()?)
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.samples_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SAMPLES_DIR))
    }

    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    pub fn audio_device(&self) -> Option<&str> {
        self.audio_device.as_deref()
    }

    /// Returns the rescan interval. Zero is rejected.
    pub fn rescan_interval(&self) -> Result<Duration, ConfigError> {
        let Some(rescan_interval) = &self.rescan_interval else {
            return Ok(DEFAULT_RESCAN_INTERVAL);
        };

        let duration: Duration = DurationString::from_string(rescan_interval.clone())
            .map_err(|e| ConfigError::Duration {
                value: rescan_interval.clone(),
                reason: e.to_string(),
            })?
            .into();
        if duration.is_zero() {
            return Err(ConfigError::ZeroRescanInterval);
        }
        Ok(duration)
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    pub fn set_samples_dir(&mut self, samples_dir: PathBuf) {
        self.samples_dir = Some(samples_dir);
    }

    pub fn set_midi_device(&mut self, midi_device: String) {
        self.midi_device = Some(midi_device);
    }

    pub fn set_audio_device(&mut self, audio_device: String) {
        self.audio_device = Some(audio_device);
    }

    pub fn set_rescan_interval(&mut self, rescan_interval: String) {
        self.rescan_interval = Some(rescan_interval);
    }
}
