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

//! Single-voice sample playback.
//!
//! The engine guarantees that at most one voice sounds at a time. The backend
//! owns the audio output device and is never touched by anything but the engine.

use std::{
    collections::HashSet,
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

mod cache;
pub mod cpal;
mod decode;
mod engine;
pub mod mock;

pub use decode::LoadedSample;
pub use engine::{PlaybackEngine, Voice};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("unable to play {}: {reason}", path.display())]
    Failed { path: PathBuf, reason: String },
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl PlaybackError {
    pub(crate) fn failed(path: &Path, reason: impl ToString) -> PlaybackError {
        PlaybackError::Failed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// An audio output backend that can hold a single voice.
pub trait Backend: fmt::Display + Send + Sync {
    /// Loads and decodes the given file so it is ready to start.
    fn load(&self, path: &Path) -> Result<LoadedSample, PlaybackError>;

    /// Starts playing the loaded sample, replacing anything already sounding.
    fn start(&self, sample: LoadedSample) -> Result<(), PlaybackError>;

    /// Silences the output. Safe to call when nothing is playing.
    fn stop(&self);

    /// Returns true while a started sample has not yet run out.
    fn is_active(&self) -> bool;

    /// Releases anything held for samples that are not in `keep`.
    fn retain_samples(&self, _keep: &HashSet<PathBuf>) {}
}

/// Stands in for an audio device that could not be opened. Every load fails,
/// so every PLAY becomes a SKIP while the rest of the sampler keeps running.
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl ToString) -> Unavailable {
        Unavailable {
            reason: reason.to_string(),
        }
    }
}

impl Backend for Unavailable {
    fn load(&self, _: &Path) -> Result<LoadedSample, PlaybackError> {
        Err(PlaybackError::DeviceUnavailable(self.reason.clone()))
    }

    fn start(&self, _: LoadedSample) -> Result<(), PlaybackError> {
        Err(PlaybackError::DeviceUnavailable(self.reason.clone()))
    }

    fn stop(&self) {}

    fn is_active(&self) -> bool {
        false
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unavailable ({})", self.reason)
    }
}

/// Lists the audio output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::list()
}

/// Opens the named audio output device, or the host default if no name is given.
/// Names starting with "mock" select the mock backend.
pub fn get_backend(name: Option<&str>) -> Result<Arc<dyn Backend>, PlaybackError> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Backend::get(name)));
        }
    }

    Ok(Arc::new(cpal::Device::get(name)?))
}
