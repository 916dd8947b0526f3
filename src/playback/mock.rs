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
    collections::HashSet,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::{LoadedSample, PlaybackError};

#[derive(Default)]
struct State {
    /// Number of voices currently sounding.
    active: usize,
    /// The most voices that were ever sounding at once.
    max_active: usize,
    /// Every file that was started, in order.
    started: Vec<PathBuf>,
    stop_calls: usize,
    /// The last set of files passed to retain_samples.
    retained: Option<HashSet<PathBuf>>,
}

/// A mock audio backend. Doesn't actually play anything, but tracks what would
/// have been audible. Any non-empty file loads successfully.
#[derive(Clone)]
pub struct Backend {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Backend {
    /// Gets the given mock backend.
    pub fn get(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Simulates the current voice running out on its own.
    #[cfg(test)]
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.active = 0;
    }

    /// The number of voices currently sounding.
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    /// The most voices that were ever sounding at the same time.
    #[cfg(test)]
    pub fn max_active(&self) -> usize {
        self.state.lock().max_active
    }

    /// Every file that was started, in order.
    #[cfg(test)]
    pub fn started(&self) -> Vec<PathBuf> {
        self.state.lock().started.clone()
    }

    #[cfg(test)]
    pub fn retained(&self) -> Option<HashSet<PathBuf>> {
        self.state.lock().retained.clone()
    }

    #[cfg(test)]
    pub fn stop_calls(&self) -> usize {
        self.state.lock().stop_calls
    }
}

impl super::Backend for Backend {
    fn load(&self, path: &Path) -> Result<LoadedSample, PlaybackError> {
        let contents = fs::read(path).map_err(|e| PlaybackError::failed(path, e))?;
        if contents.is_empty() {
            return Err(PlaybackError::failed(path, "empty file"));
        }

        let data = contents.iter().map(|b| *b as f32 / 255.0).collect();
        debug!(path = ?path, "Mock loaded sample.");
        Ok(LoadedSample::new(data, 1, 44100).with_source(path))
    }

    fn start(&self, sample: LoadedSample) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "start (mock)");
        let _enter = span.enter();

        let mut state = self.state.lock();
        // Voices stack unless the caller stops the previous one first.
        state.active += 1;
        state.max_active = state.max_active.max(state.active);
        let source = sample.source().map(Path::to_path_buf).unwrap_or_default();
        info!(device = self.name, file = ?source, "Mock voice started.");
        state.started.push(source);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.active = 0;
        state.stop_calls += 1;
    }

    fn is_active(&self) -> bool {
        self.state.lock().active > 0
    }

    fn retain_samples(&self, keep: &HashSet<PathBuf>) {
        self.state.lock().retained = Some(keep.clone());
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
