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
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use parking_lot::Mutex;
use tracing::debug;

use super::{LoadedSample, PlaybackError};

/// A decoded sample along with the modification time of the file it came from.
struct CachedSample {
    modified: Option<SystemTime>,
    sample: LoadedSample,
}

/// Decoded samples keyed by path. An entry is reused only while the file's
/// modification time is unchanged, so a re-upload under the same name is
/// decoded again.
#[derive(Default)]
pub struct SampleCache {
    entries: Mutex<HashMap<PathBuf, CachedSample>>,
}

impl SampleCache {
    pub fn new() -> SampleCache {
        SampleCache::default()
    }

    /// Returns the cached sample for the path, or decodes and caches it.
    pub fn load<F>(&self, path: &Path, decode: F) -> Result<LoadedSample, PlaybackError>
    where
        F: FnOnce(&Path) -> Result<LoadedSample, PlaybackError>,
    {
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok();

        if let Some(cached) = self.entries.lock().get(path) {
            if cached.modified == modified {
                debug!(path = ?path, "Using cached sample.");
                return Ok(cached.sample.clone());
            }
        }

        let sample = decode(path)?;
        self.entries.lock().insert(
            path.to_path_buf(),
            CachedSample {
                modified,
                sample: sample.clone(),
            },
        );
        Ok(sample)
    }

    /// Drops every entry whose path is not in `keep`. Returns the number dropped.
    pub fn retain(&self, keep: &HashSet<PathBuf>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|path, _| keep.contains(path));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, cached = entries.len(), "Evicted cached samples.");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
