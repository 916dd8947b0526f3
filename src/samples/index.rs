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
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, warn};

use super::{is_sample_file, table::SampleSet, ScanError, SampleTable};
use crate::{keys::KeyMap, util::filename_display};

/// The outcome of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescanDelta {
    /// True if any key's file list differs from the previous scan.
    pub changed: bool,
    /// The total number of samples after the scan.
    pub total: usize,
}

/// Lists the allow-listed sample files in a folder, sorted by name.
/// A missing folder is an empty listing.
pub fn list_folder(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ScanError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_sample_file(&path) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Scans the per-key folders under the samples root and publishes the results
/// into the shared sample table. The index is the only writer of the table.
pub struct SampleIndex {
    root: PathBuf,
    keys: Vec<String>,
    table: Arc<SampleTable>,
}

impl SampleIndex {
    /// Creates an index over the playable keys of the key map.
    pub fn new(root: &Path, keys: &KeyMap, table: Arc<SampleTable>) -> SampleIndex {
        SampleIndex {
            root: root.to_path_buf(),
            keys: keys.playable().map(|key| key.name().to_string()).collect(),
            table,
        }
    }

    /// The samples root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the samples root and the per-key folders if they don't exist so
    /// that the upload transport has somewhere to put files. Failures are logged.
    pub fn ensure_layout(&self) {
        for key in self.keys.iter() {
            let dir = self.root.join(key);
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!(
                    folder = ?dir,
                    err = e.to_string(),
                    "Unable to create sample folder."
                );
            }
        }
    }

    /// Rescans every key folder and swaps in the new listings.
    pub fn scan(&self) -> RescanDelta {
        let mut changed = false;

        for key in self.keys.iter() {
            let dir = self.root.join(key);
            let files = match list_folder(&dir) {
                Ok(files) => files,
                Err(e) => {
                    warn!(
                        key = key.as_str(),
                        err = e.to_string(),
                        "Treating sample folder as empty."
                    );
                    Vec::new()
                }
            };

            let set = SampleSet::new(files);
            let count = set.len();
            let selected = set.select().map(|path| filename_display(path).to_string());
            if self.table.replace(key, set) {
                changed = true;
                info!(key = key.as_str(), count, selected = ?selected, "Samples changed.");
            }
        }

        let total = self.table.total();
        debug!(changed, total, "Scan complete.");
        RescanDelta { changed, total }
    }
}
