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

//! Hot-reloading key to sample file binding.
//!
//! This module provides:
//! - The audio extension allow-list shared with the upload transport
//! - The per-key sample table with atomic per-key replacement
//! - The folder index that rescans the samples root and publishes changes

use std::{
    io,
    path::{Path, PathBuf},
};

mod index;
mod table;

pub use index::{list_folder, RescanDelta, SampleIndex};
pub use table::{SampleSet, SampleTable};

/// File extensions (compared case-insensitively) that are considered samples.
/// Anything else in a key folder, including in-progress upload artifacts, is ignored.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("unable to read sample folder {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Returns true if the given file name passes the allow-list and is not a dotfile.
pub fn is_sample_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name() else {
        return false;
    };
    if file_name.to_string_lossy().starts_with('.') {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_sample_file() {
        assert!(is_sample_file(Path::new("jingle.wav")));
        assert!(is_sample_file(Path::new("Jingle.MP3")));
        assert!(is_sample_file(Path::new("/tmp/Key3/überraschung 🎉.mp3")));

        assert!(!is_sample_file(Path::new(".hidden.wav")));
        assert!(!is_sample_file(Path::new("upload.wav.part")));
        assert!(!is_sample_file(Path::new("upload.tmp")));
        assert!(!is_sample_file(Path::new("notes.txt")));
        assert!(!is_sample_file(Path::new("wav")));
        assert!(!is_sample_file(Path::new("/")));
    }
}
