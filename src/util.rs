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

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

/// The file name of a sample as shown in logs and listings. Names that are
/// not valid UTF-8 are shown lossily.
pub fn filename_display(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|f| f.to_string_lossy())
        .unwrap_or(Cow::Borrowed("unreadable file name"))
}

/// Formats a sample length as minutes:seconds.tenths. Jingles are short, so
/// the tenths matter.
pub fn sample_length_display(duration: Duration) -> String {
    let tenths = duration.as_millis() / 100;
    let minutes = tenths / 600;
    let secs = (tenths / 10) % 60;
    format!("{}:{:02}.{}", minutes, secs, tenths % 10)
}

#[cfg(test)]
mod test {
    use std::{path::Path, time::Duration};

    use super::*;

    #[test]
    fn test_sample_length_display() {
        assert_eq!("0:00.0", sample_length_display(Duration::ZERO));
        assert_eq!("0:00.0", sample_length_display(Duration::from_millis(99)));
        assert_eq!("0:01.5", sample_length_display(Duration::from_millis(1_550)));
        assert_eq!("0:59.9", sample_length_display(Duration::from_millis(59_999)));
        assert_eq!("1:00.0", sample_length_display(Duration::from_secs(60)));
        assert_eq!("2:05.2", sample_length_display(Duration::from_millis(125_250)));
    }

    #[test]
    fn test_filename_display() {
        assert_eq!("a.mp3", filename_display(Path::new("uploads/Key5/a.mp3")));
        assert_eq!("unreadable file name", filename_display(Path::new("/")));
    }

    #[cfg(unix)]
    #[test]
    fn test_filename_display_non_utf8() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let path = Path::new("uploads/Key5").join(OsStr::from_bytes(b"jingle\xff.wav"));
        assert_eq!("jingle\u{FFFD}.wav", filename_display(&path));
    }
}
