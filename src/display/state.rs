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
use std::collections::VecDeque;

use super::{LOG_CHARS, LOG_MAX_LINES, NOW_PLAYING_CHARS, STATUS_CHARS};

/// Truncates to at most `max` characters. Never splits a character.
pub(super) fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Everything shown on the display. Every text field is already cut to its
/// character budget, so rendering it can never run off the bitmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    device_name: String,
    sample_count: usize,
    now_playing: Option<String>,
    /// Oldest first.
    log: VecDeque<String>,
}

impl DisplayState {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// The key that is playing, or None when idle.
    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    /// The log lines, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub(super) fn set_status(&mut self, device_name: &str, sample_count: usize) {
        self.device_name = truncate(device_name, STATUS_CHARS);
        self.sample_count = sample_count;
    }

    pub(super) fn set_now_playing(&mut self, key: Option<&str>) {
        self.now_playing = key.map(|key| truncate(key, NOW_PLAYING_CHARS));
    }

    pub(super) fn add_log(&mut self, line: &str) {
        self.log.push_back(truncate(line, LOG_CHARS));
        while self.log.len() > LOG_MAX_LINES {
            self.log.pop_front();
        }
    }

    pub(super) fn update_sample_count(&mut self, sample_count: usize) {
        self.sample_count = sample_count;
    }
}
