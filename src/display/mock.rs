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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;

use super::{Bitmap, DisplayError};

#[derive(Default)]
struct Screen {
    frames: usize,
    last_frame: Option<Bitmap>,
    hidden: bool,
}

/// A mock display. Keeps the last frame it was sent.
#[derive(Clone, Default)]
pub struct Backend {
    screen: Arc<Mutex<Screen>>,
    failing: Arc<AtomicBool>,
}

impl Backend {
    pub fn new() -> Backend {
        Backend::default()
    }

    /// A display whose bus fails on every write.
    pub fn failing() -> Backend {
        let backend = Backend::default();
        backend.set_failing(true);
        backend
    }

    /// Makes every later write fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// The number of frames displayed.
    pub fn frames(&self) -> usize {
        self.screen.lock().frames
    }

    pub fn last_frame(&self) -> Option<Bitmap> {
        self.screen.lock().last_frame.clone()
    }

    /// Returns true if the screen was blanked after the last frame.
    pub fn is_hidden(&self) -> bool {
        self.screen.lock().hidden
    }
}

impl super::Backend for Backend {
    fn display(&mut self, bitmap: &Bitmap) -> Result<(), DisplayError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DisplayError::Bus("mock bus failure".to_string()));
        }

        let mut screen = self.screen.lock();
        screen.frames += 1;
        screen.last_frame = Some(bitmap.clone());
        screen.hidden = false;
        Ok(())
    }

    fn hide(&mut self) -> Result<(), DisplayError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DisplayError::Bus("mock bus failure".to_string()));
        }

        self.screen.lock().hidden = true;
        Ok(())
    }
}
