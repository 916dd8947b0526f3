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

//! The status display.
//!
//! A projector holds the display state and re-renders the whole screen after
//! every change. When there is no display the null projector is used instead,
//! and every mutator does nothing.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config;

#[cfg(test)]
pub mod mock;
mod render;
#[cfg(feature = "oled")]
mod oled;
mod state;

pub use render::{render, Bitmap};
pub use state::DisplayState;

/// Display width in pixels.
pub const WIDTH: usize = 128;
/// Display height in pixels.
pub const HEIGHT: usize = 64;
/// The number of log lines kept and shown.
pub const LOG_MAX_LINES: usize = 3;

/// Character budget for the device name and sample count lines.
const STATUS_CHARS: usize = 21;
/// Character budget for the now playing key name, not counting the marker.
const NOW_PLAYING_CHARS: usize = 12;
/// Character budget for a log line.
const LOG_CHARS: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("display bus error: {0}")]
    Bus(String),
}

/// A fixed size monochrome screen.
pub trait Backend: Send {
    /// Shows the given bitmap.
    fn display(&mut self, bitmap: &Bitmap) -> Result<(), DisplayError>;

    /// Blanks the screen.
    fn hide(&mut self) -> Result<(), DisplayError>;
}

/// Projects sampler status onto a display.
pub trait Projector: Send + Sync {
    /// Sets the device identity and sample count.
    fn set_status(&self, device_name: &str, sample_count: usize);

    /// Sets the key that is playing, or None for idle.
    fn set_now_playing(&self, key: Option<&str>);

    /// Appends a log line, evicting the oldest past `LOG_MAX_LINES`.
    fn add_log(&self, line: &str);

    fn update_sample_count(&self, sample_count: usize);

    /// Resets the state and blanks the screen.
    fn clear(&self);

    /// Returns false for the null projector.
    fn is_enabled(&self) -> bool;
}

/// Used when there is no display. Does nothing.
pub struct NullProjector;

impl Projector for NullProjector {
    fn set_status(&self, _: &str, _: usize) {}

    fn set_now_playing(&self, _: Option<&str>) {}

    fn add_log(&self, _: &str) {}

    fn update_sample_count(&self, _: usize) {}

    fn clear(&self) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

struct Inner {
    state: DisplayState,
    backend: Box<dyn Backend>,
    /// Set after a failed write until the next one succeeds.
    failing: bool,
}

impl Inner {
    /// Pushes the current state to the screen. Returns true if a warning was
    /// logged.
    fn refresh(&mut self) -> bool {
        let bitmap = render(&self.state);
        let result = self.backend.display(&bitmap);
        self.report(result, "Unable to update display.")
    }

    fn hide(&mut self) -> bool {
        let result = self.backend.hide();
        self.report(result, "Unable to clear display.")
    }

    /// Warns on the first failure of a run and once when writes recover.
    fn report(&mut self, result: Result<(), DisplayError>, message: &str) -> bool {
        match result {
            Ok(()) => {
                if self.failing {
                    info!("Display writes recovered.");
                    self.failing = false;
                }
                false
            }
            Err(_) if self.failing => false,
            Err(e) => {
                warn!(err = e.to_string(), "{} Further errors suppressed.", message);
                self.failing = true;
                true
            }
        }
    }
}

/// Renders status to a real display backend.
pub struct DisplayProjector {
    inner: Mutex<Inner>,
}

impl DisplayProjector {
    pub fn new(backend: Box<dyn Backend>) -> DisplayProjector {
        DisplayProjector {
            inner: Mutex::new(Inner {
                state: DisplayState::default(),
                backend,
                failing: false,
            }),
        }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> DisplayState {
        self.inner.lock().state.clone()
    }

    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut DisplayState),
    {
        let mut inner = self.inner.lock();
        mutate(&mut inner.state);
        inner.refresh();
    }
}

impl Projector for DisplayProjector {
    fn set_status(&self, device_name: &str, sample_count: usize) {
        self.update(|state| state.set_status(device_name, sample_count));
    }

    fn set_now_playing(&self, key: Option<&str>) {
        self.update(|state| state.set_now_playing(key));
    }

    fn add_log(&self, line: &str) {
        self.update(|state| state.add_log(line));
    }

    fn update_sample_count(&self, sample_count: usize) {
        self.update(|state| state.update_sample_count(sample_count));
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.state = DisplayState::default();
        inner.hide();
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Opens the configured display. Falls back to the null projector when the
/// display is disabled or can't be reached.
pub fn create(config: &config::Display) -> Arc<dyn Projector> {
    if config.disabled() {
        info!("Display disabled.");
        return Arc::new(NullProjector);
    }

    match open_backend(config) {
        Ok(backend) => {
            info!(
                bus = config.bus(),
                address = format!("{:#04x}", config.address()),
                "Display ready."
            );
            Arc::new(DisplayProjector::new(backend))
        }
        Err(e) => {
            warn!(err = e.to_string(), "Continuing without a display.");
            Arc::new(NullProjector)
        }
    }
}

#[cfg(feature = "oled")]
fn open_backend(config: &config::Display) -> Result<Box<dyn Backend>, DisplayError> {
    Ok(Box::new(oled::Oled::open(config.bus(), config.address())?))
}

#[cfg(not(feature = "oled"))]
fn open_backend(_: &config::Display) -> Result<Box<dyn Backend>, DisplayError> {
    Err(DisplayError::DeviceUnavailable(
        "built without OLED support".to_string(),
    ))
}
