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
use std::{error::Error, fmt, sync::Arc};

use tokio::sync::mpsc::Sender;

mod midir;
pub mod mock;

/// Errors that keep the sampler from starting at all.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("no MIDI input devices found")]
    NoMidiInput,
    #[error("unable to open MIDI device {name}: {reason}")]
    MidiDevice { name: String, reason: String },
}

/// A MIDI device that can listen for inputs.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input for events and sends them to the given sender.
    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>>;

    /// Stops watching events.
    fn stop_watch_events(&self);
}

/// Lists the MIDI input ports known to midir.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    midir::list()
}

/// Gets the input device with the given name, or the first input port if no
/// name is given. Names starting with "mock" select the mock device.
pub fn get_device(name: Option<&str>) -> Result<Arc<dyn Device>, InitError> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Device::get(name)));
        }
    }

    Ok(Arc::new(midir::get(name)?))
}
