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
use std::{error::Error, fmt, mem};

use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, Level};

use super::InitError;

pub struct Device {
    name: String,
    input_port: MidiInputPort,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "wait for event (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err("Already watching events.".into());
        }

        info!(device = self.name, "Watching MIDI events.");

        let input = MidiInput::new("jinglebox input")?;
        *event_connection = Some(
            input
                .connect(
                    &self.input_port,
                    "jinglebox input watcher",
                    move |_, raw_event, _| {
                        if let Ok(event) = LiveEvent::parse(raw_event) {
                            debug!(event = format!("{:?}", event), "Received MIDI event.");
                        }
                        if let Err(e) = sender.blocking_send(Vec::from(raw_event)) {
                            error!(
                                err = format!("{:?}", e),
                                "Error sending MIDI event to receiver."
                            );
                        }
                    },
                    (),
                )
                .map_err(|e| e.to_string())?,
        );

        Ok(())
    }

    fn stop_watch_events(&self) {
        // Explicitly drop the connection.
        let event_connection = self.event_connection.lock().take();
        mem::drop(event_connection);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}

/// Lists the names of the available MIDI input ports.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("jinglebox input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Gets the input port matching the given name, or the first input port.
pub fn get(name: Option<&str>) -> Result<Device, InitError> {
    let device_error = |reason: String| InitError::MidiDevice {
        name: name.unwrap_or("default").to_string(),
        reason,
    };

    let input = MidiInput::new("jinglebox input listing").map_err(|e| device_error(e.to_string()))?;
    let mut ports = Vec::new();
    for port in input.ports() {
        let port_name = input
            .port_name(&port)
            .map_err(|e| device_error(e.to_string()))?;
        ports.push((port_name, port));
    }

    let Some(name) = name else {
        let Some((port_name, port)) = ports.into_iter().next() else {
            return Err(InitError::NoMidiInput);
        };
        return Ok(Device::new(port_name, port));
    };

    let mut matches = ports
        .into_iter()
        .filter(|(port_name, _)| port_name.contains(name))
        .collect::<Vec<(String, MidiInputPort)>>();

    if matches.is_empty() {
        return Err(device_error(format!("no device found with name {}", name)));
    }
    if matches.len() > 1 {
        return Err(device_error(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|(port_name, _)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )));
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    let (port_name, port) = matches.swap_remove(0);
    Ok(Device::new(port_name, port))
}

impl Device {
    fn new(name: String, input_port: MidiInputPort) -> Device {
        Device {
            name,
            input_port,
            event_connection: Mutex::new(None),
        }
    }
}
