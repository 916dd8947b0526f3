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
use std::sync::Arc;

use midly::{live::LiveEvent, MidiMessage};

use crate::keys::{Key, KeyMap};

/// What to do about an incoming MIDI message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play the given key's sample.
    Play(Key),
    /// Silence playback. Carries the STOP key that was pressed.
    Stop(Key),
    /// Nothing to do.
    Ignore(Ignored),
}

/// Why a message was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// A note-off, or a note-on with zero velocity.
    NoteOff(u8),
    /// A note-on for a note with no key bound to it.
    Unmapped(u8),
    /// Any other MIDI message.
    Other,
    /// Bytes that don't parse as a MIDI message.
    Unparseable,
}

/// Classifies raw MIDI messages into commands using the static note to key table.
/// The router holds no mutable state and does no I/O.
#[derive(Clone)]
pub struct MidiEventRouter {
    keys: Arc<KeyMap>,
}

impl MidiEventRouter {
    pub fn new(keys: Arc<KeyMap>) -> MidiEventRouter {
        MidiEventRouter { keys }
    }

    /// Routes a raw MIDI message.
    pub fn route(&self, raw_event: &[u8]) -> Command {
        match LiveEvent::parse(raw_event) {
            Ok(event) => self.route_event(event),
            Err(_) => Command::Ignore(Ignored::Unparseable),
        }
    }

    /// Routes a parsed MIDI event. Events on every channel are considered.
    pub fn route_event(&self, event: LiveEvent) -> Command {
        let LiveEvent::Midi { message, .. } = event else {
            return Command::Ignore(Ignored::Other);
        };

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                let note = key.as_int();
                match self.keys.key_for_note(note) {
                    Some(key) if key.is_stop() => Command::Stop(key.clone()),
                    Some(key) => Command::Play(key.clone()),
                    None => Command::Ignore(Ignored::Unmapped(note)),
                }
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                Command::Ignore(Ignored::NoteOff(key.as_int()))
            }
            _ => Command::Ignore(Ignored::Other),
        }
    }
}
