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
use serde::Deserialize;

const DEFAULT_BUS: u8 = 1;
const DEFAULT_ADDRESS: u16 = 0x3C;

/// A YAML representation of the status display configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Display {
    /// Skips all display I/O when true.
    #[serde(default)]
    disabled: bool,

    /// The I2C bus the display is attached to.
    bus: Option<u8>,

    /// The I2C address of the display.
    address: Option<u16>,
}

impl Display {
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn bus(&self) -> u8 {
        self.bus.unwrap_or(DEFAULT_BUS)
    }

    pub fn address(&self) -> u16 {
        self.address.unwrap_or(DEFAULT_ADDRESS)
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn set_bus(&mut self, bus: u8) {
        self.bus = Some(bus);
    }

    pub fn set_address(&mut self, address: u16) {
        self.address = Some(address);
    }
}
