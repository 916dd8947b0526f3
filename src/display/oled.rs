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
use embedded_graphics::prelude::*;
use rppal::i2c::I2c;
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306};

use super::{Bitmap, DisplayError};

type Screen =
    Ssd1306<I2CInterface<I2c>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// A 128x64 SSD1306 OLED on an I2C bus.
pub struct Oled {
    screen: Screen,
}

impl Oled {
    /// Opens and initializes the display at the given bus and address.
    pub fn open(bus: u8, address: u16) -> Result<Oled, DisplayError> {
        let address = u8::try_from(address).map_err(|_| {
            DisplayError::DeviceUnavailable(format!("invalid I2C address {:#x}", address))
        })?;
        let i2c = I2c::with_bus(bus).map_err(|e| {
            DisplayError::DeviceUnavailable(format!("unable to open I2C bus {}: {}", bus, e))
        })?;

        let interface = I2CDisplayInterface::new_custom_address(i2c, address);
        let mut screen = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        screen
            .init()
            .map_err(|e| DisplayError::DeviceUnavailable(format!("{:?}", e)))?;

        let mut oled = Oled { screen };
        super::Backend::hide(&mut oled)
            .map_err(|e| DisplayError::DeviceUnavailable(e.to_string()))?;
        Ok(oled)
    }
}

impl super::Backend for Oled {
    fn display(&mut self, bitmap: &Bitmap) -> Result<(), DisplayError> {
        self.screen.clear_buffer();
        self.screen
            .draw_iter(bitmap.pixels())
            .map_err(|e| DisplayError::Bus(format!("{:?}", e)))?;
        self.screen
            .flush()
            .map_err(|e| DisplayError::Bus(format!("{:?}", e)))
    }

    fn hide(&mut self) -> Result<(), DisplayError> {
        self.screen.clear_buffer();
        self.screen
            .flush()
            .map_err(|e| DisplayError::Bus(format!("{:?}", e)))
    }
}
