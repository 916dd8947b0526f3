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

//! Rendering of the display state to a monochrome bitmap.
//!
//! The screen is split into three fixed bands:
//!
//! ```text
//!  0 +----------------------+
//!    | device name          |  6x10
//!    | Samples: N           |  6x10
//! 21 +----------------------+
//!    | > Key5   (or idle)   |  9x15
//! 39 +----------------------+
//!    | oldest log line      |  5x8
//!    | ...                  |
//!    | newest log line      |
//! 63 +----------------------+
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_5X8, FONT_6X10, FONT_9X15},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};

use super::{state::truncate, DisplayState, HEIGHT, STATUS_CHARS, WIDTH};

const STATUS_Y: i32 = 0;
const SAMPLES_Y: i32 = 10;
const UPPER_RULE_Y: i32 = 21;
const NOW_PLAYING_Y: i32 = 23;
const LOWER_RULE_Y: i32 = 39;
const LOG_Y: i32 = 40;
const LOG_LINE_HEIGHT: i32 = 8;

const IDLE: &str = "idle";
const NOW_PLAYING_PREFIX: &str = "> ";

/// A packed 1 bit per pixel image the size of the display.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pixels: [u8; WIDTH * HEIGHT / 8],
    out_of_bounds: usize,
}

impl Bitmap {
    pub fn new() -> Bitmap {
        Bitmap {
            pixels: [0; WIDTH * HEIGHT / 8],
            out_of_bounds: 0,
        }
    }

    /// Returns whether the pixel at the given coordinates is lit.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }
        let index = y * WIDTH + x;
        self.pixels[index / 8] & (1 << (index % 8)) != 0
    }

    /// Iterates over every pixel in row order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        (0..HEIGHT).flat_map(move |y| {
            (0..WIDTH).map(move |x| {
                Pixel(
                    Point::new(x as i32, y as i32),
                    BinaryColor::from(self.pixel(x, y)),
                )
            })
        })
    }

    /// The number of lit pixels in the given rows.
    pub fn lit_pixels(&self, rows: std::ops::Range<usize>) -> usize {
        rows.flat_map(|y| (0..WIDTH).map(move |x| (x, y)))
            .filter(|(x, y)| self.pixel(*x, *y))
            .count()
    }

    /// The number of draws that fell outside the bitmap and were dropped.
    pub fn out_of_bounds(&self) -> usize {
        self.out_of_bounds
    }

    fn set(&mut self, x: usize, y: usize, on: bool) {
        let index = y * WIDTH + x;
        if on {
            self.pixels[index / 8] |= 1 << (index % 8);
        } else {
            self.pixels[index / 8] &= !(1 << (index % 8));
        }
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({} lit)", self.lit_pixels(0..HEIGHT))
    }
}

impl OriginDimensions for Bitmap {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for Bitmap {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            match (usize::try_from(point.x), usize::try_from(point.y)) {
                (Ok(x), Ok(y)) if x < WIDTH && y < HEIGHT => self.set(x, y, color.is_on()),
                _ => self.out_of_bounds += 1,
            }
        }
        Ok(())
    }
}

fn draw<D>(drawable: &D, bitmap: &mut Bitmap)
where
    D: Drawable<Color = BinaryColor>,
{
    drawable.draw(bitmap).map(|_| ()).unwrap_or_else(|e| match e {});
}

fn text(bitmap: &mut Bitmap, line: &str, y: i32, style: MonoTextStyle<'_, BinaryColor>) {
    draw(
        &Text::with_baseline(line, Point::new(0, y), style, Baseline::Top),
        bitmap,
    );
}

fn rule(bitmap: &mut Bitmap, y: i32) {
    draw(
        &Line::new(Point::new(0, y), Point::new(WIDTH as i32 - 1, y))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1)),
        bitmap,
    );
}

/// Renders the full screen. The same state always produces the same bitmap.
pub fn render(state: &DisplayState) -> Bitmap {
    let mut bitmap = Bitmap::new();
    let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let large = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);
    let tiny = MonoTextStyle::new(&FONT_5X8, BinaryColor::On);

    text(&mut bitmap, state.device_name(), STATUS_Y, small);
    text(
        &mut bitmap,
        &truncate(&format!("Samples: {}", state.sample_count()), STATUS_CHARS),
        SAMPLES_Y,
        small,
    );
    rule(&mut bitmap, UPPER_RULE_Y);

    let now_playing = match state.now_playing() {
        Some(key) => format!("{}{}", NOW_PLAYING_PREFIX, key),
        None => IDLE.to_string(),
    };
    text(&mut bitmap, &now_playing, NOW_PLAYING_Y, large);
    rule(&mut bitmap, LOWER_RULE_Y);

    for (i, line) in state.log().enumerate() {
        text(&mut bitmap, line, LOG_Y + i as i32 * LOG_LINE_HEIGHT, tiny);
    }

    bitmap
}
