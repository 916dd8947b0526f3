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

use std::{
    thread,
    time::{Duration, Instant},
};

/// Waits for the given predicate to return true, panicking with the message
/// if it never does.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);
    let mut tick = Duration::from_millis(5);

    loop {
        if predicate() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }

        // Back off so polling doesn't starve the threads under test.
        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}
