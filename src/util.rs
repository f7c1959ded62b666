//! Utility functions and helpers
//!
//! The packed decimal conversions used by the castle timers and
//! a hexdump for debugging room data.

use log::debug;

/// Engine ticks per second of playing time
pub const TICKS_PER_SECOND: u32 = 25;

/// Pack a value below 100 into two decimal digits
///
/// Larger values are packed the same way and wrap, as the game does.
#[inline]
pub fn to_bcd(value: u32) -> u8 {
    (value + 6 * (value / 10)) as u8
}

/// Unpack two decimal digits
#[inline]
pub fn from_bcd(value: u8) -> u32 {
    (value >> 4) as u32 * 10 + (value & 0x0F) as u32
}

/// Timer bytes (seconds, minutes, hours) for a playing time in ticks
pub fn time_to_timer(ticks: u32) -> [u8; 3] {
    let seconds = ticks / TICKS_PER_SECOND;
    [
        to_bcd(seconds % 60),
        to_bcd(seconds / 60),
        to_bcd(seconds / 3600),
    ]
}

/// Playing time in ticks for timer bytes (seconds, minutes, hours)
pub fn timer_to_time(timer: [u8; 3]) -> u32 {
    let [seconds, minutes, hours] = timer.map(from_bcd);
    (hours * 3600 + (minutes % 60) * 60 + seconds) * TICKS_PER_SECOND
}

/// Debug hexdump of a memory region
pub fn hexdump(data: &[u8], start_addr: u16) {
    for (i, chunk) in data.chunks(16).enumerate() {
        let addr = start_addr.wrapping_add((i * 16) as u16);

        let mut hex = String::with_capacity(50);
        for (j, byte) in chunk.iter().enumerate() {
            hex.push_str(&format!("{:02X} ", byte));
            if j == 7 {
                hex.push(' ');
            }
        }

        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
            .collect();

        debug!("{:04X}: {:<49} |{}|", addr, hex, ascii);
    }
}
