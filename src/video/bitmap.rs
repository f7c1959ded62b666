//! Multicolor bitmap decoding
//!
//! Each bitmap byte holds four double-width pixels, two bits each. The
//! bitmap is laid out in character cells: eight consecutive bytes form one
//! 4x8 cell and 40 cells make a 0x140 byte character row. A pixel's bit
//! pair selects its colour:
//!
//! - 00: background colour
//! - 01: high nibble of the cell's byte in colour plane 1
//! - 10: low nibble of the cell's byte in colour plane 1
//! - 11: low nibble of the cell's byte in colour plane 2
//!
//! Pairs 10 and 11 are foreground: sprites touching them raise a background
//! collision.

use crate::memory::{Memory, BITMAP, COLOR_PLANE_1, COLOR_PLANE_2, SCREEN_COLUMNS};

/// One decoded bitmap pixel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapPixel {
    /// Colour nibble
    pub color: u8,

    /// Counts for sprite to background collisions
    pub foreground: bool,
}

/// Decode the pixel at a screen position (0..320, 0..200)
pub fn pixel(memory: &Memory, background: u8, x: u32, y: u32) -> BitmapPixel {
    let column = (x >> 3) as u16;
    let char_row = (y >> 3) as u16;

    let addr = BITMAP + char_row * 0x140 + column * 8 + (y & 7) as u16;
    let shift = 6 - ((x & 7) >> 1) * 2;
    let bits = (memory.read(addr) >> shift) & 0x03;

    let cell = char_row * SCREEN_COLUMNS as u16 + column;
    let color = match bits {
        0 => background,
        1 => memory.read(COLOR_PLANE_1 + cell) >> 4,
        2 => memory.read(COLOR_PLANE_1 + cell) & 0x0F,
        _ => memory.read(COLOR_PLANE_2 + cell) & 0x0F,
    };

    BitmapPixel { color, foreground: bits & 0x02 != 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_pairs_pick_their_colour_source() {
        let mut memory = Memory::new();
        memory.write(BITMAP + 8 + 2, 0b00_01_10_11);
        memory.write(COLOR_PLANE_1 + 1, 0x52);
        memory.write(COLOR_PLANE_2 + 1, 0x0E);

        let at = |x| pixel(&memory, 6, x, 2);
        assert_eq!(at(8), BitmapPixel { color: 6, foreground: false });
        assert_eq!(at(11), BitmapPixel { color: 5, foreground: false });
        assert_eq!(at(12), BitmapPixel { color: 2, foreground: true });
        assert_eq!(at(14), BitmapPixel { color: 0x0E, foreground: true });
    }

    #[test]
    fn char_rows_are_0x140_bytes_apart() {
        let mut memory = Memory::new();
        memory.write(BITMAP + 0x140, 0xC0);
        memory.write(COLOR_PLANE_2 + 40, 0x07);

        assert_eq!(pixel(&memory, 0, 0, 8).color, 7);
        assert_eq!(pixel(&memory, 0, 0, 0).color, 0);
    }
}
