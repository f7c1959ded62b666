//! Colour palette
//!
//! The sixteen fixed colours of the display chip, as RGB triples.

/// RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RGB(pub u8, pub u8, pub u8);

/// Palette entries, indexed by colour nibble
pub const PALETTE: [RGB; 16] = [
    RGB(0x00, 0x00, 0x00), // black
    RGB(0xFF, 0xFF, 0xFF), // white
    RGB(0x68, 0x37, 0x2B), // red
    RGB(0x70, 0xA4, 0xB2), // cyan
    RGB(0x6F, 0x3D, 0x86), // purple
    RGB(0x58, 0x8D, 0x43), // green
    RGB(0x35, 0x28, 0x79), // blue
    RGB(0xB8, 0xC7, 0x6F), // yellow
    RGB(0x6F, 0x4F, 0x25), // orange
    RGB(0x43, 0x39, 0x00), // brown
    RGB(0x9A, 0x67, 0x59), // light red
    RGB(0x44, 0x44, 0x44), // dark grey
    RGB(0x6C, 0x6C, 0x6C), // grey
    RGB(0x9A, 0xD2, 0x84), // light green
    RGB(0x6C, 0x5E, 0xB5), // light blue
    RGB(0x95, 0x95, 0x95), // light grey
];

/// Look up a colour nibble; the high nibble is ignored
#[inline]
pub fn color(index: u8) -> RGB {
    PALETTE[(index & 0x0F) as usize]
}
