//! Hardware sprite rendering
//!
//! A hardware sprite is 24x21 pixels, three bytes per row, read from 64
//! byte blocks selected by the sprite's data pointer. Multicolor sprites use
//! bit pairs like the bitmap (01 shared colour 0, 10 the sprite's own
//! colour, 11 shared colour 1); hires sprites use one bit per pixel. Either
//! axis can be doubled.

use crate::engine::HardwareSprite;
use crate::memory::{Memory, SPRITE_DATA};

/// Sprite size in unexpanded pixels
pub const SPRITE_WIDTH: i32 = 24;
pub const SPRITE_HEIGHT: i32 = 21;

/// Hardware coordinates of the top left screen pixel
pub const SCREEN_LEFT: i32 = 24;
pub const SCREEN_TOP: i32 = 50;

/// Screen-space box covered by a sprite
pub fn bounds(sprite: &HardwareSprite) -> (i32, i32, i32, i32) {
    let left = sprite.x as i32 - SCREEN_LEFT;
    let top = sprite.y as i32 - SCREEN_TOP;
    let width = SPRITE_WIDTH << sprite.double_width as i32;
    let height = SPRITE_HEIGHT << sprite.double_height as i32;
    (left, top, width, height)
}

/// Colour of a sprite pixel, `None` where the sprite is transparent
///
/// `dx` and `dy` are offsets from the sprite's top left corner in screen
/// pixels and must lie inside its box.
pub fn pixel(memory: &Memory, sprite: &HardwareSprite, multicolor: [u8; 2], dx: i32, dy: i32) -> Option<u8> {
    let column = dx >> sprite.double_width as i32;
    let row = dy >> sprite.double_height as i32;

    let data = SPRITE_DATA.wrapping_add((sprite.pointer as u16) << 6);
    let byte = memory.read(data.wrapping_add((row * 3 + (column >> 3)) as u16));

    if sprite.multicolor {
        let shift = 6 - ((column & 7) >> 1) * 2;
        match (byte >> shift) & 0x03 {
            0 => None,
            1 => Some(multicolor[0]),
            2 => Some(sprite.color),
            _ => Some(multicolor[1]),
        }
    } else {
        let bit = 7 - (column & 7);
        ((byte >> bit) & 1 != 0).then_some(sprite.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(multicolor: bool) -> HardwareSprite {
        HardwareSprite {
            enabled: true,
            x: 24,
            y: 50,
            color: 7,
            multicolor,
            pointer: 0x20,
            ..HardwareSprite::default()
        }
    }

    #[test]
    fn hires_bits_are_single_pixels() {
        let mut memory = Memory::new();
        memory.write(SPRITE_DATA + 0x800 + 3, 0b1000_0001);

        let s = sprite(false);
        assert_eq!(pixel(&memory, &s, [1, 2], 0, 1), Some(7));
        assert_eq!(pixel(&memory, &s, [1, 2], 1, 1), None);
        assert_eq!(pixel(&memory, &s, [1, 2], 7, 1), Some(7));
    }

    #[test]
    fn multicolor_pairs_and_expansion() {
        let mut memory = Memory::new();
        memory.write(SPRITE_DATA + 0x800, 0b01_10_11_00);

        let mut s = sprite(true);
        assert_eq!(pixel(&memory, &s, [1, 2], 0, 0), Some(1));
        assert_eq!(pixel(&memory, &s, [1, 2], 2, 0), Some(7));
        assert_eq!(pixel(&memory, &s, [1, 2], 4, 0), Some(2));
        assert_eq!(pixel(&memory, &s, [1, 2], 6, 0), None);

        s.double_width = true;
        s.double_height = true;
        assert_eq!(pixel(&memory, &s, [1, 2], 5, 1), Some(7));
        assert_eq!(bounds(&s), (0, 0, 48, 42));
    }
}
