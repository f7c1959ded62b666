//! Compositing routine
//!
//! Images are stored in game data as `[width bytes, height lines, flags]`
//! followed by the bitmap (`width * height` bytes) and two colour blocks of
//! `width * char_rows` bytes each. Drawing ORs the bitmap into the
//! multicolor framebuffer and copies the colour blocks over the two colour
//! planes; erasing ANDs the inverse of a glyph bitmap into the framebuffer
//! and leaves the colour planes alone. The combined mode erases the previous
//! image of an animated object and draws the new one in a single row pass.
//!
//! Positions are in game units: one horizontal unit is a double-width pixel
//! (four per byte column), X 0x10 is the left edge of the screen, and Y
//! values of 0xDC and above are treated as rows above the top edge.

use crate::memory::{
    Memory, CHAR_ROW_HIGH, CHAR_ROW_LOW, COLOR_PLANE_1, COLOR_PLANE_2, SCREEN_COLUMNS,
    SCREEN_LINES, SCREEN_ROWS,
};

/// Rows at or above this value are negative (off the top of the screen)
const NEGATIVE_ROW: u8 = 0xDC;

/// Image ids used by the string renderer
const STRING_ERASE_IMAGE: u8 = 0x94;
const STRING_GLYPH_IMAGE: u8 = 0x95;

/// Game data used by the string renderer
const STRING_ERASE_HEIGHT: u16 = 0x73B5;
const STRING_GLYPH_HEIGHT: u16 = 0x73E8;
const STRING_GLYPH_DATA: u16 = 0x73EA;
const CHAR_ROM_BANKS: u16 = 0x2BE8;
const NIBBLE_EXPAND: u16 = 0x2BF8;

/// Address the character ROM is mapped at
const CHAR_ROM_BASE: u16 = 0xD000;

/// Drawing mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawMode {
    /// OR an image into the bitmap and overwrite its colours
    Graphics,
    /// AND-NOT a glyph out of the bitmap
    Text,
    /// Erase a glyph and draw an image in one pass
    Combined,
}

/// The glyph used by `Text` and `Combined` drawing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextPosition {
    pub x: u8,
    pub y: u8,
    pub gfx: u8,
}

impl TextPosition {
    pub fn new(x: u8, y: u8, gfx: u8) -> Self {
        TextPosition { x, y, gfx }
    }
}

/// Size of the drawn image, as read from its header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in bytes
    pub width: u8,
    /// Height in lines
    pub height: u8,
}

/// Horizontal placement of one layer
struct Layer {
    /// Image data cursor
    source: u16,
    width: u8,
    /// Rows left to draw
    remaining: u8,
    /// Byte offset of the first column within a bitmap row
    dest_x: u8,
    /// High byte adjustment for images crossing the left edge
    edge: u8,
    /// First and last byte column
    left: u8,
    right: u8,
    started: bool,
}

impl Layer {
    fn place(source: u16, width: u8, height: u8, dest_x: u8, edge: u8) -> Self {
        let left = (dest_x >> 2) | (edge & 0xC0);
        let edge = (edge << 1) | (dest_x >> 7);

        Layer {
            source,
            width,
            remaining: height,
            dest_x: dest_x << 1,
            edge,
            left,
            right: left.wrapping_add(width).wrapping_sub(1),
            started: false,
        }
    }

    /// Apply one image row to the bitmap row at `row_address`
    fn apply(&self, memory: &mut Memory, row_address: u16, erase: bool) {
        let mut column = self.left;
        let mut target = row_address
            .wrapping_add(self.dest_x as u16)
            .wrapping_add((self.edge as u16) << 8);
        let mut offset: u8 = 0;

        loop {
            if column < SCREEN_COLUMNS {
                let value = memory.read(self.source.wrapping_add(offset as u16));
                let addr = target.wrapping_add(offset as u16);
                let current = memory.read(addr);
                let result = if erase { current & !value } else { current | value };
                memory.write(addr, result);
            }

            if column == self.right {
                break;
            }

            target = target.wrapping_add(7);
            column = column.wrapping_add(1);
            offset = offset.wrapping_add(1);
        }
    }
}

/// Draw an image and/or erase a glyph
///
/// `gfx`, `x` and `y` describe the image (ignored in `Text` mode), `text`
/// the glyph (ignored in `Graphics` mode). Returns the image's header size,
/// or zero in `Text` mode.
pub fn screen_draw(
    memory: &mut Memory,
    mode: DrawMode,
    gfx: u8,
    x: u8,
    y: u8,
    text: TextPosition,
) -> ImageSize {
    let mut text_layer = None;
    let mut text_bottom = 0u8;

    if mode != DrawMode::Graphics {
        let header = memory.image_address(text.gfx);
        let width = memory.read(header);
        let height = memory.read(header.wrapping_add(1));
        text_bottom = text.y.wrapping_add(height).wrapping_sub(1);

        let (dest_x, edge) = if text.x < 0x10 {
            (0xFF, 0xFF)
        } else {
            (text.x - 0x10, 0)
        };

        text_layer = Some(Layer::place(header.wrapping_add(3), width, height, dest_x, edge));
    }

    let mut size = ImageSize::default();
    let mut gfx_layer = None;
    let mut gfx_bottom = 0u8;
    let mut char_row = 0u8;
    let mut last_char_row = 0u8;
    let mut plane_offset = (0u8, 0u8);

    if mode != DrawMode::Text {
        let header = memory.image_address(gfx);
        size.width = memory.read(header);
        size.height = memory.read(header.wrapping_add(1));
        gfx_bottom = y.wrapping_add(size.height).wrapping_sub(1);

        let dest_x = x.wrapping_sub(0x10);
        let edge = if x < 0x10 { 0xFF } else { 0 };
        gfx_layer = Some(Layer::place(header.wrapping_add(3), size.width, size.height, dest_x, edge));

        char_row = if y >= NEGATIVE_ROW { (y >> 3) | 0xE0 } else { y >> 3 };
        last_char_row = (size.height.wrapping_sub(1) >> 3).wrapping_add(char_row);

        let index = if char_row >= 0x80 { 0u8.wrapping_sub(char_row) } else { char_row };
        let mut low = memory.read(CHAR_ROW_LOW.wrapping_add(index as u16));
        let mut high = memory.read(CHAR_ROW_HIGH.wrapping_add(index as u16));
        if char_row > 0x80 {
            low = 0u8.wrapping_sub(low);
            high = 0u8.wrapping_sub(high);
        }

        let sign = if x < 0x10 { 0xFF } else { 0 };
        let mut column = x.wrapping_sub(0x10);
        for _ in 0..2 {
            if sign & 0x01 != 0 {
                column |= 0x80;
            }
            column >>= 1;
        }

        if low as u16 + column as u16 > 0xFF {
            high = high.wrapping_add(1);
        }
        plane_offset = (low.wrapping_add(column), high.wrapping_add(sign));
    }

    let (top, bottom) = match mode {
        DrawMode::Graphics => (y, gfx_bottom),
        DrawMode::Text => (text.y, text_bottom),
        DrawMode::Combined => (
            combined_top(y, text.y),
            combined_bottom(gfx_bottom, text_bottom),
        ),
    };

    let mut row = top;
    let mut row_address = memory.row_address(row);

    loop {
        if let Some(layer) = text_layer.as_mut() {
            if layer.remaining != 0 && (layer.started || text.y == row) {
                layer.started = true;
                layer.remaining -= 1;
                if row < SCREEN_LINES {
                    layer.apply(memory, row_address, true);
                }
                layer.source = layer.source.wrapping_add(layer.width as u16);
            }
        }

        if let Some(layer) = gfx_layer.as_mut() {
            if layer.remaining != 0 && (layer.started || y == row) {
                layer.started = true;
                layer.remaining -= 1;
                if row < SCREEN_LINES {
                    layer.apply(memory, row_address, false);
                }
                layer.source = layer.source.wrapping_add(layer.width as u16);
            }
        }

        if row == bottom {
            break;
        }

        row = row.wrapping_add(1);
        row_address = if row & 7 != 0 {
            row_address.wrapping_add(1)
        } else {
            row_address.wrapping_add(0x139)
        };
    }

    let Some(layer) = gfx_layer else {
        return size;
    };

    // Colour blocks follow the bitmap
    let mut source = layer.source;
    let (low, high) = plane_offset;

    for plane in [COLOR_PLANE_1, COLOR_PLANE_2] {
        let plane_high = ((plane >> 8) as u8).wrapping_add(high);
        let mut dest = u16::from_le_bytes([low, plane_high]);
        let mut current = char_row;
        let mut extra_row = y & 7 != 0;

        loop {
            if current < SCREEN_ROWS {
                let mut column = layer.left as u16;
                let mut offset = 0u16;
                while column <= layer.right as u16 {
                    if column < SCREEN_COLUMNS as u16 {
                        let value = memory.read(source.wrapping_add(offset));
                        memory.write(dest.wrapping_add(offset), value);
                    }
                    column += 1;
                    offset += 1;
                }
            }

            if current != last_char_row {
                current = current.wrapping_add(1);
                source = source.wrapping_add(layer.width as u16);
            } else {
                if !extra_row {
                    break;
                }
                extra_row = false;
                if current != 0xFF && current >= SCREEN_ROWS - 1 {
                    break;
                }
            }

            dest = dest.wrapping_add(SCREEN_COLUMNS as u16);
        }

        source = source.wrapping_add(layer.width as u16);
    }

    size
}

/// First row visited when erasing and drawing in one pass
fn combined_top(gfx_y: u8, text_y: u8) -> u8 {
    if gfx_y == text_y {
        return 0;
    }

    if gfx_y >= text_y {
        if gfx_y >= NEGATIVE_ROW || text_y < NEGATIVE_ROW {
            return text_y;
        }
    } else if text_y >= NEGATIVE_ROW && gfx_y < NEGATIVE_ROW {
        return text_y;
    }

    0
}

/// Last row visited when erasing and drawing in one pass
fn combined_bottom(gfx_bottom: u8, text_bottom: u8) -> u8 {
    if gfx_bottom == text_bottom {
        return text_bottom;
    }

    if gfx_bottom >= text_bottom {
        if gfx_bottom >= NEGATIVE_ROW && text_bottom < NEGATIVE_ROW {
            text_bottom
        } else {
            gfx_bottom
        }
    } else if text_bottom >= NEGATIVE_ROW && gfx_bottom < NEGATIVE_ROW {
        gfx_bottom
    } else {
        text_bottom
    }
}

/// Draw an image in `Graphics` mode
pub fn draw_image(memory: &mut Memory, gfx: u8, x: u8, y: u8) -> ImageSize {
    screen_draw(memory, DrawMode::Graphics, gfx, x, y, TextPosition::default())
}

/// Erase the bits of `gfx` at a position
pub fn erase_image(memory: &mut Memory, gfx: u8, x: u8, y: u8) {
    screen_draw(memory, DrawMode::Text, 0, 0, 0, TextPosition::new(x, y, gfx));
}

/// One string record: position, colour and font
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StringStyle {
    pub x: u8,
    pub y: u8,
    pub color: u8,
    /// Bits 0-1: height multiplier (0 means 1), bits 4-5: character set
    pub font: u8,
}

/// Draw a string stored at `addr` (bit 7 marks the last character)
///
/// Returns the address following the string.
pub fn string_draw(memory: &mut Memory, char_rom: &[u8], style: StringStyle, addr: u16) -> u16 {
    let scale = if style.font == 0 { 1 } else { style.font & 0x03 };

    memory.write(STRING_ERASE_HEIGHT, scale << 3);
    memory.write(STRING_GLYPH_HEIGHT, scale << 3);

    let color_block = STRING_GLYPH_DATA + ((scale as u16) << 4);
    memory.fill(color_block, 6, style.color << 4);

    let bank = ((style.font & 0x30) >> 3) as u16;
    let mut cursor = addr;
    let mut x = style.x;

    loop {
        let character = memory.read(cursor);
        let rom = memory
            .read_word(CHAR_ROM_BANKS + bank)
            .wrapping_add(((character & 0x7F) as u16) << 3);

        let mut target = STRING_GLYPH_DATA;
        for line in 0..8u16 {
            let pattern = char_rom
                .get(rom.wrapping_add(line).wrapping_sub(CHAR_ROM_BASE) as usize)
                .copied()
                .unwrap_or(0);

            let left = memory.read(NIBBLE_EXPAND + (pattern >> 4) as u16);
            let right = memory.read(NIBBLE_EXPAND + (pattern & 0x0F) as u16);

            for repeat in 0..scale.max(1) as u16 {
                memory.write(target + repeat * 2, left);
                memory.write(target + repeat * 2 + 1, right);
            }
            target += match scale {
                0 | 1 => 2,
                2 => 4,
                _ => 6,
            };
        }

        screen_draw(
            memory,
            DrawMode::Combined,
            STRING_GLYPH_IMAGE,
            x,
            style.y,
            TextPosition::new(x, style.y, STRING_ERASE_IMAGE),
        );

        if character & 0x80 != 0 {
            break;
        }

        cursor = cursor.wrapping_add(1);
        x = x.wrapping_add(8);
    }

    cursor.wrapping_add(1)
}

/// Draw a list of string records terminated by a zero X
///
/// Returns the address following the terminator.
pub fn print_strings(memory: &mut Memory, char_rom: &[u8], addr: u16) -> u16 {
    let mut cursor = addr;

    loop {
        let x = memory.read(cursor);
        if x == 0 {
            break;
        }

        let style = StringStyle {
            x,
            y: memory.read(cursor.wrapping_add(1)),
            color: memory.read(cursor.wrapping_add(2)),
            font: memory.read(cursor.wrapping_add(3)),
        };
        cursor = string_draw(memory, char_rom, style, cursor.wrapping_add(4));
    }

    cursor.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BITMAP, IMAGE_TABLE};

    /// Place an image at `addr` and register it under `id`
    fn install(memory: &mut Memory, id: u8, addr: u16, width: u8, height: u8, bitmap: &[u8], colors: &[u8]) {
        memory.write_word(IMAGE_TABLE + (id as u16) * 2, addr);
        memory.write(addr, width);
        memory.write(addr + 1, height);
        memory.write(addr + 2, 0);
        memory.load(addr + 3, bitmap);
        memory.load(addr + 3 + bitmap.len() as u16, colors);
    }

    fn block(memory: &Memory, x_byte: u16, row: u8, lines: u8) -> Vec<u8> {
        (0..lines)
            .map(|line| memory.read(memory.row_address(row + line) + x_byte * 8))
            .collect()
    }

    #[test]
    fn graphics_or_sets_only_tile_bits() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 1, 2, &[0xF0, 0x0F], &[0x12, 0x34]);
        memory.write(BITMAP, 0x01);

        let size = draw_image(&mut memory, 1, 0x10, 0);

        assert_eq!(size, ImageSize { width: 1, height: 2 });
        assert_eq!(memory.read(BITMAP), 0xF1);
        assert_eq!(memory.read(BITMAP + 1), 0x0F);
        assert_eq!(memory.read(COLOR_PLANE_1), 0x12);
        assert_eq!(memory.read(COLOR_PLANE_2), 0x34);
    }

    #[test]
    fn columns_are_eight_bytes_apart() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 2, 1, &[0xAA, 0x55], &[1, 2, 3, 4]);

        // X 0x14 is the second byte column
        draw_image(&mut memory, 1, 0x14, 8);

        let row = memory.row_address(8);
        assert_eq!(memory.read(row + 8), 0xAA);
        assert_eq!(memory.read(row + 16), 0x55);
        assert_eq!(memory.read(COLOR_PLANE_1 + 0x28 + 1), 1);
        assert_eq!(memory.read(COLOR_PLANE_1 + 0x28 + 2), 2);
    }

    #[test]
    fn text_clears_only_glyph_bits() {
        let mut memory = Memory::new();
        install(&mut memory, 2, 0x3100, 1, 1, &[0x3C], &[0x77, 0x77]);
        memory.write(BITMAP, 0xFF);
        memory.write(COLOR_PLANE_1, 0x99);

        erase_image(&mut memory, 2, 0x10, 0);

        assert_eq!(memory.read(BITMAP), 0xC3);
        assert_eq!(memory.read(COLOR_PLANE_1), 0x99);
    }

    #[test]
    fn draw_erase_draw_restores_region() {
        let mut memory = Memory::new();
        let tile = [0x81, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x81];
        install(&mut memory, 1, 0x3000, 1, 8, &tile, &[5, 6]);
        install(&mut memory, 2, 0x3100, 1, 8, &[0xFF; 8], &[0, 0]);

        draw_image(&mut memory, 1, 0x18, 0x10);
        let drawn = block(&memory, 2, 0x10, 8);
        assert_eq!(drawn, tile.to_vec());

        erase_image(&mut memory, 2, 0x18, 0x10);
        assert_eq!(block(&memory, 2, 0x10, 8), vec![0; 8]);

        draw_image(&mut memory, 1, 0x18, 0x10);
        assert_eq!(block(&memory, 2, 0x10, 8), drawn);
    }

    #[test]
    fn rows_below_screen_are_clipped() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 1, 4, &[0xFF; 4], &[1, 1]);

        let before: Vec<u8> = memory.slice(0xFF40, 0xC0).to_vec();
        draw_image(&mut memory, 1, 0x10, 0xC6);

        assert_eq!(memory.read(memory.row_address(0xC6)), 0xFF);
        assert_eq!(memory.read(memory.row_address(0xC7)), 0xFF);
        assert_eq!(memory.slice(0xFF40, 0xC0), &before[..]);
    }

    #[test]
    fn columns_past_right_edge_are_clipped() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 2, 1, &[0xFF, 0xEE], &[1, 2, 3, 4]);

        // Byte column 0x27 is the last visible column
        draw_image(&mut memory, 1, 0x10 + 0x27 * 4, 0);

        assert_eq!(memory.read(BITMAP + 0x27 * 8), 0xFF);
        assert_eq!(memory.read(BITMAP + 0x28 * 8), 0);
        assert_eq!(memory.read(COLOR_PLANE_1 + 0x27), 1);
        assert_eq!(memory.read(COLOR_PLANE_1 + 0x28), 0);
    }

    #[test]
    fn unaligned_rows_copy_an_extra_colour_row() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 1, 8, &[0; 8], &[0xAB, 0xCD]);

        draw_image(&mut memory, 1, 0x10, 4);

        assert_eq!(memory.read(COLOR_PLANE_1), 0xAB);
        assert_eq!(memory.read(COLOR_PLANE_1 + 0x28), 0xAB);
        assert_eq!(memory.read(COLOR_PLANE_2), 0xCD);
        assert_eq!(memory.read(COLOR_PLANE_2 + 0x28), 0xCD);
    }

    #[test]
    fn combined_mode_moves_an_image() {
        let mut memory = Memory::new();
        install(&mut memory, 1, 0x3000, 1, 2, &[0xFF, 0xFF], &[1, 1]);

        draw_image(&mut memory, 1, 0x10, 0x20);
        screen_draw(&mut memory, DrawMode::Combined, 1, 0x14, 0x20, TextPosition::new(0x10, 0x20, 1));

        let row = memory.row_address(0x20);
        assert_eq!(memory.read(row), 0);
        assert_eq!(memory.read(row + 1), 0);
        assert_eq!(memory.read(row + 8), 0xFF);
        assert_eq!(memory.read(row + 9), 0xFF);
    }

    #[test]
    fn combined_row_span_rules() {
        assert_eq!(combined_top(0x20, 0x20), 0);
        assert_eq!(combined_top(0x30, 0x20), 0x20);
        assert_eq!(combined_top(0x10, 0x20), 0);
        assert_eq!(combined_top(0x10, 0xE0), 0xE0);
        assert_eq!(combined_bottom(0x40, 0x30), 0x40);
        assert_eq!(combined_bottom(0xE0, 0x30), 0x30);
        assert_eq!(combined_bottom(0x30, 0x40), 0x40);
        assert_eq!(combined_bottom(0x30, 0xE0), 0x30);
    }

    #[test]
    fn string_draw_uses_char_rom() {
        let mut memory = Memory::new();
        // Glyph image and its erase image live in the scratch area
        memory.write_word(IMAGE_TABLE + 0x95 * 2, 0x73E7);
        memory.write(0x73E7, 2);
        memory.write(0x73E9, 0);
        memory.write_word(IMAGE_TABLE + 0x94 * 2, 0x73B4);
        memory.write(0x73B4, 2);
        memory.write_word(CHAR_ROM_BANKS, CHAR_ROM_BASE);
        for n in 0..16u8 {
            memory.write(NIBBLE_EXPAND + n as u16, n * 0x11);
        }

        let mut char_rom = vec![0u8; 0x800];
        char_rom[8..16].copy_from_slice(&[0xF0; 8]);
        memory.write(0x4000, 0x81);

        let next = string_draw(&mut memory, &char_rom, StringStyle { x: 0x10, y: 0, color: 1, font: 0 }, 0x4000);

        assert_eq!(next, 0x4001);
        assert_eq!(memory.read(BITMAP), 0xFF);
        assert_eq!(memory.read(BITMAP + 8), 0x00);
        assert_eq!(memory.read(COLOR_PLANE_1), 0x10);
    }
}
