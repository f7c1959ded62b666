//! Shared state region
//!
//! Every subsystem of the room engine communicates through one flat 64KB
//! address space. Game data, the running castle, the floor geometry of the
//! current room, the bitmap and both colour planes all live at fixed offsets,
//! and a number of image headers inside the game data are patched at run time
//! to recolour tiles before they are drawn.
//!
//! Memory Map:
//! - 0x0800 - 0x77FF: Game data (image tables, animation tables, strings)
//! - 0x7800 - 0x78FF: Castle state (lives, rooms, doors, keys, timers)
//! - 0x7900 - 0x97FF: Castle room table, door tables and object streams
//! - 0x9800 - 0xB7FF: Pristine copy of the loaded castle
//! - 0xBB00 - 0xBCFF: Bitmap row address tables (high / low)
//! - 0xC000 - 0xC7FF: Room geometry map (2 bytes per cell, 0x50 per row)
//! - 0xC800 - 0xCBFF: Hardware sprite data (64 bytes per pointer)
//! - 0xCC00 - 0xCFE7: Colour plane 1 (screen matrix)
//! - 0xD800 - 0xDBE7: Colour plane 2
//! - 0xE000 - 0xFF3F: Multicolor bitmap

use log::trace;

/// Size of the addressable region (64KB)
pub const MEMORY_SIZE: usize = 0x10000;

/// Load address of the game data image
pub const GAME_DATA: u16 = 0x0800;

/// Running castle state
pub const CASTLE_STATE: u16 = 0x7800;

/// Room table, 8 bytes per room
pub const ROOM_TABLE: u16 = 0x7900;

/// Pristine castle image, copied to `CASTLE_STATE` on a new game
pub const CASTLE_IMAGE: u16 = 0x9800;

/// Bitmap row address tables, indexed by pixel row (with wraparound)
pub const ROW_ADDRESS_LOW: u16 = 0xBC00;
pub const ROW_ADDRESS_HIGH: u16 = 0xBB00;

/// Character row offset tables (row * 0x28)
pub const CHAR_ROW_LOW: u16 = 0x5CE6;
pub const CHAR_ROW_HIGH: u16 = 0x5D06;

/// Image pointer table, one little-endian word per image id
pub const IMAGE_TABLE: u16 = 0x603B;

/// Room geometry map
pub const GEOMETRY_MAP: u16 = 0xC000;
pub const GEOMETRY_MAP_END: u16 = 0xC800;

/// Base of hardware sprite data; pointers are multiplied by 64
pub const SPRITE_DATA: u16 = 0xC000;

/// Colour planes
pub const COLOR_PLANE_1: u16 = 0xCC00;
pub const COLOR_PLANE_2: u16 = 0xD800;

/// Multicolor bitmap
pub const BITMAP: u16 = 0xE000;

/// Bitmap size in bytes (40 columns * 25 rows * 8 lines)
pub const BITMAP_SIZE: usize = 0x1F40;

/// Single bit masks, `1 << n`
pub const BIT_TABLE: u16 = 0x2F82;

/// Screen dimensions in character cells
pub const SCREEN_COLUMNS: u8 = 0x28;
pub const SCREEN_ROWS: u8 = 0x19;

/// Number of visible pixel rows
pub const SCREEN_LINES: u8 = 0xC8;

/// Flat 64KB memory shared by the room engine
#[derive(Clone)]
pub struct Memory {
    /// Backing store, always `MEMORY_SIZE` bytes
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a new, zeroed memory region with the address tables built
    pub fn new() -> Self {
        let mut memory = Memory {
            bytes: vec![0; MEMORY_SIZE],
        };
        memory.build_tables();
        memory
    }

    /// Reset all memory to zero and rebuild the address tables
    pub fn reset(&mut self) {
        self.bytes.iter_mut().for_each(|b| *b = 0);
        self.build_tables();
    }

    /// Read a byte
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    /// Write a byte
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }

    /// Read a little-endian word
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }

    /// Write a little-endian word
    #[inline]
    pub fn write_word(&mut self, addr: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.write(addr, low);
        self.write(addr.wrapping_add(1), high);
    }

    /// OR bits into a byte
    #[inline]
    pub fn set_bits(&mut self, addr: u16, mask: u8) {
        self.bytes[addr as usize] |= mask;
    }

    /// AND bits into a byte
    #[inline]
    pub fn clear_bits(&mut self, addr: u16, mask: u8) {
        self.bytes[addr as usize] &= !mask;
    }

    /// Fill `len` bytes starting at `addr` with `value`
    pub fn fill(&mut self, addr: u16, len: usize, value: u8) {
        let start = addr as usize;
        let end = (start + len).min(MEMORY_SIZE);
        self.bytes[start..end].iter_mut().for_each(|b| *b = value);
    }

    /// Copy `data` into memory at `addr`, clipped to the end of the region
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        let len = data.len().min(MEMORY_SIZE - start);
        self.bytes[start..start + len].copy_from_slice(&data[..len]);
        trace!("Loaded {} bytes at ${:04X}", len, addr);
    }

    /// Copy `len` bytes inside the region
    pub fn copy_within(&mut self, src: u16, dst: u16, len: usize) {
        let src = src as usize;
        let dst = dst as usize;
        let len = len.min(MEMORY_SIZE - src).min(MEMORY_SIZE - dst);
        self.bytes.copy_within(src..src + len, dst);
    }

    /// Borrow a range of memory
    pub fn slice(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        let end = (start + len).min(MEMORY_SIZE);
        &self.bytes[start..end]
    }

    /// Borrow the whole region
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Address of the image header for an image id
    #[inline]
    pub fn image_address(&self, image: u8) -> u16 {
        self.read_word(IMAGE_TABLE.wrapping_add((image as u16) << 1))
    }

    /// Bitmap address of a pixel row, through the row tables
    #[inline]
    pub fn row_address(&self, row: u8) -> u16 {
        u16::from_le_bytes([
            self.read(ROW_ADDRESS_LOW + row as u16),
            self.read(ROW_ADDRESS_HIGH + row as u16),
        ])
    }

    /// Offset of a character row inside a colour plane
    #[inline]
    pub fn char_row_offset(&self, row: u8) -> u16 {
        u16::from_le_bytes([
            self.read(CHAR_ROW_LOW + row as u16),
            self.read(CHAR_ROW_HIGH + row as u16),
        ])
    }

    /// Build the bitmap row tables and the character row tables
    ///
    /// Rows 0xC8..0xFF describe the 56 lines above the visible screen so
    /// that images positioned at negative rows wrap into the tables rather
    /// than into arbitrary memory.
    pub fn build_tables(&mut self) {
        let mut addr: u16 = 0xD740;
        let mut row: u8 = 0xC8;

        loop {
            let [low, high] = addr.to_le_bytes();
            self.write(ROW_ADDRESS_LOW + row as u16, low);
            self.write(ROW_ADDRESS_HIGH + row as u16, high);

            row = row.wrapping_add(1);
            if row == 0xC8 {
                break;
            }

            addr = if row & 7 != 0 {
                addr.wrapping_add(1)
            } else {
                addr.wrapping_add(0x139)
            };
        }

        for row in 0..0x20u8 {
            let [low, high] = (row as u16 * SCREEN_COLUMNS as u16).to_le_bytes();
            self.write(CHAR_ROW_LOW + row as u16, low);
            self.write(CHAR_ROW_HIGH + row as u16, high);
        }
    }

    /// Clear the bitmap and the geometry map
    pub fn clear_screen(&mut self) {
        self.fill(BITMAP, 0x2000, 0);
        self.fill(GEOMETRY_MAP, (GEOMETRY_MAP_END - GEOMETRY_MAP) as usize, 0);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_zero_is_bitmap_start() {
        let memory = Memory::new();
        assert_eq!(memory.row_address(0), BITMAP);
        assert_eq!(memory.row_address(7), BITMAP + 7);
        assert_eq!(memory.row_address(8), BITMAP + 0x140);
        assert_eq!(memory.row_address(0xC7), BITMAP + 24 * 0x140 + 7);
    }

    #[test]
    fn negative_rows_sit_above_bitmap() {
        let memory = Memory::new();
        assert_eq!(memory.row_address(0xF8), BITMAP - 0x140);
        assert_eq!(memory.row_address(0xFF), BITMAP - 0x140 + 7);
    }

    #[test]
    fn char_rows_step_by_forty() {
        let memory = Memory::new();
        assert_eq!(memory.char_row_offset(0), 0);
        assert_eq!(memory.char_row_offset(1), 0x28);
        assert_eq!(memory.char_row_offset(24), 24 * 0x28);
    }

    #[test]
    fn words_are_little_endian() {
        let mut memory = Memory::new();
        memory.write_word(0x1000, 0xBEEF);
        assert_eq!(memory.read(0x1000), 0xEF);
        assert_eq!(memory.read(0x1001), 0xBE);
        assert_eq!(memory.read_word(0x1000), 0xBEEF);
    }

    #[test]
    fn load_is_clipped_to_region() {
        let mut memory = Memory::new();
        memory.load(0xFFFE, &[1, 2, 3, 4]);
        assert_eq!(memory.read(0xFFFE), 1);
        assert_eq!(memory.read(0xFFFF), 2);
    }
}
