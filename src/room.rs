//! Room loader
//!
//! A room's contents are a stream of little-endian record tags, each followed
//! by the records of one kind. Parsers draw the static art, write the floor
//! geometry bits and create the room's objects and initial sprites. A zero
//! tag ends the stream.
//!
//! Geometry cells are two bytes wide with 0x50 bytes per character row. The
//! low byte of a cell holds the directions a walker may leave it by:
//! 0x01 up, 0x04 right, 0x10 down, 0x40 left.

use log::{debug, error};
use thiserror::Error;

use crate::draw::{draw_image, print_strings, screen_draw, DrawMode, TextPosition};
use crate::engine::{Engine, RoomPointers};
use crate::kinds::{conveyor, door, forcefield, frankie, key, lightning, mummy, raygun, teleport, trapdoor};
use crate::memory::{Memory, IMAGE_TABLE};
use crate::util::hexdump;

/// Errors raised while parsing a room
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Unknown room record {tag:04X} at {address:04X}")]
    UnknownRecord { tag: u16, address: u16 },
}

/// Record tags of the object stream
pub struct RecordTag;

impl RecordTag {
    pub const END: u16 = 0x0000;
    pub const DOOR: u16 = 0x0803;
    pub const WALKWAY: u16 = 0x0806;
    pub const SLIDING_POLE: u16 = 0x0809;
    pub const LADDER: u16 = 0x080C;
    pub const DOOR_BELL: u16 = 0x080F;
    pub const LIGHTNING: u16 = 0x0812;
    pub const FORCEFIELD: u16 = 0x0815;
    pub const MUMMY: u16 = 0x0818;
    pub const KEY: u16 = 0x081B;
    pub const LOCK: u16 = 0x081E;
    pub const MULTI_DRAW: u16 = 0x0821;
    pub const RAYGUN: u16 = 0x0824;
    pub const TELEPORT: u16 = 0x0827;
    pub const TRAPDOOR: u16 = 0x082A;
    pub const CONVEYOR: u16 = 0x082D;
    pub const FRANKIE: u16 = 0x0830;
    pub const TEXT: u16 = 0x0833;
    pub const IMAGE: u16 = 0x0836;

    /// Aliases used by the title screens
    pub const MULTI_DRAW_ALT: u16 = 0x160A;
    pub const TEXT_ALT: u16 = 0x2A6D;
}

/// Geometry bits
pub struct Exit;

impl Exit {
    pub const UP: u8 = 0x01;
    pub const RIGHT: u8 = 0x04;
    pub const DOWN: u8 = 0x10;
    pub const LEFT: u8 = 0x40;
}

/// Room record flag: shown on the map
const VISITED: u8 = 0x80;

/// Bytes per character row of the geometry map
const GEOMETRY_ROW: u16 = 0x50;

const IMAGE_WALK_LEFT: u8 = 0x1B;
const IMAGE_WALK: u8 = 0x1C;
const IMAGE_WALK_RIGHT: u8 = 0x1D;

const IMAGE_POLE: u8 = 0x24;
const IMAGE_POLE_FLOOR: u8 = 0x27;
const IMAGE_POLE_GAP: u8 = 0x25;

const IMAGE_LADDER: u8 = 0x28;
const IMAGE_LADDER_TOP: u8 = 0x2B;
const IMAGE_LADDER_FLOOR: u8 = 0x29;
const IMAGE_LADDER_FLOOR_GAP: u8 = 0x2A;
const IMAGE_LADDER_CROSS: u8 = 0x2C;
const IMAGE_LADDER_CROSS_GAP: u8 = 0x2D;

/// Image id borrowed for pictures stored in the stream
const IMAGE_INLINE: u8 = 0x16;

/// Image bytes recoloured with the room's floor colour
const FLOOR_COLORS: [u16; 5] = [0x6481, 0x648E, 0x649B, 0x65CC, 0x65CE];
const FLOOR_COLOR_RUNS: [u16; 6] = [0x6EAE, 0x6EC6, 0x6EDB, 0x6EED, 0x6EFC, 0x6F08];
const FLOOR_COLOR_BLOCKS: [u16; 4] = [0x6FB2, 0x6FF5, 0x7038, 0x707B];
const POLE_COLOR: u16 = 0x6584;
const WALK_EDGE_COLORS: [u16; 2] = [0x659B, 0x65CD];

impl Engine {
    /// Clear the screen and build a room
    ///
    /// Everything from the previous room is dropped: sprites, objects,
    /// geometry and the bitmap.
    pub fn load_room(&mut self, room: u8) -> Result<(), RoomError> {
        self.memory.clear_screen();
        self.clear_sprites();
        self.objects.clear();
        self.room = RoomPointers::default();

        let record = Memory::room_address(room);
        self.memory.set_bits(record, VISITED);
        let colors = self.memory.read(record) & 0x0F;
        set_room_colors(&mut self.memory, colors);

        let stream = self.memory.read_word(record.wrapping_add(6));
        debug!("Loading room {:02X} from {:04X}", room, stream);
        self.load_objects(stream)
    }

    /// Run the parsers of an object stream
    pub fn load_objects(&mut self, mut ptr: u16) -> Result<(), RoomError> {
        loop {
            let tag = self.memory.read_word(ptr);
            let address = ptr;
            ptr = ptr.wrapping_add(2);

            ptr = match tag {
                RecordTag::END => return Ok(()),
                RecordTag::DOOR => door::load(self, ptr),
                RecordTag::WALKWAY => load_walkways(self, ptr),
                RecordTag::SLIDING_POLE => load_poles(self, ptr),
                RecordTag::LADDER => load_ladders(self, ptr),
                RecordTag::DOOR_BELL => door::load_buttons(self, ptr),
                RecordTag::LIGHTNING => lightning::load(self, ptr),
                RecordTag::FORCEFIELD => forcefield::load(self, ptr),
                RecordTag::MUMMY => mummy::load(self, ptr),
                RecordTag::KEY => key::load(self, ptr),
                RecordTag::LOCK => door::load_locks(self, ptr),
                RecordTag::RAYGUN => raygun::load(self, ptr),
                RecordTag::TELEPORT => teleport::load(self, ptr),
                RecordTag::TRAPDOOR => trapdoor::load(self, ptr),
                RecordTag::CONVEYOR => conveyor::load(self, ptr),
                RecordTag::FRANKIE => frankie::load(self, ptr),
                RecordTag::TEXT | RecordTag::TEXT_ALT => {
                    print_strings(&mut self.memory, &self.char_rom, ptr)
                }
                RecordTag::IMAGE => load_image(&mut self.memory, ptr),
                RecordTag::MULTI_DRAW | RecordTag::MULTI_DRAW_ALT => {
                    multi_draw(&mut self.memory, ptr)
                }
                _ => {
                    error!("Unknown room record {:04X} at {:04X}", tag, address);
                    hexdump(self.memory.slice(address, 0x20), address);
                    return Err(RoomError::UnknownRecord { tag, address });
                }
            };
        }
    }
}

/// Paint the floor, pole and walkway images in a room's colour
fn set_room_colors(memory: &mut Memory, color: u8) {
    let color = (color << 4) | color;

    for addr in FLOOR_COLORS {
        memory.write(addr, color);
    }
    for addr in FLOOR_COLOR_RUNS {
        memory.fill(addr, 3, color);
    }
    for addr in FLOOR_COLOR_BLOCKS {
        memory.fill(addr, 8, color);
    }

    memory.write(POLE_COLOR, (color & 0x0F) | 0x10);

    let edge = (memory.read(FLOOR_COLORS[2]) & 0xF0) | 0x01;
    for addr in WALK_EDGE_COLORS {
        memory.write(addr, edge);
    }
}

/// Walkways: length in segments, x, y
fn load_walkways(engine: &mut Engine, mut ptr: u16) -> u16 {
    loop {
        let length = engine.memory.read(ptr);
        if length == 0 {
            break;
        }
        let mut x = engine.memory.read(ptr.wrapping_add(1));
        let y = engine.memory.read(ptr.wrapping_add(2));
        let mut cell = engine.cell_address(x, y);

        for segment in 1..=length {
            let first = segment == 1;
            let last = !first && segment == length;
            let gfx = if first {
                IMAGE_WALK_LEFT
            } else if last {
                IMAGE_WALK_RIGHT
            } else {
                IMAGE_WALK
            };
            let width = draw_image(&mut engine.memory, gfx, x, y).width;

            for column in 1..=width {
                let exits = if first && column == 1 {
                    Exit::RIGHT
                } else if last && column == width {
                    Exit::LEFT
                } else {
                    Exit::LEFT | Exit::RIGHT
                };
                engine.memory.set_bits(cell, exits);
                cell = cell.wrapping_add(2);
            }

            x = x.wrapping_add(width << 2);
        }

        ptr = ptr.wrapping_add(3);
    }

    ptr.wrapping_add(1)
}

/// Sliding poles: height in cells, x, y
fn load_poles(engine: &mut Engine, mut ptr: u16) -> u16 {
    loop {
        let mut height = engine.memory.read(ptr);
        if height == 0 {
            break;
        }
        let x = engine.memory.read(ptr.wrapping_add(1));
        let mut y = engine.memory.read(ptr.wrapping_add(2));
        let mut cell = engine.cell_address(x, y);

        loop {
            if engine.memory.read(cell) & (Exit::LEFT | Exit::RIGHT) != 0 {
                let gap = TextPosition::new(x.wrapping_sub(4), y, IMAGE_POLE_GAP);
                screen_draw(&mut engine.memory, DrawMode::Combined, IMAGE_POLE_FLOOR, x, y, gap);
            } else {
                draw_image(&mut engine.memory, IMAGE_POLE, x, y);
            }
            engine.memory.set_bits(cell, Exit::DOWN);

            height -= 1;
            if height == 0 {
                break;
            }
            y = y.wrapping_add(8);
            cell = cell.wrapping_add(GEOMETRY_ROW);
        }

        ptr = ptr.wrapping_add(3);
    }

    ptr.wrapping_add(1)
}

/// Ladders: height in cells, x, y
fn load_ladders(engine: &mut Engine, mut ptr: u16) -> u16 {
    loop {
        let full = engine.memory.read(ptr);
        if full == 0 {
            break;
        }
        let mut height = full;
        let x = engine.memory.read(ptr.wrapping_add(1));
        let mut y = engine.memory.read(ptr.wrapping_add(2));
        let mut cell = engine.cell_address(x, y);

        loop {
            let floor = engine.memory.read(cell) & (Exit::LEFT | Exit::RIGHT) != 0;
            if !floor {
                let gfx = if height != 1 { IMAGE_LADDER } else { IMAGE_LADDER_TOP };
                draw_image(&mut engine.memory, gfx, x, y);
            } else if height == 1 {
                let gap = TextPosition::new(x, y, IMAGE_LADDER_FLOOR_GAP);
                screen_draw(&mut engine.memory, DrawMode::Combined, IMAGE_LADDER_FLOOR, x, y, gap);
            } else {
                let left = x.wrapping_sub(4);
                let gap = TextPosition::new(left, y, IMAGE_LADDER_CROSS_GAP);
                screen_draw(&mut engine.memory, DrawMode::Combined, IMAGE_LADDER_CROSS, left, y, gap);
            }

            // Every cell but the top one can be climbed out of upwards
            if height != full {
                engine.memory.set_bits(cell, Exit::UP);
            }

            height -= 1;
            if height == 0 {
                break;
            }
            engine.memory.set_bits(cell, Exit::DOWN);
            y = y.wrapping_add(8);
            cell = cell.wrapping_add(GEOMETRY_ROW);
        }

        ptr = ptr.wrapping_add(3);
    }

    ptr.wrapping_add(1)
}

/// A picture stored in the stream, then the positions to draw it at
fn load_image(memory: &mut Memory, ptr: u16) -> u16 {
    memory.write_word(IMAGE_TABLE.wrapping_add((IMAGE_INLINE as u16) << 1), ptr);

    let width = memory.read(ptr) as u16;
    let height = memory.read(ptr.wrapping_add(1));
    let char_rows = (height.wrapping_sub(1) >> 3) as u16 + 1;
    let size = 3 + width * height as u16 + ((width * char_rows) << 1);

    let mut cursor = ptr.wrapping_add(size);
    loop {
        let x = memory.read(cursor);
        if x == 0 {
            break;
        }
        let y = memory.read(cursor.wrapping_add(1));
        draw_image(memory, IMAGE_INLINE, x, y);
        cursor = cursor.wrapping_add(2);
    }

    cursor.wrapping_add(1)
}

/// Rows of one image: count, image, x, y, x step, y step
fn multi_draw(memory: &mut Memory, mut ptr: u16) -> u16 {
    loop {
        let count = memory.read(ptr);
        if count == 0 {
            break;
        }
        let gfx = memory.read(ptr.wrapping_add(1));
        let mut x = memory.read(ptr.wrapping_add(2));
        let mut y = memory.read(ptr.wrapping_add(3));
        let dx = memory.read(ptr.wrapping_add(4));
        let dy = memory.read(ptr.wrapping_add(5));

        for _ in 0..count {
            draw_image(memory, gfx, x, y);
            x = x.wrapping_add(dx);
            y = y.wrapping_add(dy);
        }

        ptr = ptr.wrapping_add(6);
    }

    ptr.wrapping_add(1)
}
