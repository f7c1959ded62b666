//! Synthetic game data for scenario tests
//!
//! Builds a memory image with the lookup tables the engine relies on, a
//! handful of solid images and one room whose object stream is assembled
//! record by record.

#![allow(dead_code)]

use rusty_creep::controller::CENTRED;
use rusty_creep::memory::{BIT_TABLE, IMAGE_TABLE};
use rusty_creep::room::RecordTag;
use rusty_creep::{Engine, Memory};

/// Room every scenario plays in
pub const ROOM: u8 = 1;

/// Where the object stream is assembled
pub const STREAM: u16 = 0xA000;

/// Player images, key images and the coffin pieces
const SOLID_IMAGES: [(u8, u8, u8); 4] = [(0x00, 2, 0x10), (0x4C, 1, 0x08), (0x8F, 2, 0x10), (0x90, 2, 0x18)];

/// Joystick port value to direction
const DIRECTIONS: [(u8, u8); 8] = [
    (0x0E, 0),
    (0x06, 1),
    (0x07, 2),
    (0x05, 3),
    (0x0D, 4),
    (0x09, 5),
    (0x0B, 6),
    (0x0A, 7),
];

/// Memory with lookup tables, solid images and an empty castle block
pub fn memory() -> Memory {
    let mut memory = Memory::new();
    memory.build_tables();

    for n in 0..8u16 {
        memory.write(BIT_TABLE + n, 1 << n);
    }

    memory.fill(0x5F59, 0x10, CENTRED);
    for (port, direction) in DIRECTIONS {
        memory.write(0x5F59 + port as u16, direction);
    }

    for (id, width, height) in SOLID_IMAGES {
        install_image(&mut memory, id, width, height);
    }
    memory
}

/// Put a solid image into the image table
pub fn install_image(memory: &mut Memory, id: u8, width: u8, height: u8) {
    let addr = 0x3000 + (id as u16) * 0x40;
    memory.write_word(IMAGE_TABLE + (id as u16) * 2, addr);
    memory.write(addr, width);
    memory.write(addr + 1, height);
    memory.write(addr + 2, 0);
    memory.fill(addr + 3, width as usize * height as usize, 0xFF);
}

/// Object stream of the scenario room
#[derive(Clone, Debug, Default)]
pub struct RoomBuilder {
    stream: Vec<u8>,
}

impl RoomBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record: its tag, then its body as given
    pub fn record(mut self, tag: u16, body: &[u8]) -> Self {
        self.stream.extend_from_slice(&tag.to_le_bytes());
        self.stream.extend_from_slice(body);
        self
    }

    /// One closed door the players enter through
    pub fn door(self, x: u8, y: u8) -> Self {
        self.record(RecordTag::DOOR, &[1, x, y, 0, ROOM, 0, 0, 0, 0])
    }

    /// One key record, terminated
    pub fn key(self, id: u8, x: u8, y: u8) -> Self {
        self.record(RecordTag::KEY, &[id, 0x4C, x, y, 0])
    }

    /// One sleeping Frankenstein in a coffin opening to the right
    pub fn frankie(self, x: u8, y: u8) -> Self {
        self.record(RecordTag::FRANKIE, &[0, x, y, 0, 0, 0, 0, 0x80])
    }

    /// Install the room and load it into a fresh engine
    pub fn build(mut self) -> Engine {
        self.stream.extend_from_slice(&RecordTag::END.to_le_bytes());

        let mut memory = memory();
        memory.load(STREAM, &self.stream);
        memory.write_word(Memory::room_address(ROOM) + 6, STREAM);
        memory.set_current_room(0, ROOM);
        memory.set_current_door(0, 0);

        let mut engine = Engine::new(memory, Vec::new());
        engine.load_room(ROOM).expect("scenario room loads");
        engine
    }
}
