//! Shared fixtures for unit tests

use crate::engine::Engine;
use crate::memory::{Memory, BIT_TABLE, IMAGE_TABLE};

/// Joystick port value to direction: up 0, right 2, down 4, left 6
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

/// An engine over blank memory with the lookup tables the hooks rely on
pub(crate) fn engine() -> Engine {
    let mut memory = Memory::new();
    memory.build_tables();

    for n in 0..8u16 {
        memory.write(BIT_TABLE + n, 1 << n);
    }

    memory.fill(0x5F59, 0x10, 0x80);
    for (port, direction) in DIRECTIONS {
        memory.write(0x5F59 + port as u16, direction);
    }

    Engine::new(memory, Vec::new())
}

/// Install a solid image in the image table
pub(crate) fn install_image(engine: &mut Engine, id: u8, width: u8, height: u8, flags: u8) {
    let addr = 0x3000 + (id as u16) * 0x40;
    engine.memory.write_word(IMAGE_TABLE + (id as u16) * 2, addr);
    engine.memory.write(addr, width);
    engine.memory.write(addr + 1, height);
    engine.memory.write(addr + 2, flags);
    for n in 0..(width as u16 * height as u16) {
        engine.memory.write(addr + 3 + n, 0xFF);
    }
}
