//! Pseudo random byte generator
//!
//! Three bytes of shift/xor state. The sequence is part of the game's
//! observable behaviour (lightning frames, teleport sparkle pitch), so it is
//! reproduced bit for bit and its state travels with a saved session.

use serde::{Deserialize, Serialize};

/// Seed generator state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRng {
    a: u8,
    b: u8,
    c: u8,
}

impl SeedRng {
    /// Create a generator in its power-on state
    pub fn new() -> Self {
        SeedRng {
            a: 0x57,
            b: 0xC6,
            c: 0xA0,
        }
    }

    /// Produce the next byte
    pub fn next_byte(&mut self) -> u8 {
        let carry_in = self.a & 0x01 != 0;
        let carry_out = self.b & 0x01 != 0;

        let mut value = self.b >> 1;
        if carry_in {
            value |= 0x80;
        }
        self.c = value;

        self.b ^= carry_out as u8;
        self.a ^= self.c;
        self.b ^= self.a;
        self.b
    }
}

impl Default for SeedRng {
    fn default() -> Self {
        Self::new()
    }
}
