//! Save state implementation
//!
//! Two kinds of snapshots are kept:
//!
//! - `Position`: the castle state block at 0x7800, which is what the game
//!   itself saves. Restoring one resumes the castle at the start of the
//!   rooms the players were in.
//! - `SaveState`: the whole running room (memory image, both registries,
//!   hardware sprite registers, counters and generator state), used by the
//!   front end's quick save.
//!
//! Both are versioned and serialized using bincode with Serde.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use bincode::serde::{decode_from_std_read, encode_into_std_write};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::castle::CastleFlags;
use crate::engine::{Engine, HardwareSprite, RoomPointers};
use crate::memory::{Memory, CASTLE_STATE, MEMORY_SIZE};
use crate::object::ObjectRegistry;
use crate::rng::SeedRng;
use crate::sprite::{SpriteRegistry, MAX_SPRITES};

/// Current save state format version
const CURRENT_SAVE_STATE_VERSION: u32 = 1;

/// Largest castle state block a position may hold
const MAX_CASTLE_STATE: usize = 0x2000;

/// Errors that can occur during save state operations
#[derive(Error, Debug)]
pub enum SaveStateError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Incompatible save state version: found {0}, expected {1}")]
    IncompatibleVersion(u32, u32),

    #[error("Invalid save state data")]
    InvalidData,
}

/// Create a bincode configuration optimized for size
fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Serialize data using bincode
fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, SaveStateError> {
    let mut buffer = Vec::new();
    encode_into_std_write(value, &mut buffer, config())
        .map_err(|e| SaveStateError::SerializationError(e.to_string()))?;
    Ok(buffer)
}

/// Deserialize data using bincode
fn deserialize<T: for<'a> Deserialize<'a>>(data: &[u8]) -> Result<T, SaveStateError> {
    decode_from_std_read(&mut &*data, config())
        .map_err(|e| SaveStateError::DeserializationError(e.to_string()))
}

fn check_version(version: u32) -> Result<(), SaveStateError> {
    if version != CURRENT_SAVE_STATE_VERSION {
        return Err(SaveStateError::IncompatibleVersion(version, CURRENT_SAVE_STATE_VERSION));
    }
    Ok(())
}

/// A saved castle position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    version: u32,

    /// Castle state block, `castle_size` bytes from 0x7800
    castle: Vec<u8>,
}

impl Position {
    /// Capture the castle state block
    pub fn capture(memory: &Memory) -> Result<Self, SaveStateError> {
        let size = memory.castle_size() as usize;
        if size == 0 || size > MAX_CASTLE_STATE {
            return Err(SaveStateError::InvalidData);
        }

        Ok(Position {
            version: CURRENT_SAVE_STATE_VERSION,
            castle: memory.slice(CASTLE_STATE, size).to_vec(),
        })
    }

    /// Write the block back and flag the castle as restored
    pub fn restore(&self, memory: &mut Memory) -> Result<(), SaveStateError> {
        check_version(self.version)?;
        if self.castle.len() < 2 || self.castle.len() > MAX_CASTLE_STATE {
            return Err(SaveStateError::InvalidData);
        }

        memory.load(CASTLE_STATE, &self.castle);
        let flags = memory.castle_flags();
        memory.set_castle_flags(flags | CastleFlags::RESTORED);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SaveStateError> {
        let position: Position = deserialize(data)?;
        check_version(position.version)?;
        Ok(position)
    }
}

/// Snapshot of a running room
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveState {
    /// Save state format version
    version: u32,

    /// Shared memory region
    memory: Vec<u8>,

    sprites: SpriteRegistry,
    objects: ObjectRegistry,
    hardware: [HardwareSprite; MAX_SPRITES],
    sprite_x_msb: u8,

    ticks: u8,
    frame: u32,
    rng: SeedRng,

    room: RoomPointers,
    player_sprite: [Option<usize>; 2],
    player_time: [u32; 2],
    clock_start: [u32; 2],
    raygun_nearest: u8,
}

impl SaveState {
    /// Create a new save state from the engine state
    pub fn from_engine(engine: &Engine) -> Self {
        SaveState {
            version: CURRENT_SAVE_STATE_VERSION,
            memory: engine.memory.as_bytes().to_vec(),
            sprites: engine.sprites.clone(),
            objects: engine.objects.clone(),
            hardware: engine.hardware,
            sprite_x_msb: engine.sprite_x_msb,
            ticks: engine.ticks,
            frame: engine.frame,
            rng: engine.rng,
            room: engine.room,
            player_sprite: engine.player_sprite,
            player_time: engine.player_time,
            clock_start: engine.clock_start,
            raygun_nearest: engine.raygun_nearest,
        }
    }

    /// Apply the save state to an engine
    ///
    /// Controllers, sound and the character ROM are left alone.
    pub fn apply_to_engine(&self, engine: &mut Engine) -> Result<(), SaveStateError> {
        check_version(self.version)?;
        if self.memory.len() != MEMORY_SIZE {
            warn!("Save state memory image has {} bytes", self.memory.len());
            return Err(SaveStateError::InvalidData);
        }

        engine.memory.load(0, &self.memory);
        engine.sprites = self.sprites.clone();
        engine.objects = self.objects.clone();
        engine.hardware = self.hardware;
        engine.sprite_x_msb = self.sprite_x_msb;
        engine.ticks = self.ticks;
        engine.frame = self.frame;
        engine.rng = self.rng;
        engine.room = self.room;
        engine.player_sprite = self.player_sprite;
        engine.player_time = self.player_time;
        engine.clock_start = self.clock_start;
        engine.raygun_nearest = self.raygun_nearest;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SaveStateError> {
        // Check for minimum size
        if data.len() < 8 {
            return Err(SaveStateError::InvalidData);
        }
        let state: SaveState = deserialize(data)?;
        check_version(state.version)?;
        Ok(state)
    }

    /// Save state to a file
    pub fn save_to_file<P: AsRef<Path>>(engine: &Engine, path: P) -> Result<(), SaveStateError> {
        let data = Self::from_engine(engine).to_bytes()?;

        let mut file = File::create(path.as_ref())?;
        file.write_all(&data)?;

        info!("Save state written to {}", path.as_ref().display());
        Ok(())
    }

    /// Load state from a file
    pub fn load_from_file<P: AsRef<Path>>(engine: &mut Engine, path: P) -> Result<(), SaveStateError> {
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Self::from_bytes(&data)?.apply_to_engine(engine)?;

        info!("Save state loaded from {}", path.as_ref().display());
        Ok(())
    }
}
