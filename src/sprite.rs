//! Sprite registry
//!
//! A room runs at most eight moving entities, one per hardware sprite. Each
//! slot holds the scheduling state (countdown, period, flash bookkeeping),
//! the entity geometry used by floor and collision tests, the current image
//! and a kind-specific payload.
//!
//! Slot lifecycle: `FREE` -> `CREATED` (one tick pulse consumed by the kind's
//! execute hook) -> normal ticking -> `DESTROY` -> `ACTION_FREE` -> `FREE`.

use log::debug;
use serde::{Deserialize, Serialize};

/// Number of sprite slots
pub const MAX_SPRITES: usize = 8;

/// Sprite kind tags
pub struct SpriteKind;

impl SpriteKind {
    pub const PLAYER: u8 = 0;
    pub const LIGHTNING: u8 = 1;
    pub const FORCEFIELD: u8 = 2;
    pub const MUMMY: u8 = 3;
    pub const LASER: u8 = 4;
    pub const FRANKIE: u8 = 5;
}

/// Sprite state bits
pub struct SpriteState;

impl SpriteState {
    /// Release the slot at the end of this pass
    pub const ACTION_FREE: u8 = 0x01;
    /// Overlapped foreground pixels last frame
    pub const OVERLAPS: u8 = 0x02;
    /// Overlapped another sprite last frame
    pub const COLLIDES: u8 = 0x04;
    pub const CREATED: u8 = 0x08;
    pub const DESTROY: u8 = 0x10;
    pub const FLASH: u8 = 0x20;
    pub const DYING: u8 = 0x40;
    pub const FREE: u8 = 0x80;

    /// Mask that drops the two collision bits
    pub const COLLISION_CLEAR: u8 = 0xF9;
}

/// Image header flag bits
pub struct ImageFlags;

impl ImageFlags {
    pub const COLOR: u8 = 0x0F;
    pub const DOUBLE_WIDTH: u8 = 0x10;
    pub const DOUBLE_HEIGHT: u8 = 0x20;
    /// Set: drawn in front of the bitmap foreground
    pub const PRIORITY: u8 = 0x40;
    /// Set: hires, clear: multicolor
    pub const HIRES: u8 = 0x80;
}

/// Player payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    /// Player number (0 or 1)
    pub number: u8,

    /// Fire button held this tick
    pub button: bool,

    /// Floor mask override, reset to 0xFF after each use
    pub floor_mask: u8,

    /// Trapdoor switch object last stood on
    pub last_switch: u8,

    /// Trapdoor switch object touched this tick (0xFF: none)
    pub switch: u8,

    /// Index into the door walk tables, in steps of four
    pub walk_step: u8,

    /// Joystick direction read this tick (0x80: centred)
    pub joystick: u8,

    /// Direction of travel (0x80: standing)
    pub direction: u8,
}

/// Lightning bolt payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoltData {
    /// Record offset of the pole that owns the bolt
    pub pole: u8,
}

/// Forcefield payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcefieldData {
    pub index: u8,

    /// Floor bits currently blocked
    pub closed: bool,
}

/// Mummy payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MummyData {
    /// Byte offset of the mummy record
    pub record: u8,

    /// Rising out of the tomb (false) or walking (true)
    pub walking: bool,

    /// Frame index into the rise tables
    pub rise_step: u8,

    pub last_switch: u8,
    pub switch: u8,
}

/// Laser payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaserData {
    /// Byte offset of the firing ray gun record
    pub gun: u8,

    /// Horizontal step per execution
    pub dx: u8,
}

/// Frankenstein payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrankieData {
    /// Byte offset of the Frankenstein record
    pub record: u8,

    /// Copy of the record flags
    pub flags: u8,

    /// Direction of travel (0x80: standing)
    pub direction: u8,

    /// Floor mask override, reset to 0xFF after each use
    pub floor_mask: u8,

    pub last_switch: u8,
    pub switch: u8,
}

/// Kind-specific sprite payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpriteData {
    #[default]
    None,
    Player(PlayerData),
    Bolt(BoltData),
    Forcefield(ForcefieldData),
    Mummy(MummyData),
    Laser(LaserData),
    Frankie(FrankieData),
}

/// One sprite slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    /// Kind tag (`SpriteKind`)
    pub kind: u8,

    /// State bits (`SpriteState`)
    pub state: u8,

    /// Ticks until the next execution
    pub countdown: u8,

    /// Countdown reload value
    pub period: u8,

    /// Remaining blink steps while dying
    pub flash_count: u8,

    pub x: u8,
    pub y: u8,

    /// Entity size, used to find the floor cell under the sprite
    pub width: u8,
    pub height: u8,

    /// Collision box, derived from the current image
    pub collision_width: u8,
    pub collision_height: u8,

    /// Current image id
    pub image: u8,

    /// Flags of the current image (`ImageFlags`)
    pub image_flags: u8,

    pub data: SpriteData,
}

impl Sprite {
    /// An unused slot
    pub const fn free() -> Self {
        Sprite {
            kind: 0,
            state: SpriteState::FREE,
            countdown: 0,
            period: 0,
            flash_count: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            collision_width: 0,
            collision_height: 0,
            image: 0,
            image_flags: 0,
            data: SpriteData::None,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.state & SpriteState::FREE != 0
    }

    #[inline]
    pub fn has(&self, bits: u8) -> bool {
        self.state & bits != 0
    }
}

impl Default for Sprite {
    fn default() -> Self {
        Self::free()
    }
}

/// Fixed array of sprite slots
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteRegistry {
    slots: [Sprite; MAX_SPRITES],
}

impl SpriteRegistry {
    /// Create a registry with every slot free
    pub fn new() -> Self {
        SpriteRegistry {
            slots: [Sprite::free(); MAX_SPRITES],
        }
    }

    /// Free every slot
    pub fn clear(&mut self) {
        for sprite in self.slots.iter_mut() {
            sprite.state = SpriteState::FREE;
        }
    }

    /// Claim the first free slot
    ///
    /// The slot comes back cleared with `CREATED` set and a countdown and
    /// period of one. Returns `None` when all slots are in use; the caller
    /// simply drops the spawn.
    pub fn allocate(&mut self) -> Option<usize> {
        let slot = self.slots.iter().position(|s| s.is_free());

        match slot {
            Some(index) => {
                self.slots[index] = Sprite {
                    state: SpriteState::CREATED,
                    countdown: 1,
                    period: 1,
                    ..Sprite::free()
                };
                Some(index)
            }
            None => {
                debug!("Sprite registry full, spawn dropped");
                None
            }
        }
    }

    /// Number of slots in use
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn get(&self, index: usize) -> Option<&Sprite> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sprite> {
        self.slots.iter()
    }
}

impl Default for SpriteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for SpriteRegistry {
    type Output = Sprite;

    fn index(&self, index: usize) -> &Sprite {
        &self.slots[index]
    }
}

impl std::ops::IndexMut<usize> for SpriteRegistry {
    fn index_mut(&mut self, index: usize) -> &mut Sprite {
        &mut self.slots[index]
    }
}
