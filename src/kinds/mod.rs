//! Type-behavior tables
//!
//! Every sprite and object carries a small integer kind tag. The tag selects
//! a row in one of two static tables; each row holds the hooks for that kind.
//! Hooks a kind does not implement fall back to the trait defaults, which
//! match what the game does for an empty table entry.
//!
//! Sprite hooks:
//! - `execute`: runs when the sprite's countdown expires (or it is destroyed)
//! - `object_collision`: sprite box overlaps an object; returns whether the
//!   sprite starts to flash
//! - `hit`: another sprite overlaps this one; returns whether this sprite
//!   starts to flash
//!
//! Object hooks:
//! - `execute`: runs every tick while the object's `EXECUTE` flag is set
//! - `infront`: a sprite overlaps the object

pub mod conveyor;
pub mod door;
pub mod forcefield;
pub mod frankie;
pub mod key;
pub mod lightning;
pub mod mummy;
pub mod player;
pub mod raygun;
pub mod teleport;
pub mod trapdoor;

use crate::engine::Engine;
use crate::memory::BIT_TABLE;
use crate::object::ObjectFlags;
use crate::sprite::SpriteState;

/// Hooks of a sprite kind
pub trait SpriteBehavior: Sync {
    fn execute(&self, engine: &mut Engine, slot: usize);

    fn object_collision(&self, _engine: &mut Engine, _slot: usize, _object: usize) -> bool {
        false
    }

    fn hit(&self, _engine: &mut Engine, _slot: usize, _other: usize) -> bool {
        true
    }
}

/// Hooks of an object kind
pub trait ObjectBehavior: Sync {
    fn execute(&self, engine: &mut Engine, object: usize) {
        if let Some(o) = engine.objects.at_mut(object) {
            o.flags &= !ObjectFlags::EXECUTE;
        }
    }

    fn infront(&self, _engine: &mut Engine, _object: usize, _slot: usize) {}
}

/// One row of the sprite table
pub struct SpriteEntry {
    pub behavior: &'static dyn SpriteBehavior,

    /// Bit 0: blink eight times before dying
    pub flash_data: u8,

    /// Bit 7: never collides with sprites; low bits: collision group
    pub hit_data: u8,
}

impl SpriteEntry {
    /// Blink before dying
    pub const FLASH_BLINK: u8 = 0x01;

    /// Excluded from sprite collisions
    pub const HIT_NEVER: u8 = 0x80;
}

/// A kind with no hooks at all
struct Inert;

impl ObjectBehavior for Inert {}

static SPRITE_TABLE: [SpriteEntry; 6] = [
    SpriteEntry { behavior: &player::Player, flash_data: 0x01, hit_data: 0x00 },
    SpriteEntry { behavior: &lightning::Bolt, flash_data: 0x00, hit_data: 0x04 },
    SpriteEntry { behavior: &forcefield::Forcefield, flash_data: 0x00, hit_data: 0x03 },
    SpriteEntry { behavior: &mummy::Mummy, flash_data: 0x01, hit_data: 0x02 },
    SpriteEntry { behavior: &raygun::Laser, flash_data: 0x00, hit_data: 0x04 },
    SpriteEntry { behavior: &frankie::Frankie, flash_data: 0x01, hit_data: 0x00 },
];

static OBJECT_TABLE: [&dyn ObjectBehavior; 16] = [
    &door::Door,
    &door::Button,
    &lightning::Pole,
    &lightning::Switch,
    &forcefield::Timer,
    &mummy::Tomb,
    &key::Key,
    &door::Lock,
    &raygun::RayGun,
    &raygun::Control,
    &teleport::Teleport,
    &trapdoor::Trapdoor,
    &Inert,
    &conveyor::Conveyor,
    &conveyor::Control,
    &Inert,
];

/// Consume a `DESTROY` pulse: the slot is released at the end of the pass
///
/// Returns whether the sprite was being destroyed.
pub(crate) fn release(engine: &mut Engine, slot: usize) -> bool {
    let sprite = &mut engine.sprites[slot];
    if !sprite.has(SpriteState::DESTROY) {
        return false;
    }
    sprite.state = (sprite.state ^ SpriteState::DESTROY) | SpriteState::ACTION_FREE;
    true
}

/// Consume a `CREATED` pulse, returning whether it was set
pub(crate) fn take_created(engine: &mut Engine, slot: usize) -> bool {
    let sprite = &mut engine.sprites[slot];
    if !sprite.has(SpriteState::CREATED) {
        return false;
    }
    sprite.state ^= SpriteState::CREATED;
    true
}

/// Horizontal reach of a sprite's right edge past an object's left edge
pub(crate) fn reach(engine: &Engine, slot: usize, object: usize) -> u8 {
    let sprite = &engine.sprites[slot];
    let object_x = engine.objects.at(object).map_or(0, |o| o.x);
    sprite.x.wrapping_add(sprite.width).wrapping_sub(object_x)
}

/// Position of the first object of a kind carrying an id
pub(crate) fn find_object(engine: &Engine, kind: u8, id: u8) -> Option<usize> {
    let handle = engine.objects.find(kind, id)?;
    engine.objects.position_of(handle)
}

/// Single bit mask `1 << n` from the game's bit table
pub(crate) fn bit(engine: &Engine, n: u8) -> u8 {
    engine.memory.read(BIT_TABLE.wrapping_add(n as u16))
}

/// Sprite table row for a kind tag
pub fn sprite_entry(kind: u8) -> Option<&'static SpriteEntry> {
    SPRITE_TABLE.get(kind as usize)
}

/// Object hooks for a kind tag
pub fn object_behavior(kind: u8) -> Option<&'static dyn ObjectBehavior> {
    OBJECT_TABLE.get(kind as usize).copied()
}
