//! Ray guns, their control panels and lasers
//!
//! Record (7 bytes): flags, track x, track top y, track length in cells,
//! gun y, panel x, panel y. The last record has flag 0x80 set. A gun slides
//! along its track towards the nearest living player and fires when lined
//! up; a player at the panel takes over aiming and firing.

use log::debug;

use super::player::player_at;
use super::{reach, release, take_created, ObjectBehavior, SpriteBehavior};
use crate::castle::PlayerState;
use crate::draw::draw_image;
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::{LaserData, SpriteData, SpriteKind, SpriteState};

const RECORD_SIZE: u8 = 7;

/// Record flag bits
pub struct GunFlags;

impl GunFlags {
    pub const LAST: u8 = 0x80;
    /// A laser from this gun is in flight
    pub const FIRING: u8 = 0x40;
    /// Aimed from the panel this tick
    pub const MANUAL: u8 = 0x20;
    /// Track only, no gun
    pub const NO_GUN: u8 = 0x10;
    /// Panel fire button held
    pub const FIRE: u8 = 0x08;
    pub const UP: u8 = 0x04;
    pub const DOWN: u8 = 0x02;
    /// Gun faces left
    pub const LEFT: u8 = 0x01;
}

const IMAGE_TRACK_LEFT: u8 = 0x5F;
const IMAGE_TRACK_RIGHT: u8 = 0x60;
const IMAGE_LASER: u8 = 0x6C;
const IMAGE_PANEL: u8 = 0x6D;
const IMAGE_ARROWS: u8 = 0x6E;

/// Gun images by facing and vertical sub-position
const GUN_IMAGES: u16 = 0x4D68;

/// Panel arrow colour patches
const ARROW_COLOR: u16 = 0x6DBF;
const ARROW_UP: u8 = 0x5C;
const ARROW_DOWN: u8 = 0xC2;
const ARROW_IDLE: u8 = 0xCC;

const LASER_PITCH: u16 = 0x7593;

/// Lasers stay between these x positions
const LASER_MIN_X: u8 = 0x08;
const LASER_MAX_X: u8 = 0xB0;

/// Vertical distance within which a gun fires on its own
const FIRE_RANGE: u8 = 5;

fn record_address(engine: &Engine, offset: u8) -> u16 {
    engine.room.rayguns.wrapping_add(offset as u16)
}

/// Light the panel arrows of a gun
fn update_panel(engine: &mut Engine, record: u16, color: u8) {
    let x = engine.memory.read(record.wrapping_add(5));
    let y = engine.memory.read(record.wrapping_add(6));

    engine.memory.fill(ARROW_COLOR, 2, color);
    draw_image(&mut engine.memory, IMAGE_ARROWS, x, y);
    engine.memory.fill(ARROW_COLOR, 2, color << 4);
    draw_image(&mut engine.memory, IMAGE_ARROWS, x, y.wrapping_add(0x10));
}

/// Point the gun at the nearest living player
fn track(engine: &mut Engine, record: u16, gun_y: u8) {
    let mut nearest = 0xFF;
    let mut direction = 0;

    for number in [1, 0] {
        if engine.memory.player_state(number) != PlayerState::ALIVE {
            continue;
        }
        let Some(slot) = engine.player_sprite[number] else {
            continue;
        };
        let player_y = engine.sprites[slot].y;
        let distance = (player_y.wrapping_sub(gun_y) as i8).unsigned_abs();

        if distance < nearest {
            nearest = distance;
            direction = if player_y >= 0xC8 || player_y < gun_y {
                GunFlags::UP
            } else {
                GunFlags::DOWN
            };
        }
    }

    engine.raygun_nearest = nearest;
    let flags = engine.memory.read(record) & !(GunFlags::UP | GunFlags::DOWN);
    engine.memory.write(record, flags | direction);
}

/// Move the gun one step, returning whether it should be redrawn
fn slide(engine: &mut Engine, record: u16, lowest: u8) -> bool {
    let flags = engine.memory.read(record);
    let gun_y = engine.memory.read(record.wrapping_add(4));

    if flags & GunFlags::UP != 0 && gun_y != engine.memory.read(record.wrapping_add(2)) {
        engine.memory.write(record.wrapping_add(4), gun_y.wrapping_sub(1));
        update_panel(engine, record, ARROW_UP);
        return true;
    }
    if flags & GunFlags::UP == 0 && flags & GunFlags::DOWN != 0 && gun_y < lowest {
        engine.memory.write(record.wrapping_add(4), gun_y.wrapping_add(1));
        update_panel(engine, record, ARROW_DOWN);
        return true;
    }

    update_panel(engine, record, ARROW_IDLE);
    false
}

pub struct RayGun;

impl ObjectBehavior for RayGun {
    fn execute(&self, engine: &mut Engine, object: usize) {
        if engine.ticks & 3 != 0 {
            return;
        }
        let Some(gun) = engine.objects.at(object).copied() else {
            return;
        };
        let record = record_address(engine, gun.id);

        // The first pass only places the gun
        let redraw = if gun.has(ObjectFlags::DISABLE) {
            true
        } else {
            if engine.memory.read(record) & GunFlags::MANUAL == 0 {
                track(engine, record, gun.y);
            }
            slide(engine, record, gun.state)
        };

        if redraw {
            let gun_y = engine.memory.read(record.wrapping_add(4));
            let facing = if engine.memory.read(record) & GunFlags::LEFT != 0 { 4 } else { 0 };
            let frame = (gun_y & 3) | facing;
            let gfx = engine.memory.read(GUN_IMAGES.wrapping_add(frame as u16));
            engine.draw_object(object, gfx, gun.x, gun_y);
        }

        let mut flags = engine.memory.read(record);
        if flags & GunFlags::MANUAL != 0 {
            flags ^= GunFlags::MANUAL;
            engine.memory.write(record, flags);
            if flags & GunFlags::FIRE == 0 {
                return;
            }
        } else if engine.raygun_nearest >= FIRE_RANGE {
            return;
        }

        if flags & GunFlags::FIRING != 0 {
            return;
        }
        if fire(engine, object, record).is_some() {
            engine.memory.write(record, flags | GunFlags::FIRING);
        }
    }
}

/// Spawn a laser from a gun
fn fire(engine: &mut Engine, object: usize, record: u16) -> Option<usize> {
    let gun = engine.objects.at(object).copied()?;

    let pitch = ((gun.id.wrapping_add(7) | 0xF8) >> 1).wrapping_add(0x2C);
    engine.memory.write(LASER_PITCH, pitch);
    engine.play_effect(Effect::LASER);

    let slot = engine.sprites.allocate()?;
    let left = engine.memory.read(record) & GunFlags::LEFT != 0;

    let sprite = &mut engine.sprites[slot];
    sprite.kind = SpriteKind::LASER;
    sprite.y = gun.y.wrapping_add(5);
    sprite.image = IMAGE_LASER;
    let dx = if left {
        sprite.x = gun.x.wrapping_sub(8);
        0xFC
    } else {
        sprite.x = gun.x.wrapping_add(8);
        4
    };
    sprite.data = SpriteData::Laser(LaserData { gun: gun.id, dx });

    engine.prepare_sprite(slot);
    debug!("Ray gun {:02X} fired, laser in slot {}", gun.id, slot);
    Some(slot)
}

pub struct Control;

impl ObjectBehavior for Control {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if reach(engine, slot, object) >= 8
            || engine.memory.player_state(player.number as usize) != PlayerState::ALIVE
        {
            return;
        }
        let Some(id) = engine.objects.at(object).map(|o| o.id) else {
            return;
        };
        let record = record_address(engine, id);

        let aim = match player.joystick {
            0 => GunFlags::UP,
            4 => GunFlags::DOWN,
            0x80 => 0,
            _ => return,
        };

        let mut flags = engine.memory.read(record) & !(GunFlags::UP | GunFlags::DOWN);
        flags |= aim | GunFlags::MANUAL;
        if player.button {
            flags |= GunFlags::FIRE;
        } else {
            flags &= !GunFlags::FIRE;
        }
        engine.memory.write(record, flags);
    }
}

pub struct Laser;

impl SpriteBehavior for Laser {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        let SpriteData::Laser(data) = engine.sprites[slot].data else {
            release(engine, slot);
            return;
        };

        if release(engine, slot) {
            let record = record_address(engine, data.gun);
            engine.memory.clear_bits(record, GunFlags::FIRING);
            return;
        }
        take_created(engine, slot);

        let sprite = &mut engine.sprites[slot];
        sprite.x = sprite.x.wrapping_add(data.dx);
        if !(LASER_MIN_X..LASER_MAX_X).contains(&sprite.x) {
            sprite.state |= SpriteState::DESTROY;
        }
    }

    /// Lasers stop at poles, coffins and the other guns
    fn object_collision(&self, engine: &mut Engine, slot: usize, object: usize) -> bool {
        let Some(target) = engine.objects.at(object) else {
            return false;
        };
        match target.kind {
            ObjectKind::LIGHTNING_POLE | ObjectKind::FRANKIE_COFFIN => true,
            ObjectKind::RAYGUN => match engine.sprites[slot].data {
                SpriteData::Laser(data) => data.gun != target.id,
                _ => true,
            },
            _ => false,
        }
    }
}

/// Parse the ray gun records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.rayguns = ptr;
    let mut offset = 0u8;

    loop {
        engine.memory.clear_bits(ptr, GunFlags::FIRING);
        let flags = engine.memory.read(ptr);
        let x = engine.memory.read(ptr.wrapping_add(1));
        let y = engine.memory.read(ptr.wrapping_add(2));
        let length = engine.memory.read(ptr.wrapping_add(3));

        let track = if flags & GunFlags::LEFT != 0 {
            IMAGE_TRACK_LEFT
        } else {
            IMAGE_TRACK_RIGHT
        };
        for n in 0..length {
            draw_image(&mut engine.memory, track, x, y.wrapping_add(n.wrapping_mul(8)));
        }

        if flags & GunFlags::NO_GUN == 0 {
            let gun_x = if flags & GunFlags::LEFT != 0 {
                x.wrapping_sub(8)
            } else {
                x.wrapping_add(4)
            };
            engine.objects.create(Object {
                id: offset,
                flags: ObjectFlags::DISABLE | ObjectFlags::EXECUTE,
                x: gun_x,
                state: (length << 3).wrapping_add(y).wrapping_sub(0x0B),
                ..Object::new(ObjectKind::RAYGUN)
            });
        }

        if let Some(panel) = engine.objects.create(Object {
            id: offset,
            ..Object::new(ObjectKind::RAYGUN_CONTROL)
        }) {
            let px = engine.memory.read(ptr.wrapping_add(5));
            let py = engine.memory.read(ptr.wrapping_add(6));
            engine.draw_object(panel, IMAGE_PANEL, px, py);
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) & GunFlags::LAST != 0 {
            break;
        }
    }

    // Nobody in range until a gun has tracked
    engine.raygun_nearest = 0xFF;
    ptr.wrapping_add(1)
}
