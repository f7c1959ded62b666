//! Conveyor belts and their control buttons
//!
//! Record (5 bytes): flags, belt x, belt y, control x, control y. The last
//! record has flag 0x80 set. Each press of a control button walks the belt
//! through stopped, running, stopped, running reversed.

use super::player::player_at;
use super::ObjectBehavior;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::SpriteKind;

const RECORD_SIZE: u8 = 5;

/// Record flag bits
pub struct BeltFlags;

impl BeltFlags {
    pub const LAST: u8 = 0x80;
    /// Button held by player two last tick
    pub const HELD_2: u8 = 0x20;
    /// Button held by player one last tick
    pub const HELD_1: u8 = 0x10;
    pub const PRESSED_2: u8 = 0x08;
    pub const PRESSED_1: u8 = 0x04;
    pub const REVERSE: u8 = 0x02;
    pub const RUNNING: u8 = 0x01;

    const BUTTONS: u8 = Self::HELD_1 | Self::HELD_2 | Self::PRESSED_1 | Self::PRESSED_2;
}

const IMAGE_BELT_BLANK: u8 = 0x7D;
const BELT_FIRST: u8 = 0x7E;
const BELT_LAST: u8 = 0x81;
const IMAGE_CONTROL: u8 = 0x82;
const IMAGE_BUTTON: u8 = 0x83;

/// Control lamp colour patches
const LAMP_FORWARD: u16 = 0x70A6;
const LAMP_REVERSE: u16 = 0x70A8;
const LAMP_OFF: u8 = 0xC0;

const CONVEYOR_PITCH: u16 = 0x7624;

/// Horizontal range the belt moves walkers over
const BELT_LENGTH: u8 = 0x20;

fn record_address(engine: &Engine, offset: u8) -> u16 {
    engine.room.conveyors.wrapping_add(offset as u16)
}

/// Colour the control lamps for a belt state
fn set_lamps(engine: &mut Engine, flags: u8) {
    let (forward, reverse) = if flags & BeltFlags::RUNNING == 0 {
        (LAMP_OFF, LAMP_OFF)
    } else if flags & BeltFlags::REVERSE == 0 {
        (LAMP_OFF, 0x20)
    } else {
        (0x50, LAMP_OFF)
    };
    engine.memory.write(LAMP_FORWARD, forward);
    engine.memory.write(LAMP_REVERSE, reverse);
}

pub struct Conveyor;

impl ObjectBehavior for Conveyor {
    fn execute(&self, engine: &mut Engine, object: usize) {
        let Some(belt) = engine.objects.at(object).copied() else {
            return;
        };
        let record = record_address(engine, belt.id);
        let mut flags = engine.memory.read(record);

        let fresh_press = (flags & BeltFlags::PRESSED_1 != 0 && flags & BeltFlags::HELD_1 == 0)
            || (flags & BeltFlags::PRESSED_2 != 0 && flags & BeltFlags::HELD_2 == 0);

        if fresh_press {
            flags = if flags & BeltFlags::RUNNING != 0 {
                flags ^ (BeltFlags::RUNNING | BeltFlags::REVERSE)
            } else {
                flags | BeltFlags::RUNNING
            };
            set_lamps(engine, flags);
            engine.memory.write(CONVEYOR_PITCH, 0x18);

            let x = engine.memory.read(record.wrapping_add(3));
            let y = engine.memory.read(record.wrapping_add(4));
            draw_image(&mut engine.memory, IMAGE_CONTROL, x, y);
            engine.play_effect(Effect::CONVEYOR);
        }

        // This tick's presses become last tick's
        flags &= !(BeltFlags::HELD_1 | BeltFlags::HELD_2);
        if flags & BeltFlags::PRESSED_1 != 0 {
            flags = (flags | BeltFlags::HELD_1) ^ BeltFlags::PRESSED_1;
        }
        if flags & BeltFlags::PRESSED_2 != 0 {
            flags = (flags | BeltFlags::HELD_2) ^ BeltFlags::PRESSED_2;
        }
        engine.memory.write(record, flags);

        if flags & BeltFlags::RUNNING == 0 || engine.ticks & 1 != 0 {
            return;
        }

        let gfx = if flags & BeltFlags::REVERSE == 0 {
            match belt.gfx.wrapping_add(1) {
                g if g > BELT_LAST => BELT_FIRST,
                g => g,
            }
        } else {
            match belt.gfx.wrapping_sub(1) {
                g if g < BELT_FIRST => BELT_LAST,
                g => g,
            }
        };
        engine.draw_object(object, gfx, belt.x, belt.y);
    }

    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(belt) = engine.objects.at(object).copied() else {
            return;
        };
        let flags = engine.memory.read(record_address(engine, belt.id));
        if flags & BeltFlags::RUNNING == 0 {
            return;
        }

        let sprite = engine.sprites[slot];
        let player = sprite.kind == SpriteKind::PLAYER;
        match sprite.kind {
            // Climbing players are not carried
            SpriteKind::PLAYER if sprite.image >= 6 => return,
            SpriteKind::PLAYER | SpriteKind::MUMMY | SpriteKind::FRANKIE => {}
            _ => return,
        }

        let right = sprite.x.wrapping_add(sprite.width);
        let offset = right.wrapping_sub(belt.x);
        if (right as i8) >= 0 && (offset as i8) < 0 {
            return;
        }
        if offset >= BELT_LENGTH {
            return;
        }

        let mut dx: u8 = if flags & BeltFlags::REVERSE != 0 { 0xFF } else { 1 };
        if !(player && engine.ticks & 7 != 0) {
            dx <<= 1;
        }
        engine.sprites[slot].x = sprite.x.wrapping_add(dx);
    }
}

pub struct Control;

impl ObjectBehavior for Control {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if !player.button {
            return;
        }
        let Some(id) = engine.objects.at(object).map(|o| o.id) else {
            return;
        };

        let pressed = if player.number != 0 {
            BeltFlags::PRESSED_2
        } else {
            BeltFlags::PRESSED_1
        };
        engine.memory.set_bits(record_address(engine, id), pressed);
    }
}

/// Parse the conveyor records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.conveyors = ptr;
    let mut offset = 0u8;

    loop {
        engine.memory.clear_bits(ptr, BeltFlags::BUTTONS);
        let flags = engine.memory.read(ptr);
        let x = engine.memory.read(ptr.wrapping_add(1));
        let y = engine.memory.read(ptr.wrapping_add(2));

        if let Some(belt) = engine.objects.create(Object {
            id: offset,
            flags: ObjectFlags::DISABLE | ObjectFlags::EXECUTE,
            ..Object::new(ObjectKind::CONVEYOR)
        }) {
            erase_image(&mut engine.memory, IMAGE_BELT_BLANK, x, y);
            engine.draw_object(belt, BELT_FIRST, x, y);
        }

        let cx = engine.memory.read(ptr.wrapping_add(3));
        let cy = engine.memory.read(ptr.wrapping_add(4));
        set_lamps(engine, flags);
        draw_image(&mut engine.memory, IMAGE_CONTROL, cx, cy);

        if let Some(control) = engine.objects.create(Object {
            id: offset,
            ..Object::new(ObjectKind::CONVEYOR_CONTROL)
        }) {
            engine.draw_object(control, IMAGE_BUTTON, cx.wrapping_add(4), cy.wrapping_add(8));
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) & BeltFlags::LAST != 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}
