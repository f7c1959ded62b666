//! Teleports
//!
//! Record: booth x, booth y, selected destination, then destination x/y
//! pairs ended by a zero x. Pushing up in the booth cycles the destination;
//! the button sends the player there while both ends flash.

use super::player::player_at;
use super::ObjectBehavior;
use crate::castle::PlayerState;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};

const IMAGE_FLOOR: u8 = 0x1C;
const IMAGE_BOOTH: u8 = 0x6F;
const IMAGE_PAD: u8 = 0x70;
const IMAGE_LAMP: u8 = 0x71;
const IMAGE_TARGET: u8 = 0x72;

/// Colour patches of the booth lamp and the destination markers
const LAMP_TOP: u16 = 0x6E70;
const LAMP_BOTTOM: u16 = 0x6E73;
const TARGET_COLOR: u16 = 0x6E95;

const TELEPORT_PITCH: u16 = 0x75CF;
const CHANGE_PITCH: u16 = 0x75DB;

/// Flashes per trip
const FLASHES: u8 = 8;

/// Address of the x byte of a destination
fn destination(record: u16, index: u8) -> u16 {
    record.wrapping_add(((index as u16) << 1) + 3)
}

/// Paint the booth lamp in a destination's colour
fn set_color(engine: &mut Engine, record: u16, color: u8) {
    engine.memory.fill(LAMP_TOP, 3, (color << 4) | 0x0A);
    engine.memory.fill(LAMP_BOTTOM, 3, 0x0F);

    let x = engine.memory.read(record).wrapping_add(4);
    let y = engine.memory.read(record.wrapping_add(1));
    draw_image(&mut engine.memory, IMAGE_LAMP, x, y);

    engine.memory.fill(LAMP_BOTTOM, 3, 1);
    draw_image(&mut engine.memory, IMAGE_LAMP, x, y.wrapping_add(8));
    draw_image(&mut engine.memory, IMAGE_LAMP, x, y.wrapping_add(0x10));
}

pub struct Teleport;

impl ObjectBehavior for Teleport {
    fn execute(&self, engine: &mut Engine, object: usize) {
        if engine.ticks & 1 != 0 {
            return;
        }
        let Some(booth) = engine.objects.at(object).copied() else {
            return;
        };

        let pitch = engine.rng.next_byte() & 0x3F;
        engine.memory.write(TELEPORT_PITCH, pitch);
        engine.play_effect(Effect::TELEPORT);

        let lit = engine.ticks & 3 == 0;
        let target = if lit { booth.phase } else { 1 };
        engine.memory.fill(TARGET_COLOR, 4, target << 4);
        draw_image(&mut engine.memory, IMAGE_TARGET, booth.dest_x, booth.dest_y);

        set_color(engine, booth.record, if lit { booth.phase } else { 0 });
        if !lit {
            return;
        }

        let remaining = booth.color.wrapping_sub(1);
        if let Some(o) = engine.objects.at_mut(object) {
            o.color = remaining;
            if remaining == 0 {
                o.flags &= !ObjectFlags::EXECUTE;
            }
        }
    }

    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(booth) = engine.objects.at(object).copied() else {
            return;
        };
        if booth.has(ObjectFlags::EXECUTE) {
            return;
        }
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if engine.memory.player_state(player.number as usize) != PlayerState::ALIVE {
            return;
        }

        let record = booth.record;
        let selected = engine.memory.read(record.wrapping_add(2));

        if !player.button {
            if player.joystick != 0 || engine.ticks & 0x0F != 0 {
                return;
            }

            let mut next = selected.wrapping_add(1);
            if engine.memory.read(destination(record, next)) == 0 {
                next = 0;
            }
            engine.memory.write(record.wrapping_add(2), next);
            engine.memory.write(CHANGE_PITCH, next.wrapping_add(0x32));
            engine.play_effect(Effect::TELEPORT_CHANGE);
            set_color(engine, record, next.wrapping_add(2));
            return;
        }

        let target = destination(record, selected);
        let dest_x = engine.memory.read(target);
        let dest_y = engine.memory.read(target.wrapping_add(1));

        if let Some(o) = engine.objects.at_mut(object) {
            o.flags |= ObjectFlags::EXECUTE;
            o.color = FLASHES;
            o.phase = selected.wrapping_add(2);
            o.dest_x = dest_x;
            o.dest_y = dest_y;
        }

        let sprite = &mut engine.sprites[slot];
        sprite.x = dest_x;
        sprite.y = dest_y.wrapping_add(7);
    }
}

/// Parse a teleport record
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    let x = engine.memory.read(ptr);
    let y = engine.memory.read(ptr.wrapping_add(1));

    for n in 0..3u8 {
        erase_image(&mut engine.memory, IMAGE_FLOOR, x.wrapping_add(n * 4), y.wrapping_add(0x18));
    }
    draw_image(&mut engine.memory, IMAGE_BOOTH, x, y);
    draw_image(&mut engine.memory, IMAGE_FLOOR, x.wrapping_add(0x0C), y.wrapping_add(0x18));

    if let Some(booth) = engine.objects.create(Object {
        record: ptr,
        ..Object::new(ObjectKind::TELEPORT)
    }) {
        engine.draw_object(booth, IMAGE_PAD, x.wrapping_add(4), y.wrapping_add(0x18));
    }
    let selected = engine.memory.read(ptr.wrapping_add(2));
    set_color(engine, ptr, selected.wrapping_add(2));

    let mut color = 0x20u8;
    while engine.memory.read(ptr.wrapping_add(3)) != 0 {
        engine.memory.fill(TARGET_COLOR, 4, color);
        let dx = engine.memory.read(ptr.wrapping_add(3));
        let dy = engine.memory.read(ptr.wrapping_add(4));
        draw_image(&mut engine.memory, IMAGE_TARGET, dx, dy);

        ptr = ptr.wrapping_add(2);
        color = color.wrapping_add(0x10);
    }

    ptr.wrapping_add(4)
}
