//! Lightning machines
//!
//! Record (8 bytes): flags, x, y, pole length, then up to four linked pole
//! offsets (0xFF ends the list). Flags: 0x80 the record is a switch, 0x40
//! the machine is on, 0x20 last record.

use log::debug;

use super::player::player_at;
use super::{find_object, reach, release, take_created, ObjectBehavior, SpriteBehavior};
use crate::draw::draw_image;
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::{BoltData, SpriteData, SpriteKind, SpriteState, MAX_SPRITES};

const RECORD_SIZE: u8 = 8;

/// Record flag bits
const SWITCH: u8 = 0x80;
pub const ON: u8 = 0x40;
const LAST: u8 = 0x20;

const IMAGE_POLE: u8 = 0x32;
const IMAGE_POLE_TOP: u8 = 0x33;
const IMAGE_POLE_SEGMENT: u8 = 0x34;
const IMAGE_SWITCH_BASE: u8 = 0x36;
const IMAGE_SWITCH_ON: u8 = 0x37;
const IMAGE_SWITCH_OFF: u8 = 0x38;

/// Bolt frames
const BOLT_FIRST: u8 = 0x39;
const BOLT_END: u8 = 0x3D;

/// Pole segment colours, patched per segment
const SEGMENT_COLOR: u16 = 0x66E6;
const SEGMENT_COLORS: [(u8, u8); 3] = [(0x16, 0x06), (0x61, 0x06), (0x66, 0x01)];

const SWITCH_PITCH: u16 = 0x75E7;

fn record_address(engine: &Engine, offset: u8) -> u16 {
    engine.room.lightning.wrapping_add(offset as u16)
}

pub struct Pole;

impl ObjectBehavior for Pole {
    fn execute(&self, engine: &mut Engine, object: usize) {
        let Some(pole) = engine.objects.at(object).copied() else {
            return;
        };
        let record = record_address(engine, pole.id);

        if pole.state != 1 {
            if let Some(o) = engine.objects.at_mut(object) {
                o.state = 1;
            }
            create_bolt(engine, &pole);
        } else if engine.memory.read(record) & ON == 0 {
            switch_off(engine, object, &pole, record);
            return;
        } else if engine.ticks & 3 != 0 {
            return;
        }

        let phase = (pole.phase + 1) % 3;
        if let Some(o) = engine.objects.at_mut(object) {
            o.phase = phase;
        }

        let x = engine.memory.read(record.wrapping_add(1));
        let mut y = engine.memory.read(record.wrapping_add(2));
        let mut color = phase as usize;

        for _ in 0..engine.memory.read(record.wrapping_add(3)) {
            let (first, second) = SEGMENT_COLORS[color];
            engine.memory.write(SEGMENT_COLOR, first);
            engine.memory.write(SEGMENT_COLOR + 1, second);
            draw_image(&mut engine.memory, IMAGE_POLE_SEGMENT, x, y);

            color = (color + 1) % 3;
            y = y.wrapping_add(8);
        }
    }
}

/// Stop a pole: dim its segments and end its bolt
fn switch_off(engine: &mut Engine, object: usize, pole: &Object, record: u16) {
    if let Some(o) = engine.objects.at_mut(object) {
        o.state = 0;
        o.flags &= !ObjectFlags::EXECUTE;
    }
    engine.memory.write(SEGMENT_COLOR, 0x55);
    engine.memory.write(SEGMENT_COLOR + 1, 0x55);

    let x = engine.memory.read(record.wrapping_add(1));
    let mut y = engine.memory.read(record.wrapping_add(2));
    for _ in 0..engine.memory.read(record.wrapping_add(3)) {
        draw_image(&mut engine.memory, IMAGE_POLE_SEGMENT, x, y);
        y = y.wrapping_add(8);
    }

    let bolt = (0..MAX_SPRITES).find(|&slot| {
        let sprite = &engine.sprites[slot];
        sprite.kind == SpriteKind::LIGHTNING
            && !sprite.is_free()
            && matches!(sprite.data, SpriteData::Bolt(BoltData { pole: id }) if id == pole.id)
    });

    match bolt {
        Some(slot) => engine.sprites[slot].state |= SpriteState::DESTROY,
        None => debug!("Pole {:02X} has no bolt", pole.id),
    }
}

fn create_bolt(engine: &mut Engine, pole: &Object) {
    let Some(slot) = engine.sprites.allocate() else {
        return;
    };
    let sprite = &mut engine.sprites[slot];
    sprite.kind = SpriteKind::LIGHTNING;
    sprite.x = pole.x;
    sprite.y = pole.y.wrapping_add(8);
    sprite.data = SpriteData::Bolt(BoltData { pole: pole.id });
}

pub struct Switch;

impl ObjectBehavior for Switch {
    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        let Some(player) = player_at(engine, slot) else {
            return;
        };
        if reach(engine, slot, object) >= 4 {
            return;
        }

        // Up turns the machine on, down turns it off
        let joystick = player.joystick;
        if joystick != 0 && joystick != 4 {
            return;
        }
        let Some(switch) = engine.objects.at(object).copied() else {
            return;
        };
        let record = record_address(engine, switch.id);
        let on = engine.memory.read(record) & ON != 0;
        if on == (joystick == 0) {
            return;
        }

        engine.memory.write(record, engine.memory.read(record) ^ ON);

        for n in 0..4u16 {
            let linked = engine.memory.read(record.wrapping_add(4 + n));
            if linked == 0xFF {
                break;
            }
            let pole = record_address(engine, linked);
            engine.memory.write(pole, engine.memory.read(pole) ^ ON);

            match find_object(engine, ObjectKind::LIGHTNING_POLE, linked) {
                Some(position) => engine.set_object_flags(position, ObjectFlags::EXECUTE),
                None => debug!("Switch {:02X} links to missing pole {:02X}", switch.id, linked),
            }
        }

        let gfx = if engine.memory.read(record) & ON == 0 {
            engine.memory.write(SWITCH_PITCH, 0x2F);
            IMAGE_SWITCH_OFF
        } else {
            engine.memory.write(SWITCH_PITCH, 0x23);
            IMAGE_SWITCH_ON
        };
        engine.draw_object(object, gfx, switch.x, switch.y);
        engine.play_effect(Effect::SWITCH);
    }
}

pub struct Bolt;

impl SpriteBehavior for Bolt {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        if release(engine, slot) {
            return;
        }
        take_created(engine, slot);

        let period = (engine.rng.next_byte() & 3) + 1;
        let mut image = (engine.rng.next_byte() & 3) + BOLT_FIRST;
        if image == engine.sprites[slot].image {
            image += 1;
            if image >= BOLT_END {
                image = BOLT_FIRST;
            }
        }

        let sprite = &mut engine.sprites[slot];
        sprite.period = period;
        sprite.image = image;
        engine.prepare_sprite(slot);
    }

    fn hit(&self, _engine: &mut Engine, _slot: usize, _other: usize) -> bool {
        false
    }
}

/// Parse the lightning machine records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.lightning = ptr;
    let mut offset = 0u8;

    loop {
        let flags = engine.memory.read(ptr);
        let mut x = engine.memory.read(ptr.wrapping_add(1));
        let mut y = engine.memory.read(ptr.wrapping_add(2));

        if flags & SWITCH != 0 {
            draw_image(&mut engine.memory, IMAGE_SWITCH_BASE, x, y);
            if let Some(switch) = engine.objects.create(Object {
                id: offset,
                ..Object::new(ObjectKind::LIGHTNING_SWITCH)
            }) {
                let gfx = if flags & ON != 0 { IMAGE_SWITCH_ON } else { IMAGE_SWITCH_OFF };
                engine.draw_object(switch, gfx, x.wrapping_add(4), y.wrapping_add(8));
            }
        } else {
            let length = engine.memory.read(ptr.wrapping_add(3));
            for _ in 0..length {
                draw_image(&mut engine.memory, IMAGE_POLE, x, y);
                y = y.wrapping_add(8);
            }
            x = x.wrapping_sub(4);

            if let Some(pole) = engine.objects.create(Object {
                id: offset,
                color: length,
                ..Object::new(ObjectKind::LIGHTNING_POLE)
            }) {
                engine.draw_object(pole, IMAGE_POLE_TOP, x, y);
                if flags & ON != 0 {
                    engine.set_object_flags(pole, ObjectFlags::EXECUTE);
                }
            }
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) & LAST != 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}
