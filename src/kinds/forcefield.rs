//! Forcefields and their timer buttons
//!
//! Record (4 bytes): button x, button y, field x, field y. A zero byte ends
//! the list. Pressing the button drops the field for a while; the button
//! counts down on its own lamp and raises the field again when done.

use super::player::player_at;
use super::{release, take_created, ObjectBehavior, SpriteBehavior};
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::{ForcefieldData, SpriteData, SpriteKind};

const RECORD_SIZE: u16 = 4;

/// One byte per forcefield: 1 while the field is up
const FIELD_STATE: u16 = 0x4750;

/// Sound pitch per remaining countdown phase
const COUNTDOWN_PITCH: u16 = 0x4756;

const FORCEFIELD_PITCH: u16 = 0x75AB;

/// Countdown lamp rows in the timer image
const LAMP_ROWS: u16 = 0x6889;
const LAMP_COUNT: usize = 8;
const LAMP_LIT: u8 = 0x55;

const IMAGE_BUTTON: u8 = 0x3F;
const IMAGE_TIMER: u8 = 0x40;
const IMAGE_FIELD_ON: u8 = 0x35;
const IMAGE_FIELD_SHIMMER: u8 = 0x3D;
const IMAGE_FIELD_OFF: u8 = 0x41;
const IMAGE_EMITTER: u8 = 0x3E;

/// Ticks per countdown phase
const PHASE_TICKS: u8 = 0x1E;
const PHASES: u8 = 8;

pub struct Timer;

impl ObjectBehavior for Timer {
    fn execute(&self, engine: &mut Engine, object: usize) {
        let Some(timer) = engine.objects.at(object).copied() else {
            return;
        };

        let countdown = timer.state.wrapping_sub(1);
        if countdown != 0 {
            if let Some(o) = engine.objects.at_mut(object) {
                o.state = countdown;
            }
            return;
        }

        let phase = timer.phase.wrapping_sub(1);
        let pitch = engine.memory.read(COUNTDOWN_PITCH.wrapping_add(phase as u16));
        engine.memory.write(FORCEFIELD_PITCH, pitch);
        engine.play_effect(Effect::FORCEFIELD);

        for lamp in 0..LAMP_COUNT as u8 {
            let value = if lamp >= phase { LAMP_LIT } else { 0 };
            engine.memory.write(LAMP_ROWS.wrapping_add(lamp as u16), value);
        }
        draw_image(&mut engine.memory, IMAGE_TIMER, timer.x, timer.y);

        if let Some(o) = engine.objects.at_mut(object) {
            o.phase = phase;
            o.state = if phase != 0 { PHASE_TICKS } else { 0 };
        }
        if phase == 0 {
            engine.clear_object_flags(object, ObjectFlags::EXECUTE);
            engine.memory.write(FIELD_STATE.wrapping_add(timer.id as u16), 1);
        }
    }

    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        if !player_at(engine, slot).is_some_and(|p| p.button) {
            return;
        }
        let Some(timer) = engine.objects.at(object).copied() else {
            return;
        };

        engine.memory.write(FORCEFIELD_PITCH, 0x0C);
        engine.play_effect(Effect::FORCEFIELD);

        if let Some(o) = engine.objects.at_mut(object) {
            o.flags |= ObjectFlags::EXECUTE;
            o.state = PHASE_TICKS;
            o.phase = PHASES;
        }

        engine.memory.fill(LAMP_ROWS, LAMP_COUNT, LAMP_LIT);
        erase_image(&mut engine.memory, timer.gfx, timer.x, timer.y);
        engine.memory.write(FIELD_STATE.wrapping_add(timer.id as u16), 0);
    }
}

pub struct Forcefield;

impl SpriteBehavior for Forcefield {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        if release(engine, slot) {
            return;
        }
        take_created(engine, slot);

        let SpriteData::Forcefield(mut data) = engine.sprites[slot].data else {
            return;
        };
        let up = engine.memory.read(FIELD_STATE.wrapping_add(data.index as u16)) == 1;

        if up {
            if !data.closed {
                data.closed = true;
                let cell = engine.floor_cell(slot).address.wrapping_sub(2);
                engine.memory.clear_bits(cell, 0x04);
                engine.memory.clear_bits(cell.wrapping_add(4), 0x40);
                engine.sprites[slot].image = IMAGE_FIELD_ON;
            } else {
                let sprite = &mut engine.sprites[slot];
                sprite.image = if sprite.image == IMAGE_FIELD_ON {
                    IMAGE_FIELD_SHIMMER
                } else {
                    IMAGE_FIELD_ON
                };
            }
        } else if data.closed {
            data.closed = false;
            let cell = engine.floor_cell(slot).address.wrapping_sub(2);
            engine.memory.set_bits(cell, 0x04);
            engine.memory.set_bits(cell.wrapping_add(4), 0x40);
            engine.sprites[slot].image = IMAGE_FIELD_OFF;
        } else {
            return;
        }

        engine.sprites[slot].data = SpriteData::Forcefield(data);
        engine.prepare_sprite(slot);
    }

    fn hit(&self, _engine: &mut Engine, _slot: usize, _other: usize) -> bool {
        false
    }
}

/// Parse the forcefield records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    let mut index = 0u8;

    loop {
        let x = engine.memory.read(ptr);
        let y = engine.memory.read(ptr.wrapping_add(1));
        let field_x = engine.memory.read(ptr.wrapping_add(2));
        let field_y = engine.memory.read(ptr.wrapping_add(3));

        if let Some(timer) = engine.objects.create(Object {
            id: index,
            ..Object::new(ObjectKind::FORCEFIELD_TIMER)
        }) {
            draw_image(&mut engine.memory, IMAGE_BUTTON, x, y);
            engine.memory.fill(LAMP_ROWS, LAMP_COUNT, LAMP_LIT);
            engine.draw_object(timer, IMAGE_TIMER, x.wrapping_add(4), y.wrapping_add(8));
        }
        engine.memory.write(FIELD_STATE.wrapping_add(index as u16), 1);

        if let Some(slot) = engine.sprites.allocate() {
            let sprite = &mut engine.sprites[slot];
            sprite.kind = SpriteKind::FORCEFIELD;
            sprite.x = field_x;
            sprite.y = field_y.wrapping_add(2);
            sprite.image = IMAGE_FIELD_ON;
            sprite.period = 4;
            sprite.width = 2;
            sprite.height = 0x19;
            sprite.data = SpriteData::Forcefield(ForcefieldData { index, closed: false });
        }
        draw_image(&mut engine.memory, IMAGE_EMITTER, field_x, field_y);

        index = index.wrapping_add(1);
        ptr = ptr.wrapping_add(RECORD_SIZE);

        if engine.memory.read(ptr) == 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}
