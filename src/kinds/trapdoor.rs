//! Trapdoors and their floor switches
//!
//! Record (5 bytes): flags (0x01 open, 0x80 last record), trapdoor X, Y,
//! switch X, Y. Each record creates the trapdoor itself and the floor
//! switch; walkers stepping onto a switch toggle the trapdoor, and walkers
//! standing over an open trapdoor fall.

use log::warn;

use super::ObjectBehavior;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};

const RECORD_SIZE: u8 = 5;

/// Record flag bits
pub const OPEN: u8 = 0x01;
const LAST: u8 = 0x80;

/// Image patches for the switch: lamp colours
const SWITCH_LAMP: u16 = 0x6F2E;
const SWITCH_BASE: u16 = 0x6F30;

/// Trapdoor sound pitch
const TRAPDOOR_PITCH: u16 = 0x759F;

const IMAGE_OPEN: u8 = 0x79;
const IMAGE_SWITCH: u8 = 0x7A;
const IMAGE_CLOSED: u8 = 0x7B;

/// Animation frames, closed to open
const FRAME_FIRST: u8 = 0x73;
const FRAME_LAST: u8 = 0x78;

pub struct Trapdoor;

impl ObjectBehavior for Trapdoor {
    fn execute(&self, engine: &mut Engine, object: usize) {
        let Some(trapdoor) = engine.objects.at(object).copied() else {
            return;
        };
        let record = engine.room.trapdoors.wrapping_add(trapdoor.id as u16);
        let x = engine.memory.read(record.wrapping_add(1));
        let y = engine.memory.read(record.wrapping_add(2));
        let frame = trapdoor.phase;

        if trapdoor.state != 0 {
            play_sound(engine, frame);
            erase_image(&mut engine.memory, frame, x, y);
            if frame != FRAME_LAST {
                set_phase(engine, object, frame.wrapping_add(1));
                return;
            }
            engine.draw_object(object, IMAGE_OPEN, x.wrapping_add(4), y);
        } else {
            if frame == FRAME_LAST {
                engine.disable_object(object);
            }
            play_sound(engine, frame);
            draw_image(&mut engine.memory, frame, x, y);
            if frame != FRAME_FIRST {
                set_phase(engine, object, frame.wrapping_sub(1));
                return;
            }
        }

        engine.clear_object_flags(object, ObjectFlags::EXECUTE);
    }
}

fn set_phase(engine: &mut Engine, object: usize, phase: u8) {
    if let Some(o) = engine.objects.at_mut(object) {
        o.phase = phase;
    }
}

fn play_sound(engine: &mut Engine, frame: u8) {
    engine.memory.write(TRAPDOOR_PITCH, frame.wrapping_sub(0x48));
    engine.play_effect(Effect::TRAPDOOR);
}

/// Parse the trapdoor records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.trapdoors = ptr;
    let mut offset = 0u8;

    loop {
        let flags = engine.memory.read(ptr);
        let x = engine.memory.read(ptr.wrapping_add(1));
        let y = engine.memory.read(ptr.wrapping_add(2));

        if let Some(trapdoor) = engine.objects.create(Object {
            id: offset,
            ..Object::new(ObjectKind::TRAPDOOR)
        }) {
            if flags & OPEN == 0 {
                engine.memory.write(SWITCH_LAMP, 0xC0);
                engine.memory.write(SWITCH_BASE, 0x55);
            } else {
                erase_image(&mut engine.memory, IMAGE_CLOSED, x, y);
                engine.draw_object(trapdoor, IMAGE_OPEN, x.wrapping_add(4), y);
                engine.memory.write(SWITCH_LAMP, 0x20);
                engine.memory.write(SWITCH_BASE, 0xCC);
                open_floor(engine, x, y);
            }
        }

        if let Some(switch) = engine.objects.create(Object {
            id: offset,
            ..Object::new(ObjectKind::TRAPDOOR_SWITCH)
        }) {
            let sx = engine.memory.read(ptr.wrapping_add(3));
            let sy = engine.memory.read(ptr.wrapping_add(4));
            engine.draw_object(switch, IMAGE_SWITCH, sx, sy);
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) & LAST != 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}

/// Remove the walkway across an open trapdoor
fn open_floor(engine: &mut Engine, x: u8, y: u8) {
    let cell = engine.cell_address(x, y);
    engine.memory.write(cell, engine.memory.read(cell) & 0xFB);
    let next = cell.wrapping_add(4);
    engine.memory.write(next, engine.memory.read(next) & 0xBF);
}

/// Restore the walkway across a closed trapdoor
fn close_floor(engine: &mut Engine, x: u8, y: u8) {
    let cell = engine.cell_address(x, y);
    engine.memory.set_bits(cell, 0x04);
    engine.memory.set_bits(cell.wrapping_add(4), 0x40);
}

/// Whether the trapdoor record at `id` is open
pub fn is_open(engine: &Engine, id: u8) -> bool {
    engine.memory.read(engine.room.trapdoors.wrapping_add(id as u16)) & OPEN != 0
}

/// Toggle a trapdoor from its floor switch
pub fn toggle(engine: &mut Engine, id: u8) {
    let record = engine.room.trapdoors.wrapping_add(id as u16);
    let flags = engine.memory.read(record) ^ OPEN;
    engine.memory.write(record, flags);

    let x = engine.memory.read(record.wrapping_add(1));
    let y = engine.memory.read(record.wrapping_add(2));

    let trapdoor = engine
        .objects
        .find(ObjectKind::TRAPDOOR, id)
        .and_then(|handle| engine.objects.get_mut(handle));
    if trapdoor.is_none() {
        warn!("No trapdoor for switch record {:02X}", id);
    }

    if flags & OPEN == 0 {
        if let Some(o) = trapdoor {
            o.flags |= ObjectFlags::EXECUTE;
            o.state = 0;
            o.phase = FRAME_LAST;
        }
        engine.memory.write(SWITCH_LAMP, 0xC0);
        engine.memory.write(SWITCH_BASE, 0x55);
        close_floor(engine, x, y);
    } else {
        if let Some(o) = trapdoor {
            o.flags |= ObjectFlags::EXECUTE;
            o.state = 1;
            o.phase = FRAME_FIRST;
        }
        engine.memory.write(SWITCH_LAMP, 0x20);
        engine.memory.write(SWITCH_BASE, 0xCC);
        open_floor(engine, x, y);
    }

    let sx = engine.memory.read(record.wrapping_add(3));
    let sy = engine.memory.read(record.wrapping_add(4));
    draw_image(&mut engine.memory, IMAGE_SWITCH, sx, sy);
}

/// Switch handling shared by every walker: a switch touched this tick
/// toggles its trapdoor once, until the walker steps off it
pub fn step_switch(engine: &mut Engine, last_switch: &mut u8, switch: &mut u8) {
    let touched = *switch;
    if touched != 0xFF && touched != *last_switch {
        toggle(engine, touched);
    }
    *last_switch = touched;
    *switch = 0xFF;
}
