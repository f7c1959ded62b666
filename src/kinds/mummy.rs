//! Mummies and their tombs
//!
//! Record (7 bytes): state, ankh x, ankh y, tomb x, tomb y, mummy x, mummy y.
//! States: 1 sealed in the tomb, 2 out and walking, 3 dead. Touching the
//! ankh breaks the tomb open and the mummy rises out of it; from then on it
//! walks along the floor towards the first living player.

use super::player::player_at;
use super::{reach, release, take_created, trapdoor, ObjectBehavior, SpriteBehavior};
use crate::castle::PlayerState;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectFlags, ObjectKind};
use crate::sprite::{MummyData, SpriteData, SpriteKind};

const RECORD_SIZE: u8 = 7;

/// Record states
pub struct MummyState;

impl MummyState {
    pub const SEALED: u8 = 1;
    pub const WALKING: u8 = 2;
    pub const DEAD: u8 = 3;
}

const IMAGE_ANKH: u8 = 0x44;
const IMAGE_BLOCK: u8 = 0x42;
const IMAGE_OPEN_TOMB: u8 = 0x43;

/// Walking frames
const LEFT_FIRST: u8 = 0x4B;
const RIGHT_FIRST: u8 = 0x4E;
const RIGHT_END: u8 = 0x51;

/// Rising animation: image, x and y deltas per step (0xFF image ends it)
const RISE_IMAGE: u16 = 0x39EF;
const RISE_DX: u16 = 0x39F7;
const RISE_DY: u16 = 0x39FF;

const ANKH_COLOR: u16 = 0x68F0;
const MUMMY_PITCH: u16 = 0x7630;

/// Ankh flash colours
const ANKH_DIM: u8 = 0x66;
const ANKH_LIT: u8 = 0x11;

fn record_address(engine: &Engine, offset: u8) -> u16 {
    engine.room.mummies.wrapping_add(offset as u16)
}

pub struct Tomb;

impl ObjectBehavior for Tomb {
    fn execute(&self, engine: &mut Engine, object: usize) {
        if engine.ticks & 3 != 0 {
            return;
        }
        let Some(tomb) = engine.objects.at(object).copied() else {
            return;
        };

        let countdown = tomb.state.wrapping_sub(1);
        let color = if countdown == 0 {
            engine.clear_object_flags(object, ObjectFlags::EXECUTE);
            ANKH_DIM
        } else if tomb.phase == ANKH_DIM {
            ANKH_LIT
        } else {
            ANKH_DIM
        };

        engine.memory.fill(ANKH_COLOR, 6, color);
        if let Some(o) = engine.objects.at_mut(object) {
            o.state = countdown;
            o.phase = color;
        }
        engine.draw_object(object, tomb.gfx, tomb.x, tomb.y);
    }

    fn infront(&self, engine: &mut Engine, object: usize, slot: usize) {
        if player_at(engine, slot).is_none() || reach(engine, slot, object) >= 8 {
            return;
        }
        let Some(tomb) = engine.objects.at(object).copied() else {
            return;
        };
        let record = record_address(engine, tomb.id);
        if engine.memory.read(record) != MummyState::SEALED {
            return;
        }

        let tomb_x = engine.memory.read(record.wrapping_add(3));
        let tomb_y = engine.memory.read(record.wrapping_add(4));
        engine.memory.write(record, MummyState::WALKING);
        engine.memory.write(record.wrapping_add(5), tomb_x.wrapping_add(4));
        engine.memory.write(record.wrapping_add(6), tomb_y.wrapping_add(7));

        if let Some(o) = engine.objects.at_mut(object) {
            o.flags |= ObjectFlags::EXECUTE;
            o.state = 8;
            o.phase = ANKH_DIM;
        }

        open_tomb(engine, tomb_x, tomb_y);
        create(engine, tomb.id, false);
    }
}

/// Knock the front blocks out of a tomb
fn open_tomb(engine: &mut Engine, tomb_x: u8, tomb_y: u8) {
    let x = tomb_x.wrapping_add(4);
    let y = tomb_y.wrapping_add(8);
    for n in 0..3u8 {
        erase_image(&mut engine.memory, IMAGE_BLOCK, x.wrapping_add(n * 4), y);
    }
    draw_image(&mut engine.memory, IMAGE_OPEN_TOMB, x, y);
}

/// Spawn a mummy sprite, rising from its tomb or already walking
fn create(engine: &mut Engine, record_offset: u8, walking: bool) -> Option<usize> {
    let slot = engine.sprites.allocate()?;
    let record = record_address(engine, record_offset);

    let (x, y, period) = if walking {
        (
            engine.memory.read(record.wrapping_add(5)),
            engine.memory.read(record.wrapping_add(6)),
            2,
        )
    } else {
        (
            engine.memory.read(record.wrapping_add(3)).wrapping_add(0x0D),
            engine.memory.read(record.wrapping_add(4)).wrapping_add(8),
            4,
        )
    };

    let sprite = &mut engine.sprites[slot];
    sprite.kind = SpriteKind::MUMMY;
    sprite.x = x;
    sprite.y = y;
    sprite.period = period;
    sprite.width = 5;
    sprite.height = 0x11;
    sprite.image = 0xFF;
    sprite.data = SpriteData::Mummy(MummyData {
        record: record_offset,
        walking,
        rise_step: 0xFF,
        last_switch: 0xFF,
        switch: 0xFF,
    });

    Some(slot)
}

fn payload(engine: &Engine, slot: usize) -> MummyData {
    match engine.sprites[slot].data {
        SpriteData::Mummy(data) => data,
        _ => MummyData::default(),
    }
}

fn kill(engine: &mut Engine, slot: usize) {
    let record = record_address(engine, payload(engine, slot).record);
    engine.memory.write(record, MummyState::DEAD);
}

pub struct Mummy;

impl SpriteBehavior for Mummy {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        if release(engine, slot) {
            return;
        }
        if take_created(engine, slot) && payload(engine, slot).walking {
            engine.sprites[slot].image = LEFT_FIRST;
            engine.prepare_sprite(slot);
        }

        let mut data = payload(engine, slot);
        trapdoor::step_switch(engine, &mut data.last_switch, &mut data.switch);
        let record = record_address(engine, data.record);

        if !data.walking {
            data.rise_step = data.rise_step.wrapping_add(1);
            let step = data.rise_step as u16;
            let image = engine.memory.read(RISE_IMAGE.wrapping_add(step));

            if image != 0xFF {
                let dx = engine.memory.read(RISE_DX.wrapping_add(step));
                let dy = engine.memory.read(RISE_DY.wrapping_add(step));
                let sprite = &mut engine.sprites[slot];
                sprite.data = SpriteData::Mummy(data);
                sprite.image = image;
                sprite.x = sprite.x.wrapping_add(dx);
                sprite.y = sprite.y.wrapping_add(dy);

                engine.memory.write(MUMMY_PITCH, (data.rise_step << 2).wrapping_add(0x24));
                engine.play_effect(Effect::MUMMY);
                engine.prepare_sprite(slot);
                return;
            }

            data.walking = true;
            let sprite = &mut engine.sprites[slot];
            sprite.x = engine.memory.read(record.wrapping_add(3)).wrapping_add(4);
            sprite.y = engine.memory.read(record.wrapping_add(4)).wrapping_add(7);
            sprite.period = 2;
        }
        engine.sprites[slot].data = SpriteData::Mummy(data);

        // Chase player one, or player two once player one is gone
        let target = if engine.memory.player_state(0) == PlayerState::ALIVE {
            0
        } else if engine.memory.player_state(1) == PlayerState::ALIVE {
            1
        } else {
            return;
        };
        let Some(player) = engine.player_sprite[target] else {
            return;
        };

        let cell = engine.floor_cell(slot);
        let floor = engine.memory.read(cell.address);
        let own_x = engine.sprites[slot].x;
        let player_x = engine.sprites[player].x;

        if (own_x.wrapping_sub(player_x) as i8).unsigned_abs() < 2 {
            return;
        }

        let sprite = &mut engine.sprites[slot];
        sprite.image = sprite.image.wrapping_add(1);

        if own_x < player_x {
            if floor & 0x04 == 0 {
                return;
            }
            sprite.x = sprite.x.wrapping_add(1);
            if !(RIGHT_FIRST..RIGHT_END).contains(&sprite.image) {
                sprite.image = RIGHT_FIRST;
            }
        } else {
            if floor & 0x40 == 0 {
                return;
            }
            sprite.x = sprite.x.wrapping_sub(1);
            if !(LEFT_FIRST..RIGHT_FIRST).contains(&sprite.image) {
                sprite.image = LEFT_FIRST;
            }
        }

        let (x, y) = (sprite.x, sprite.y);
        engine.memory.write(record.wrapping_add(5), x);
        engine.memory.write(record.wrapping_add(6), y);
        engine.prepare_sprite(slot);
    }

    fn object_collision(&self, engine: &mut Engine, slot: usize, object: usize) -> bool {
        let Some(target) = engine.objects.at(object).copied() else {
            return false;
        };
        let close = (reach(engine, slot, object) as i8) < 4;

        match target.kind {
            ObjectKind::TRAPDOOR if close && trapdoor::is_open(engine, target.id) => {
                kill(engine, slot);
                true
            }
            ObjectKind::TRAPDOOR_SWITCH if close => {
                let mut data = payload(engine, slot);
                data.switch = target.id;
                engine.sprites[slot].data = SpriteData::Mummy(data);
                false
            }
            _ => false,
        }
    }

    fn hit(&self, engine: &mut Engine, slot: usize, other: usize) -> bool {
        match engine.sprites[other].kind {
            SpriteKind::PLAYER | SpriteKind::FRANKIE => false,
            _ => {
                kill(engine, slot);
                true
            }
        }
    }
}

/// Parse the mummy records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.mummies = ptr;
    let mut offset = 0u8;

    loop {
        let state = engine.memory.read(ptr);
        let ankh_x = engine.memory.read(ptr.wrapping_add(1));
        let ankh_y = engine.memory.read(ptr.wrapping_add(2));
        let tomb_x = engine.memory.read(ptr.wrapping_add(3));
        let tomb_y = engine.memory.read(ptr.wrapping_add(4));

        let tomb = engine.objects.create(Object {
            id: offset,
            phase: ANKH_DIM,
            ..Object::new(ObjectKind::MUMMY_TOMB)
        });
        if let Some(tomb) = tomb {
            engine.memory.fill(ANKH_COLOR, 6, ANKH_DIM);
            engine.draw_object(tomb, IMAGE_ANKH, ankh_x, ankh_y);
        }

        for row in 0..3u8 {
            for column in 0..5u8 {
                draw_image(
                    &mut engine.memory,
                    IMAGE_BLOCK,
                    tomb_x.wrapping_add(column * 4),
                    tomb_y.wrapping_add(row * 8),
                );
            }
        }

        if state != MummyState::SEALED {
            open_tomb(engine, tomb_x, tomb_y);
            if state == MummyState::WALKING && tomb.is_some() {
                create(engine, offset, true);
            }
        }

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) == 0 {
            break;
        }
    }

    ptr.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::player;
    use crate::sprite::SpriteState;
    use crate::testing;

    fn engine_with_tomb(state: u8) -> Engine {
        let mut engine = testing::engine();
        engine.room.doors = 0x9100;
        engine.memory.load(0x9000, &[state, 0x30, 0x40, 0x50, 0x40, 0x58, 0x47, 0]);
        engine
    }

    #[test]
    fn sealed_tomb_has_no_mummy() {
        let mut engine = engine_with_tomb(MummyState::SEALED);
        assert_eq!(load(&mut engine, 0x9000), 0x9008);
        assert_eq!(engine.objects.at(0).unwrap().gfx, IMAGE_ANKH);
        assert_eq!(engine.sprites.live_count(), 0);
    }

    #[test]
    fn walking_mummy_resumes_at_its_record() {
        let mut engine = engine_with_tomb(MummyState::WALKING);
        load(&mut engine, 0x9000);

        let sprite = engine.sprites[0];
        assert_eq!(sprite.kind, SpriteKind::MUMMY);
        assert_eq!((sprite.x, sprite.y, sprite.period), (0x58, 0x47, 2));
    }

    #[test]
    fn touching_the_ankh_releases_the_mummy() {
        let mut engine = engine_with_tomb(MummyState::SEALED);
        load(&mut engine, 0x9000);
        let slot = player::add(&mut engine, 0).unwrap();
        engine.sprites[slot].x = 0x2E;

        Tomb.infront(&mut engine, 0, slot);

        assert_eq!(engine.memory.read(0x9000), MummyState::WALKING);
        assert_eq!(engine.memory.slice(0x9005, 2), &[0x54, 0x47]);
        let tomb = engine.objects.at(0).unwrap();
        assert!(tomb.has(ObjectFlags::EXECUTE));
        assert_eq!(tomb.state, 8);

        let mummy = engine.sprites.iter().position(|s| s.kind == SpriteKind::MUMMY && !s.is_free()).unwrap();
        assert_eq!((engine.sprites[mummy].x, engine.sprites[mummy].period), (0x5D, 4));
    }

    #[test]
    fn ankh_flashes_then_stops() {
        let mut engine = engine_with_tomb(MummyState::SEALED);
        load(&mut engine, 0x9000);
        engine.objects.at_mut(0).unwrap().state = 2;
        engine.set_object_flags(0, ObjectFlags::EXECUTE);
        engine.ticks = 0;

        Tomb.execute(&mut engine, 0);
        assert_eq!(engine.objects.at(0).unwrap().phase, ANKH_LIT);
        Tomb.execute(&mut engine, 0);
        assert_eq!(engine.objects.at(0).unwrap().phase, ANKH_DIM);
        assert!(!engine.objects.at(0).unwrap().has(ObjectFlags::EXECUTE));
    }

    #[test]
    fn rising_follows_the_table() {
        let mut engine = engine_with_tomb(MummyState::SEALED);
        load(&mut engine, 0x9000);
        engine.memory.load(RISE_IMAGE, &[0x4F, 0xFF]);
        engine.memory.write(RISE_DX, 2);
        let slot = create(&mut engine, 0, false).unwrap();

        Mummy.execute(&mut engine, slot);
        assert_eq!(engine.sprites[slot].image, 0x4F);
        assert_eq!(engine.sprites[slot].x, 0x5F);

        Mummy.execute(&mut engine, slot);
        assert!(payload(&engine, slot).walking);
        assert_eq!((engine.sprites[slot].x, engine.sprites[slot].y), (0x54, 0x47));
        assert_eq!(engine.sprites[slot].period, 2);
    }

    #[test]
    fn walks_towards_the_player() {
        let mut engine = engine_with_tomb(MummyState::WALKING);
        load(&mut engine, 0x9000);
        let player = player::add(&mut engine, 0).unwrap();
        engine.sprites[player].x = 0x20;
        engine.sprites[0].state = 0;

        let cell = engine.floor_cell(0);
        engine.memory.write(cell.address, 0x44);
        Mummy.execute(&mut engine, 0);

        assert_eq!(engine.sprites[0].x, 0x57);
        assert_eq!(engine.sprites[0].image, LEFT_FIRST);
        assert_eq!(engine.memory.read(0x9005), 0x57);
    }

    #[test]
    fn lasers_kill_but_players_do_not() {
        let mut engine = engine_with_tomb(MummyState::WALKING);
        load(&mut engine, 0x9000);
        let other = engine.sprites.allocate().unwrap();

        engine.sprites[other].kind = SpriteKind::PLAYER;
        assert!(!Mummy.hit(&mut engine, 0, other));
        assert_eq!(engine.memory.read(0x9000), MummyState::WALKING);

        engine.sprites[other].kind = SpriteKind::LASER;
        assert!(Mummy.hit(&mut engine, 0, other));
        assert_eq!(engine.memory.read(0x9000), MummyState::DEAD);
        assert!(!engine.sprites[0].has(SpriteState::DESTROY));
    }
}
