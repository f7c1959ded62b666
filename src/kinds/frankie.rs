//! Frankenstein's monster and his coffin
//!
//! Record (7 bytes): flags, coffin x, coffin y, then the monster's saved x,
//! y, image and direction. The last record has flag 0x80 set.
//!
//! The monster sleeps in his coffin until a living player passes on the
//! side the coffin opens to, then hunts the players along walkways, ladders
//! and poles. An open trapdoor, a laser or a lightning bolt kills him for
//! good.

use log::debug;

use super::{bit, release, take_created, trapdoor, SpriteBehavior};
use crate::castle::PlayerState;
use crate::draw::{draw_image, erase_image};
use crate::engine::{Effect, Engine};
use crate::object::{Object, ObjectKind};
use crate::sprite::{FrankieData, SpriteData, SpriteKind};

const RECORD_SIZE: u8 = 7;

/// Record flag bits
pub struct FrankieFlags;

impl FrankieFlags {
    pub const LAST: u8 = 0x80;
    pub const DEAD: u8 = 0x04;
    /// Out of the coffin
    pub const AWAKE: u8 = 0x02;
    /// Coffin opens to the left
    pub const FACES_LEFT: u8 = 0x01;
}

const STANDING: u8 = 0x80;

const IMAGE_ASLEEP: u8 = 0x8F;
const IMAGE_COFFIN_RIGHT: u8 = 0x90;
const IMAGE_COFFIN_LEFT: u8 = 0x91;
const IMAGE_COFFIN_FLOOR: u8 = 0x92;
const IMAGE_FLOOR: u8 = 0x1C;

/// Walking frames
const RIGHT_FIRST: u8 = 0x84;
const LEFT_FIRST: u8 = 0x87;
const POLE: u8 = 0x8A;
const LADDER_FIRST: u8 = 0x8B;
const CLIMB_END: u8 = 0x8F;

fn record_address(engine: &Engine, offset: u8) -> u16 {
    engine.room.frankies.wrapping_add(offset as u16)
}

fn payload(engine: &Engine, slot: usize) -> FrankieData {
    match engine.sprites[slot].data {
        SpriteData::Frankie(data) => data,
        _ => FrankieData::default(),
    }
}

/// Mark the monster dead in his record
fn kill(engine: &mut Engine, slot: usize) {
    let mut data = payload(engine, slot);
    let record = record_address(engine, data.record);
    let flags = (engine.memory.read(record) & !FrankieFlags::AWAKE) | FrankieFlags::DEAD;
    engine.memory.write(record, flags);
    data.flags = flags;
    engine.sprites[slot].data = SpriteData::Frankie(data);
}

/// Living players that are in the room
fn targets(engine: &Engine) -> impl Iterator<Item = usize> + '_ {
    [1, 0].into_iter().filter_map(move |number| {
        if engine.memory.player_state(number) != PlayerState::ALIVE {
            return None;
        }
        engine.player_sprite[number]
    })
}

/// Whether a player passes the open side of the coffin
fn wakes(engine: &Engine, slot: usize, flags: u8) -> bool {
    let monster = engine.sprites[slot];

    targets(engine).any(|player| {
        let player = engine.sprites[player];
        if monster.y as i16 - player.y as i16 >= 4 {
            return false;
        }
        let behind = monster.x as i16 - player.x as i16 >= 0;
        behind == (flags & FrankieFlags::FACES_LEFT != 0)
    })
}

/// Pick a direction the floor allows, heading for the nearest player
fn choose_direction(engine: &Engine, slot: usize, floor: u8, current: u8) -> u8 {
    let mut count = 0;
    let mut last = 0;
    for direction in [6u8, 4, 2, 0] {
        if bit(engine, direction) & floor != 0 {
            count += 1;
            last = direction;
        }
    }

    if count == 1 {
        return last;
    }
    // A straight run keeps going
    if count == 2
        && bit(engine, last.wrapping_sub(4) & 7) & floor != 0
        && current & STANDING == 0
        && bit(engine, current) & floor != 0
    {
        return current;
    }

    // Distance to the closest player per direction: up, right, down, left
    let monster = engine.sprites[slot];
    let mut distance = [0xFFu8; 4];
    for player in targets(engine) {
        let player = engine.sprites[player];

        let dx = player.x.wrapping_sub(monster.x) as i8;
        let side = if dx < 0 { 3 } else { 1 };
        distance[side] = distance[side].min(dx.unsigned_abs());

        let dy = player.y.wrapping_sub(monster.y) as i8;
        let side = if dy < 0 { 0 } else { 2 };
        distance[side] = distance[side].min(dy.unsigned_abs());
    }

    // Longest distance first, falling back to shorter ones the floor allows
    let mut limit = 0xFF;
    loop {
        let mut best = 0;
        let mut choice = None;
        for side in (0..4).rev() {
            let d = distance[side];
            if d >= limit || d < best {
                continue;
            }
            best = d;
            choice = Some(side as u8);
        }

        let Some(side) = choice else {
            return STANDING;
        };
        if bit(engine, side << 1) & floor != 0 {
            return side << 1;
        }
        limit = best;
    }
}

pub struct Frankie;

impl SpriteBehavior for Frankie {
    fn execute(&self, engine: &mut Engine, slot: usize) {
        if release(engine, slot) {
            return;
        }
        take_created(engine, slot);

        let mut data = payload(engine, slot);
        let record = record_address(engine, data.record);

        if data.flags & FrankieFlags::AWAKE == 0 {
            if !wakes(engine, slot, data.flags) {
                return;
            }
            data.flags |= FrankieFlags::AWAKE;
            engine.memory.write(record, data.flags);
            data.direction = STANDING;
            engine.play_effect(Effect::FRANKIE);
            debug!("Frankenstein {:02X} wakes up", data.record);
        }

        trapdoor::step_switch(engine, &mut data.last_switch, &mut data.switch);

        let cell = engine.floor_cell(slot);
        let floor = engine.memory.read(cell.address) & data.floor_mask;
        data.floor_mask = 0xFF;

        data.direction = if floor == 0 {
            STANDING
        } else {
            choose_direction(engine, slot, floor, data.direction)
        };
        let direction = data.direction;
        engine.sprites[slot].data = SpriteData::Frankie(data);

        let sprite = &mut engine.sprites[slot];
        let mut moved = true;

        if direction & 2 != 0 {
            sprite.y = sprite.y.wrapping_sub(cell.sub_y);
            sprite.image = sprite.image.wrapping_add(1);
            if direction == 2 {
                sprite.x = sprite.x.wrapping_add(1);
                if !(RIGHT_FIRST..LEFT_FIRST).contains(&sprite.image) {
                    sprite.image = RIGHT_FIRST;
                }
            } else {
                sprite.x = sprite.x.wrapping_sub(1);
                if !(LEFT_FIRST..POLE).contains(&sprite.image) {
                    sprite.image = LEFT_FIRST;
                }
            }
        } else if direction & STANDING == 0 {
            sprite.x = sprite.x.wrapping_sub(cell.sub_x).wrapping_add(1);
            if engine.memory.read(cell.address) & 0x01 == 0 {
                sprite.image = POLE;
                sprite.y = sprite.y.wrapping_add(2);
            } else {
                sprite.y = if direction == 0 {
                    sprite.y.wrapping_sub(2)
                } else {
                    sprite.y.wrapping_add(2)
                };
                sprite.image = ((sprite.y & 0x06) >> 1) + LADDER_FIRST;
            }
        } else {
            moved = false;
        }

        if moved {
            engine.prepare_sprite(slot);
        }

        let sprite = engine.sprites[slot];
        engine.memory.write(record.wrapping_add(3), sprite.x);
        engine.memory.write(record.wrapping_add(4), sprite.y);
        engine.memory.write(record.wrapping_add(5), sprite.image);
        engine.memory.write(record.wrapping_add(6), direction);
    }

    fn object_collision(&self, engine: &mut Engine, slot: usize, object: usize) -> bool {
        let Some(target) = engine.objects.at(object).copied() else {
            return false;
        };
        let sprite = &engine.sprites[slot];
        let reach = sprite.x.wrapping_add(sprite.width).wrapping_sub(target.x) as i8;
        if reach >= 4 {
            return false;
        }

        match target.kind {
            ObjectKind::TRAPDOOR if trapdoor::is_open(engine, target.id) => {
                kill(engine, slot);
                true
            }
            ObjectKind::TRAPDOOR_SWITCH => {
                let mut data = payload(engine, slot);
                data.switch = target.id;
                engine.sprites[slot].data = SpriteData::Frankie(data);
                false
            }
            _ => false,
        }
    }

    fn hit(&self, engine: &mut Engine, slot: usize, other: usize) -> bool {
        let mut data = payload(engine, slot);
        if data.flags & FrankieFlags::AWAKE == 0 {
            return false;
        }

        let own = engine.sprites[slot];
        let target = engine.sprites[other];

        match target.kind {
            SpriteKind::PLAYER | SpriteKind::FORCEFIELD | SpriteKind::MUMMY => false,
            SpriteKind::FRANKIE => {
                // Two monsters block each other's way instead
                let climbing = |image: u8| (POLE..CLIMB_END).contains(&image);
                let walking = |image: u8| (RIGHT_FIRST..POLE).contains(&image);

                if climbing(own.image) {
                    if !climbing(target.image) || own.y == target.y {
                        return false;
                    }
                    data.floor_mask &= if own.y < target.y { 0xEF } else { 0xFE };
                } else {
                    if !walking(own.image) || !walking(target.image) {
                        return false;
                    }
                    data.floor_mask &= if own.x < target.x { 0xFB } else { 0xBF };
                }
                engine.sprites[slot].data = SpriteData::Frankie(data);
                false
            }
            _ => {
                kill(engine, slot);
                true
            }
        }
    }
}

/// Wake-up state or saved position of one monster
fn create(engine: &mut Engine, record: u16, offset: u8) -> Option<usize> {
    let flags = engine.memory.read(record);
    if flags & FrankieFlags::DEAD != 0 {
        return None;
    }
    let slot = engine.sprites.allocate()?;

    let mut data = FrankieData {
        record: offset,
        flags,
        direction: 0,
        floor_mask: 0xFF,
        last_switch: 0xFF,
        switch: 0xFF,
    };

    let sprite = &mut engine.sprites[slot];
    sprite.kind = SpriteKind::FRANKIE;
    if flags & FrankieFlags::AWAKE == 0 {
        sprite.x = engine.memory.read(record.wrapping_add(1));
        sprite.y = engine.memory.read(record.wrapping_add(2)).wrapping_add(7);
        sprite.image = IMAGE_ASLEEP;
    } else {
        sprite.x = engine.memory.read(record.wrapping_add(3));
        sprite.y = engine.memory.read(record.wrapping_add(4));
        sprite.image = engine.memory.read(record.wrapping_add(5));
        data.direction = engine.memory.read(record.wrapping_add(6));
    }
    sprite.width = 3;
    sprite.height = 0x11;
    sprite.countdown = 2;
    sprite.period = 2;
    sprite.data = SpriteData::Frankie(data);

    engine.prepare_sprite(slot);
    Some(slot)
}

/// Parse the Frankenstein records
pub fn load(engine: &mut Engine, mut ptr: u16) -> u16 {
    engine.room.frankies = ptr;
    let mut offset = 0u8;

    loop {
        let flags = engine.memory.read(ptr);
        let x = engine.memory.read(ptr.wrapping_add(1));
        let y = engine.memory.read(ptr.wrapping_add(2));
        let left = flags & FrankieFlags::FACES_LEFT != 0;

        // The coffin blocks the walkway on its closed side
        erase_image(&mut engine.memory, IMAGE_COFFIN_FLOOR, x, y.wrapping_add(0x18));
        let mut cell = engine.cell_address(x, y.wrapping_add(0x18));
        let blocked = if left {
            cell = cell.wrapping_sub(2);
            0x04
        } else {
            0x40
        };
        for n in [4u16, 2, 0] {
            engine.memory.clear_bits(cell.wrapping_add(n), blocked);
        }

        if let Some(coffin) = engine.objects.create(Object::new(ObjectKind::FRANKIE_COFFIN)) {
            let gfx = if left { IMAGE_COFFIN_LEFT } else { IMAGE_COFFIN_RIGHT };
            engine.draw_object(coffin, gfx, x, y);
        }
        if !left {
            draw_image(&mut engine.memory, IMAGE_FLOOR, x.wrapping_add(4), y.wrapping_add(0x18));
        }

        create(engine, ptr, offset);

        offset = offset.wrapping_add(RECORD_SIZE);
        ptr = ptr.wrapping_add(RECORD_SIZE as u16);

        if engine.memory.read(ptr) & FrankieFlags::LAST != 0 {
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

    fn engine_with_coffin(flags: u8) -> Engine {
        let mut engine = testing::engine();
        engine.room.doors = 0x9100;
        engine.memory.load(0x9000, &[flags, 0x40, 0x30, 0x50, 0x37, 0x84, 0x02, 0x80]);
        engine
    }

    fn add_player(engine: &mut Engine, x: u8, y: u8) -> usize {
        let slot = player::add(engine, 0).unwrap();
        engine.sprites[slot].x = x;
        engine.sprites[slot].y = y;
        slot
    }

    #[test]
    fn sleeping_monster_lies_in_the_coffin() {
        let mut engine = engine_with_coffin(0);
        assert_eq!(load(&mut engine, 0x9000), 0x9008);

        let coffin = engine.objects.at(0).unwrap();
        assert_eq!((coffin.kind, coffin.gfx), (ObjectKind::FRANKIE_COFFIN, IMAGE_COFFIN_RIGHT));
        let monster = engine.sprites[0];
        assert_eq!((monster.x, monster.y, monster.image), (0x40, 0x37, IMAGE_ASLEEP));
        assert_eq!(monster.period, 2);
    }

    #[test]
    fn awake_monster_resumes_from_the_record() {
        let mut engine = engine_with_coffin(FrankieFlags::AWAKE);
        load(&mut engine, 0x9000);

        let monster = engine.sprites[0];
        assert_eq!((monster.x, monster.y, monster.image), (0x50, 0x37, 0x84));
        assert_eq!(payload(&engine, 0).direction, 2);
    }

    #[test]
    fn dead_monster_stays_dead() {
        let mut engine = engine_with_coffin(FrankieFlags::DEAD);
        load(&mut engine, 0x9000);
        assert_eq!(engine.sprites.live_count(), 0);
        assert_eq!(engine.objects.len(), 1);
    }

    #[test]
    fn wakes_for_a_player_on_the_open_side() {
        let mut engine = engine_with_coffin(0);
        load(&mut engine, 0x9000);

        // Behind a right facing coffin: keeps sleeping
        let player = add_player(&mut engine, 0x30, 0x37);
        Frankie.execute(&mut engine, 0);
        assert_eq!(engine.memory.read(0x9000) & FrankieFlags::AWAKE, 0);

        engine.sprites[player].x = 0x60;
        Frankie.execute(&mut engine, 0);
        assert!(engine.memory.read(0x9000) & FrankieFlags::AWAKE != 0);
        assert_eq!(engine.memory.read(0x9006), STANDING);
    }

    #[test]
    fn walks_towards_the_player() {
        let mut engine = engine_with_coffin(FrankieFlags::AWAKE);
        load(&mut engine, 0x9000);
        add_player(&mut engine, 0x70, 0x37);
        engine.sprites[0].state = 0;

        // Walkway leading right and left
        let cell = engine.floor_cell(0).address;
        engine.memory.write(cell, 0x44);
        Frankie.execute(&mut engine, 0);

        assert_eq!(engine.sprites[0].x, 0x51);
        assert_eq!(engine.sprites[0].image, 0x85);
        assert_eq!(engine.memory.slice(0x9003, 4), &[0x51, 0x37, 0x85, 0x02]);
    }

    #[test]
    fn open_trapdoor_kills() {
        let mut engine = engine_with_coffin(FrankieFlags::AWAKE);
        load(&mut engine, 0x9000);
        engine.room.trapdoors = 0x9200;
        engine.memory.write(0x9200, trapdoor::OPEN);
        let pit = engine
            .objects
            .create(Object { x: 0x52, ..Object::new(ObjectKind::TRAPDOOR) })
            .unwrap();

        assert!(Frankie.object_collision(&mut engine, 0, pit));
        assert_eq!(engine.memory.read(0x9000), FrankieFlags::DEAD);
    }

    #[test]
    fn lasers_kill_but_players_do_not() {
        let mut engine = engine_with_coffin(FrankieFlags::AWAKE);
        load(&mut engine, 0x9000);
        let other = engine.sprites.allocate().unwrap();

        engine.sprites[other].kind = SpriteKind::PLAYER;
        assert!(!Frankie.hit(&mut engine, 0, other));

        engine.sprites[other].kind = SpriteKind::LASER;
        assert!(Frankie.hit(&mut engine, 0, other));
        assert!(engine.memory.read(0x9000) & FrankieFlags::DEAD != 0);
        assert!(!engine.sprites[0].has(SpriteState::DESTROY));
    }

    #[test]
    fn monsters_block_each_other() {
        let mut engine = engine_with_coffin(FrankieFlags::AWAKE);
        load(&mut engine, 0x9000);
        let other = engine.sprites.allocate().unwrap();
        engine.sprites[other].kind = SpriteKind::FRANKIE;
        engine.sprites[other].image = LEFT_FIRST;
        engine.sprites[other].x = 0x60;

        assert!(!Frankie.hit(&mut engine, 0, other));
        assert_eq!(payload(&engine, 0).floor_mask, 0xFB);
    }
}
