//! Per-tick scheduler
//!
//! The engine owns the shared memory region, both registries and the
//! hardware sprite registers, and advances them one tick at a time:
//!
//! 1. fold the overlap report of the last rendered frame into sprite state
//! 2. sprite pass, slot order: re-tests, execute hooks, blinking, then the
//!    hardware sprite position and visibility
//! 3. object pass, table order: execute hooks, removal of picked objects
//! 4. tick counter
//!
//! Everything runs on the caller's thread; hooks receive the engine by
//! exclusive reference and see the writes of earlier slots in the same pass.

use log::{error, trace};
use serde::{Deserialize, Serialize};

use crate::audio::SoundBoard;
use crate::collision::Overlap;
use crate::controller::Controller;
use crate::draw::{screen_draw, DrawMode, TextPosition};
use crate::kinds::{object_behavior, sprite_entry, SpriteEntry};
use crate::memory::{Memory, BIT_TABLE, SPRITE_DATA};
use crate::object::{ObjectFlags, ObjectRegistry};
use crate::rng::SeedRng;
use crate::sprite::{ImageFlags, SpriteRegistry, SpriteState, MAX_SPRITES};

/// Tick counter value at power on
const INITIAL_TICKS: u8 = 0xA0;

/// Pitch of the blink effect
const BLINK_PITCH: u16 = 0x760C;

/// Blank rows used to pad hardware sprite data
const BLANK_ROWS: u16 = 0x5E89;

/// Hardware sprite data rows and bytes per row
const SPRITE_ROWS: u8 = 0x15;
const SPRITE_ROW_BYTES: u8 = 3;

/// Effect ids
pub struct Effect;

impl Effect {
    pub const LASER: u8 = 0x00;
    pub const TRAPDOOR: u8 = 0x01;
    pub const FORCEFIELD: u8 = 0x02;
    pub const DOOR: u8 = 0x03;
    pub const TELEPORT: u8 = 0x04;
    pub const TELEPORT_CHANGE: u8 = 0x05;
    pub const SWITCH: u8 = 0x06;
    pub const FRANKIE: u8 = 0x07;
    pub const BLINK: u8 = 0x08;
    pub const CONVEYOR: u8 = 0x0A;
    pub const MUMMY: u8 = 0x0B;
    pub const KEY: u8 = 0x0C;
}

/// One hardware sprite's registers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSprite {
    pub enabled: bool,

    /// Screen position in hardware coordinates
    pub x: i16,
    pub y: u8,

    pub color: u8,
    pub double_width: bool,
    pub double_height: bool,

    /// Drawn behind the bitmap foreground
    pub behind: bool,
    pub multicolor: bool,

    /// Data pointer, in units of 64 bytes from `SPRITE_DATA`
    pub pointer: u8,
}

/// Start of each kind's records in the current room's object stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPointers {
    pub doors: u16,
    pub lightning: u16,
    pub mummies: u16,
    pub keys: u16,
    pub rayguns: u16,
    pub trapdoors: u16,
    pub conveyors: u16,
    pub frankies: u16,
}

/// The geometry cell under a sprite's feet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FloorCell {
    /// Address in the geometry map
    pub address: u16,

    /// Position within the cell
    pub sub_x: u8,
    pub sub_y: u8,
}

/// Where a sprite goes next within one pass
#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Action,
    Flash,
}

/// The room simulation
pub struct Engine {
    /// Shared state region
    pub memory: Memory,

    pub sprites: SpriteRegistry,
    pub objects: ObjectRegistry,

    /// Hardware sprite registers, one per sprite slot
    pub hardware: [HardwareSprite; MAX_SPRITES],

    /// Ninth X bit register
    pub sprite_x_msb: u8,

    /// Tick counter, wraps
    pub ticks: u8,

    /// Ticks since the engine was created
    pub frame: u32,

    pub rng: SeedRng,

    pub controllers: [Controller; 2],

    pub sound: SoundBoard,

    /// Record pointers of the current room
    pub room: RoomPointers,

    /// Sprite slot of each player present in the room
    pub player_sprite: [Option<usize>; 2],

    /// Playing time in ticks per player
    pub player_time: [u32; 2],

    /// Tick at which each player's clock was last started
    pub(crate) clock_start: [u32; 2],

    /// Vertical distance to the nearest player, shared by every ray gun
    pub(crate) raygun_nearest: u8,

    /// Character ROM used by the string renderer
    pub char_rom: Vec<u8>,
}

impl Engine {
    /// Create an engine around a prepared memory image
    pub fn new(memory: Memory, char_rom: Vec<u8>) -> Self {
        let mut hardware = [HardwareSprite::default(); MAX_SPRITES];
        for (n, sprite) in hardware.iter_mut().enumerate() {
            sprite.pointer = 0x20 + n as u8;
        }

        Engine {
            memory,
            sprites: SpriteRegistry::new(),
            objects: ObjectRegistry::new(),
            hardware,
            sprite_x_msb: 0,
            ticks: INITIAL_TICKS,
            frame: 0,
            rng: SeedRng::new(),
            controllers: [Controller::new(); 2],
            sound: SoundBoard::new(),
            room: RoomPointers::default(),
            player_sprite: [None; 2],
            player_time: [0; 2],
            clock_start: [0; 2],
            raygun_nearest: 0,
            char_rom,
        }
    }

    /// Advance the room by one tick
    ///
    /// `overlaps` is the overlap report of the frame rendered since the
    /// previous tick.
    pub fn tick(&mut self, overlaps: &[Overlap]) {
        self.collect_overlaps(overlaps);
        self.sprite_pass();
        self.object_pass();

        self.ticks = self.ticks.wrapping_add(1);
        self.frame = self.frame.wrapping_add(1);

        self.sound.tick(&self.memory);
        trace!("Tick {:02X}: {} sprites, {} objects", self.ticks, self.sprites.live_count(), self.objects.len());
    }

    fn sprite_pass(&mut self) {
        for slot in 0..MAX_SPRITES {
            if self.sprites[slot].is_free() {
                continue;
            }

            let Some(mut step) = self.first_step(slot) else {
                continue;
            };

            loop {
                match step {
                    Step::Action => {
                        self.execute_sprite(slot);
                        if self.sprites[slot].has(SpriteState::FLASH) {
                            self.flash_on_off(slot);
                        }
                    }
                    Step::Flash => self.flash_on_off(slot),
                }

                if !self.sprites[slot].has(SpriteState::DESTROY) {
                    break;
                }
                step = Step::Action;
            }

            self.update_hardware(slot);
        }
    }

    /// Countdown and re-tests; `None` when the sprite sits this tick out
    fn first_step(&mut self, slot: usize) -> Option<Step> {
        let state = self.sprites[slot].state;

        if state & SpriteState::DESTROY != 0 {
            return Some(Step::Action);
        }
        if state & SpriteState::FLASH != 0 {
            return Some(Step::Flash);
        }

        let sprite = &mut self.sprites[slot];
        sprite.countdown = sprite.countdown.wrapping_sub(1);

        if sprite.countdown != 0 {
            if state & SpriteState::COLLIDES == 0 {
                return None;
            }
            self.sprite_check(slot);
            return self.sprites[slot].has(SpriteState::FLASH).then_some(Step::Flash);
        }

        if state & SpriteState::DYING != 0 {
            return Some(Step::Flash);
        }

        if state & SpriteState::OVERLAPS != 0 {
            self.object_check(slot);
            if self.sprites[slot].has(SpriteState::FLASH) {
                return Some(Step::Flash);
            }
        }

        if self.sprites[slot].has(SpriteState::COLLIDES) {
            self.sprite_check(slot);
            if self.sprites[slot].has(SpriteState::FLASH) {
                return Some(Step::Flash);
            }
        }

        Some(Step::Action)
    }

    /// Run a sprite's execute hook
    fn execute_sprite(&mut self, slot: usize) {
        match sprite_entry(self.sprites[slot].kind) {
            Some(entry) => entry.behavior.execute(self, slot),
            None => {
                let sprite = &mut self.sprites[slot];
                error!("Sprite {} has unmapped kind {:02X}, releasing", slot, sprite.kind);
                sprite.state = (sprite.state & !SpriteState::DESTROY) | SpriteState::ACTION_FREE;
            }
        }
    }

    /// Hit data of a sprite's kind
    pub(crate) fn hit_data(&self, slot: usize) -> u8 {
        sprite_entry(self.sprites[slot].kind).map_or(SpriteEntry::HIT_NEVER, |e| e.hit_data)
    }

    /// Start, continue or finish the dying blink
    fn flash_on_off(&mut self, slot: usize) {
        let kind = self.sprites[slot].kind;
        let sprite = &mut self.sprites[slot];

        if sprite.has(SpriteState::FLASH) {
            sprite.state ^= SpriteState::FLASH;

            let flash_data = sprite_entry(kind).map_or(0, |e| e.flash_data);
            if flash_data & SpriteEntry::FLASH_BLINK == 0 {
                sprite.state |= SpriteState::DESTROY;
                return;
            }

            sprite.flash_count = 8;
            sprite.state |= SpriteState::DYING;
            sprite.period = 1;
            self.hardware[slot].multicolor = false;
        } else if sprite.flash_count == 0 {
            sprite.state = (sprite.state ^ SpriteState::DYING) | SpriteState::DESTROY;
            return;
        }

        if self.ticks & 1 == 0 {
            self.hardware[slot].color = 1;

            let sprite = &mut self.sprites[slot];
            sprite.flash_count = sprite.flash_count.wrapping_sub(1);
            let pitch = sprite.flash_count << 3;
            self.memory.write(BLINK_PITCH, pitch);
            self.play_effect(Effect::BLINK);
        } else {
            self.hardware[slot].color = 0;
        }

        let sprite = &mut self.sprites[slot];
        sprite.countdown = sprite.period;
    }

    /// Release a finished slot, or place its hardware sprite
    fn update_hardware(&mut self, slot: usize) {
        let bit = self.memory.read(BIT_TABLE + slot as u16);
        let sprite = &mut self.sprites[slot];

        if sprite.has(SpriteState::ACTION_FREE) {
            sprite.state = SpriteState::FREE;
            sprite.countdown = sprite.period;
            self.hardware[slot].enabled = false;
            return;
        }

        let doubled = (sprite.x as u16) << 1;
        let mut high = (doubled >> 8) as u8;
        let x = doubled.wrapping_sub(8);
        if doubled >= 0x100 && x < 0x100 {
            high = high.wrapping_sub(1);
        }

        let hardware = &mut self.hardware[slot];
        hardware.x = doubled as i16 - 8;

        if high & 0x80 != 0 {
            hardware.enabled = false;
        } else {
            // Only the first sprite's ninth bit is ever cleared
            self.sprite_x_msb = if high != 0 {
                self.sprite_x_msb | bit
            } else {
                self.sprite_x_msb & !self.memory.read(BIT_TABLE)
            };

            if self.sprite_x_msb & bit != 0 && (x as u8) >= 0x58 && high != 0 {
                hardware.enabled = false;
            } else {
                hardware.y = sprite.y.wrapping_add(0x32);
                hardware.enabled = true;
            }
        }

        sprite.countdown = sprite.period;
    }

    fn object_pass(&mut self) {
        let mut position = 0;

        while position < self.objects.len() {
            let Some(object) = self.objects.at(position).copied() else {
                break;
            };

            if object.has(ObjectFlags::EXECUTE) {
                match object_behavior(object.kind) {
                    Some(behavior) => behavior.execute(self, position),
                    None => error!("Object {} has unmapped kind {:02X}", position, object.kind),
                }
            }

            let picked = self
                .objects
                .at(position)
                .is_some_and(|o| o.has(ObjectFlags::PICKED));

            if picked {
                self.disable_object(position);
                self.objects.remove_at(position);
                if position == self.objects.len() {
                    break;
                }
            }

            position += 1;
        }
    }

    /// Load a sprite's current image into its hardware sprite
    ///
    /// Also derives the collision box and the colour and display flags from
    /// the image header. The data is written to the idle half of the double
    /// buffer, then the pointer is flipped.
    pub fn prepare_sprite(&mut self, slot: usize) {
        let header = self.memory.image_address(self.sprites[slot].image);
        let width = self.memory.read(header);
        let height = self.memory.read(header.wrapping_add(1));
        let flags = self.memory.read(header.wrapping_add(2));

        let mut collision_width = width << 2;
        let mut collision_height = height;

        let pointer = self.hardware[slot].pointer ^ 8;
        let mut dest = SPRITE_DATA.wrapping_add((pointer as u16) << 6);
        let mut source = header.wrapping_add(3);

        for row in 1..=SPRITE_ROWS {
            for column in 0..SPRITE_ROW_BYTES {
                let value = if column < width {
                    self.memory.read(source.wrapping_add(column as u16))
                } else {
                    0
                };
                self.memory.write(dest.wrapping_add(column as u16), value);
            }

            if row == SPRITE_ROWS {
                break;
            }

            source = if row < height {
                source.wrapping_add(width as u16)
            } else {
                BLANK_ROWS
            };
            dest = dest.wrapping_add(SPRITE_ROW_BYTES as u16);
        }

        if flags & ImageFlags::DOUBLE_WIDTH != 0 {
            collision_width <<= 1;
        }
        if flags & ImageFlags::DOUBLE_HEIGHT != 0 {
            collision_height <<= 1;
        }

        let hardware = &mut self.hardware[slot];
        hardware.pointer = pointer;
        hardware.color = flags & ImageFlags::COLOR;
        hardware.double_width = flags & ImageFlags::DOUBLE_WIDTH != 0;
        hardware.double_height = flags & ImageFlags::DOUBLE_HEIGHT != 0;
        hardware.behind = flags & ImageFlags::PRIORITY == 0;
        hardware.multicolor = flags & ImageFlags::HIRES == 0;

        let sprite = &mut self.sprites[slot];
        sprite.image_flags = flags;
        sprite.collision_width = collision_width;
        sprite.collision_height = collision_height;
    }

    /// Geometry map address of the cell containing a position
    pub fn cell_address(&self, x: u8, y: u8) -> u16 {
        let column = (x >> 2).wrapping_sub(4);
        let row = y >> 3;
        Self::geometry_address(&self.memory, column, row)
    }

    fn geometry_address(memory: &Memory, column: u8, row: u8) -> u16 {
        let offset = memory.char_row_offset(row) << 1;
        0xC000u16
            .wrapping_add(offset)
            .wrapping_add((column << 1) as u16)
    }

    /// Geometry cell under a sprite's feet
    pub fn floor_cell(&self, slot: usize) -> FloorCell {
        let sprite = &self.sprites[slot];

        let right = sprite.x.wrapping_add(sprite.width);
        let bottom = sprite.y.wrapping_add(sprite.height);

        FloorCell {
            address: Self::geometry_address(&self.memory, (right >> 2).wrapping_sub(4), bottom >> 3),
            sub_x: right & 3,
            sub_y: bottom & 7,
        }
    }

    /// Draw a new image for an object, erasing its previous one
    ///
    /// A disabled object is just drawn; either way it ends up enabled at the
    /// new position with its size taken from the image.
    pub fn draw_object(&mut self, object: usize, gfx: u8, x: u8, y: u8) {
        let Some(current) = self.objects.at(object).copied() else {
            return;
        };

        let size = if current.has(ObjectFlags::DISABLE) {
            screen_draw(&mut self.memory, DrawMode::Graphics, gfx, x, y, TextPosition::default())
        } else {
            let previous = TextPosition::new(current.x, current.y, current.gfx);
            screen_draw(&mut self.memory, DrawMode::Combined, gfx, x, y, previous)
        };

        if let Some(o) = self.objects.at_mut(object) {
            o.flags &= !ObjectFlags::DISABLE;
            o.gfx = gfx;
            o.x = x;
            o.y = y;
            o.width = size.width << 2;
            o.height = size.height;
        }
    }

    /// Erase an object and take it out of collision tests
    pub fn disable_object(&mut self, object: usize) {
        let Some(current) = self.objects.at(object).copied() else {
            return;
        };

        if !current.has(ObjectFlags::DISABLE) {
            screen_draw(
                &mut self.memory,
                DrawMode::Text,
                0,
                0,
                0,
                TextPosition::new(current.x, current.y, current.gfx),
            );
            if let Some(o) = self.objects.at_mut(object) {
                o.flags |= ObjectFlags::DISABLE;
            }
        }
    }

    /// Request a sound effect
    pub fn play_effect(&mut self, effect: u8) {
        self.sound.play_effect(&mut self.memory, effect);
    }

    /// Direction and fire button of a player's joystick
    pub fn joystick(&self, player: usize) -> (u8, bool) {
        self.controllers[player & 1].read(&self.memory)
    }

    /// Set flag bits on an object
    pub(crate) fn set_object_flags(&mut self, object: usize, bits: u8) {
        if let Some(o) = self.objects.at_mut(object) {
            o.flags |= bits;
        }
    }

    /// Clear flag bits on an object
    pub(crate) fn clear_object_flags(&mut self, object: usize, bits: u8) {
        if let Some(o) = self.objects.at_mut(object) {
            o.flags &= !bits;
        }
    }

    /// Free every sprite and hide the hardware sprites
    pub fn clear_sprites(&mut self) {
        self.sprites.clear();
        for hardware in self.hardware.iter_mut() {
            hardware.enabled = false;
        }
        self.player_sprite = [None; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::IMAGE_TABLE;
    use crate::sprite::{Sprite, SpriteKind};

    fn engine() -> Engine {
        let mut memory = Memory::new();
        for n in 0..8u16 {
            memory.write(BIT_TABLE + n, 1 << n);
        }
        Engine::new(memory, Vec::new())
    }

    fn install_image(engine: &mut Engine, id: u8, width: u8, height: u8, flags: u8) {
        let addr = 0x3000 + (id as u16) * 0x40;
        engine.memory.write_word(IMAGE_TABLE + (id as u16) * 2, addr);
        engine.memory.write(addr, width);
        engine.memory.write(addr + 1, height);
        engine.memory.write(addr + 2, flags);
        for n in 0..(width as u16 * height as u16) {
            engine.memory.write(addr + 3 + n, 0xFF);
        }
    }

    #[test]
    fn tick_counter_starts_at_a0_and_wraps() {
        let mut engine = engine();
        assert_eq!(engine.ticks, 0xA0);
        for _ in 0..0x60 {
            engine.tick(&[]);
        }
        assert_eq!(engine.ticks, 0);
    }

    #[test]
    fn prepare_derives_box_and_flips_pointer() {
        let mut engine = engine();
        install_image(&mut engine, 4, 2, 10, ImageFlags::DOUBLE_WIDTH | 0x07);
        engine.sprites.allocate();
        engine.sprites[0].image = 4;

        engine.prepare_sprite(0);

        assert_eq!(engine.sprites[0].collision_width, 16);
        assert_eq!(engine.sprites[0].collision_height, 10);
        assert_eq!(engine.hardware[0].pointer, 0x28);
        assert_eq!(engine.hardware[0].color, 7);
        assert!(engine.hardware[0].double_width);
        assert!(engine.hardware[0].multicolor);
        assert!(engine.hardware[0].behind);

        // Two image bytes then padding on each row, blank after the image
        let data = SPRITE_DATA + (0x28 << 6);
        assert_eq!(engine.memory.slice(data, 3), &[0xFF, 0xFF, 0]);
        assert_eq!(engine.memory.slice(data + 3 * 10, 3), &[0, 0, 0]);
    }

    #[test]
    fn hardware_position_follows_sprite() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.sprites[0] = Sprite {
            kind: SpriteKind::FORCEFIELD,
            state: 0,
            countdown: 5,
            period: 5,
            x: 0x40,
            y: 0x20,
            ..Sprite::free()
        };

        engine.update_hardware(0);

        assert!(engine.hardware[0].enabled);
        assert_eq!(engine.hardware[0].x, 0x78);
        assert_eq!(engine.hardware[0].y, 0x52);
        assert_eq!(engine.sprites[0].countdown, 5);
    }

    #[test]
    fn action_free_releases_slot() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.hardware[0].enabled = true;
        engine.sprites[0].state = SpriteState::ACTION_FREE;

        engine.update_hardware(0);

        assert!(engine.sprites[0].is_free());
        assert!(!engine.hardware[0].enabled);
    }

    #[test]
    fn floor_cell_of_sprite_feet() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.sprites[0].x = 0x2D;
        engine.sprites[0].width = 3;
        engine.sprites[0].y = 0x20;
        engine.sprites[0].height = 0x11;

        let cell = engine.floor_cell(0);

        // right edge 0x30: column 8, row 0x31 >> 3 = 6
        assert_eq!(cell.sub_x, 0);
        assert_eq!(cell.sub_y, 1);
        assert_eq!(cell.address, 0xC000 + 6 * 0x50 + 8 * 2);
        assert_eq!(engine.cell_address(0x30, 0x31), cell.address);
    }

    #[test]
    fn non_blinking_flash_destroys_at_once() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.sprites[0].kind = SpriteKind::LASER;
        engine.sprites[0].state = SpriteState::FLASH;

        engine.flash_on_off(0);

        assert_eq!(engine.sprites[0].state, SpriteState::DESTROY);
    }

    #[test]
    fn blinking_flash_counts_down_then_destroys() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.sprites[0].kind = SpriteKind::MUMMY;
        engine.sprites[0].state = SpriteState::FLASH;
        engine.ticks = 0;

        engine.flash_on_off(0);
        assert!(engine.sprites[0].has(SpriteState::DYING));
        assert_eq!(engine.sprites[0].flash_count, 7);
        assert_eq!(engine.sprites[0].period, 1);
        assert_eq!(engine.hardware[0].color, 1);

        engine.sprites[0].flash_count = 0;
        engine.flash_on_off(0);
        assert!(!engine.sprites[0].has(SpriteState::DYING));
        assert!(engine.sprites[0].has(SpriteState::DESTROY));
    }

    #[test]
    fn unmapped_sprite_kind_is_released() {
        let mut engine = engine();
        engine.sprites.allocate();
        engine.sprites[0].kind = 0x09;

        engine.tick(&[]);

        assert!(engine.sprites[0].is_free());
    }
}
