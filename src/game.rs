//! Game flow and desktop front end
//!
//! `Game` drives the castle: it starts a new game (or resumes a saved
//! position), picks which players share the next room, runs the room until
//! nobody is alive or walking through a door, then settles deaths, lives and
//! escapes before moving on. Everything is stepped one engine tick at a time
//! so the flow can be tested without a window.
//!
//! `Game::run` wraps the same stepping in an SDL2 window with keyboard
//! joysticks, audio and frame pacing.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use sdl2::{event::Event, keyboard::Keycode, pixels::PixelFormatEnum, render::TextureCreator, video::WindowContext};
use thiserror::Error;

use crate::audio::AudioSystem;
use crate::castle::PlayerState;
use crate::collision::Overlap;
use crate::controller::{Controller, Hotkeys};
use crate::draw::{draw_image, print_strings};
use crate::engine::Engine;
use crate::kinds::player;
use crate::memory::{Memory, CASTLE_IMAGE, CASTLE_STATE};
use crate::persistence::{install_castle, install_game_data, DiskStore, Persistence, PersistenceError};
use crate::room::RoomError;
use crate::savestate::{Position, SaveState, SaveStateError};
use crate::sprite::SpriteState;
use crate::util::timer_to_time;
use crate::video::{Renderer, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Ticks the room keeps running once everybody has left or died
const LEAVING_TICKS: u8 = 0x1E;

/// Ticks a message screen stays up
const HOLD_TICKS: u16 = 0x69;

/// Largest castle image a new game copies
const MAX_CASTLE_SIZE: u16 = 0x2000;

/// "Game Over" and the two "For Player" lines
const GAME_OVER_STRINGS: u16 = 0x0F64;
const PLAYER_OVER_STRINGS: [u16; 2] = [0x0F72, 0x0F83];

/// "Player N Escapes", with the digit patched in
const ESCAPE_STRINGS: u16 = 0x1AB3;
const ESCAPE_DIGIT: u16 = 0x1ABE;

/// Elapsed time image, its pixel rows and the digit font it is built from
const TIME_IMAGE: u8 = 0x93;
const TIME_PIXELS: u16 = 0x736C;
const DIGIT_FONT: u16 = 0x2A1B;
const TIME_X: u8 = 0x68;
const TIME_Y: u8 = 0x18;

/// Default scale factor for the display window
pub const SCALE_FACTOR: u32 = 3;

/// Audio sample rate
const SAMPLE_RATE: u32 = 44100;

/// Display frames per engine tick
const FRAMES_PER_TICK: u32 = 2;

/// Errors raised while setting up or advancing a game
#[derive(Error, Debug)]
pub enum GameError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    SaveState(#[from] SaveStateError),

    #[error("Castle image size {0:#06X} is invalid")]
    InvalidCastle(u16),
}

/// Display refresh the front end paces to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// 50 Hz
    Pal,
    /// 60 Hz
    Ntsc,
}

impl Pacing {
    fn frame_time(self) -> Duration {
        match self {
            Pacing::Pal => Duration::from_nanos(20_000_000),
            Pacing::Ntsc => Duration::from_nanos(16_666_667),
        }
    }
}

/// Settings for one game session
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Directory holding OBJECT, char.rom, castles and saved positions
    pub data_dir: PathBuf,

    /// Castle to play, with or without its `Z` prefix
    pub castle: String,

    /// Saved position to resume instead of starting fresh
    pub position: Option<String>,

    /// 1 or 2
    pub players: u8,

    /// Deaths never cost a life
    pub unlimited_lives: bool,

    pub scale: u32,
    pub pacing: Pacing,

    /// Effect volume, 0.0 - 1.0
    pub volume: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            data_dir: PathBuf::from("data"),
            castle: String::from("Tutorial"),
            position: None,
            players: 1,
            unlimited_lives: false,
            scale: SCALE_FACTOR,
            pacing: Pacing::Pal,
            volume: 0.25,
        }
    }
}

/// Where the game flow is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// A room is running
    Room,
    /// The room winds down for the given number of ticks
    Leaving(u8),
    /// A message screen is up for the given number of ticks
    Hold(u16),
    /// Nobody is active any more
    Finished,
}

/// Message screens queued after a room
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Screen {
    Escape(usize),
    GameOver,
}

/// A castle being played
pub struct Game<S: Persistence = DiskStore> {
    pub engine: Engine,
    store: S,
    config: GameConfig,
    phase: Phase,

    /// Players taking part in the current room
    present: [bool; 2],

    screens: VecDeque<Screen>,

    hotkeys: Hotkeys,
    running: bool,
    paused: bool,
}

impl<S: Persistence> Game<S> {
    /// Load game data and the castle from a store and enter the first room
    pub fn new(store: S, config: GameConfig) -> Result<Self, GameError> {
        let mut memory = Memory::new();
        install_game_data(&mut memory, &store.load_game_data()?);
        memory.build_tables();
        install_castle(&mut memory, &store.load_castle(&config.castle)?);

        let char_rom = store.load_char_rom()?;
        let restored = match &config.position {
            Some(name) => {
                Position::from_bytes(&store.load_position(name)?)?.restore(&mut memory)?;
                info!("Resuming position {}", name);
                true
            }
            None => false,
        };

        let mut game = Game {
            engine: Engine::new(memory, char_rom),
            store,
            config,
            phase: Phase::Finished,
            present: [false; 2],
            screens: VecDeque::new(),
            hotkeys: Hotkeys::new(),
            running: false,
            paused: false,
        };
        game.start(restored)?;
        Ok(game)
    }

    /// Set up the castle block and enter the first room
    fn start(&mut self, restored: bool) -> Result<(), GameError> {
        let memory = &mut self.engine.memory;

        if !restored {
            let size = memory.read_word(CASTLE_IMAGE);
            if size < 2 || size > MAX_CASTLE_SIZE {
                return Err(GameError::InvalidCastle(size));
            }
            memory.copy_within(CASTLE_IMAGE, CASTLE_STATE, size as usize);

            let two_players = self.config.players >= 2;
            memory.set_joystick_select(two_players as u8);
            memory.clear_timers();

            for p in 0..2 {
                memory.set_escaped(p, false);
                memory.set_current_room(p, memory.start_room(p));
                memory.set_current_door(p, memory.start_door(p));
            }
            memory.set_last_alive(0);
            memory.set_player_active(0, true);

            if two_players {
                memory.set_player_active(1, true);
            } else {
                memory.set_player_active(1, false);
                memory.set_player_state(1, PlayerState::ABSENT);
            }
            info!("New game: {} player(s), {} lives", self.config.players.clamp(1, 2), memory.lives(0));
        }

        for p in 0..2 {
            let timer = Memory::timer_address(p);
            let bytes = [1, 2, 3].map(|n| self.engine.memory.read(timer + n));
            self.engine.player_time[p] = timer_to_time(bytes);
        }

        self.next_room()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Players taking part in the current room
    pub fn present(&self) -> [bool; 2] {
        self.present
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Advance by one tick
    ///
    /// `overlaps` is the overlap report of the frames drawn since the last
    /// tick; it is ignored while a message screen is up.
    pub fn step(&mut self, overlaps: &[Overlap]) -> Result<Phase, GameError> {
        match self.phase {
            Phase::Room => {
                self.engine.tick(overlaps);
                if !self.room_running() {
                    debug!("Room {:02X} finished", self.engine.memory.current_room(self.first_present()));
                    self.phase = Phase::Leaving(LEAVING_TICKS);
                }
            }
            Phase::Leaving(ticks) => {
                self.engine.tick(overlaps);
                if ticks > 1 {
                    self.phase = Phase::Leaving(ticks - 1);
                } else {
                    self.settle_room();
                    self.next_screen()?;
                }
            }
            Phase::Hold(ticks) => {
                if ticks > 1 {
                    self.phase = Phase::Hold(ticks - 1);
                } else {
                    self.next_screen()?;
                }
            }
            Phase::Finished => {}
        }
        Ok(self.phase)
    }

    /// Kill every living player, as the restore key does
    pub fn restore(&mut self) {
        if self.phase != Phase::Room {
            return;
        }

        for p in (0..2).rev() {
            if self.engine.memory.player_state(p) != PlayerState::ALIVE {
                continue;
            }
            self.engine.memory.set_player_state(p, PlayerState::DYING);
            if let Some(slot) = self.engine.player_sprite[p] {
                self.engine.sprites[slot].state |= SpriteState::FLASH;
            }
            info!("Player {} restored", p + 1);
        }
    }

    /// Keep the room going while a player is alive or passing a door
    fn room_running(&mut self) -> bool {
        let memory = &mut self.engine.memory;

        if memory.player_state(0) == PlayerState::ALIVE {
            memory.set_last_alive(0);
            return true;
        }
        if memory.player_state(1) == PlayerState::ALIVE {
            memory.set_last_alive(1);
            return true;
        }

        (0..2).any(|p| matches!(memory.player_state(p), PlayerState::WALKING_OUT | PlayerState::ENTERING))
    }

    /// Pick the players for the next room and load it
    fn next_room(&mut self) -> Result<(), GameError> {
        let memory = &self.engine.memory;
        let active = [memory.player_active(0), memory.player_active(1)];

        self.present = match active {
            [false, false] => {
                info!("Game finished");
                self.phase = Phase::Finished;
                return Ok(());
            }
            [true, true] if memory.current_room(0) == memory.current_room(1) => [true, true],
            [true, true] => {
                let waiting = memory.last_alive() & 1;
                let mut present = [true; 2];
                present[waiting] = false;
                present
            }
            _ => active,
        };

        let room = self.engine.memory.current_room(self.first_present());
        info!("Entering room {:02X} with players {:?}", room, self.present);
        self.engine.load_room(room)?;

        for p in 0..2 {
            if self.present[p] && player::add(&mut self.engine, p).is_none() {
                warn!("No sprite slot for player {}", p + 1);
            }
        }

        self.phase = Phase::Room;
        Ok(())
    }

    fn first_present(&self) -> usize {
        if self.present[0] {
            0
        } else {
            1
        }
    }

    /// Settle deaths and escapes of the players that were in the room
    fn settle_room(&mut self) {
        self.engine.memory.clear_screen();
        self.engine.clear_sprites();
        self.engine.objects.clear();

        let mut game_over = false;
        for p in 0..2 {
            if !self.present[p] {
                continue;
            }

            let memory = &mut self.engine.memory;
            if memory.player_state(p) != PlayerState::DYING {
                if !memory.escaped(p) {
                    continue;
                }
                info!("Player {} escaped", p + 1);
                self.screens.push_back(Screen::Escape(p));
                memory.set_player_active(p, false);
                game_over = true;
                continue;
            }

            if !self.config.unlimited_lives {
                let lives = memory.lives(p).wrapping_sub(1);
                memory.set_lives(p, lives);
                info!("Player {} died, {} lives left", p + 1, lives);
                if lives == 0 {
                    memory.set_player_active(p, false);
                    game_over = true;
                    continue;
                }
            }
            memory.set_current_room(p, memory.start_room(p));
            memory.set_current_door(p, memory.start_door(p));
        }

        if game_over {
            self.screens.push_back(Screen::GameOver);
        }
    }

    /// Show the next queued message, or move on to the next room
    fn next_screen(&mut self) -> Result<(), GameError> {
        let Some(screen) = self.screens.pop_front() else {
            return self.next_room();
        };

        self.engine.memory.clear_screen();
        match screen {
            Screen::Escape(p) => self.show_escape(p)?,
            Screen::GameOver => self.show_game_over(),
        }
        self.phase = Phase::Hold(HOLD_TICKS);
        Ok(())
    }

    fn show_escape(&mut self, number: usize) -> Result<(), GameError> {
        if let Some(picture) = self.engine.memory.escape_picture() {
            self.engine.load_objects(picture)?;
        }

        let engine = &mut self.engine;
        engine.memory.write(ESCAPE_DIGIT, b'1' + number as u8);
        print_strings(&mut engine.memory, &engine.char_rom, ESCAPE_STRINGS);

        compose_time(&mut engine.memory, Memory::timer_address(number));
        draw_image(&mut engine.memory, TIME_IMAGE, TIME_X, TIME_Y);
        Ok(())
    }

    fn show_game_over(&mut self) {
        let engine = &mut self.engine;
        print_strings(&mut engine.memory, &engine.char_rom, GAME_OVER_STRINGS);

        if engine.memory.joystick_select() != 0 {
            for (p, strings) in PLAYER_OVER_STRINGS.into_iter().enumerate() {
                if !engine.memory.player_active(p) {
                    print_strings(&mut engine.memory, &engine.char_rom, strings);
                }
            }
        }
        info!("Game over");
    }

    /// Write the castle block to the store under the castle's name
    pub fn save_position(&mut self) -> Result<(), GameError> {
        let data = Position::capture(&self.engine.memory)?.to_bytes()?;
        self.store.save_position(&self.config.castle, &data)?;
        info!("Position saved for {}", self.config.castle);
        Ok(())
    }

    /// Resume the position saved under the castle's name
    pub fn load_position(&mut self) -> Result<(), GameError> {
        let data = self.store.load_position(&self.config.castle)?;
        Position::from_bytes(&data)?.restore(&mut self.engine.memory)?;
        self.screens.clear();
        info!("Position loaded for {}", self.config.castle);
        self.start(true)
    }

    /// Quick save of the running room
    fn quick_save_path(&self) -> PathBuf {
        self.config.data_dir.join(format!("{}.state", self.config.castle))
    }

    fn quick_load(&mut self) -> Result<(), SaveStateError> {
        let path = self.quick_save_path();
        SaveState::load_from_file(&mut self.engine, path)?;
        self.present = self.engine.player_sprite.map(|slot| slot.is_some());
        self.screens.clear();
        self.phase = Phase::Room;
        Ok(())
    }

    /// Act on latched hotkeys; failures are logged and play goes on
    fn handle_hotkeys(&mut self, renderer: &Renderer) {
        if Hotkeys::take(&mut self.hotkeys.pause) {
            self.paused = !self.paused;
            info!("{}", if self.paused { "Paused" } else { "Resumed" });
        }
        if Hotkeys::take(&mut self.hotkeys.restore) {
            self.restore();
        }
        if Hotkeys::take(&mut self.hotkeys.save) {
            if let Err(e) = self.save_position() {
                error!("Saving position failed: {}", e);
            }
        }
        if Hotkeys::take(&mut self.hotkeys.load) {
            if let Err(e) = self.load_position() {
                error!("Loading position failed: {}", e);
            }
        }
        if Hotkeys::take(&mut self.hotkeys.quick_save) {
            if let Err(e) = SaveState::save_to_file(&self.engine, self.quick_save_path()) {
                error!("Quick save failed: {}", e);
            }
        }
        if Hotkeys::take(&mut self.hotkeys.quick_load) {
            if let Err(e) = self.quick_load() {
                error!("Quick load failed: {}", e);
            }
        }
        if Hotkeys::take(&mut self.hotkeys.screenshot) {
            let path = self
                .config
                .data_dir
                .join(format!("{}-{:06}.png", self.config.castle, self.engine.frame));
            match renderer.save_png(&path) {
                Ok(()) => info!("Screenshot written to {}", path.display()),
                Err(e) => error!("Screenshot failed: {}", e),
            }
        }
    }

    /// Run the game in a window until it finishes or is closed
    pub fn run(&mut self) -> Result<()> {
        // Initialize SDL2
        let sdl_context = sdl2::init().map_err(|e| anyhow::anyhow!("Failed to initialize SDL2: {}", e))?;

        let video_subsystem = sdl_context
            .video()
            .map_err(|e| anyhow::anyhow!("Failed to initialize SDL2 video subsystem: {}", e))?;

        let scale = self.config.scale.max(1);
        let window = video_subsystem
            .window("Rusty Creep", SCREEN_WIDTH * scale, SCREEN_HEIGHT * scale)
            .position_centered()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;

        let mut canvas = window
            .into_canvas()
            .accelerated()
            .present_vsync()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create canvas: {}", e))?;

        canvas
            .set_scale(scale as f32, scale as f32)
            .map_err(|e| anyhow::anyhow!("Failed to set canvas scale: {}", e))?;

        let texture_creator: TextureCreator<WindowContext> = canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, SCREEN_WIDTH, SCREEN_HEIGHT)
            .with_context(|| "Failed to create texture")?;

        let mut event_pump = sdl_context
            .event_pump()
            .map_err(|e| anyhow::anyhow!("Failed to get event pump: {}", e))?;

        let mut audio = AudioSystem::new(&sdl_context, SAMPLE_RATE);
        audio.set_volume(self.config.volume);
        debug!("Effect volume {:.2}", audio.volume());
        let mut renderer = Renderer::new();

        let target_frame_time = self.config.pacing.frame_time();
        let mut last_frame_time = Instant::now();
        let mut overlaps: Vec<Overlap> = Vec::new();
        let mut frame_count: u64 = 0;

        self.running = true;
        info!("Playing {} at {:?} pacing", self.config.castle, self.config.pacing);

        while self.running && !self.is_finished() {
            for event in event_pump.poll_iter() {
                match event {
                    Event::Quit { .. } => self.running = false,
                    Event::KeyDown { keycode: Some(keycode), repeat: false, .. } => self.handle_key_down(keycode),
                    Event::KeyUp { keycode: Some(keycode), .. } => self.handle_key_up(keycode),
                    _ => {}
                }
            }

            let was_paused = self.paused;
            self.handle_hotkeys(&renderer);
            if self.paused != was_paused {
                if self.paused {
                    audio.pause();
                } else {
                    audio.resume();
                }
            }

            if !self.paused {
                if frame_count % FRAMES_PER_TICK as u64 == 0 {
                    self.step(&overlaps).with_context(|| "Game step failed")?;
                    overlaps.clear();
                    for effect in self.engine.sound.take_started() {
                        trace!("Effect {:02X}", effect);
                    }
                }

                for overlap in renderer.render(&self.engine) {
                    if !overlaps.contains(&overlap) {
                        overlaps.push(overlap);
                    }
                }

                texture
                    .update(None, renderer.get_frame_buffer(), SCREEN_WIDTH as usize * 3)
                    .with_context(|| "Failed to update texture")?;

                audio.process(&self.engine.sound, target_frame_time.as_secs_f32());
                frame_count += 1;
            }

            // Frame timing for steady frame rate
            let frame_duration = last_frame_time.elapsed();
            if frame_duration < target_frame_time {
                std::thread::sleep(target_frame_time - frame_duration);
            }
            last_frame_time = Instant::now();

            if frame_count % 250 == 0 {
                trace!("Frame {}, tick {}", frame_count, self.engine.frame);
            }

            canvas.clear();
            canvas
                .copy(&texture, None, None)
                .map_err(|e| anyhow::anyhow!("Failed to copy texture to canvas: {}", e))?;
            canvas.present();
        }

        audio.close();
        Ok(())
    }

    /// Joystick key bindings: arrows and right control for player 1,
    /// WASD and left control for player 2
    fn joystick_key(keycode: Keycode) -> Option<(usize, u8)> {
        let binding = match keycode {
            Keycode::Up => (0, Controller::BUTTON_UP),
            Keycode::Down => (0, Controller::BUTTON_DOWN),
            Keycode::Left => (0, Controller::BUTTON_LEFT),
            Keycode::Right => (0, Controller::BUTTON_RIGHT),
            Keycode::RCtrl | Keycode::Return => (0, Controller::BUTTON_FIRE),
            Keycode::W => (1, Controller::BUTTON_UP),
            Keycode::S => (1, Controller::BUTTON_DOWN),
            Keycode::A => (1, Controller::BUTTON_LEFT),
            Keycode::D => (1, Controller::BUTTON_RIGHT),
            Keycode::LCtrl | Keycode::Space => (1, Controller::BUTTON_FIRE),
            _ => return None,
        };
        Some(binding)
    }

    /// Handle key down events
    fn handle_key_down(&mut self, keycode: Keycode) {
        if let Some((player, button)) = Self::joystick_key(keycode) {
            self.engine.controllers[player].set_button_pressed(button, true);
            return;
        }

        match keycode {
            Keycode::Escape => self.running = false,
            Keycode::P => self.hotkeys.pause = true,
            Keycode::R => self.hotkeys.restore = true,
            Keycode::F2 => self.hotkeys.save = true,
            Keycode::F3 => self.hotkeys.load = true,
            Keycode::F5 => self.hotkeys.quick_save = true,
            Keycode::F7 => self.hotkeys.quick_load = true,
            Keycode::F12 => self.hotkeys.screenshot = true,
            Keycode::M => {
                let playing = self.engine.sound.music_playback();
                self.engine.sound.set_music_playback(!playing);
            }
            _ => {}
        }
    }

    /// Handle key up events
    fn handle_key_up(&mut self, keycode: Keycode) {
        if let Some((player, button)) = Self::joystick_key(keycode) {
            self.engine.controllers[player].set_button_pressed(button, false);
        }
    }
}

/// Build the elapsed time image from a castle timer
///
/// Each BCD byte becomes two digits, seven pixel rows each, in an image
/// eight bytes wide: hours in columns 0-1, minutes 3-4, seconds 6-7.
fn compose_time(memory: &mut Memory, timer: u16) {
    for (n, column) in [6u16, 3, 0].into_iter().enumerate() {
        let value = memory.read(timer + 1 + n as u16);
        for (digit, offset) in [(value >> 4, 0), (value & 0x0F, 1)] {
            let font = DIGIT_FONT + ((digit as u16) << 3);
            for row in 0..7u16 {
                let pattern = memory.read(font + row);
                memory.write(TIME_PIXELS + column + offset + (row << 3), pattern);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, CHAR_ROM_FILE, GAME_DATA_FILE};

    const ROOM: u8 = 2;
    const STREAM: u16 = 0xA100;

    /// A castle whose start room has an empty object stream
    fn store(lives: u8, escape_picture: bool) -> MemoryStore {
        let mut castle = vec![0u8; 0x200];
        castle[0] = 0x00;
        castle[1] = 0x02;
        castle[2] = if escape_picture { 0x80 } else { 0 };
        castle[3] = ROOM;
        castle[4] = ROOM;
        castle[7] = lives;
        castle[8] = lives;
        // Escape picture stream, empty like the room
        castle[0x5F] = 0x00;
        castle[0x60] = 0xA2;

        // Room record at 0x7900 + ROOM * 8 in the castle block
        let record = 0x100 + (ROOM as usize) * 8;
        castle[record + 6] = (STREAM & 0xFF) as u8;
        castle[record + 7] = (STREAM >> 8) as u8;

        let mut with_address = vec![0x00, 0x98];
        with_address.extend(castle);

        let mut store = MemoryStore::new();
        store.insert(GAME_DATA_FILE, vec![0x00, 0x08, 0x00]);
        store.insert(CHAR_ROM_FILE, vec![0; 0x1000]);
        store.insert("ZTest", with_address);
        store
    }

    fn config(players: u8) -> GameConfig {
        GameConfig {
            castle: String::from("Test"),
            players,
            ..GameConfig::default()
        }
    }

    fn game(lives: u8, players: u8) -> Game<MemoryStore> {
        Game::new(store(lives, false), config(players)).unwrap()
    }

    #[test]
    fn new_game_copies_the_castle_and_places_the_player() {
        let game = game(3, 1);
        let memory = &game.engine.memory;

        assert_eq!(memory.current_room(0), ROOM);
        assert_eq!(memory.lives(0), 3);
        assert!(memory.player_active(0));
        assert!(!memory.player_active(1));
        assert_eq!(memory.player_state(1), PlayerState::ABSENT);
        assert_eq!(game.present(), [true, false]);
        assert!(game.engine.player_sprite[0].is_some());
        assert_eq!(game.phase(), Phase::Room);
    }

    #[test]
    fn two_players_in_one_room_enter_together() {
        let game = game(3, 2);
        assert_eq!(game.present(), [true, true]);
        assert_eq!(game.engine.memory.joystick_select(), 1);
    }

    #[test]
    fn two_players_in_different_rooms_take_turns() {
        let mut game = game(3, 2);
        game.engine.memory.set_current_room(1, ROOM + 1);
        game.engine.memory.set_last_alive(1);
        game.next_room().unwrap();
        assert_eq!(game.present(), [true, false]);
    }

    #[test]
    fn restore_kills_the_player_and_costs_a_life() {
        let mut game = game(3, 1);
        game.restore();
        assert_eq!(game.engine.memory.player_state(0), PlayerState::DYING);

        game.settle_room();
        assert_eq!(game.engine.memory.lives(0), 2);
        assert!(game.engine.memory.player_active(0));
        assert_eq!(game.engine.memory.current_room(0), ROOM);
        assert!(game.screens.is_empty());
    }

    #[test]
    fn last_life_ends_the_game() {
        let mut game = game(1, 1);
        game.engine.memory.set_player_state(0, PlayerState::DYING);
        game.phase = Phase::Leaving(1);

        assert_eq!(game.step(&[]).unwrap(), Phase::Hold(HOLD_TICKS));
        assert!(!game.engine.memory.player_active(0));

        for _ in 0..HOLD_TICKS {
            game.step(&[]).unwrap();
        }
        assert!(game.is_finished());
    }

    #[test]
    fn unlimited_lives_keep_the_count() {
        let mut game = Game::new(
            store(1, false),
            GameConfig {
                unlimited_lives: true,
                ..config(1)
            },
        )
        .unwrap();
        game.engine.memory.set_player_state(0, PlayerState::DYING);
        game.settle_room();
        assert_eq!(game.engine.memory.lives(0), 1);
        assert!(game.engine.memory.player_active(0));
    }

    #[test]
    fn dying_player_winds_the_room_down() {
        let mut game = game(2, 1);
        game.engine.memory.set_player_state(0, PlayerState::DYING);

        assert_eq!(game.step(&[]).unwrap(), Phase::Leaving(LEAVING_TICKS));
        for _ in 1..LEAVING_TICKS {
            assert!(matches!(game.step(&[]).unwrap(), Phase::Leaving(_)));
        }

        // Back at the start door with one life fewer
        assert_eq!(game.step(&[]).unwrap(), Phase::Room);
        assert_eq!(game.engine.memory.lives(0), 1);
        assert_eq!(game.engine.memory.player_state(0), PlayerState::ALIVE);
    }

    #[test]
    fn escape_deactivates_and_queues_both_screens() {
        let mut game = Game::new(store(3, true), config(1)).unwrap();
        game.engine.memory.set_escaped(0, true);
        game.engine.memory.set_player_state(0, PlayerState::WALKING_OUT);
        game.settle_room();

        assert!(!game.engine.memory.player_active(0));
        assert_eq!(game.screens, VecDeque::from([Screen::Escape(0), Screen::GameOver]));

        game.next_screen().unwrap();
        assert_eq!(game.engine.memory.read(ESCAPE_DIGIT), b'1');
        assert_eq!(game.phase(), Phase::Hold(HOLD_TICKS));
    }

    #[test]
    fn positions_round_trip_through_the_store() {
        let mut game = game(3, 1);
        game.engine.memory.set_lives(0, 1);
        game.save_position().unwrap();
        assert!(game.store().contains("Test.sav"));

        game.engine.memory.set_lives(0, 3);
        game.load_position().unwrap();
        assert_eq!(game.engine.memory.lives(0), 1);
        assert_eq!(game.phase(), Phase::Room);
    }

    #[test]
    fn timer_digits_land_in_their_columns() {
        let mut memory = Memory::new();
        for digit in 0..10u16 {
            memory.fill(DIGIT_FONT + digit * 8, 7, digit as u8 + 0x10);
        }
        let timer = Memory::timer_address(0);
        memory.write(timer + 1, 0x42);
        memory.write(timer + 2, 0x17);
        memory.write(timer + 3, 0x03);

        compose_time(&mut memory, timer);

        let row = memory.slice(TIME_PIXELS + 8, 8).to_vec();
        assert_eq!(row, vec![0x10, 0x13, 0, 0x11, 0x17, 0, 0x14, 0x12]);
    }

    #[test]
    fn broken_castle_is_refused() {
        let mut store = store(3, false);
        store.insert("ZTest", vec![0x00, 0x98, 0x00, 0x00]);
        assert!(matches!(Game::new(store, config(1)), Err(GameError::InvalidCastle(0))));
    }
}
