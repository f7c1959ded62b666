//! Castle state block
//!
//! The running castle keeps its bookkeeping in a fixed block at 0x7800 which
//! is also what a saved position stores. The accessors here give each offset
//! a name; the layout itself must not change since castle files and saved
//! positions carry it verbatim.
//!
//! Layout (`p` is the player number, 0 or 1):
//! - 0x7800: Size of the castle image (word)
//! - 0x7802: Flags (bit 0: position was restored from a save, bit 7: the
//!   castle has an escape picture)
//! - 0x7803 + p: Start room
//! - 0x7805 + p: Start door
//! - 0x7807 + p: Lives
//! - 0x7809 + p: Current room
//! - 0x780B + p: Current door
//! - 0x780D + p: Player state (see `PlayerState`)
//! - 0x780F + p: Player active
//! - 0x7811: Last player seen alive in a room
//! - 0x7812: Joystick selection (1 = two players)
//! - 0x7813 + p: Number of keys held
//! - 0x7815 / 0x7835: Key lists
//! - 0x7855 + 4p: Elapsed time (BCD seconds, minutes, hours at +1..+3)
//! - 0x785D + p: Escaped flag
//! - 0x785F: Object stream of the escape picture (word)

use crate::memory::{Memory, CASTLE_STATE, ROOM_TABLE};

const SIZE: u16 = CASTLE_STATE;
const FLAGS: u16 = 0x7802;
const START_ROOM: u16 = 0x7803;
const START_DOOR: u16 = 0x7805;
const LIVES: u16 = 0x7807;
const ROOM: u16 = 0x7809;
const DOOR: u16 = 0x780B;
const STATE: u16 = 0x780D;
const ACTIVE: u16 = 0x780F;
const LAST_ALIVE: u16 = 0x7811;
const JOYSTICK_SELECT: u16 = 0x7812;
const KEY_COUNT: u16 = 0x7813;
const KEY_LIST: [u16; 2] = [0x7815, 0x7835];
const TIMERS: u16 = 0x7855;
const ESCAPED: u16 = 0x785D;
const ESCAPE_PICTURE: u16 = 0x785F;

/// Maximum number of keys a player can carry
pub const MAX_KEYS: u8 = 0x20;

/// Player state values stored in the castle block
pub struct PlayerState;

impl PlayerState {
    pub const ALIVE: u8 = 0;
    pub const DYING: u8 = 2;
    pub const ABSENT: u8 = 4;
    pub const WALKING_OUT: u8 = 5;
    pub const ENTERING: u8 = 6;
}

/// Castle flag bits
pub struct CastleFlags;

impl CastleFlags {
    pub const RESTORED: u8 = 0x01;
    pub const ESCAPE_PICTURE: u8 = 0x80;
}

impl Memory {
    /// Size of the castle state image in bytes
    pub fn castle_size(&self) -> u16 {
        self.read_word(SIZE)
    }

    pub fn castle_flags(&self) -> u8 {
        self.read(FLAGS)
    }

    pub fn set_castle_flags(&mut self, value: u8) {
        self.write(FLAGS, value);
    }

    pub fn start_room(&self, player: usize) -> u8 {
        self.read(START_ROOM + player as u16)
    }

    pub fn start_door(&self, player: usize) -> u8 {
        self.read(START_DOOR + player as u16)
    }

    pub fn lives(&self, player: usize) -> u8 {
        self.read(LIVES + player as u16)
    }

    pub fn set_lives(&mut self, player: usize, lives: u8) {
        self.write(LIVES + player as u16, lives);
    }

    pub fn current_room(&self, player: usize) -> u8 {
        self.read(ROOM + player as u16)
    }

    pub fn set_current_room(&mut self, player: usize, room: u8) {
        self.write(ROOM + player as u16, room);
    }

    pub fn current_door(&self, player: usize) -> u8 {
        self.read(DOOR + player as u16)
    }

    pub fn set_current_door(&mut self, player: usize, door: u8) {
        self.write(DOOR + player as u16, door);
    }

    /// Player state, one of the `PlayerState` values
    pub fn player_state(&self, player: usize) -> u8 {
        self.read(STATE + player as u16)
    }

    pub fn set_player_state(&mut self, player: usize, state: u8) {
        self.write(STATE + player as u16, state);
    }

    pub fn player_active(&self, player: usize) -> bool {
        self.read(ACTIVE + player as u16) == 1
    }

    pub fn set_player_active(&mut self, player: usize, active: bool) {
        self.write(ACTIVE + player as u16, active as u8);
    }

    pub fn last_alive(&self) -> usize {
        (self.read(LAST_ALIVE) & 1) as usize
    }

    pub fn set_last_alive(&mut self, player: usize) {
        self.write(LAST_ALIVE, player as u8);
    }

    pub fn joystick_select(&self) -> u8 {
        self.read(JOYSTICK_SELECT)
    }

    pub fn set_joystick_select(&mut self, value: u8) {
        self.write(JOYSTICK_SELECT, value);
    }

    pub fn key_count(&self, player: usize) -> u8 {
        self.read(KEY_COUNT + player as u16)
    }

    /// Keys currently held by a player
    pub fn keys(&self, player: usize) -> &[u8] {
        let count = self.key_count(player).min(MAX_KEYS) as usize;
        self.slice(KEY_LIST[player & 1], count)
    }

    /// Add a key to a player's list; a full list drops the key
    pub fn add_key(&mut self, player: usize, key: u8) -> bool {
        let count = self.key_count(player);
        if count >= MAX_KEYS {
            return false;
        }
        self.write(KEY_LIST[player & 1] + count as u16, key);
        self.write(KEY_COUNT + player as u16, count + 1);
        true
    }

    pub fn has_key(&self, player: usize, key: u8) -> bool {
        self.keys(player).contains(&key)
    }

    /// Address of a player's four byte timer record
    pub fn timer_address(player: usize) -> u16 {
        TIMERS + ((player as u16) << 2)
    }

    pub fn clear_timers(&mut self) {
        self.fill(TIMERS, 8, 0);
    }

    pub fn escaped(&self, player: usize) -> bool {
        self.read(ESCAPED + player as u16) == 1
    }

    pub fn set_escaped(&mut self, player: usize, escaped: bool) {
        self.write(ESCAPED + player as u16, escaped as u8);
    }

    /// Object stream drawn behind the escape message, if the castle has one
    pub fn escape_picture(&self) -> Option<u16> {
        (self.castle_flags() & CastleFlags::ESCAPE_PICTURE != 0).then(|| self.read_word(ESCAPE_PICTURE))
    }

    /// Address of a room's eight byte record
    pub fn room_address(room: u8) -> u16 {
        ROOM_TABLE + ((room as u16) << 3)
    }
}
