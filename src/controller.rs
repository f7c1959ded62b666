//! Controller implementation
//!
//! Each player has one joystick with four directions and a fire button. The
//! game reads a snapshot once per player execution and turns the directions
//! into a 4-bit active-low value that indexes the direction table in game
//! data. Keyboard hotkeys that act on the whole session (pause, restore,
//! save, load, quick save and load, screenshot) are latched separately and
//! consumed once.

use crate::memory::Memory;

/// Joystick to direction table
const DIRECTION_TABLE: u16 = 0x5F59;

/// Direction reported for a centred stick
pub const CENTRED: u8 = 0x80;

/// Joystick state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controller {
    /// Current button state
    button_state: u8,
}

impl Controller {
    /// Button bitmasks
    pub const BUTTON_FIRE: u8 = 0x01;
    pub const BUTTON_UP: u8 = 0x10;
    pub const BUTTON_DOWN: u8 = 0x20;
    pub const BUTTON_LEFT: u8 = 0x40;
    pub const BUTTON_RIGHT: u8 = 0x80;

    /// Create a new controller
    pub fn new() -> Self {
        Controller { button_state: 0 }
    }

    /// Release every button
    pub fn reset(&mut self) {
        self.button_state = 0;
    }

    /// Set a button state
    pub fn set_button_pressed(&mut self, button: u8, pressed: bool) {
        if pressed {
            self.button_state |= button;
        } else {
            self.button_state &= !button;
        }
    }

    /// Replace the whole snapshot
    pub fn set_state(&mut self, buttons: u8) {
        self.button_state = buttons;
    }

    pub fn state(&self) -> u8 {
        self.button_state
    }

    pub fn fire(&self) -> bool {
        self.button_state & Self::BUTTON_FIRE != 0
    }

    /// Directions as the hardware reports them: active low, bit 0 up,
    /// bit 1 down, bit 2 left, bit 3 right
    pub fn port_bits(&self) -> u8 {
        let mut bits = 0xFF;

        if self.button_state & Self::BUTTON_LEFT != 0 {
            bits ^= 0x04;
        }
        if self.button_state & Self::BUTTON_RIGHT != 0 {
            bits ^= 0x08;
        }
        if self.button_state & Self::BUTTON_UP != 0 {
            bits ^= 0x01;
        }
        if self.button_state & Self::BUTTON_DOWN != 0 {
            bits ^= 0x02;
        }

        bits & 0x0F
    }

    /// Map the stick through the direction table
    ///
    /// Returns the direction (0-7, or `CENTRED`) and the fire button.
    pub fn read(&self, memory: &Memory) -> (u8, bool) {
        let direction = memory.read(DIRECTION_TABLE + self.port_bits() as u16);
        (direction, self.fire())
    }
}

/// Session hotkeys, latched until taken
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hotkeys {
    pub pause: bool,
    pub restore: bool,
    pub save: bool,
    pub load: bool,
    pub quick_save: bool,
    pub quick_load: bool,
    pub screenshot: bool,
}

impl Hotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a latched key, clearing it
    pub fn take(flag: &mut bool) -> bool {
        std::mem::replace(flag, false)
    }
}
