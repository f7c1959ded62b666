//! Sound effect sequencer
//!
//! Effects are byte-code streams in game data, located through the pointer
//! table at 0x7572. The engine patches parameters into an effect (pitch,
//! length) before starting it. Only one effect plays at a time; requests made
//! while one is playing are dropped.
//!
//! Command bytes carry the opcode in bits 2-7 and a voice number in bits 0-1;
//! the command length comes from a table indexed by the opcode:
//! - 0: note on (argument: note index, transposed per voice)
//! - 1: note off
//! - 2, 3: wait (low, high byte of the delay counter)
//! - 4: voice envelope setup
//! - 5: no operation
//! - 6: set voice transpose
//! - 7: volume
//! - 8: tempo
//! - anything else: end of effect

use log::trace;

use crate::memory::Memory;

const EFFECT_TABLE: u16 = 0x7572;
const COMMAND_LENGTHS: u16 = 0x20D2;
const TRANSPOSE: u16 = 0x2104;
const TEMPO: u16 = 0x2107;
const NOTE_LOW: u16 = 0x2108;
const NOTE_HIGH: u16 = 0x2168;

/// Default transpose and tempo written when an effect starts
const DEFAULT_TRANSPOSE: u8 = 0x18;
const DEFAULT_TEMPO: u8 = 0x14;

/// CPU cycles per engine tick (two PAL frames)
const CYCLES_PER_TICK: u32 = 2 * 19_705;

/// Sound chip clock in Hz
const CHIP_CLOCK: f32 = 985_248.0;

/// One of the three voices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Voice {
    /// Frequency register value
    pub frequency: u16,
    pub gate: bool,
}

impl Voice {
    /// Tone in Hz while the gate is open
    pub fn tone(&self) -> Option<f32> {
        if self.gate && self.frequency != 0 {
            Some(self.frequency as f32 * CHIP_CLOCK / 16_777_216.0)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Playback {
    effect: u8,
    cursor: u16,
    delay_low: u8,
    delay_high: u8,
}

/// Effect sequencer state
#[derive(Clone, Debug, Default)]
pub struct SoundBoard {
    playing: Option<Playback>,

    pub voices: [Voice; 3],

    /// Music enabled
    music: bool,

    /// Cycles accumulated towards the next sequencer step
    cycles: u32,

    /// Effects started, oldest first, for the front end and tests
    started: Vec<u8>,
}

impl SoundBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an effect unless one is already playing
    pub fn play_effect(&mut self, memory: &mut Memory, effect: u8) {
        if self.playing.is_some() {
            return;
        }

        let cursor = memory.read_word(EFFECT_TABLE + ((effect as u16) << 1));
        for voice in 0..3 {
            memory.write(TRANSPOSE + voice, DEFAULT_TRANSPOSE);
        }
        memory.write(TEMPO, DEFAULT_TEMPO);

        self.voices = [Voice::default(); 3];
        self.cycles = 0;
        self.playing = Some(Playback {
            effect,
            cursor,
            delay_low: 0,
            delay_high: 0,
        });
        self.started.push(effect);
        trace!("Effect {:02X} started at {:04X}", effect, cursor);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    /// Effect currently playing
    pub fn current(&self) -> Option<u8> {
        self.playing.map(|p| p.effect)
    }

    pub fn set_music_playback(&mut self, enabled: bool) {
        self.music = enabled;
    }

    pub fn music_playback(&self) -> bool {
        self.music
    }

    /// Effects started since the last call
    pub fn take_started(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.started)
    }

    /// Advance the sequencer by one engine tick
    pub fn tick(&mut self, memory: &Memory) {
        if self.playing.is_none() {
            return;
        }

        self.cycles += CYCLES_PER_TICK;
        loop {
            let period = Self::step_period(memory);
            if self.cycles < period {
                break;
            }
            self.cycles -= period;
            if !self.step(memory) {
                break;
            }
        }
    }

    /// Cycles between sequencer steps at the current tempo
    fn step_period(memory: &Memory) -> u32 {
        let high = ((memory.read(TEMPO) as u32) << 2) | 3;
        (high << 8) | 0xFF
    }

    /// Run one sequencer step; returns false once the effect has ended
    fn step(&mut self, memory: &Memory) -> bool {
        let Some(mut playback) = self.playing else {
            return false;
        };

        if playback.delay_low != 0 || playback.delay_high != 0 {
            if playback.delay_low == 0 {
                playback.delay_high = playback.delay_high.wrapping_sub(1);
            }
            playback.delay_low = playback.delay_low.wrapping_sub(1);

            if playback.delay_low | playback.delay_high != 0 {
                self.playing = Some(playback);
                return true;
            }
        }

        loop {
            let command = memory.read(playback.cursor);
            let argument = memory.read(playback.cursor.wrapping_add(1));
            let length = memory.read(COMMAND_LENGTHS + (command >> 2) as u16).max(1);
            playback.cursor = playback.cursor.wrapping_add(length as u16);

            let voice = (command & 3) as usize;
            match command >> 2 {
                0 => {
                    let transpose = memory.read(TRANSPOSE + voice as u16);
                    let note = argument.wrapping_add(transpose) as u16;
                    if let Some(v) = self.voices.get_mut(voice) {
                        v.frequency = u16::from_le_bytes([
                            memory.read(NOTE_LOW + note),
                            memory.read(NOTE_HIGH + note),
                        ]);
                        v.gate = true;
                    }
                }
                1 => {
                    if let Some(v) = self.voices.get_mut(voice) {
                        v.gate = false;
                    }
                }
                2 => {
                    playback.delay_low = argument;
                    self.playing = Some(playback);
                    return true;
                }
                3 => {
                    playback.delay_high = argument;
                    self.playing = Some(playback);
                    return true;
                }
                4..=8 => {}
                _ => {
                    trace!("Effect {:02X} finished", playback.effect);
                    self.playing = None;
                    self.voices = [Voice::default(); 3];
                    return false;
                }
            }
        }
    }

    /// Tones of the open voices
    pub fn tones(&self) -> impl Iterator<Item = f32> + '_ {
        self.voices.iter().filter_map(Voice::tone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_effect(effect: u8, data: &[u8]) -> Memory {
        let mut memory = Memory::new();
        memory.write_word(EFFECT_TABLE + ((effect as u16) << 1), 0x3000);
        memory.load(0x3000, data);
        // opcodes 0..8 take two bytes, end takes one
        for op in 0..9 {
            memory.write(COMMAND_LENGTHS + op, 2);
        }
        memory.write(COMMAND_LENGTHS + 0x3F, 1);
        memory.write(NOTE_LOW + 0x20, 0x34);
        memory.write(NOTE_HIGH + 0x20, 0x12);
        memory
    }

    #[test]
    fn second_request_is_ignored_while_playing() {
        let mut memory = memory_with_effect(3, &[0x08, 0x05, 0xFC]);
        memory.write_word(EFFECT_TABLE + 8, 0x3100);

        let mut sound = SoundBoard::new();
        sound.play_effect(&mut memory, 3);
        sound.play_effect(&mut memory, 4);
        assert_eq!(sound.current(), Some(3));
        assert_eq!(sound.take_started(), vec![3]);
    }

    #[test]
    fn note_on_then_end() {
        // note on voice 0 (index 0x08 + transpose 0x18), wait 1, end
        let mut memory = memory_with_effect(1, &[0x00, 0x08, 0x08, 0x01, 0xFC]);
        let mut sound = SoundBoard::new();
        sound.play_effect(&mut memory, 1);

        assert!(sound.step(&memory));
        assert_eq!(sound.voices[0].frequency, 0x1234);
        assert!(sound.voices[0].gate);
        assert!(sound.tones().next().is_some());

        // delay of one elapses, then the end command stops playback
        assert!(!sound.step(&memory));
        assert!(!sound.is_playing());
        assert_eq!(sound.tones().count(), 0);
    }
}
