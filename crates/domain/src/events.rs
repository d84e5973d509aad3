use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pitch::pitch_class_name;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NoteEvent {
    /// Start tick.
    pub beat: u32,
    /// Semitone-indexed pitch (MIDI numbering, 0-127).
    pub pitch: u8,
    /// Length in ticks, always > 0 in a validated score.
    pub duration: u32,
}

impl NoteEvent {
    pub fn new(beat: u32, pitch: u8, duration: u32) -> Self {
        Self {
            beat,
            pitch,
            duration,
        }
    }

    /// Pitch-class label, derived from `pitch` so it can never drift.
    pub fn display_name(&self) -> &'static str {
        pitch_class_name(self.pitch)
    }

    pub fn end(&self) -> u32 {
        self.beat.saturating_add(self.duration)
    }

    pub fn is_due_at(&self, tick: u32) -> bool {
        self.beat <= tick && tick < self.end()
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LedSignal {
    #[default]
    Off,
    Due,
    Correct,
    Wrong,
}

impl LedSignal {
    /// State code understood by the LED controller firmware.
    pub fn code(self) -> u8 {
        match self {
            LedSignal::Off => 0,
            LedSignal::Due => 1,
            LedSignal::Correct => 2,
            LedSignal::Wrong => 3,
        }
    }

    /// Correct and Wrong are short-lived flashes that revert on their own.
    pub fn is_flash(self) -> bool {
        matches!(self, LedSignal::Correct | LedSignal::Wrong)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LedCommand {
    pub pitch: u8,
    pub signal: LedSignal,
}

impl LedCommand {
    pub fn new(pitch: u8, signal: LedSignal) -> Self {
        Self { pitch, signal }
    }
}

impl fmt::Display for LedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LED MIDI={} STATE={}", self.pitch, self.signal.code())
    }
}
