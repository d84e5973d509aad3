//! Tick-driven karaoke engine: tracks the due note of a score, judges key
//! presses against it and keeps the per-pitch LED map in sync with the
//! attached [`LedDriver`].
//!
//! The engine never sleeps or spawns. Flash reverts are handed to the host as
//! [`ScheduledClear`]s and come back through [`PlaybackEngine::apply_clear`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use andio_domain::pitch::MAX_PITCH;
use andio_domain::{DomainError, LedCommand, LedSignal, NoteEvent, Score, SessionSummary};

use crate::config::EngineConfig;
use crate::led::LedDriver;
use crate::scoring::ScoreTally;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackState {
    pub current_tick: u32,
    pub transport: TransportState,
    pub active_note: Option<NoteEvent>,
    pub led_state: BTreeMap<u8, LedSignal>,
}

impl PlaybackState {
    fn new() -> Self {
        Self {
            current_tick: 0,
            transport: TransportState::Idle,
            active_note: None,
            led_state: BTreeMap::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing
    }

    pub fn led(&self, pitch: u8) -> LedSignal {
        self.led_state.get(&pitch).copied().unwrap_or_default()
    }
}

/// Identifies one Correct/Wrong flash within one session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlashToken {
    generation: u64,
    sequence: u64,
    pitch: u8,
}

impl FlashToken {
    pub fn pitch(&self) -> u8 {
        self.pitch
    }
}

/// A deferred LED revert the host must run after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledClear {
    pub token: FlashToken,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Advanced { tick: u32 },
    Finished(SessionSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Correct { pitch: u8 },
    Wrong { expected: NoteEvent, played: u8 },
}

pub struct PlaybackEngine<D: LedDriver> {
    score: Score,
    config: EngineConfig,
    driver: D,
    state: PlaybackState,
    tally: ScoreTally,
    active_index: Option<usize>,
    generation: u64,
    next_sequence: u64,
    pending_flashes: HashMap<u8, FlashToken>,
    scheduled: Vec<ScheduledClear>,
}

impl<D: LedDriver> PlaybackEngine<D> {
    pub fn new(score: Score, config: EngineConfig, driver: D) -> Result<Self, DomainError> {
        score.validate()?;
        config.validate()?;
        info!(
            title = %score.title,
            notes = score.notes.len(),
            total_beats = score.total_beats,
            "karaoke engine ready"
        );
        Ok(Self {
            score,
            config,
            driver,
            state: PlaybackState::new(),
            tally: ScoreTally::new(),
            active_index: None,
            generation: 0,
            next_sequence: 0,
            pending_flashes: HashMap::new(),
            scheduled: Vec::new(),
        })
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn tally(&self) -> &ScoreTally {
        &self.tally
    }

    pub fn transport(&self) -> TransportState {
        self.state.transport
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// `Idle -> Playing`, evaluating the note due at tick 0.
    pub fn start(&mut self) -> bool {
        if self.state.transport != TransportState::Idle {
            return false;
        }
        self.state.transport = TransportState::Playing;
        info!(title = %self.score.title, "playback started");
        self.refresh_active_note();
        true
    }

    pub fn toggle_play(&mut self) -> TransportState {
        match self.state.transport {
            TransportState::Idle => {
                self.start();
            }
            TransportState::Playing => {
                self.state.transport = TransportState::Paused;
                info!(tick = self.state.current_tick, "playback paused");
            }
            TransportState::Paused => {
                self.state.transport = TransportState::Playing;
                info!(tick = self.state.current_tick, "playback resumed");
            }
            TransportState::Finished => {}
        }
        self.state.transport
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_playing() {
            return TickOutcome::Ignored;
        }
        self.state.current_tick += 1;
        if self.state.current_tick >= self.score.total_beats {
            return TickOutcome::Finished(self.finish());
        }
        self.refresh_active_note();
        TickOutcome::Advanced {
            tick: self.state.current_tick,
        }
    }

    pub fn on_key_press(&mut self, pitch: u8) -> KeyOutcome {
        if !self.state.is_playing() || pitch > MAX_PITCH {
            return KeyOutcome::Ignored;
        }
        let Some(expected) = self.state.active_note else {
            return KeyOutcome::Ignored;
        };

        if pitch == expected.pitch {
            self.tally.record_correct();
            self.flash(pitch, LedSignal::Correct, self.config.correct_flash());
            debug!(pitch, streak = self.tally.streak, "correct key");
            KeyOutcome::Correct { pitch }
        } else {
            self.tally.record_wrong();
            self.flash(pitch, LedSignal::Wrong, self.config.wrong_flash());
            self.state.transport = TransportState::Paused;
            info!(
                expected = expected.pitch,
                played = pitch,
                tick = self.state.current_tick,
                "wrong key, playback paused"
            );
            KeyOutcome::Wrong {
                expected,
                played: pitch,
            }
        }
    }

    /// Hands out the flash reverts scheduled since the last call.
    pub fn take_scheduled(&mut self) -> Vec<ScheduledClear> {
        std::mem::take(&mut self.scheduled)
    }

    /// Reverts a flash once its display time is over. Returns `false` when the
    /// token belongs to an earlier session or a newer flash replaced it.
    pub fn apply_clear(&mut self, token: FlashToken) -> bool {
        if token.generation != self.generation {
            debug!(pitch = token.pitch, "discarding clear from a previous session");
            return false;
        }
        if self.pending_flashes.get(&token.pitch) != Some(&token) {
            return false;
        }
        self.pending_flashes.remove(&token.pitch);
        let revert = match self.state.active_note {
            Some(note) if note.pitch == token.pitch => LedSignal::Due,
            _ => LedSignal::Off,
        };
        self.set_led(token.pitch, revert);
        true
    }

    pub fn restart(&mut self) {
        let lit: Vec<u8> = self
            .state
            .led_state
            .iter()
            .filter(|(_, signal)| **signal != LedSignal::Off)
            .map(|(pitch, _)| *pitch)
            .collect();
        for pitch in lit {
            self.driver.send(LedCommand::new(pitch, LedSignal::Off));
        }
        self.state = PlaybackState::new();
        self.tally = ScoreTally::new();
        self.active_index = None;
        self.generation += 1;
        self.pending_flashes.clear();
        self.scheduled.clear();
        info!(generation = self.generation, "session restarted");
    }

    pub fn progress_percent(&self) -> u8 {
        let ratio = self.state.current_tick as f64 / self.score.total_beats as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn finish(&mut self) -> SessionSummary {
        self.state.transport = TransportState::Finished;
        if let Some(note) = self.state.active_note.take() {
            self.release(note.pitch);
        }
        self.active_index = None;
        // No tick will follow, so flashes still showing are settled now.
        let flashing: Vec<u8> = self.pending_flashes.drain().map(|(pitch, _)| pitch).collect();
        for pitch in flashing {
            self.set_led(pitch, LedSignal::Off);
        }
        self.scheduled.clear();
        let summary = self.tally.summary();
        info!(
            correct = summary.correct,
            wrong = summary.wrong,
            max_streak = summary.max_streak,
            "session finished"
        );
        summary
    }

    fn refresh_active_note(&mut self) {
        let due = self
            .score
            .due_note(self.state.current_tick)
            .map(|(index, note)| (index, *note));
        if due.map(|(index, _)| index) == self.active_index {
            return;
        }

        let previous = self.state.active_note.take();
        self.active_index = due.map(|(index, _)| index);
        self.state.active_note = due.map(|(_, note)| note);

        if let Some(previous) = previous {
            let still_lit = due.is_some_and(|(_, note)| note.pitch == previous.pitch);
            if !still_lit {
                self.release(previous.pitch);
            }
        }
        if let Some((_, note)) = due {
            debug!(tick = self.state.current_tick, pitch = note.pitch, "note due");
            let current = self.state.led(note.pitch);
            if !current.is_flash() && current != LedSignal::Due
            {
                self.set_led(note.pitch, LedSignal::Due);
            }
        }
    }

    /// Turns a no longer due pitch off unless a flash is still showing on it.
    fn release(&mut self, pitch: u8) {
        if !self.state.led(pitch).is_flash() {
            self.set_led(pitch, LedSignal::Off);
        }
    }

    fn flash(&mut self, pitch: u8, signal: LedSignal, delay: Duration) {
        let token = FlashToken {
            generation: self.generation,
            sequence: self.next_sequence,
            pitch,
        };
        self.next_sequence += 1;
        self.pending_flashes.insert(pitch, token);
        self.set_led(pitch, signal);
        self.scheduled.push(ScheduledClear { token, delay });
    }

    fn set_led(&mut self, pitch: u8, signal: LedSignal) {
        self.state.led_state.insert(pitch, signal);
        self.driver.send(LedCommand::new(pitch, signal));
    }
}
