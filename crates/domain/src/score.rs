use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{error::DomainError, events::NoteEvent, pitch::MAX_PITCH};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Score {
    pub title: String,
    /// Ordered by `beat`; notes sharing a beat keep the order they were given in.
    pub notes: Vec<NoteEvent>,
    pub total_beats: u32,
}

impl Score {
    pub fn new(
        title: impl Into<String>,
        notes: Vec<NoteEvent>,
        total_beats: u32,
    ) -> Result<Self, DomainError> {
        let mut notes = notes;
        notes.sort_by_key(|note| note.beat);
        let score = Self {
            title: title.into(),
            notes,
            total_beats,
        };
        score.validate()?;
        Ok(score)
    }

    /// Checks the invariants a playable score has to satisfy.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.notes.is_empty() {
            return Err(DomainError::configuration(format!(
                "score '{}' has no notes",
                self.title
            )));
        }
        if self.total_beats == 0 {
            return Err(DomainError::configuration(format!(
                "score '{}' has an empty timeline",
                self.title
            )));
        }
        for (index, note) in self.notes.iter().enumerate() {
            if note.pitch > MAX_PITCH {
                return Err(DomainError::configuration(format!(
                    "note {index} has pitch {} above {MAX_PITCH}",
                    note.pitch
                )));
            }
            if note.duration == 0 {
                return Err(DomainError::configuration(format!(
                    "note {index} has zero duration"
                )));
            }
        }
        if self.notes.windows(2).any(|pair| pair[0].beat > pair[1].beat) {
            return Err(DomainError::configuration("notes are not ordered by beat"));
        }
        Ok(())
    }

    /// The note due at `tick` together with its index. Overlaps resolve to the
    /// smallest beat, then to the earliest stored note.
    pub fn due_note(&self, tick: u32) -> Option<(usize, &NoteEvent)> {
        self.notes
            .iter()
            .enumerate()
            .take_while(|(_, note)| note.beat <= tick)
            .filter(|(_, note)| note.is_due_at(tick))
            .min_by_key(|(index, note)| (note.beat, *index))
    }
}

/// End-of-session result handed to the presentation layer.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSummary {
    pub correct: u32,
    pub wrong: u32,
    pub max_streak: u32,
}

impl SessionSummary {
    pub fn accuracy_percent(&self) -> u8 {
        let presses = self.correct + self.wrong;
        if presses == 0 {
            return 0;
        }
        (self.correct as f64 / presses as f64 * 100.0).round() as u8
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PracticeStatistics {
    pub sessions: u32,
    pub best_score: u8,
    pub highest_streak: u32,
    pub last_practiced: Option<OffsetDateTime>,
}

impl PracticeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, summary: &SessionSummary, at: OffsetDateTime) {
        self.sessions += 1;
        self.best_score = self.best_score.max(summary.accuracy_percent());
        self.highest_streak = self.highest_streak.max(summary.max_streak);
        self.last_practiced = Some(at);
    }
}
