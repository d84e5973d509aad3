use serde::{Deserialize, Serialize};

use andio_domain::SessionSummary;

/// Running score of one karaoke session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreTally {
    pub correct: u32,
    pub wrong: u32,
    pub streak: u32,
    pub max_streak: u32,
}

impl ScoreTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_correct(&mut self) {
        self.correct += 1;
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
    }

    pub fn record_wrong(&mut self) {
        self.wrong += 1;
        self.streak = 0;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            correct: self.correct,
            wrong: self.wrong,
            max_streak: self.max_streak,
        }
    }
}
