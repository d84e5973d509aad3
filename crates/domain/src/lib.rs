pub mod error;
pub mod events;
pub mod io;
pub mod musicxml;
pub mod pitch;
pub mod samples;
pub mod score;

pub use crate::error::DomainError;
pub use crate::events::{LedCommand, LedSignal, NoteEvent};
pub use crate::io::{load_score_json, ExportFormat, JsonExporter, ScoreExporter, YamlExporter};
pub use crate::musicxml::MusicXmlExporter;
pub use crate::pitch::{note_label, parse_pitch, pitch_class_name};
pub use crate::score::{PracticeStatistics, Score, SessionSummary};
