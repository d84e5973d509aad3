use crate::{events::NoteEvent, score::Score};

/// The built-in karaoke song shipped with the trainer.
pub fn alle_meine_entchen() -> Score {
    let notes = [
        (0, 60, 4),
        (4, 62, 4),
        (8, 64, 4),
        (12, 65, 4),
        (16, 67, 8),
        (24, 67, 8),
        (32, 69, 4),
        (36, 69, 4),
        (40, 69, 4),
        (44, 69, 4),
        (48, 67, 16),
    ]
    .into_iter()
    .map(|(beat, pitch, duration)| NoteEvent::new(beat, pitch, duration))
    .collect();

    Score {
        title: "Alle meine Entchen".to_string(),
        notes,
        total_beats: 200,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_playable() {
        let score = alle_meine_entchen();
        assert!(score.validate().is_ok());
        assert_eq!(score.notes.len(), 11);
        assert_eq!(score.notes[4].display_name(), "G");
    }
}
