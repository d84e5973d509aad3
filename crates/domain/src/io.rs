use serde::{Deserialize, Serialize};

use crate::{error::DomainError, score::Score};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
    MusicXml,
}

pub trait ScoreExporter {
    fn export(&self, score: &Score, format: ExportFormat) -> Result<Vec<u8>, DomainError>;
}

pub struct JsonExporter;

impl ScoreExporter for JsonExporter {
    fn export(&self, score: &Score, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        match format {
            ExportFormat::Json => serde_json::to_vec_pretty(score)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            other => Err(DomainError::validation(format!(
                "JsonExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

pub struct YamlExporter;

impl ScoreExporter for YamlExporter {
    fn export(&self, score: &Score, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        match format {
            ExportFormat::Yaml => serde_yaml::to_string(score)
                .map(String::into_bytes)
                .map_err(|err| DomainError::Serialization(err.to_string())),
            other => Err(DomainError::validation(format!(
                "YamlExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

/// Deserializes a score and re-establishes its ordering and validity.
pub fn load_score_json(bytes: &[u8]) -> Result<Score, DomainError> {
    let raw: Score =
        serde_json::from_slice(bytes).map_err(|err| DomainError::Serialization(err.to_string()))?;
    Score::new(raw.title, raw.notes, raw.total_beats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoteEvent;

    #[test]
    fn exports_json() {
        let score = Score::new("title", vec![NoteEvent::new(0, 60, 4)], 4).unwrap();
        let bytes = JsonExporter.export(&score, ExportFormat::Json).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"title\": \"title\""));
        assert!(output.contains("\"total_beats\": 4"));
    }

    #[test]
    fn json_exporter_refuses_yaml() {
        let score = Score::new("title", vec![NoteEvent::new(0, 60, 4)], 4).unwrap();
        assert!(JsonExporter.export(&score, ExportFormat::Yaml).is_err());
    }

    #[test]
    fn exports_yaml() {
        let score = Score::new("title", vec![NoteEvent::new(0, 60, 4)], 4).unwrap();
        let bytes = YamlExporter.export(&score, ExportFormat::Yaml).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("title: title"));
        assert!(YamlExporter.export(&score, ExportFormat::Json).is_err());
    }

    #[test]
    fn loading_sorts_and_validates() {
        let json = br#"{
            "title": "Loaded",
            "notes": [
                {"beat": 2, "pitch": 62, "duration": 2},
                {"beat": 0, "pitch": 60, "duration": 2}
            ],
            "total_beats": 4
        }"#;
        let score = load_score_json(json).unwrap();
        assert_eq!(score.notes[0].pitch, 60);

        let empty = br#"{"title": "Empty", "notes": [], "total_beats": 4}"#;
        assert!(matches!(
            load_score_json(empty),
            Err(DomainError::Configuration(_))
        ));
        assert!(matches!(
            load_score_json(b"not json"),
            Err(DomainError::Serialization(_))
        ));
    }
}
