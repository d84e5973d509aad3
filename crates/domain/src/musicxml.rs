use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::{
    error::DomainError,
    io::{ExportFormat, ScoreExporter},
    pitch::pitch_class_name,
    score::Score,
};

/// Ticks per quarter note; one tick is written as a sixteenth.
const DIVISIONS: u32 = 4;
/// Ticks per 4/4 measure.
const MEASURE_TICKS: u32 = DIVISIONS * 4;

/// Note values a single `<note>` can carry, longest first.
const NOTE_VALUES: [(u32, &str, bool); 8] = [
    (16, "whole", false),
    (12, "half", true),
    (8, "half", false),
    (6, "quarter", true),
    (4, "quarter", false),
    (3, "eighth", true),
    (2, "eighth", false),
    (1, "16th", false),
];

/// Writes a score as a single-staff partwise MusicXML document in 4/4.
///
/// The score is treated as one melodic line: a note is cut short where the
/// next later note starts, and notes sharing a start with an earlier one are
/// left out. Silence becomes rests and notes crossing a barline are tied.
pub struct MusicXmlExporter;

impl ScoreExporter for MusicXmlExporter {
    fn export(&self, score: &Score, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
        match format {
            ExportFormat::MusicXml => write_document(score).map_err(serialization),
            other => Err(DomainError::validation(format!(
                "MusicXmlExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    start: u32,
    length: u32,
    pitch: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Piece {
    length: u32,
    pitch: Option<u8>,
    tie_stop: bool,
    tie_start: bool,
}

fn melodic_line(score: &Score) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for (index, note) in score.notes.iter().enumerate() {
        if note.beat < cursor {
            continue;
        }
        let next_start = score.notes[index + 1..]
            .iter()
            .map(|next| next.beat)
            .find(|beat| *beat > note.beat);
        let end = next_start.map_or(note.end(), |next| note.end().min(next));
        if note.beat > cursor {
            segments.push(Segment {
                start: cursor,
                length: note.beat - cursor,
                pitch: None,
            });
        }
        segments.push(Segment {
            start: note.beat,
            length: end - note.beat,
            pitch: Some(note.pitch),
        });
        cursor = end;
    }
    let timeline = score.total_beats.max(cursor);
    let padded = timeline.div_ceil(MEASURE_TICKS) * MEASURE_TICKS;
    if padded > cursor {
        segments.push(Segment {
            start: cursor,
            length: padded - cursor,
            pitch: None,
        });
    }
    segments
}

/// Splits the line into measures of writable note values.
fn measures(segments: &[Segment]) -> Vec<Vec<Piece>> {
    let mut measures: Vec<Vec<Piece>> = Vec::new();
    for segment in segments {
        let mut chunks = Vec::new();
        let mut position = segment.start;
        let end = segment.start + segment.length;
        while position < end {
            let room = MEASURE_TICKS - position % MEASURE_TICKS;
            let remaining = (end - position).min(room);
            let (length, _, _) = NOTE_VALUES
                .iter()
                .copied()
                .find(|(ticks, _, _)| *ticks <= remaining)
                .unwrap_or((1, "16th", false));
            chunks.push((position / MEASURE_TICKS, length));
            position += length;
        }
        let last = chunks.len().saturating_sub(1);
        for (index, (measure, length)) in chunks.into_iter().enumerate() {
            let measure = measure as usize;
            if measures.len() <= measure {
                measures.resize_with(measure + 1, Vec::new);
            }
            let tied = segment.pitch.is_some();
            measures[measure].push(Piece {
                length,
                pitch: segment.pitch,
                tie_stop: tied && index > 0,
                tie_start: tied && index < last,
            });
        }
    }
    measures
}

type XmlResult = Result<(), quick_xml::Error>;

struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> XmlResult {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(element))
    }

    fn text(&mut self, name: &str, value: &str) -> XmlResult {
        self.start(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

fn write_document(score: &Score) -> Result<Vec<u8>, quick_xml::Error> {
    let mut out = XmlOut::new();
    out.writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.writer.write_event(Event::DocType(BytesText::from_escaped(
        r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#,
    )))?;
    out.start("score-partwise", &[("version", "3.1")])?;

    out.start("work", &[])?;
    out.text("work-title", &score.title)?;
    out.end("work")?;

    out.start("part-list", &[])?;
    out.start("score-part", &[("id", "P1")])?;
    out.text("part-name", "Piano")?;
    out.end("score-part")?;
    out.end("part-list")?;

    out.start("part", &[("id", "P1")])?;
    for (index, pieces) in measures(&melodic_line(score)).iter().enumerate() {
        let number = (index + 1).to_string();
        out.start("measure", &[("number", number.as_str())])?;
        if index == 0 {
            write_attributes(&mut out)?;
        }
        for piece in pieces {
            write_piece(&mut out, piece)?;
        }
        out.end("measure")?;
    }
    out.end("part")?;
    out.end("score-partwise")?;
    Ok(out.finish())
}

fn write_attributes(out: &mut XmlOut) -> XmlResult {
    out.start("attributes", &[])?;
    out.text("divisions", &DIVISIONS.to_string())?;
    out.start("key", &[])?;
    out.text("fifths", "0")?;
    out.end("key")?;
    out.start("time", &[])?;
    out.text("beats", "4")?;
    out.text("beat-type", "4")?;
    out.end("time")?;
    out.start("clef", &[])?;
    out.text("sign", "G")?;
    out.text("line", "2")?;
    out.end("clef")?;
    out.end("attributes")
}

fn write_piece(out: &mut XmlOut, piece: &Piece) -> XmlResult {
    let (_, kind, dotted) = NOTE_VALUES
        .iter()
        .copied()
        .find(|(ticks, _, _)| *ticks == piece.length)
        .unwrap_or((1, "16th", false));

    out.start("note", &[])?;
    match piece.pitch {
        Some(pitch) => {
            let name = pitch_class_name(pitch);
            out.start("pitch", &[])?;
            out.text("step", &name[..1])?;
            if name.ends_with('#') {
                out.text("alter", "1")?;
            }
            out.text("octave", &(i32::from(pitch) / 12 - 1).to_string())?;
            out.end("pitch")?;
        }
        None => out.empty("rest", &[])?,
    }
    out.text("duration", &piece.length.to_string())?;
    if piece.tie_stop {
        out.empty("tie", &[("type", "stop")])?;
    }
    if piece.tie_start {
        out.empty("tie", &[("type", "start")])?;
    }
    out.text("type", kind)?;
    if dotted {
        out.empty("dot", &[])?;
    }
    if piece.tie_stop || piece.tie_start {
        out.start("notations", &[])?;
        if piece.tie_stop {
            out.empty("tied", &[("type", "stop")])?;
        }
        if piece.tie_start {
            out.empty("tied", &[("type", "start")])?;
        }
        out.end("notations")?;
    }
    out.end("note")
}

fn serialization(err: quick_xml::Error) -> DomainError {
    DomainError::Serialization(err.to_string())
}
