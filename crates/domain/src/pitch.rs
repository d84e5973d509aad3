use crate::DomainError;

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Highest valid pitch (MIDI note numbering).
pub const MAX_PITCH: u8 = 127;

/// Octave assumed when a note name is given without one.
const DEFAULT_OCTAVE: i32 = 4;

pub fn pitch_class_name(pitch: u8) -> &'static str {
    PITCH_CLASS_NAMES[(pitch % 12) as usize]
}

/// Scientific pitch label, middle C (60) is `C4`.
pub fn note_label(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", pitch_class_name(pitch), octave)
}

/// Parses either a raw pitch number (`"60"`) or a note name (`"C4"`, `"f#3"`, `"Db"`).
pub fn parse_pitch(input: &str) -> Result<u8, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("empty pitch"));
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed
            .parse::<u8>()
            .ok()
            .filter(|pitch| *pitch <= MAX_PITCH)
            .ok_or_else(|| DomainError::validation(format!("pitch out of range: {trimmed}")));
    }

    let mut chars = trimmed.chars();
    let letter = chars.next().map(|c| c.to_ascii_uppercase());
    let base: i32 = match letter {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return Err(DomainError::validation(format!("unknown note name: {trimmed}"))),
    };
    let rest = chars.as_str();
    let (accidental, octave_text) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave = if octave_text.is_empty() {
        DEFAULT_OCTAVE
    } else {
        octave_text
            .parse::<i32>()
            .map_err(|_| DomainError::validation(format!("invalid octave in {trimmed}")))?
    };

    let pitch = (octave + 1) * 12 + base + accidental;
    if !(0..=MAX_PITCH as i32).contains(&pitch) {
        return Err(DomainError::validation(format!("pitch out of range: {trimmed}")));
    }
    Ok(pitch as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_pitch_class() {
        assert_eq!(pitch_class_name(60), "C");
        assert_eq!(pitch_class_name(61), "C#");
        assert_eq!(pitch_class_name(71), "B");
        assert_eq!(note_label(60), "C4");
        assert_eq!(note_label(0), "C-1");
        assert_eq!(note_label(69), "A4");
    }

    #[test]
    fn parses_numbers_and_names() {
        assert_eq!(parse_pitch("60").unwrap(), 60);
        assert_eq!(parse_pitch(" C4 ").unwrap(), 60);
        assert_eq!(parse_pitch("c#4").unwrap(), 61);
        assert_eq!(parse_pitch("Db4").unwrap(), 61);
        assert_eq!(parse_pitch("A").unwrap(), 69);
        assert_eq!(parse_pitch("C-1").unwrap(), 0);
        assert_eq!(parse_pitch("G9").unwrap(), 127);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_pitch("").is_err());
        assert!(parse_pitch("128").is_err());
        assert!(parse_pitch("H2").is_err());
        assert!(parse_pitch("Cx").is_err());
        assert!(parse_pitch("G#9").is_err());
    }
}
