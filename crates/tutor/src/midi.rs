use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::session::SessionCommand;

const NOTE_ON: u8 = 0x90;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MidiDevice {
    pub index: usize,
    pub name: String,
}

pub struct MidiManager;

impl MidiManager {
    pub fn list_inputs() -> Result<Vec<MidiDevice>> {
        let input = MidiInput::new("andio")?;
        Ok(input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiDevice {
                index,
                name: input.port_name(port).unwrap_or_else(|_| "Unknown".into()),
            })
            .collect())
    }
}

/// Pitch of a key going down, if `message` is a note-on with non-zero velocity.
pub fn decode_key_press(message: &[u8]) -> Option<u8> {
    match message {
        [status, pitch, velocity, ..] if status & 0xF0 == NOTE_ON && *velocity > 0 => {
            Some(*pitch & 0x7F)
        }
        _ => None,
    }
}

/// Live connection to a MIDI keyboard; the port closes when this is dropped.
pub struct MidiKeyboard {
    port_name: String,
    _connection: MidiInputConnection<()>,
}

impl MidiKeyboard {
    pub fn connect(port_index: usize, commands: Sender<SessionCommand>) -> Result<Self> {
        let mut input = MidiInput::new("andio-keyboard")?;
        input.ignore(Ignore::All);
        let ports = input.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| anyhow!("no midi input at index {port_index}"))?;
        let port_name = input
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".into());

        let connection = input
            .connect(
                port,
                "andio-keys",
                move |_stamp, message, _| {
                    if let Some(pitch) = decode_key_press(message) {
                        debug!(pitch, "midi key press");
                        if commands.try_send(SessionCommand::KeyPress(pitch)).is_err() {
                            warn!(pitch, "session not accepting key presses");
                        }
                    }
                },
                (),
            )
            .map_err(|err| anyhow!("connect midi input: {:?}", err.kind()))?;
        info!(port = %port_name, "midi keyboard connected");

        Ok(Self {
            port_name,
            _connection: connection,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_inputs_are_indexed_in_port_order() {
        if let Ok(devices) = MidiManager::list_inputs() {
            for (position, device) in devices.iter().enumerate() {
                assert_eq!(device.index, position);
            }
        }
    }

    #[test]
    fn note_on_is_a_key_press() {
        assert_eq!(decode_key_press(&[0x90, 60, 100]), Some(60));
        assert_eq!(decode_key_press(&[0x93, 72, 1]), Some(72));
    }

    #[test]
    fn other_messages_are_ignored() {
        assert_eq!(decode_key_press(&[0x90, 60, 0]), None);
        assert_eq!(decode_key_press(&[0x80, 60, 64]), None);
        assert_eq!(decode_key_press(&[0xB0, 64, 127]), None);
        assert_eq!(decode_key_press(&[0x90, 60]), None);
        assert_eq!(decode_key_press(&[]), None);
    }
}
