pub mod config;
pub mod engine;
pub mod led;
pub mod midi;
pub mod scheduler;
pub mod scoring;
pub mod session;

pub use config::EngineConfig;
pub use engine::{
    FlashToken, KeyOutcome, PlaybackEngine, PlaybackState, ScheduledClear, TickOutcome,
    TransportState,
};
pub use led::{LedCommandQueue, LedDriver, QueueLedDriver, TracingLedDriver};
pub use midi::{decode_key_press, MidiDevice, MidiKeyboard, MidiManager};
pub use scheduler::ClearQueue;
pub use scoring::ScoreTally;
pub use session::{KaraokeSession, SessionCommand, SessionContext, SessionEvent};
