use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use andio_domain::{DomainError, Score, SessionSummary};

use crate::config::EngineConfig;
use crate::engine::{KeyOutcome, PlaybackEngine, TickOutcome, TransportState};
use crate::led::LedDriver;
use crate::scheduler::ClearQueue;

/// Who is playing what; passed in explicitly for each session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    pub profile_id: Option<String>,
    pub song_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    KeyPress(u8),
    TogglePlay,
    Restart,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Transport(TransportState),
    Tick { tick: u32, progress: u8 },
    Key(KeyOutcome),
    Finished(SessionSummary),
}

/// Hosts one engine on a single task: ticks, key presses and flash reverts
/// are all applied from the same loop, never concurrently.
pub struct KaraokeSession<D: LedDriver> {
    engine: PlaybackEngine<D>,
    clears: ClearQueue,
    context: SessionContext,
}

impl<D: LedDriver> KaraokeSession<D> {
    pub fn new(
        score: Score,
        config: EngineConfig,
        driver: D,
        context: SessionContext,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            engine: PlaybackEngine::new(score, config, driver)?,
            clears: ClearQueue::new(),
            context,
        })
    }

    pub fn engine(&self) -> &PlaybackEngine<D> {
        &self.engine
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Runs until the score finishes (`Some(summary)`), or until `Stop` arrives
    /// or every command sender is gone (`None`).
    pub async fn run(
        &mut self,
        mut commands: Receiver<SessionCommand>,
        events: UnboundedSender<SessionEvent>,
    ) -> Option<SessionSummary> {
        let period = self.engine.config().tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            song = ?self.context.song_id,
            profile = ?self.context.profile_id,
            "karaoke session running"
        );

        loop {
            let playing = self.engine.state().is_playing();
            let next_clear = self.clears.next_due();
            let clear_at = next_clear.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = ticker.tick(), if playing => {
                    match self.engine.tick() {
                        TickOutcome::Advanced { tick } => {
                            let progress = self.engine.progress_percent();
                            let _ = events.send(SessionEvent::Tick { tick, progress });
                        }
                        TickOutcome::Finished(summary) => {
                            self.clears.cancel_all();
                            let _ = events.send(SessionEvent::Finished(summary));
                            return Some(summary);
                        }
                        TickOutcome::Ignored => {}
                    }
                }
                _ = sleep_until(clear_at), if next_clear.is_some() => {
                    for token in self.clears.pop_due(Instant::now()) {
                        self.engine.apply_clear(token);
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("command channel closed");
                        return None;
                    };
                    match command {
                        SessionCommand::KeyPress(pitch) => {
                            let outcome = self.engine.on_key_press(pitch);
                            if outcome != KeyOutcome::Ignored {
                                let _ = events.send(SessionEvent::Key(outcome));
                            }
                            if matches!(outcome, KeyOutcome::Wrong { .. }) {
                                let _ = events.send(SessionEvent::Transport(self.engine.transport()));
                            }
                        }
                        SessionCommand::TogglePlay => {
                            let transport = self.engine.toggle_play();
                            if transport == TransportState::Playing {
                                ticker.reset();
                            }
                            let _ = events.send(SessionEvent::Transport(transport));
                        }
                        SessionCommand::Restart => {
                            self.engine.restart();
                            self.clears.cancel_all();
                            let _ = events.send(SessionEvent::Transport(self.engine.transport()));
                        }
                        SessionCommand::Stop => {
                            info!("session stopped");
                            return None;
                        }
                    }
                }
            }

            let now = Instant::now();
            for clear in self.engine.take_scheduled() {
                self.clears.schedule(now, clear);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use andio_domain::{LedCommand, LedSignal, NoteEvent};
    use tokio::sync::mpsc;

    fn session(notes: Vec<NoteEvent>, total_beats: u32) -> KaraokeSession<Vec<LedCommand>> {
        let score = Score::new("Session", notes, total_beats).unwrap();
        KaraokeSession::new(
            score,
            EngineConfig::default(),
            Vec::new(),
            SessionContext {
                profile_id: Some("prof_1".into()),
                song_id: Some("song_1".into()),
            },
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn plays_to_the_end() {
        let mut session = session(vec![NoteEvent::new(0, 60, 4)], 4);
        let (commands, receiver) = mpsc::channel(8);
        let (events, mut event_rx) = mpsc::unbounded_channel();
        commands.send(SessionCommand::TogglePlay).await.unwrap();
        commands.send(SessionCommand::KeyPress(60)).await.unwrap();

        let summary = session.run(receiver, events).await;
        assert_eq!(
            summary,
            Some(SessionSummary {
                correct: 1,
                wrong: 0,
                max_streak: 1
            })
        );

        let mut seen = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.first(), Some(&SessionEvent::Transport(TransportState::Playing)));
        assert!(seen.contains(&SessionEvent::Key(KeyOutcome::Correct { pitch: 60 })));
        assert_eq!(seen.last(), Some(&SessionEvent::Finished(summary.unwrap())));

        let led = session.engine().driver();
        assert!(led.contains(&LedCommand::new(60, LedSignal::Correct)));
        assert_eq!(led.last(), Some(&LedCommand::new(60, LedSignal::Off)));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_key_pauses_and_clears_later() {
        let mut session = session(vec![NoteEvent::new(0, 60, 40)], 40);
        let (commands, receiver) = mpsc::channel(8);
        let (events, _event_rx) = mpsc::unbounded_channel();
        commands.send(SessionCommand::TogglePlay).await.unwrap();
        commands.send(SessionCommand::KeyPress(61)).await.unwrap();

        let driver = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            commands.send(SessionCommand::Stop).await.unwrap();
        });
        let summary = session.run(receiver, events).await;
        driver.await.unwrap();

        assert_eq!(summary, None);
        assert_eq!(session.engine().transport(), TransportState::Paused);
        assert_eq!(session.engine().state().current_tick, 0);
        assert_eq!(session.engine().state().led(61), LedSignal::Off);
        assert_eq!(session.engine().tally().wrong, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flash_in_final_window_is_turned_off() {
        let mut session = session(vec![NoteEvent::new(0, 60, 2)], 2);
        let (commands, receiver) = mpsc::channel(8);
        let (events, _event_rx) = mpsc::unbounded_channel();
        commands.send(SessionCommand::TogglePlay).await.unwrap();

        let keys = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            commands.send(SessionCommand::KeyPress(60)).await.unwrap();
            commands
        });
        let summary = session.run(receiver, events).await;
        let _commands = keys.await.unwrap();

        assert_eq!(summary.map(|s| s.correct), Some(1));
        assert_eq!(session.engine().state().led(60), LedSignal::Off);
        assert_eq!(
            session.engine().driver().last(),
            Some(&LedCommand::new(60, LedSignal::Off))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_drops_pending_clears() {
        let mut session = session(vec![NoteEvent::new(0, 60, 40)], 40);
        let (commands, receiver) = mpsc::channel(8);
        let (events, _event_rx) = mpsc::unbounded_channel();
        commands.send(SessionCommand::TogglePlay).await.unwrap();
        commands.send(SessionCommand::KeyPress(62)).await.unwrap();
        commands.send(SessionCommand::Restart).await.unwrap();
        drop(commands);

        assert_eq!(session.run(receiver, events).await, None);
        assert_eq!(session.engine().transport(), TransportState::Idle);
        assert!(session.engine().state().led_state.is_empty());
        assert_eq!(session.engine().tally().wrong, 0);
    }
}
