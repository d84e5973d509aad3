use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use andio_domain::{
    load_score_json, note_label, parse_pitch, samples, ExportFormat, JsonExporter,
    MusicXmlExporter, Score, ScoreExporter, SessionSummary, YamlExporter,
};
use andio_services::{
    AddonManager, AppSettings, Calibration, ConnectionType, FileStore, LibraryFilter,
    ProfileStore, SongLibrary, SortOrder,
};
use andio_tutor::{
    EngineConfig, KaraokeSession, KeyOutcome, MidiKeyboard, MidiManager, QueueLedDriver,
    SessionCommand, SessionContext, SessionEvent, TracingLedDriver, TransportState,
};

/// How often queued LED commands are handed to the LED bridge.
const LED_BRIDGE_POLL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Andio LED piano trainer", long_about = None)]
struct Cli {
    /// Path of the local data store (defaults to the user data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a karaoke session; type note names on stdin, `p` to pause, `r` to restart, `q` to quit
    Play {
        /// JSON score to play
        score: Option<PathBuf>,
        /// Library song to play instead of a file
        #[arg(long)]
        song: Option<String>,
        /// YAML engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// MIDI input port index to take key presses from
        #[arg(long)]
        midi_port: Option<usize>,
        /// Profile the session is played under
        #[arg(long)]
        profile: Option<String>,
    },
    /// List MIDI input devices
    Devices,
    /// Show the song library
    Library {
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        recent: bool,
        #[arg(long, default_value = "")]
        search: String,
        /// Toggle the favorite flag of a song
        #[arg(long)]
        toggle_favorite: Option<String>,
    },
    /// List, create or delete learner profiles
    Profiles {
        #[arg(long)]
        create: Option<String>,
        #[arg(long)]
        delete: Option<String>,
    },
    /// Show or change device settings
    Settings {
        #[arg(long)]
        brightness: Option<u8>,
        #[arg(long, value_enum)]
        connection: Option<Connection>,
        #[arg(long)]
        lan_url: Option<String>,
    },
    /// Export a score file, a library song or the built-in demo score
    #[command(visible_alias = "demo-score")]
    Export {
        /// JSON score to convert
        score: Option<PathBuf>,
        #[arg(long)]
        song: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List, install or remove add-ons
    Addons {
        #[arg(long)]
        install: Option<String>,
        #[arg(long)]
        uninstall: Option<String>,
    },
    /// Store the key counts of the LED strip and mark a profile as calibrated
    Calibrate {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        white: u32,
        #[arg(long)]
        black: u32,
        /// Counts were detected automatically rather than typed in
        #[arg(long)]
        automapped: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Yaml,
    Musicxml,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Connection {
    Usb,
    Lan,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store_path = cli.store.unwrap_or_else(default_store_path);

    match cli.command {
        Command::Play {
            score,
            song,
            config,
            midi_port,
            profile,
        } => {
            let mut store = FileStore::open(&store_path)?;
            let score = resolve_score(&mut store, score.as_deref(), song.as_deref())?;
            let config = match config {
                Some(path) => EngineConfig::from_yaml_path(path)?,
                None => EngineConfig::default(),
            };
            let context = SessionContext {
                profile_id: profile,
                song_id: song,
            };
            if let Some(summary) = play(score, config, context.clone(), midi_port).await? {
                if let Some(song_id) = context.song_id.as_deref() {
                    let mut library = SongLibrary::open(&mut store)?;
                    let entry = library.record_result(song_id, &summary, OffsetDateTime::now_utc())?;
                    println!("Best score for {}: {}%", entry.title, entry.stats.best_score);
                }
            }
        }
        Command::Devices => {
            let devices = MidiManager::list_inputs()?;
            if devices.is_empty() {
                println!("No MIDI inputs found");
            }
            for device in devices {
                println!("{}: {}", device.index, device.name);
            }
        }
        Command::Library {
            favorites,
            recent,
            search,
            toggle_favorite,
        } => {
            let mut store = FileStore::open(&store_path)?;
            let mut library = SongLibrary::open(&mut store)?;
            if let Some(id) = toggle_favorite {
                let favorite = library.toggle_favorite(&id)?;
                println!("{id} favorite: {favorite}");
            }
            let filter = if favorites {
                LibraryFilter::Favorites
            } else if recent {
                LibraryFilter::Recent
            } else {
                LibraryFilter::All
            };
            for song in library.query(filter, &search, SortOrder::Recent)? {
                println!(
                    "{:<8} {:<24} {:<12} {:?} best {}%{}",
                    song.id,
                    song.title,
                    song.composer,
                    song.difficulty,
                    song.stats.best_score,
                    if song.favorite { " *" } else { "" }
                );
            }
        }
        Command::Profiles { create, delete } => {
            let mut store = FileStore::open(&store_path)?;
            let mut profiles = ProfileStore::new(&mut store);
            if let Some(name) = create {
                let profile = profiles.create(&name, OffsetDateTime::now_utc())?;
                println!("Created profile {} ({})", profile.name, profile.id);
            }
            if let Some(id) = delete {
                if !profiles.delete(&id)? {
                    warn!(id = %id, "no such profile");
                }
            }
            for profile in profiles.list()? {
                println!(
                    "{} {} calibrated={} keys={}/{}",
                    profile.id, profile.name, profile.calibrated, profile.white_keys, profile.black_keys
                );
            }
        }
        Command::Settings {
            brightness,
            connection,
            lan_url,
        } => {
            let mut store = FileStore::open(&store_path)?;
            let mut settings = AppSettings::load(&store)?;
            let changed = brightness.is_some() || connection.is_some() || lan_url.is_some();
            if let Some(brightness) = brightness {
                settings.brightness = brightness;
            }
            if let Some(connection) = connection {
                settings.connection = match connection {
                    Connection::Usb => ConnectionType::Usb,
                    Connection::Lan => ConnectionType::Lan,
                };
            }
            if lan_url.is_some() {
                settings.lan_url = lan_url;
            }
            if changed {
                settings.save(&mut store, OffsetDateTime::now_utc())?;
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Export {
            score,
            song,
            format,
            output,
        } => {
            let score = if score.is_none() && song.is_none() {
                samples::alle_meine_entchen()
            } else {
                let mut store = FileStore::open(&store_path)?;
                resolve_score(&mut store, score.as_deref(), song.as_deref())?
            };
            let bytes = match format {
                Format::Json => JsonExporter.export(&score, ExportFormat::Json)?,
                Format::Yaml => YamlExporter.export(&score, ExportFormat::Yaml)?,
                Format::Musicxml => MusicXmlExporter.export(&score, ExportFormat::MusicXml)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("write export {:?}", path))?;
                    info!(path = %path.display(), bytes = bytes.len(), "score exported");
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        Command::Addons { install, uninstall } => {
            let mut store = FileStore::open(&store_path)?;
            let mut addons = AddonManager::new(&mut store);
            if let Some(id) = install {
                let installed = addons.install(&id, OffsetDateTime::now_utc())?;
                println!("Installed {} ({} KB)", installed.addon.name, installed.addon.size_kb);
            }
            if let Some(id) = uninstall {
                if !addons.uninstall(&id)? {
                    warn!(id = %id, "add-on is not installed");
                }
            }
            for listing in addons.available()? {
                println!(
                    "{:<16} {:<24} {:?}{}",
                    listing.addon.id,
                    listing.addon.name,
                    listing.addon.kind,
                    if listing.installed { " [installed]" } else { "" }
                );
            }
        }
        Command::Calibrate {
            profile,
            white,
            black,
            automapped,
        } => {
            let mut store = FileStore::open(&store_path)?;
            let mut calibration = Calibration::new(&mut store);
            let profile =
                calibration.calibrate(&profile, white, black, automapped, OffsetDateTime::now_utc())?;
            let mapping = calibration.tone_calibration()?;
            println!(
                "{} calibrated: {} white, {} black keys",
                profile.name, profile.white_keys, profile.black_keys
            );
            if let (Some(first), Some(last)) = (mapping.first(), mapping.last()) {
                println!(
                    "LED 0 = {} ({:.2} Hz), LED {} = {} ({:.2} Hz)",
                    note_label(first.midi),
                    first.frequency_hz,
                    last.led_index,
                    note_label(last.midi),
                    last.frequency_hz
                );
            }
        }
    }
    Ok(())
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("andio").join("store.json"))
        .unwrap_or_else(|| PathBuf::from("andio-store.json"))
}

fn resolve_score(store: &mut FileStore, path: Option<&Path>, song: Option<&str>) -> Result<Score> {
    if let Some(path) = path {
        let bytes = std::fs::read(path).with_context(|| format!("read score {:?}", path))?;
        return Ok(load_score_json(&bytes)?);
    }
    if let Some(id) = song {
        let library = SongLibrary::open(store)?;
        return library
            .score(id)?
            .ok_or_else(|| anyhow!("song {id} has no playable score"));
    }
    Ok(samples::alle_meine_entchen())
}

async fn play(
    score: Score,
    config: EngineConfig,
    context: SessionContext,
    midi_port: Option<usize>,
) -> Result<Option<SessionSummary>> {
    println!("{} - {} notes", score.title, score.notes.len());
    println!("Enter note names (C4, 61, ...), `p` start/pause, `r` restart, `q` quit");

    let (driver, mut led_queue) = QueueLedDriver::with_capacity(config.led_queue_capacity);
    let mut session = KaraokeSession::new(score, config, driver, context)?;

    let (stop_bridge, mut bridge_stopped) = oneshot::channel::<()>();
    let bridge = tokio::spawn(async move {
        let mut hardware = TracingLedDriver;
        let mut poll = tokio::time::interval(LED_BRIDGE_POLL);
        loop {
            tokio::select! {
                _ = poll.tick() => {
                    led_queue.forward_to(&mut hardware);
                }
                _ = &mut bridge_stopped => {
                    led_queue.forward_to(&mut hardware);
                    break;
                }
            }
        }
    });
    let (commands, receiver) = mpsc::channel(64);
    let (events, mut event_rx) = mpsc::unbounded_channel();

    let _keyboard = match midi_port {
        Some(index) => Some(MidiKeyboard::connect(index, commands.clone())?),
        None => None,
    };

    let stdin_commands = commands;
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "" => continue,
                "p" => SessionCommand::TogglePlay,
                "r" => SessionCommand::Restart,
                "q" => SessionCommand::Stop,
                other => match parse_pitch(other) {
                    Ok(pitch) => SessionCommand::KeyPress(pitch),
                    Err(err) => {
                        eprintln!("{err}");
                        continue;
                    }
                },
            };
            if stdin_commands.blocking_send(command).is_err() {
                break;
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Transport(TransportState::Playing) => println!("> playing"),
                SessionEvent::Transport(TransportState::Paused) => println!("|| paused"),
                SessionEvent::Transport(TransportState::Idle) => println!("<< restarted"),
                SessionEvent::Transport(TransportState::Finished) => {}
                SessionEvent::Tick { tick, progress } => {
                    if tick % 10 == 0 {
                        println!("   {progress}%");
                    }
                }
                SessionEvent::Key(KeyOutcome::Correct { pitch }) => {
                    println!("ok {}", note_label(pitch))
                }
                SessionEvent::Key(KeyOutcome::Wrong { expected, played }) => println!(
                    "wrong key: expected {}, played {}",
                    note_label(expected.pitch),
                    note_label(played)
                ),
                SessionEvent::Key(KeyOutcome::Ignored) => {}
                SessionEvent::Finished(summary) => println!(
                    "Finished: {} correct, {} wrong, best streak {}",
                    summary.correct, summary.wrong, summary.max_streak
                ),
            }
        }
    });

    let summary = session.run(receiver, events).await;
    printer.await?;
    let _ = stop_bridge.send(());
    bridge.await?;
    let dropped = session.engine().driver().dropped();
    if dropped > 0 {
        warn!(dropped, "led commands dropped by a full queue");
    }
    info!(finished = summary.is_some(), "session ended");
    Ok(summary)
}
