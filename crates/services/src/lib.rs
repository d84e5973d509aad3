pub mod addons;
pub mod calibration;
pub mod library;
pub mod profiles;
pub mod settings;
pub mod storage;

pub use addons::{catalog, Addon, AddonKind, AddonListing, AddonManager, InstalledAddon};
pub use calibration::{tone_map, AutomapResult, Calibration, ToneMapping};
pub use library::{Difficulty, LibraryFilter, SongEntry, SongLibrary, SongSource, SortOrder};
pub use profiles::{Profile, ProfileStore};
pub use settings::{AppSettings, ConnectionType};
pub use storage::{get_json, set_json, FileStore, KeyValueStore, MemoryStore};
