use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use andio_domain::{samples, PracticeStatistics, Score, SessionSummary};

use crate::storage::{get_json, set_json, KeyValueStore};

const SONG_PREFIX: &str = "song:";
const SCORE_PREFIX: &str = "score:";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SongSource {
    Preinstalled,
    Scanned,
    Imported,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SongEntry {
    pub id: String,
    pub title: String,
    pub composer: String,
    pub difficulty: Difficulty,
    pub measures: u32,
    pub note_count: u32,
    pub favorite: bool,
    pub source: SongSource,
    pub stats: PracticeStatistics,
}

impl SongEntry {
    fn preinstalled(
        id: &str,
        title: &str,
        composer: &str,
        difficulty: Difficulty,
        measures: u32,
        note_count: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            composer: composer.to_string(),
            difficulty,
            measures,
            note_count,
            favorite: false,
            source: SongSource::Preinstalled,
            stats: PracticeStatistics::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LibraryFilter {
    #[default]
    All,
    Favorites,
    Recent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Recent,
    Title,
    Difficulty,
}

fn preinstalled_songs() -> Vec<SongEntry> {
    vec![
        SongEntry::preinstalled("song_1", "Alle meine Entchen", "Volkslied", Difficulty::Easy, 8, 32),
        SongEntry::preinstalled("song_2", "Hänschen Klein", "Volkslied", Difficulty::Easy, 12, 48),
        SongEntry::preinstalled("song_3", "Ode an die Freude", "Beethoven", Difficulty::Medium, 32, 124),
        SongEntry::preinstalled("song_4", "Für Elise (Intro)", "Beethoven", Difficulty::Medium, 24, 96),
    ]
}

/// Song catalog kept in a key-value store under `song:<id>`, with playable
/// scores under `score:<id>`.
pub struct SongLibrary<'a, S: KeyValueStore> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> SongLibrary<'a, S> {
    /// Opens the library, seeding the preinstalled songs into an empty store.
    pub fn open(store: &'a mut S) -> Result<Self> {
        if store.list(SONG_PREFIX)?.is_empty() {
            for song in preinstalled_songs() {
                set_json(&mut *store, &song_key(&song.id), &song)?;
            }
            set_json(&mut *store, &score_key("song_1"), &samples::alle_meine_entchen())?;
            info!("seeded preinstalled songs");
        }
        Ok(Self { store })
    }

    pub fn songs(&self) -> Result<Vec<SongEntry>> {
        let mut songs = Vec::new();
        for key in self.store.list(SONG_PREFIX)? {
            if let Some(song) = get_json(&*self.store, &key)? {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    pub fn song(&self, id: &str) -> Result<Option<SongEntry>> {
        get_json(&*self.store, &song_key(id))
    }

    pub fn score(&self, id: &str) -> Result<Option<Score>> {
        get_json(&*self.store, &score_key(id))
    }

    /// Adds a user song (scanned or imported) together with its score.
    pub fn add(&mut self, entry: SongEntry, score: &Score) -> Result<()> {
        score.validate()?;
        set_json(&mut *self.store, &song_key(&entry.id), &entry)?;
        set_json(&mut *self.store, &score_key(&entry.id), score)?;
        info!(id = %entry.id, title = %entry.title, "song added");
        Ok(())
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let mut song = self.require(id)?;
        song.favorite = !song.favorite;
        set_json(&mut *self.store, &song_key(id), &song)?;
        Ok(song.favorite)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        let song = self.require(id)?;
        if song.source == SongSource::Preinstalled {
            bail!("preinstalled song {id} cannot be deleted");
        }
        self.store.delete(&song_key(id))?;
        self.store.delete(&score_key(id))?;
        info!(id, "song deleted");
        Ok(())
    }

    pub fn record_result(
        &mut self,
        id: &str,
        summary: &SessionSummary,
        at: OffsetDateTime,
    ) -> Result<SongEntry> {
        let mut song = self.require(id)?;
        song.stats.record(summary, at);
        set_json(&mut *self.store, &song_key(id), &song)?;
        info!(
            id,
            accuracy = summary.accuracy_percent(),
            best = song.stats.best_score,
            "session result recorded"
        );
        Ok(song)
    }

    pub fn query(
        &self,
        filter: LibraryFilter,
        search: &str,
        sort: SortOrder,
    ) -> Result<Vec<SongEntry>> {
        let needle = search.trim().to_lowercase();
        let mut songs: Vec<SongEntry> = self
            .songs()?
            .into_iter()
            .filter(|song| match filter {
                LibraryFilter::All => true,
                LibraryFilter::Favorites => song.favorite,
                LibraryFilter::Recent => song.stats.last_practiced.is_some(),
            })
            .filter(|song| {
                needle.is_empty()
                    || song.title.to_lowercase().contains(&needle)
                    || song.composer.to_lowercase().contains(&needle)
            })
            .collect();
        match sort {
            SortOrder::Recent => {
                songs.sort_by(|a, b| b.stats.last_practiced.cmp(&a.stats.last_practiced))
            }
            SortOrder::Title => songs.sort_by(|a, b| a.title.cmp(&b.title)),
            SortOrder::Difficulty => songs.sort_by_key(|song| song.difficulty),
        }
        Ok(songs)
    }

    fn require(&self, id: &str) -> Result<SongEntry> {
        self.song(id)?.ok_or_else(|| anyhow!("unknown song {id}"))
    }
}

fn song_key(id: &str) -> String {
    format!("{SONG_PREFIX}{id}")
}

fn score_key(id: &str) -> String {
    format!("{SCORE_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use andio_domain::NoteEvent;
    use time::Duration;

    #[test]
    fn seeds_preinstalled_songs_once() {
        let mut store = MemoryStore::new();
        let library = SongLibrary::open(&mut store).unwrap();
        assert_eq!(library.songs().unwrap().len(), 4);
        assert!(library.score("song_1").unwrap().is_some());

        let reopened = SongLibrary::open(&mut store).unwrap();
        assert_eq!(reopened.songs().unwrap().len(), 4);
    }

    #[test]
    fn preinstalled_songs_cannot_be_deleted() {
        let mut store = MemoryStore::new();
        let mut library = SongLibrary::open(&mut store).unwrap();
        assert!(library.delete("song_1").is_err());
        assert!(library.delete("missing").is_err());

        let score = Score::new("Scan", vec![NoteEvent::new(0, 60, 2)], 2).unwrap();
        let mut entry = SongEntry::preinstalled("scan_1", "Scan", "Me", Difficulty::Hard, 1, 1);
        entry.source = SongSource::Scanned;
        library.add(entry, &score).unwrap();
        library.delete("scan_1").unwrap();
        assert!(library.song("scan_1").unwrap().is_none());
        assert!(library.score("scan_1").unwrap().is_none());
    }

    #[test]
    fn favorites_and_recent_filters() {
        let mut store = MemoryStore::new();
        let mut library = SongLibrary::open(&mut store).unwrap();
        assert!(library.toggle_favorite("song_2").unwrap());
        let favorites = library
            .query(LibraryFilter::Favorites, "", SortOrder::Title)
            .unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, "song_2");

        let earlier = OffsetDateTime::UNIX_EPOCH;
        let later = earlier + Duration::days(1);
        let summary = SessionSummary {
            correct: 9,
            wrong: 1,
            max_streak: 6,
        };
        library.record_result("song_3", &summary, earlier).unwrap();
        let updated = library.record_result("song_1", &summary, later).unwrap();
        assert_eq!(updated.stats.best_score, 90);

        let recent = library
            .query(LibraryFilter::Recent, "", SortOrder::Recent)
            .unwrap();
        let ids: Vec<&str> = recent.iter().map(|song| song.id.as_str()).collect();
        assert_eq!(ids, vec!["song_1", "song_3"]);
    }

    #[test]
    fn search_matches_title_or_composer() {
        let mut store = MemoryStore::new();
        let library = SongLibrary::open(&mut store).unwrap();
        let found = library
            .query(LibraryFilter::All, "beethoven", SortOrder::Title)
            .unwrap();
        let titles: Vec<&str> = found.iter().map(|song| song.title.as_str()).collect();
        assert_eq!(titles, vec!["Für Elise (Intro)", "Ode an die Freude"]);
    }
}
