use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use andio_domain::pitch::{pitch_class_name, MAX_PITCH};

use crate::profiles::{Profile, ProfileStore};
use crate::storage::{get_json, set_json, KeyValueStore};

const AUTOMAP_KEY: &str = "automap_result";
const TONE_MAP_KEY: &str = "tone_calibration";

/// Pitch lit by the first LED of the strip (A0).
pub const LOWEST_KEY_PITCH: u8 = 21;
const LOWEST_KEY_HZ: f64 = 27.5;

/// Key counts detected on the LED strip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutomapResult {
    pub white: u32,
    pub black: u32,
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToneMapping {
    pub led_index: u32,
    pub midi: u8,
    pub frequency_hz: f64,
    pub is_white: bool,
}

/// One entry per LED, counted upwards from A0 in semitones.
pub fn tone_map(white: u32, black: u32) -> Result<Vec<ToneMapping>> {
    let total = white + black;
    let max_keys = u32::from(MAX_PITCH - LOWEST_KEY_PITCH) + 1;
    if white == 0 {
        bail!("calibration needs at least one white key");
    }
    if total > max_keys {
        bail!("{total} keys exceed the {max_keys} addressable pitches");
    }
    Ok((0..total)
        .map(|index| {
            let midi = LOWEST_KEY_PITCH + index as u8;
            let frequency = LOWEST_KEY_HZ * 2f64.powf(f64::from(index) / 12.0);
            ToneMapping {
                led_index: index,
                midi,
                frequency_hz: (frequency * 100.0).round() / 100.0,
                is_white: !pitch_class_name(midi).ends_with('#'),
            }
        })
        .collect())
}

pub struct Calibration<'a, S: KeyValueStore> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> Calibration<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn automap_result(&self) -> Result<Option<AutomapResult>> {
        get_json(&*self.store, AUTOMAP_KEY)
    }

    pub fn tone_calibration(&self) -> Result<Vec<ToneMapping>> {
        Ok(get_json(&*self.store, TONE_MAP_KEY)?.unwrap_or_default())
    }

    /// Stores the detected key counts and the derived tone map, then marks
    /// the profile as calibrated.
    pub fn calibrate(
        &mut self,
        profile_id: &str,
        white: u32,
        black: u32,
        automapped: bool,
        at: OffsetDateTime,
    ) -> Result<Profile> {
        let mapping = tone_map(white, black)?;
        let mut profiles = ProfileStore::new(&mut *self.store);
        let mut profile = profiles
            .get(profile_id)?
            .ok_or_else(|| anyhow!("unknown profile {profile_id}"))?;
        profile.calibrated = true;
        profile.automapped = automapped;
        profile.white_keys = white;
        profile.black_keys = black;
        profiles.save(&profile)?;

        let automap = AutomapResult {
            white,
            black,
            timestamp: at,
        };
        set_json(&mut *self.store, AUTOMAP_KEY, &automap)?;
        set_json(&mut *self.store, TONE_MAP_KEY, &mapping)?;
        info!(profile = profile_id, white, black, automapped, "keyboard calibrated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn tone_map_starts_at_a0() {
        let map = tone_map(52, 36).unwrap();
        assert_eq!(map.len(), 88);
        assert_eq!(map[0].midi, 21);
        assert_eq!(map[0].frequency_hz, 27.5);
        assert!(map[0].is_white);
        assert!(!map[1].is_white);
        assert_eq!(map[12].frequency_hz, 55.0);
        // A4
        assert_eq!(map[48].midi, 69);
        assert_eq!(map[48].frequency_hz, 440.0);
        assert_eq!(map[87].midi, 108);
        assert_eq!(map.iter().filter(|key| key.is_white).count(), 52);
    }

    #[test]
    fn tone_map_rejects_impossible_counts() {
        assert!(tone_map(0, 5).is_err());
        assert!(tone_map(88, 36).is_err());
        assert_eq!(tone_map(60, 47).unwrap().last().map(|key| key.midi), Some(127));
    }

    #[test]
    fn calibrate_updates_profile_and_results() {
        let mut store = MemoryStore::new();
        let at = OffsetDateTime::UNIX_EPOCH;
        let profile = ProfileStore::new(&mut store).create("Anna", at).unwrap();

        let mut calibration = Calibration::new(&mut store);
        assert_eq!(calibration.automap_result().unwrap(), None);
        let updated = calibration.calibrate(&profile.id, 52, 36, true, at).unwrap();
        assert!(updated.calibrated && updated.automapped);
        assert_eq!((updated.white_keys, updated.black_keys), (52, 36));
        assert_eq!(
            calibration.automap_result().unwrap(),
            Some(AutomapResult {
                white: 52,
                black: 36,
                timestamp: at
            })
        );
        assert_eq!(calibration.tone_calibration().unwrap().len(), 88);

        let stored = ProfileStore::new(&mut store).get(&profile.id).unwrap();
        assert_eq!(stored, Some(updated));
    }

    #[test]
    fn calibrating_unknown_profile_stores_nothing() {
        let mut store = MemoryStore::new();
        let mut calibration = Calibration::new(&mut store);
        assert!(calibration
            .calibrate("prof_missing", 52, 36, false, OffsetDateTime::UNIX_EPOCH)
            .is_err());
        assert!(calibration.tone_calibration().unwrap().is_empty());
    }
}
