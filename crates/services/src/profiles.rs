use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::storage::{get_json, set_json, KeyValueStore};

const PROFILE_PREFIX: &str = "profile:";

/// A learner together with the keyboard set-up measured for them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub created: OffsetDateTime,
    pub calibrated: bool,
    pub automapped: bool,
    pub white_keys: u32,
    pub black_keys: u32,
    pub ai_installed: bool,
}

pub struct ProfileStore<'a, S: KeyValueStore> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> ProfileStore<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn create(&mut self, name: &str, at: OffsetDateTime) -> Result<Profile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("profile name must not be empty"));
        }
        let millis = at.unix_timestamp_nanos() / 1_000_000;
        let profile = Profile {
            id: format!("prof_{millis}"),
            name: name.to_string(),
            created: at,
            calibrated: false,
            automapped: false,
            white_keys: 0,
            black_keys: 0,
            ai_installed: false,
        };
        self.save(&profile)?;
        info!(id = %profile.id, name = %profile.name, "profile created");
        Ok(profile)
    }

    pub fn save(&mut self, profile: &Profile) -> Result<()> {
        set_json(&mut *self.store, &profile_key(&profile.id), profile)
    }

    pub fn get(&self, id: &str) -> Result<Option<Profile>> {
        get_json(&*self.store, &profile_key(id))
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        let mut profiles = Vec::new();
        for key in self.store.list(PROFILE_PREFIX)? {
            if let Some(profile) = get_json(&*self.store, &key)? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let existed = self.store.delete(&profile_key(id))?;
        if existed {
            info!(id, "profile deleted");
        }
        Ok(existed)
    }
}

fn profile_key(id: &str) -> String {
    format!("{PROFILE_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use time::Duration;

    #[test]
    fn create_list_delete() {
        let mut store = MemoryStore::new();
        let mut profiles = ProfileStore::new(&mut store);
        let at = OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(1_700);
        let anna = profiles.create("  Anna ", at).unwrap();
        assert_eq!(anna.id, "prof_1700");
        assert_eq!(anna.name, "Anna");
        assert!(!anna.calibrated);

        let mut calibrated = anna.clone();
        calibrated.calibrated = true;
        calibrated.white_keys = 52;
        calibrated.black_keys = 36;
        profiles.save(&calibrated).unwrap();
        assert_eq!(profiles.get("prof_1700").unwrap(), Some(calibrated));
        assert_eq!(profiles.list().unwrap().len(), 1);

        assert!(profiles.delete("prof_1700").unwrap());
        assert!(profiles.list().unwrap().is_empty());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut store = MemoryStore::new();
        let mut profiles = ProfileStore::new(&mut store);
        assert!(profiles.create("   ", OffsetDateTime::UNIX_EPOCH).is_err());
    }
}
