use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::storage::{get_json, set_json, KeyValueStore};

const ADDON_PREFIX: &str = "addon:";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddonKind {
    AppTheme,
    KaraokeSkin,
    LedSequence,
    ScoringPreset,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub kind: AddonKind,
    pub description: String,
    pub size_kb: u32,
}

impl Addon {
    fn new(id: &str, name: &str, kind: AddonKind, description: &str, size_kb: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            description: description.to_string(),
            size_kb,
        }
    }
}

/// Persisted under `addon:<id>` once installed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledAddon {
    #[serde(flatten)]
    pub addon: Addon,
    pub installed_at: OffsetDateTime,
}

/// Catalog entry as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddonListing {
    pub addon: Addon,
    pub installed: bool,
}

pub fn catalog() -> Vec<Addon> {
    vec![
        Addon::new(
            "theme_neon",
            "Neon Dreams Theme",
            AddonKind::AppTheme,
            "Bright neon colors on a dark background",
            2_100,
        ),
        Addon::new(
            "theme_minimal",
            "Minimal White Theme",
            AddonKind::AppTheme,
            "Clean minimalist design in white",
            1_800,
        ),
        Addon::new(
            "karaoke_retro",
            "Retro Karaoke Skin",
            AddonKind::KaraokeSkin,
            "80s arcade style with pixel effects",
            3_500,
        ),
        Addon::new(
            "led_rainbow",
            "Rainbow Chase",
            AddonKind::LedSequence,
            "Rainbow animations for LED feedback",
            500,
        ),
        Addon::new(
            "scoring_strict",
            "Strict Timing Scoring",
            AddonKind::ScoringPreset,
            "Very precise timing required, higher scores",
            200,
        ),
        Addon::new(
            "scoring_casual",
            "Casual Learning Mode",
            AddonKind::ScoringPreset,
            "Relaxed learning without time pressure",
            200,
        ),
    ]
}

pub struct AddonManager<'a, S: KeyValueStore> {
    store: &'a mut S,
}

impl<'a, S: KeyValueStore> AddonManager<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    pub fn available(&self) -> Result<Vec<AddonListing>> {
        catalog()
            .into_iter()
            .map(|addon| {
                let installed = self.store.get(&addon_key(&addon.id))?.is_some();
                Ok(AddonListing { addon, installed })
            })
            .collect()
    }

    pub fn installed(&self) -> Result<Vec<InstalledAddon>> {
        let mut installed = Vec::new();
        for key in self.store.list(ADDON_PREFIX)? {
            if let Some(addon) = get_json(&*self.store, &key)? {
                installed.push(addon);
            }
        }
        Ok(installed)
    }

    /// Installing an add-on twice keeps the first installation time.
    pub fn install(&mut self, id: &str, at: OffsetDateTime) -> Result<InstalledAddon> {
        let addon = catalog()
            .into_iter()
            .find(|addon| addon.id == id)
            .ok_or_else(|| anyhow!("unknown add-on {id}"))?;
        let key = addon_key(id);
        if let Some(existing) = get_json::<_, InstalledAddon>(&*self.store, &key)? {
            return Ok(existing);
        }
        let installed = InstalledAddon {
            addon,
            installed_at: at,
        };
        set_json(&mut *self.store, &key, &installed)?;
        info!(id, size_kb = installed.addon.size_kb, "add-on installed");
        Ok(installed)
    }

    pub fn uninstall(&mut self, id: &str) -> Result<bool> {
        let removed = self.store.delete(&addon_key(id))?;
        if removed {
            info!(id, "add-on removed");
        }
        Ok(removed)
    }
}

fn addon_key(id: &str) -> String {
    format!("{ADDON_PREFIX}{id}")
}
