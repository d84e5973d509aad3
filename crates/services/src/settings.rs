use anyhow::Result;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::storage::{get_json, set_json, KeyValueStore};

const SETTINGS_KEY: &str = "app_settings";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionType {
    #[default]
    Usb,
    Lan,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// LED strip brightness, 0-255.
    pub brightness: u8,
    pub connection: ConnectionType,
    pub theme: String,
    pub lan_url: Option<String>,
    pub last_update: Option<OffsetDateTime>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            brightness: 200,
            connection: ConnectionType::Usb,
            theme: "andio".to_string(),
            lan_url: None,
            last_update: None,
        }
    }
}

impl AppSettings {
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self> {
        match get_json(store, SETTINGS_KEY)? {
            Some(settings) => Ok(settings),
            None => {
                debug!("no stored settings, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&mut self, store: &mut S, at: OffsetDateTime) -> Result<()> {
        self.last_update = Some(at);
        set_json(store, SETTINGS_KEY, self)?;
        info!(brightness = self.brightness, connection = ?self.connection, "settings saved");
        Ok(())
    }
}
