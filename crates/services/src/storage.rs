use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Opaque string key-value store with prefix listing.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    /// Returns whether the key existed.
    fn delete(&mut self, key: &str) -> Result<bool>;
    /// Keys starting with `prefix`, in ascending order.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

pub fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key)? {
        Some(text) => {
            let value =
                serde_json::from_str(&text).with_context(|| format!("decode stored {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub fn set_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let text = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
    store.set(key, text)
}

fn keys_with_prefix(entries: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(keys_with_prefix(&self.entries, prefix))
    }
}

/// Keeps every entry in one JSON document, rewritten on each mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text =
                fs::read_to_string(&path).with_context(|| format!("read store {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parse store {:?}", path))?
        } else {
            BTreeMap::new()
        };
        debug!(path = ?path, entries = entries.len(), "opened file store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create store directory {:?}", parent))?;
            }
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, text).with_context(|| format!("write store {:?}", self.path))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.persist()?;
        }
        Ok(existed)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(keys_with_prefix(&self.entries, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_lists_by_prefix() {
        let mut store = MemoryStore::new();
        store.set("song:b", "2".into()).unwrap();
        store.set("song:a", "1".into()).unwrap();
        store.set("profile:x", "3".into()).unwrap();
        store.set("songbook", "4".into()).unwrap();
        assert_eq!(store.list("song:").unwrap(), vec!["song:a", "song:b"]);
        assert!(store.delete("song:a").unwrap());
        assert!(!store.delete("song:a").unwrap());
        assert_eq!(store.get("song:a").unwrap(), None);
    }

    #[test]
    fn json_helpers_round_trip_values() {
        let mut store = MemoryStore::new();
        set_json(&mut store, "numbers", &vec![1u8, 2, 3]).unwrap();
        let numbers: Option<Vec<u8>> = get_json(&store, "numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));
        store.set("broken", "{".into()).unwrap();
        assert!(get_json::<_, Vec<u8>>(&store, "broken").is_err());
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("store.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.set("app_settings", "{}".into()).unwrap();
            store.set("song:1", "x".into()).unwrap();
            store.delete("song:1").unwrap();
        }
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("app_settings").unwrap().as_deref(), Some("{}"));
        assert!(reopened.list("song:").unwrap().is_empty());
        assert_eq!(reopened.path(), path.as_path());
    }
}
