//! Category/key configuration store.
//!
//! Settings are addressed as `<category>.<key>`, e.g. `dccoverrides.Python_path` or
//! `lastUsedSettings.priority`. The file-backed store keeps them as a JSON object of
//! category objects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigError;

pub const CATEGORY_OVERRIDES: &str = "dccoverrides";
pub const CATEGORY_LAST_USED: &str = "lastUsedSettings";
pub const CATEGORY_GLOBALS: &str = "globals";
pub const CATEGORY_INSTALLATIONS: &str = "installations";
pub const CATEGORY_INFORMATION: &str = "information";

pub const KEY_LOCAL_MODE: &str = "localMode";
pub const KEY_PROGRAM_VERSION: &str = "programVersion";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FARM_CONFIG";

type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A `[category, key, value]` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry(pub String, pub String, pub Value);

impl ConfigEntry {
    pub fn new(category: impl Into<String>, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(category.into(), key.into(), value.into())
    }

    pub fn category(&self) -> &str {
        &self.0
    }

    pub fn key(&self) -> &str {
        &self.1
    }

    pub fn value(&self) -> &Value {
        &self.2
    }
}

/// Read/write access to persisted settings.
pub trait ConfigStore: Send + Sync {
    fn get(&self, category: &str, key: &str) -> ConfigResult<Option<Value>>;

    fn set_many(&self, entries: &[ConfigEntry]) -> ConfigResult<()>;

    fn set(&self, category: &str, key: &str, value: Value) -> ConfigResult<()> {
        self.set_many(&[ConfigEntry::new(category, key, value)])
    }

    /// Boolean lookup; missing or non-boolean values read as `None`.
    fn get_bool(&self, category: &str, key: &str) -> ConfigResult<Option<bool>> {
        Ok(self.get(category, key)?.and_then(|v| v.as_bool()))
    }

    fn get_string(&self, category: &str, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get(category, key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn get_i64(&self, category: &str, key: &str) -> ConfigResult<Option<i64>> {
        Ok(self.get(category, key)?.and_then(|v| v.as_i64()))
    }
}

/// Default config file location: `$FARM_CONFIG`, else `<config dir>/farmhand/farmhand.json`.
pub fn default_config_path() -> ConfigResult<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("farmhand").join("farmhand.json"))
        .ok_or(ConfigError::NoConfigDir)
}

/// JSON file backed store. The file is created on first write.
#[derive(Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self::new(default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> ConfigResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::Malformed {
                path: self.path.clone(),
            }),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, category: &str, key: &str) -> ConfigResult<Option<Value>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.read_document()?;
        match doc.get(category) {
            None => Ok(None),
            Some(Value::Object(section)) => Ok(section.get(key).cloned()),
            Some(_) => Err(ConfigError::CategoryNotObject(category.to_string())),
        }
    }

    fn set_many(&self, entries: &[ConfigEntry]) -> ConfigResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = self.read_document()?;
        for ConfigEntry(category, key, value) in entries {
            let section = doc
                .entry(category.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            match section {
                Value::Object(map) => {
                    map.insert(key.clone(), value.clone());
                }
                _ => return Err(ConfigError::CategoryNotObject(category.clone())),
            }
        }
        self.write_document(&doc)?;
        debug!(path = %self.path.display(), entries = entries.len(), "config written");
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, category: &str, key: &str, value: impl Into<Value>) -> Self {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((category.to_string(), key.to_string()), value.into());
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, category: &str, key: &str) -> ConfigResult<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values
            .get(&(category.to_string(), key.to_string()))
            .cloned())
    }

    fn set_many(&self, entries: &[ConfigEntry]) -> ConfigResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        for ConfigEntry(category, key, value) in entries {
            values.insert((category.clone(), key.clone()), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_config_entry_serializes_as_triple() {
        let entry = ConfigEntry::new("information", "programVersion", "2.7");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!(["information", "programVersion", "2.7"]));
    }

    #[test]
    fn test_json_store_missing_file_reads_none() {
        let dir = tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path().join("nope.json"));
        assert_eq!(store.get("globals", "localMode").unwrap(), None);
    }

    #[test]
    fn test_json_store_roundtrip_creates_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("farm.json");
        let store = JsonConfigStore::new(&path);

        store
            .set_many(&[
                ConfigEntry::new(CATEGORY_GLOBALS, KEY_LOCAL_MODE, true),
                ConfigEntry::new(CATEGORY_LAST_USED, "priority", 70),
            ])
            .unwrap();

        assert!(path.exists());
        assert_eq!(store.get_bool(CATEGORY_GLOBALS, KEY_LOCAL_MODE).unwrap(), Some(true));
        assert_eq!(store.get_i64(CATEGORY_LAST_USED, "priority").unwrap(), Some(70));
    }

    #[test]
    fn test_json_store_preserves_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farm.json");
        std::fs::write(&path, r#"{"dccoverrides": {"Python_path": "C:/py/python.exe"}}"#).unwrap();
        let store = JsonConfigStore::new(&path);

        store
            .set(CATEGORY_OVERRIDES, "Python_override", json!(true))
            .unwrap();

        assert_eq!(
            store.get_string(CATEGORY_OVERRIDES, "Python_path").unwrap(),
            Some("C:/py/python.exe".to_string())
        );
        assert_eq!(
            store.get_bool(CATEGORY_OVERRIDES, "Python_override").unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_json_store_rejects_non_object_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("farm.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let store = JsonConfigStore::new(&path);
        assert!(matches!(
            store.get("globals", "x"),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_typed_getters_ignore_wrong_types() {
        let store = MemoryConfigStore::new().with(CATEGORY_LAST_USED, "priority", "high");
        assert_eq!(store.get_i64(CATEGORY_LAST_USED, "priority").unwrap(), None);
        assert_eq!(store.get_bool(CATEGORY_LAST_USED, "priority").unwrap(), None);
    }
}
