use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, read_dir, read_to_string, remove_file, write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

pub const DATA_DIR: &str = "./data/state";

/// Storage keys for every persisted value. Each key maps to one independently
/// serialized JSON value, so a partial corruption never takes down the rest.
pub mod keys {
    pub const TOY_STATES: &str = "user_inventory_v2_states";
    pub const OUTFIT_STATES: &str = "user_outfit_v2_states";
    pub const SETTING_STATES: &str = "user_setting_v2_states";
    pub const KINK_STATES: &str = "user_kinks_v2_states";

    pub const CUSTOM_TOYS: &str = "custom_user_inventory_v2";
    pub const CUSTOM_OUTFITS: &str = "custom_user_outfit_v2";
    pub const CUSTOM_SETTINGS: &str = "custom_user_setting_v2";
    pub const CUSTOM_KINKS: &str = "custom_user_kinks_v2";

    pub const ROLE: &str = "user_role";
    pub const INTENSITY: &str = "user_intensity";
    pub const NO_GO_LIST: &str = "no_go_list";
    pub const SELECTED_MODEL: &str = "selected_model";

    pub const PROMPT_TEMPLATE: &str = "custom_prompt_template";
    pub const TEMPLATE_LIBRARY: &str = "prompt_templates";
    pub const SAMPLING_PARAMS: &str = "ai_model_params";

    pub const CHAT_CONTEXT: &str = "scene_chat_context";
    pub const SAVED_SCENARIOS: &str = "saved_scenarios";
    pub const FULL_STATE: &str = "app_full_state";

    /// Everything that belongs in an export bundle.
    pub const ALL: &[&str] = &[
        TOY_STATES,
        OUTFIT_STATES,
        SETTING_STATES,
        KINK_STATES,
        CUSTOM_TOYS,
        CUSTOM_OUTFITS,
        CUSTOM_SETTINGS,
        CUSTOM_KINKS,
        ROLE,
        INTENSITY,
        NO_GO_LIST,
        SELECTED_MODEL,
        PROMPT_TEMPLATE,
        TEMPLATE_LIBRARY,
        SAMPLING_PARAMS,
        CHAT_CONTEXT,
        SAVED_SCENARIOS,
        FULL_STATE,
    ];
}

/// Injected state repository. Components depend on this trait instead of
/// reaching for ambient global storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// One pretty-printed JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open_default() -> Self {
        Self::new(DATA_DIR)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        create_dir_all(&self.root)?; // Ensure the data directory exists.
        write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let root = Path::new(&self.root);
        if !root.exists() {
            return Ok(Vec::new());
        }

        Ok(read_dir(root)?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.is_file() && path.extension()? == "json" {
                    path.file_stem()?.to_str().map(String::from)
                } else {
                    None
                }
            })
            .collect())
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .map(|map| map.get(key).cloned())
            .unwrap_or_default())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut map) = self.entries.lock() {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if let Ok(mut map) = self.entries.lock() {
            map.remove(key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Load a typed value, falling back to its default on a missing key,
/// malformed JSON, or a storage failure. Load never fails.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("stored value for '{key}' is malformed, using defaults: {e}");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("failed to read '{key}', using defaults: {e}");
            T::default()
        }
    }
}

pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string_pretty(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_lists_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());

        store.set("user_role", "\"switch\"").expect("set");
        assert_eq!(
            store.get("user_role").expect("get"),
            Some("\"switch\"".to_string())
        );
        assert_eq!(store.keys().expect("keys"), vec!["user_role".to_string()]);

        store.remove("user_role").expect("remove");
        assert_eq!(store.get("user_role").expect("get"), None);
        // Removing a missing key is not an error.
        store.remove("user_role").expect("remove twice");
    }

    #[test]
    fn malformed_value_falls_back_to_default() {
        let store = MemoryStore::new();
        store.set("list", "{not json").expect("set");
        let value: Vec<String> = load_or_default(&store, "list");
        assert!(value.is_empty());
    }
}
