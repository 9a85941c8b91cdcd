use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::profile::{Intensity, Role};
use crate::schema;
use crate::store::{KeyValueStore, keys, load_or_default, save_json};

/// Sampling parameters sent with free-form generation requests. `min_p` is
/// kept for the editor but the `/llm` endpoint has no such field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f64,
    #[serde(default = "default_min_p")]
    pub min_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub context_length: u32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,
}

fn default_min_p() -> f64 {
    0.05
}

fn default_repeat_penalty() -> f64 {
    1.1
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            temperature: 1.1,
            max_tokens: 4096,
            top_k: 80,
            top_p: 0.95,
            min_p: default_min_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            context_length: 16384,
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

/// Durable per-user settings: role, intensity, no-go list, sampling
/// parameters, model choice, and the export/import bundle.
pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn sampling_params(&self) -> SamplingParams {
        load_or_default(self.store.as_ref(), keys::SAMPLING_PARAMS)
    }

    pub fn set_sampling_params(&self, params: &SamplingParams) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), keys::SAMPLING_PARAMS, params)
    }

    pub fn role(&self) -> Role {
        load_or_default(self.store.as_ref(), keys::ROLE)
    }

    pub fn set_role(&self, role: Role) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), keys::ROLE, &role)
    }

    pub fn intensity(&self) -> Intensity {
        load_or_default(self.store.as_ref(), keys::INTENSITY)
    }

    pub fn set_intensity(&self, intensity: Intensity) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), keys::INTENSITY, &intensity)
    }

    pub fn selected_model(&self) -> Option<String> {
        load_or_default(self.store.as_ref(), keys::SELECTED_MODEL)
    }

    pub fn set_selected_model(&self, model: Option<&str>) -> Result<(), StoreError> {
        match model {
            Some(model) => save_json(self.store.as_ref(), keys::SELECTED_MODEL, &model),
            None => self.store.remove(keys::SELECTED_MODEL),
        }
    }

    // region:  --- No-go list

    pub fn no_go_list(&self) -> Vec<String> {
        match self.store.get(keys::NO_GO_LIST) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("stored no-go list is malformed, using defaults: {e}");
                default_no_go_list()
            }),
            _ => default_no_go_list(),
        }
    }

    /// Add a hard limit. Blank input and duplicates are silently ignored.
    pub fn add_no_go(&self, term: &str) -> Result<(), StoreError> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(());
        }
        let mut list = self.no_go_list();
        if !list.contains(&term) {
            list.push(term);
            save_json(self.store.as_ref(), keys::NO_GO_LIST, &list)?;
        }
        Ok(())
    }

    pub fn remove_no_go(&self, term: &str) -> Result<(), StoreError> {
        let list: Vec<String> = self.no_go_list().into_iter().filter(|t| t != term).collect();
        save_json(self.store.as_ref(), keys::NO_GO_LIST, &list)
    }

    pub fn reset_no_go(&self) -> Result<(), StoreError> {
        save_json(self.store.as_ref(), keys::NO_GO_LIST, &default_no_go_list())
    }

    // endregion:  --- No-go list

    // region:  --- Export / import

    /// Bundle every persisted value into one JSON document. Raw stored
    /// strings are passed through untouched so a later import reproduces the
    /// identical key set.
    pub fn export_bundle(&self) -> Result<String, StoreError> {
        let mut bundle = BTreeMap::new();
        for key in keys::ALL {
            if let Some(raw) = self.store.get(key)? {
                bundle.insert(key.to_string(), raw);
            }
        }
        bundle.insert("exported_at".to_string(), Utc::now().to_rfc3339());
        Ok(serde_json::to_string_pretty(&bundle)?)
    }

    pub fn import_bundle(&self, bundle: &str) -> Result<(), StoreError> {
        let bundle: BTreeMap<String, String> = serde_json::from_str(bundle)?;
        for (key, raw) in &bundle {
            if key != "exported_at" {
                self.store.set(key, raw)?;
            }
        }
        Ok(())
    }

    /// One-shot snapshot of the live session state under its own key.
    pub fn save_full_state(&self, state: &serde_json::Value) -> Result<(), StoreError> {
        let stamped = serde_json::json!({
            "state": state,
            "saved_at": Utc::now().to_rfc3339(),
        });
        save_json(self.store.as_ref(), keys::FULL_STATE, &stamped)
    }

    // endregion:  --- Export / import
}

fn default_no_go_list() -> Vec<String> {
    schema::DEFAULT_NO_GO_LIST
        .iter()
        .map(|t| t.to_string())
        .collect()
}
