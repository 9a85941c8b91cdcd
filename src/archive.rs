use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::SceneChat;
use crate::error::StoreError;
use crate::profile::Intensity;
use crate::store::{KeyValueStore, keys, load_or_default, save_json};

/// The archive keeps only the most recent entries; older ones are evicted.
pub const MAX_SAVED_SCENARIOS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub intensity: Intensity,
    pub timestamp: DateTime<Utc>,
}

/// Durable list of generated outputs. Append and delete only, most-recent
/// first.
pub struct ScenarioArchive {
    store: Arc<dyn KeyValueStore>,
}

impl ScenarioArchive {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<ScenarioRecord> {
        load_or_default(self.store.as_ref(), keys::SAVED_SCENARIOS)
    }

    /// Prepend a record; the 51st save evicts the oldest entry.
    pub fn save(
        &self,
        content: &str,
        intensity: Intensity,
        title: Option<&str>,
    ) -> Result<ScenarioRecord, StoreError> {
        let mut scenarios = self.list();
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => format!("Scene {}", scenarios.len() + 1),
        };
        let record = ScenarioRecord {
            id: Uuid::new_v4().to_string(),
            title,
            content: content.to_string(),
            intensity,
            timestamp: Utc::now(),
        };
        scenarios.insert(0, record.clone());
        scenarios.truncate(MAX_SAVED_SCENARIOS);
        save_json(self.store.as_ref(), keys::SAVED_SCENARIOS, &scenarios)?;
        Ok(record)
    }

    /// Save a whole chat transcript under a dated title.
    pub fn save_chat(
        &self,
        chat: &SceneChat,
        intensity: Intensity,
    ) -> Result<ScenarioRecord, StoreError> {
        let title = format!(
            "{} Chat - {}",
            capitalize(&intensity.to_string()),
            Local::now().format("%b %-d")
        );
        self.save(&chat.archive_text(), intensity, Some(&title))
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let scenarios: Vec<ScenarioRecord> =
            self.list().into_iter().filter(|s| s.id != id).collect();
        save_json(self.store.as_ref(), keys::SAVED_SCENARIOS, &scenarios)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
