use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::profile::Intensity;
use crate::schema;
use crate::store::{KeyValueStore, keys, load_or_default, save_json};

/// State an item can be tagged with. Untagged items are absent from the
/// serialized map, so `Option<ItemState>` is the full tri-state-plus-unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemState {
    Wants, // Prioritize in the generated scene.
    Okay,  // May be used.
    Not,   // Avoid.
}

/// Demon intensity drops the avoid tier from the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    Full,
    SkipAvoid,
}

impl CycleMode {
    pub fn for_intensity(intensity: Intensity) -> Self {
        if intensity.is_demon() {
            CycleMode::SkipAvoid
        } else {
            CycleMode::Full
        }
    }
}

/// Total transition function: unset → wants → okay → (not →) unset.
pub fn cycle_state(current: Option<ItemState>, mode: CycleMode) -> Option<ItemState> {
    match (current, mode) {
        (None, _) => Some(ItemState::Wants),
        (Some(ItemState::Wants), _) => Some(ItemState::Okay),
        (Some(ItemState::Okay), CycleMode::Full) => Some(ItemState::Not),
        (Some(ItemState::Okay), CycleMode::SkipAvoid) => None,
        (Some(ItemState::Not), _) => None,
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CategoryKind {
    Toys,
    Outfits,
    Settings,
    Kinks,
}

impl CategoryKind {
    pub fn catalog(self) -> &'static [&'static str] {
        match self {
            CategoryKind::Toys => schema::TOY_CATALOG,
            CategoryKind::Outfits => schema::OUTFIT_CATALOG,
            CategoryKind::Settings => schema::SETTING_CATALOG,
            CategoryKind::Kinks => schema::KINK_CATALOG,
        }
    }

    pub fn states_key(self) -> &'static str {
        match self {
            CategoryKind::Toys => keys::TOY_STATES,
            CategoryKind::Outfits => keys::OUTFIT_STATES,
            CategoryKind::Settings => keys::SETTING_STATES,
            CategoryKind::Kinks => keys::KINK_STATES,
        }
    }

    pub fn custom_key(self) -> &'static str {
        match self {
            CategoryKind::Toys => keys::CUSTOM_TOYS,
            CategoryKind::Outfits => keys::CUSTOM_OUTFITS,
            CategoryKind::Settings => keys::CUSTOM_SETTINGS,
            CategoryKind::Kinks => keys::CUSTOM_KINKS,
        }
    }
}

/// Normalized grouping emitted to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionGroups {
    pub wants: Vec<String>,
    pub okay: Vec<String>,
    pub not: Vec<String>,
}

impl SelectionGroups {
    /// Items the generation backend may act on: wants first, then okay.
    pub fn active(&self) -> Vec<String> {
        self.wants.iter().chain(self.okay.iter()).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.wants.len() + self.okay.len()
    }
}

/// One category's selection map plus its user-added items.
#[derive(Debug, Clone)]
pub struct CategorySelection {
    pub kind: CategoryKind,
    states: BTreeMap<String, ItemState>,
    custom_items: Vec<String>,
}

impl CategorySelection {
    /// A missing or empty saved map means a fresh start: every catalog item
    /// begins at `Wants`.
    pub fn load(kind: CategoryKind, store: &dyn KeyValueStore) -> Self {
        let states: BTreeMap<String, ItemState> = load_or_default(store, kind.states_key());
        let states = if states.is_empty() {
            Self::all_wants(kind)
        } else {
            states
        };
        let custom_items: Vec<String> = load_or_default(store, kind.custom_key());
        Self {
            kind,
            states,
            custom_items,
        }
    }

    fn all_wants(kind: CategoryKind) -> BTreeMap<String, ItemState> {
        kind.catalog()
            .iter()
            .map(|item| (item.to_string(), ItemState::Wants))
            .collect()
    }

    pub fn state_of(&self, item: &str) -> Option<ItemState> {
        self.states.get(item).copied()
    }

    /// Advance one item through the cycle and return its new state.
    pub fn cycle(&mut self, item: &str, mode: CycleMode) -> Option<ItemState> {
        let next = cycle_state(self.state_of(item), mode);
        match next {
            Some(state) => {
                self.states.insert(item.to_string(), state);
            }
            None => {
                self.states.remove(item);
            }
        }
        next
    }

    /// Add a user-supplied item, auto-tagged `Wants`. Blank names and
    /// duplicates are silently ignored.
    pub fn add_custom(&mut self, name: &str) -> Option<String> {
        let item = name.trim().to_lowercase();
        if item.is_empty() || self.custom_items.contains(&item) {
            return None;
        }
        self.custom_items.push(item.clone());
        self.states.insert(item.clone(), ItemState::Wants);
        Some(item)
    }

    pub fn remove_custom(&mut self, name: &str) {
        self.custom_items.retain(|i| i != name);
        self.states.remove(name);
    }

    /// All selectable items: the catalog plus user additions.
    pub fn items(&self) -> Vec<String> {
        self.kind
            .catalog()
            .iter()
            .map(|i| i.to_string())
            .chain(self.custom_items.iter().cloned())
            .collect()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.custom_items.clear();
    }

    pub fn groups(&self) -> SelectionGroups {
        let mut groups = SelectionGroups::default();
        for (item, state) in &self.states {
            match state {
                ItemState::Wants => groups.wants.push(item.clone()),
                ItemState::Okay => groups.okay.push(item.clone()),
                ItemState::Not => groups.not.push(item.clone()),
            }
        }
        groups
    }

    // Persist failures degrade to a log line; selection state stays usable.
    fn persist(&self, store: &dyn KeyValueStore) {
        if let Err(e) = save_json(store, self.kind.states_key(), &self.states) {
            log::warn!("failed to persist {} selections: {e}", self.kind);
        }
        if let Err(e) = save_json(store, self.kind.custom_key(), &self.custom_items) {
            log::warn!("failed to persist custom {} items: {e}", self.kind);
        }
    }
}

pub type SelectionListener = dyn Fn(CategoryKind, &SelectionGroups) + Send + Sync;

/// All four categories behind one persistence and notification surface.
pub struct PreferenceStore {
    store: Arc<dyn KeyValueStore>,
    toys: CategorySelection,
    outfits: CategorySelection,
    settings: CategorySelection,
    kinks: CategorySelection,
    listeners: Vec<Box<SelectionListener>>,
}

impl PreferenceStore {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            toys: CategorySelection::load(CategoryKind::Toys, store.as_ref()),
            outfits: CategorySelection::load(CategoryKind::Outfits, store.as_ref()),
            settings: CategorySelection::load(CategoryKind::Settings, store.as_ref()),
            kinks: CategorySelection::load(CategoryKind::Kinks, store.as_ref()),
            store,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(CategoryKind, &SelectionGroups) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub fn category(&self, kind: CategoryKind) -> &CategorySelection {
        match kind {
            CategoryKind::Toys => &self.toys,
            CategoryKind::Outfits => &self.outfits,
            CategoryKind::Settings => &self.settings,
            CategoryKind::Kinks => &self.kinks,
        }
    }

    fn category_mut(&mut self, kind: CategoryKind) -> &mut CategorySelection {
        match kind {
            CategoryKind::Toys => &mut self.toys,
            CategoryKind::Outfits => &mut self.outfits,
            CategoryKind::Settings => &mut self.settings,
            CategoryKind::Kinks => &mut self.kinks,
        }
    }

    pub fn groups(&self, kind: CategoryKind) -> SelectionGroups {
        self.category(kind).groups()
    }

    pub fn total_active(&self) -> usize {
        [
            CategoryKind::Toys,
            CategoryKind::Outfits,
            CategoryKind::Settings,
            CategoryKind::Kinks,
        ]
        .into_iter()
        .map(|kind| self.groups(kind).active_count())
        .sum()
    }

    pub fn cycle(&mut self, kind: CategoryKind, item: &str, mode: CycleMode) -> Option<ItemState> {
        let store = Arc::clone(&self.store);
        let next = {
            let category = self.category_mut(kind);
            let next = category.cycle(item, mode);
            category.persist(store.as_ref());
            next
        };
        self.emit(kind);
        next
    }

    pub fn add_custom_item(&mut self, kind: CategoryKind, name: &str) -> Option<String> {
        let store = Arc::clone(&self.store);
        let added = {
            let category = self.category_mut(kind);
            let added = category.add_custom(name);
            if added.is_some() {
                category.persist(store.as_ref());
            }
            added
        };
        if added.is_some() {
            self.emit(kind);
        }
        added
    }

    pub fn remove_custom_item(&mut self, kind: CategoryKind, name: &str) {
        let store = Arc::clone(&self.store);
        {
            let category = self.category_mut(kind);
            category.remove_custom(name);
            category.persist(store.as_ref());
        }
        self.emit(kind);
    }

    pub fn reset_category(&mut self, kind: CategoryKind) {
        let store = Arc::clone(&self.store);
        {
            let category = self.category_mut(kind);
            category.clear();
            category.persist(store.as_ref());
        }
        self.emit(kind);
    }

    /// Hard reset used at the together-mode handoff: everything back to unset.
    pub fn reset_all(&mut self) {
        for kind in [
            CategoryKind::Toys,
            CategoryKind::Outfits,
            CategoryKind::Settings,
            CategoryKind::Kinks,
        ] {
            self.reset_category(kind);
        }
    }

    fn emit(&self, kind: CategoryKind) {
        let groups = self.category(kind).groups();
        for listener in &self.listeners {
            listener(kind, &groups);
        }
    }
}
