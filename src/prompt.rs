use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::preferences::{CategoryKind, PreferenceStore, SelectionGroups};
use crate::profile::{Intensity, Role};
use crate::schema;
use crate::settings::SamplingParams;
use crate::store::{KeyValueStore, keys, load_or_default, save_json};

/// One category's selections split by tier. The avoid tier rides along for
/// diagnostics; only the no-go list is enforced in the rendered prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTiers {
    pub wants: Vec<String>,
    pub okay: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
}

impl CategoryTiers {
    pub fn is_empty(&self) -> bool {
        self.wants.is_empty() && self.okay.is_empty()
    }
}

/// A participant's finished turn: all four categories plus identity.
/// Immutable once captured; the merge consumes two of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerSnapshot {
    pub name: String,
    pub role: Role,
    pub toys: CategoryTiers,
    pub kinks: CategoryTiers,
    pub outfits: CategoryTiers,
    pub settings: CategoryTiers,
}

impl PartnerSnapshot {
    pub fn capture(prefs: &PreferenceStore, name: &str, role: Role) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                "Partner".to_string()
            } else {
                name.to_string()
            },
            role,
            toys: tiers(prefs.groups(CategoryKind::Toys)),
            kinks: tiers(prefs.groups(CategoryKind::Kinks)),
            outfits: tiers(prefs.groups(CategoryKind::Outfits)),
            settings: tiers(prefs.groups(CategoryKind::Settings)),
        }
    }

    /// `"<name> (<role>)"`, the label format for two-party sessions.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.role)
    }
}

fn tiers(groups: SelectionGroups) -> CategoryTiers {
    CategoryTiers {
        wants: groups.wants,
        okay: groups.okay,
        avoid: groups.not,
    }
}

/// The merged view of one or two participants that feeds the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPreferences {
    pub toys: CategoryTiers,
    pub kinks: CategoryTiers,
    pub outfits: CategoryTiers,
    pub settings: CategoryTiers,
    pub roles: Vec<String>,
}

/// Union of two partners' tiers per category. Membership is order-independent
/// (merging A with B equals merging B with A); label order follows the
/// arguments.
pub fn merge_partners(a: &PartnerSnapshot, b: &PartnerSnapshot) -> MergedPreferences {
    MergedPreferences {
        toys: merge_tiers(&a.toys, &b.toys),
        kinks: merge_tiers(&a.kinks, &b.kinks),
        outfits: merge_tiers(&a.outfits, &b.outfits),
        settings: merge_tiers(&a.settings, &b.settings),
        roles: vec![a.label(), b.label()],
    }
}

/// Solo sessions feed the live selections straight through; the role renders
/// bare, without a display name.
pub fn solo_preferences(user: &PartnerSnapshot) -> MergedPreferences {
    MergedPreferences {
        toys: user.toys.clone(),
        kinks: user.kinks.clone(),
        outfits: user.outfits.clone(),
        settings: user.settings.clone(),
        roles: vec![user.role.to_string()],
    }
}

fn merge_tiers(a: &CategoryTiers, b: &CategoryTiers) -> CategoryTiers {
    CategoryTiers {
        wants: union(&a.wants, &b.wants),
        okay: union(&a.okay, &b.okay),
        avoid: union(&a.avoid, &b.avoid),
    }
}

// Deduplicated union preserving first-seen order.
fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in a.iter().chain(b.iter()) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Render one category block. Invariant: the preferred block always precedes
/// the optional block — it signals generation priority downstream. Both
/// empty renders the literal `none`.
pub fn format_category(tiers: &CategoryTiers) -> String {
    let mut parts = Vec::new();
    if !tiers.wants.is_empty() {
        parts.push(format!(
            "PREFERRED (Must Include): {}",
            tiers.wants.join(", ")
        ));
    }
    if !tiers.okay.is_empty() {
        parts.push(format!("ACCEPTED (Optional): {}", tiers.okay.join(", ")));
    }
    if parts.is_empty() {
        schema::EMPTY_CATEGORY.to_string()
    } else {
        parts.join("\n")
    }
}

/// Substitute the recognized tokens into `template` (or the default one).
/// Unrecognized placeholders pass through verbatim; this function never
/// fails.
pub fn build_prompt(
    data: &MergedPreferences,
    intensity: Intensity,
    no_go_list: &[String],
    template: Option<&str>,
) -> String {
    template
        .unwrap_or(schema::DEFAULT_PROMPT_TEMPLATE)
        .replace("{intensity}", &intensity.to_string())
        .replace("{participants}", &data.roles.join(", "))
        .replace("{all_toys}", &format_category(&data.toys))
        .replace("{all_kinks}", &format_category(&data.kinks))
        .replace("{all_wardrobe}", &format_category(&data.outfits))
        .replace("{all_settings}", &format_category(&data.settings))
        .replace("{no_go_list}", &no_go_list.join(", "))
}

/// The composed prompt plus the structured data that produced it, kept for
/// debugging displays.
#[derive(Debug, Clone)]
pub struct PromptAssembly {
    pub prompt: String,
    pub merged: MergedPreferences,
}

pub fn assemble(
    data: MergedPreferences,
    intensity: Intensity,
    no_go_list: &[String],
    template: Option<&str>,
) -> PromptAssembly {
    let prompt = build_prompt(&data, intensity, no_go_list, template);
    PromptAssembly {
        prompt,
        merged: data,
    }
}

/// A saved template with its own sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub params: Option<SamplingParams>,
}

/// User-managed template collection plus the one "current" template applied
/// at generation time.
pub struct TemplateLibrary {
    store: Arc<dyn KeyValueStore>,
}

impl TemplateLibrary {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The active custom template, if one has been saved. Stored raw.
    pub fn current(&self) -> Option<String> {
        self.store.get(keys::PROMPT_TEMPLATE).unwrap_or_else(|e| {
            log::warn!("failed to read the current template: {e}");
            None
        })
    }

    pub fn set_current(&self, template: &str) -> Result<(), StoreError> {
        self.store.set(keys::PROMPT_TEMPLATE, template)
    }

    /// Drop back to the built-in default template.
    pub fn clear_current(&self) -> Result<(), StoreError> {
        self.store.remove(keys::PROMPT_TEMPLATE)
    }

    pub fn saved(&self) -> Vec<NamedTemplate> {
        load_or_default(self.store.as_ref(), keys::TEMPLATE_LIBRARY)
    }

    /// Save the given content under a new name. An empty name is silently
    /// ignored.
    pub fn save_as(
        &self,
        name: &str,
        content: &str,
        params: Option<SamplingParams>,
    ) -> Result<Option<NamedTemplate>, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let template = NamedTemplate {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            content: content.to_string(),
            params,
        };
        let mut templates = self.saved();
        templates.push(template.clone());
        save_json(self.store.as_ref(), keys::TEMPLATE_LIBRARY, &templates)?;
        Ok(Some(template))
    }

    pub fn load(&self, id: &str) -> Option<NamedTemplate> {
        self.saved().into_iter().find(|t| t.id == id)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let templates: Vec<NamedTemplate> =
            self.saved().into_iter().filter(|t| t.id != id).collect();
        save_json(self.store.as_ref(), keys::TEMPLATE_LIBRARY, &templates)
    }
}
