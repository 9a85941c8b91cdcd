// region:  --- Catalogs

/// Seed items shown in each category before the user adds their own.
pub const TOY_CATALOG: &[&str] = &[
    "cuffs",
    "blindfold",
    "crop",
    "vibrator",
    "rope",
    "gag",
    "paddle",
    "collar",
    "wand",
    "clamps",
    "feather tickler",
    "massage oil",
];

pub const OUTFIT_CATALOG: &[&str] = &[
    "lingerie",
    "stockings",
    "corset",
    "leather harness",
    "silk robe",
    "latex",
    "costume roleplay",
    "nothing at all",
];

pub const SETTING_CATALOG: &[&str] = &[
    "bedroom",
    "hotel room",
    "candlelit bath",
    "kitchen counter",
    "cabin getaway",
    "car backseat",
    "massage table",
    "balcony at night",
];

pub const KINK_CATALOG: &[&str] = &[
    "light bondage",
    "spanking",
    "sensory deprivation",
    "temperature play",
    "roleplay",
    "dirty talk",
    "edging",
    "body worship",
    "praise",
    "degradation",
    "teasing",
    "aftercare",
];

// endregion:  --- Catalogs

// region:  --- Restrictions

/// Universal hard limits applied to every generated scene until the user
/// edits the list.
pub const DEFAULT_NO_GO_LIST: &[&str] = &[
    "blood",
    "needles",
    "scat",
    "watersports",
    "choking",
    "filming",
    "involving others",
];

// endregion:  --- Restrictions

// region:  --- Prompt template

/// Tokens substituted into a custom template. Anything else in curly braces
/// is passed through verbatim.
pub const RECOGNIZED_PLACEHOLDERS: &[&str] = &[
    "{intensity}",
    "{participants}",
    "{all_toys}",
    "{all_kinks}",
    "{all_wardrobe}",
    "{all_settings}",
    "{no_go_list}",
];

/// Narrative-style fallback used when no custom template is active. Within
/// each category block the preferred items always precede the optional ones.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"Write an erotic scene incorporating the following elements.

[INVENTORY & PREFERENCES]
Toys:
{all_toys}

Kinks:
{all_kinks}

Outfits:
{all_wardrobe}

Settings:
{all_settings}

[SCENE CONFIGURATION]
Intensity Level: {intensity}
Roles/Dynamics: {participants}

[RESTRICTIONS]
Strictly avoid: {no_go_list}"#;

/// Rendered in place of an empty category block.
pub const EMPTY_CATEGORY: &str = "none";

// endregion:  --- Prompt template
