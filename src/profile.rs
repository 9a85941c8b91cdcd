use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Dynamic a participant takes within a scene.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Dom,
    Sub,
    #[default]
    Switch,
    Voyeur,
}

/// Scene intensity. Ordered so the highest level wins when two participants
/// disagree; `Demon` additionally removes the avoid tier from the selection
/// cycle.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Intensity {
    Casual,
    #[default]
    Adventurous,
    Weird,
    Demon,
}

impl Intensity {
    pub fn is_demon(self) -> bool {
        self == Intensity::Demon
    }

    /// Escalation rule for two participants: the highest level applies.
    pub fn escalate(self, other: Intensity) -> Intensity {
        self.max(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_escalates_to_the_highest_level() {
        assert_eq!(
            Intensity::Casual.escalate(Intensity::Weird),
            Intensity::Weird
        );
        assert_eq!(
            Intensity::Demon.escalate(Intensity::Casual),
            Intensity::Demon
        );
    }

    #[test]
    fn role_renders_lowercase() {
        assert_eq!(Role::Voyeur.to_string(), "voyeur");
        assert_eq!(Role::default(), Role::Switch);
    }
}
