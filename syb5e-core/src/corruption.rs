//! Corruption: the cost of casting and the threshold a character can bear.
//!
//! A cantrip causes 1 point of temporary corruption, a leveled spell
//! 1d4 + its level. Favored cantrips cost nothing and favored leveled
//! spells cost only their level. At-will and innate casting never
//! corrupts.
//!
//! Costs are kept symbolic. The formula is evaluated once, later, when
//! the chat record for the cast is reconciled (see [`crate::usage`]).

use crate::actor::{Ability, Actor, ActorError, Item, ItemKind, Preparation};
use crate::dice::{self, DiceError};
use crate::spellcasting;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Expression used when a cast costs nothing.
pub const NO_CORRUPTION: &str = "0";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorruptionError {
    #[error("Spell level '{0}' is not a number")]
    InvalidLevel(String),

    #[error("Corruption bonus '{0}' must not contain dice")]
    NonDeterministicBonus(String),

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

// ============================================================================
// Stored resource
// ============================================================================

/// Which score drives the corruption threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CorruptionAbility {
    Ability(Ability),
    /// The stored `max` is used as is.
    Custom,
    /// Threshold is always zero.
    Thorough,
}

impl TryFrom<String> for CorruptionAbility {
    type Error = ActorError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        match key.as_str() {
            "custom" => Ok(CorruptionAbility::Custom),
            "thorough" => Ok(CorruptionAbility::Thorough),
            other => Ability::from_key(other).map(CorruptionAbility::Ability),
        }
    }
}

impl From<CorruptionAbility> for String {
    fn from(ability: CorruptionAbility) -> Self {
        ability.to_string()
    }
}

impl fmt::Display for CorruptionAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptionAbility::Ability(ability) => write!(f, "{}", ability.key()),
            CorruptionAbility::Custom => write!(f, "custom"),
            CorruptionAbility::Thorough => write!(f, "thorough"),
        }
    }
}

/// Flat bonus to the threshold. May be stored as a formula string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BonusValue {
    Flat(i32),
    Formula(String),
}

impl BonusValue {
    /// Reduce to a whole number. Formulas with dice are rejected.
    ///
    /// Fractional results are floored here. The threshold is otherwise a
    /// whole number, so this matches flooring the final sum.
    pub fn simplify(&self) -> Result<i32, CorruptionError> {
        match self {
            BonusValue::Flat(value) => Ok(*value),
            BonusValue::Formula(formula) if formula.trim().is_empty() => Ok(0),
            BonusValue::Formula(formula) => match dice::simplify(formula) {
                Ok(value) => Ok(value.floor() as i32),
                Err(DiceError::NonDeterministic(_)) => {
                    Err(CorruptionError::NonDeterministicBonus(formula.clone()))
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

impl Default for BonusValue {
    fn default() -> Self {
        BonusValue::Flat(0)
    }
}

/// Corruption as stored on the character document. `value` is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionResource {
    pub temp: i32,
    pub permanent: i32,
    /// Only read when `ability` is `custom`.
    pub max: i32,
    pub ability: CorruptionAbility,
    pub bonus: BonusValue,
}

impl Default for CorruptionResource {
    fn default() -> Self {
        Self {
            temp: 0,
            permanent: 0,
            max: 0,
            ability: CorruptionAbility::Ability(Ability::Charisma),
            bonus: BonusValue::default(),
        }
    }
}

impl CorruptionResource {
    pub fn new(temp: i32, permanent: i32) -> Self {
        Self {
            temp,
            permanent,
            ..Self::default()
        }
    }

    pub fn with_ability(mut self, ability: CorruptionAbility) -> Self {
        self.ability = ability;
        self
    }

    pub fn with_bonus(mut self, bonus: BonusValue) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_custom_max(mut self, max: i32) -> Self {
        self.ability = CorruptionAbility::Custom;
        self.max = max;
        self
    }

    pub fn value(&self) -> i32 {
        self.temp + self.permanent
    }

    pub fn get(&self, target: CorruptionTarget) -> i32 {
        match target {
            CorruptionTarget::Temp => self.temp,
            CorruptionTarget::Permanent => self.permanent,
        }
    }
}

/// Derived view of an actor's corruption, recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Corruption {
    pub temp: i32,
    pub permanent: i32,
    pub value: i32,
    pub max: i32,
    pub ability: CorruptionAbility,
    pub bonus: BonusValue,
}

/// Corruption threshold.
///
/// Non-casters (and partial casters) get `max(mod + 2 * prof, 2)`; full
/// casters get `(prof + mod) * 2`. The bonus is added afterwards and only
/// to a computed threshold.
pub fn max_corruption(actor: &Actor) -> Result<i32, CorruptionError> {
    let resource = &actor.corruption;
    let ability = match resource.ability {
        CorruptionAbility::Custom => return Ok(resource.max),
        CorruptionAbility::Thorough => return Ok(0),
        CorruptionAbility::Ability(ability) => ability,
    };

    let corr_mod = actor.modifier(ability);
    let prof = actor.proficiency;
    let bonus = resource.bonus.simplify()?;
    let full_caster = spellcasting::spell_progression(actor).full_caster;

    let raw = if full_caster {
        (prof + corr_mod) * 2
    } else {
        (corr_mod + prof * 2).max(2)
    };

    Ok(raw + bonus)
}

/// Build the derived corruption view for an actor.
pub fn corruption(actor: &Actor) -> Result<Corruption, CorruptionError> {
    let resource = &actor.corruption;
    Ok(Corruption {
        temp: resource.temp,
        permanent: resource.permanent,
        value: resource.value(),
        max: max_corruption(actor)?,
        ability: resource.ability,
        bonus: resource.bonus.clone(),
    })
}

// ============================================================================
// Casting cost
// ============================================================================

/// Which stored field a cast's corruption lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionTarget {
    #[default]
    Temp,
    Permanent,
}

/// Corruption produced by one cast. `total` is set once the expression
/// has been rolled; its presence means the cast has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionDescriptor {
    pub expression: String,
    #[serde(rename = "type")]
    pub target: CorruptionTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i32>,
}

impl CorruptionDescriptor {
    pub fn new(expression: impl Into<String>, target: CorruptionTarget) -> Self {
        Self {
            expression: expression.into(),
            target,
            total: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.total.is_some()
    }

    pub fn resolved(&self, total: i32) -> Self {
        Self {
            total: Some(total),
            ..self.clone()
        }
    }
}

/// Read a spell level the way the host stores it: a number or a numeric
/// string (cantrips arrive as `"0"`). Trailing text after the digits is
/// ignored, so `"3rd"` reads as 3.
pub fn parse_spell_level(level: &str) -> Result<u8, CorruptionError> {
    let trimmed = level.trim_start();
    let digits: String = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse()
        .map_err(|_| CorruptionError::InvalidLevel(level.to_string()))
}

/// The raw cost expression for a cast.
pub fn generate_expression(level: u8, favored: bool, preparation: Preparation) -> String {
    if preparation.is_free_casting() {
        return NO_CORRUPTION.to_string();
    }

    match (favored, level) {
        (true, 0) => NO_CORRUPTION.to_string(),
        (true, level) => level.to_string(),
        (false, 0) => "1".to_string(),
        (false, level) => format!("1d4 + {level}"),
    }
}

/// [`generate_expression`] from an unparsed level.
pub fn expression_for(
    level: &str,
    favored: bool,
    preparation: Preparation,
) -> Result<String, CorruptionError> {
    Ok(generate_expression(
        parse_spell_level(level)?,
        favored,
        preparation,
    ))
}

/// Whether a cast generates corruption at all. Agrees with
/// [`generate_expression`]: false exactly when that returns `"0"`.
pub fn generates_corruption(level: u8, favored: bool, preparation: Preparation) -> bool {
    if preparation.is_free_casting() {
        return false;
    }
    !(level == 0 && favored)
}

// ============================================================================
// Item overrides
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// No override.
    #[default]
    None,
    Add,
    Multiply,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideTarget {
    /// Keep the generated target.
    #[default]
    Default,
    Temp,
    Permanent,
}

/// Per-item rewrite of the generated cost.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorruptionOverride {
    pub mode: OverrideMode,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub target: OverrideTarget,
}

impl CorruptionOverride {
    pub fn new(mode: OverrideMode, value: impl ToString) -> Self {
        Self {
            mode,
            value: value.to_string(),
            target: OverrideTarget::Default,
        }
    }

    pub fn with_target(mut self, target: OverrideTarget) -> Self {
        self.target = target;
        self
    }

    /// Rewrite `base` textually. Nothing is evaluated here.
    pub fn apply(&self, base: CorruptionDescriptor) -> CorruptionDescriptor {
        let value = &self.value;
        let expression = match self.mode {
            OverrideMode::None => base.expression,
            OverrideMode::Add => format!("{} + ({value})", base.expression),
            OverrideMode::Multiply => format!("({}) * ({value})", base.expression),
            OverrideMode::Override => value.clone(),
        };

        let target = match self.target {
            OverrideTarget::Default => base.target,
            OverrideTarget::Temp => CorruptionTarget::Temp,
            OverrideTarget::Permanent => CorruptionTarget::Permanent,
        };

        CorruptionDescriptor {
            expression,
            target,
            total: base.total,
        }
    }
}

/// Full cost of using an item, overrides included. `cast_level` replaces
/// the spell's own level when upcasting.
pub fn item_corruption(item: &Item, cast_level: Option<u8>) -> CorruptionDescriptor {
    let expression = match item.kind {
        ItemKind::Spell {
            level,
            favored,
            preparation,
        } => generate_expression(cast_level.unwrap_or(level), favored, preparation),
        ItemKind::Other => NO_CORRUPTION.to_string(),
    };

    let base = CorruptionDescriptor::new(expression, CorruptionTarget::Temp);
    match &item.corruption_override {
        Some(custom) => custom.apply(base),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{AbilityScores, ClassItem};
    use crate::spellcasting::SpellProgression;

    #[test]
    fn test_unfavored_costs() {
        for level in 1..=9u8 {
            assert_eq!(
                generate_expression(level, false, Preparation::Prepared),
                format!("1d4 + {level}")
            );
        }
        assert_eq!(generate_expression(0, false, Preparation::Prepared), "1");
    }

    #[test]
    fn test_favored_costs() {
        assert_eq!(generate_expression(0, true, Preparation::Prepared), "0");
        assert_eq!(generate_expression(3, true, Preparation::Prepared), "3");
    }

    #[test]
    fn test_free_casting_never_corrupts() {
        for preparation in [Preparation::AtWill, Preparation::Innate] {
            for level in 0..=9u8 {
                for favored in [true, false] {
                    assert_eq!(generate_expression(level, favored, preparation), "0");
                    assert!(!generates_corruption(level, favored, preparation));
                }
            }
        }
    }

    #[test]
    fn test_generates_corruption_agrees_with_expression() {
        assert!(!generates_corruption(0, true, Preparation::Prepared));
        assert!(generates_corruption(0, false, Preparation::Prepared));
        assert!(generates_corruption(1, true, Preparation::Prepared));

        for preparation in [
            Preparation::Prepared,
            Preparation::Always,
            Preparation::AtWill,
            Preparation::Innate,
            Preparation::Pact,
            Preparation::Ritual,
        ] {
            for level in 0..=9u8 {
                for favored in [true, false] {
                    let free = generate_expression(level, favored, preparation) == NO_CORRUPTION;
                    assert_eq!(generates_corruption(level, favored, preparation), !free);
                }
            }
        }
    }

    #[test]
    fn test_parse_spell_level() {
        assert_eq!(parse_spell_level("0").unwrap(), 0);
        assert_eq!(parse_spell_level(" 3").unwrap(), 3);
        assert_eq!(parse_spell_level("3rd").unwrap(), 3);
        assert_eq!(
            expression_for("2", false, Preparation::Prepared).unwrap(),
            "1d4 + 2"
        );
        assert!(matches!(
            parse_spell_level("cantrip"),
            Err(CorruptionError::InvalidLevel(_))
        ));
        assert!(parse_spell_level("-1").is_err());
        assert!(expression_for("", true, Preparation::Prepared).is_err());
    }

    #[test]
    fn test_override_add_and_replace() {
        let base = CorruptionDescriptor::new("1d4 + 3", CorruptionTarget::Temp);

        let added = CorruptionOverride::new(OverrideMode::Add, 2).apply(base.clone());
        assert_eq!(added.expression, "1d4 + 3 + (2)");

        let multiplied = CorruptionOverride::new(OverrideMode::Multiply, "0.5").apply(base.clone());
        assert_eq!(multiplied.expression, "(1d4 + 3) * (0.5)");

        let replaced = CorruptionOverride::new(OverrideMode::Override, "5").apply(base.clone());
        assert_eq!(replaced.expression, "5");

        let untouched = CorruptionOverride::default().apply(base.clone());
        assert_eq!(untouched, base);
    }

    #[test]
    fn test_override_redirects_target() {
        let base = CorruptionDescriptor::new("1", CorruptionTarget::Temp);
        let redirected = CorruptionOverride::default()
            .with_target(OverrideTarget::Permanent)
            .apply(base);
        assert_eq!(redirected.expression, "1");
        assert_eq!(redirected.target, CorruptionTarget::Permanent);
    }

    #[test]
    fn test_item_corruption() {
        let spell = Item::spell("Witch Hammer", 2);
        assert_eq!(item_corruption(&spell, None).expression, "1d4 + 2");
        assert_eq!(item_corruption(&spell, Some(4)).expression, "1d4 + 4");

        let favored_cantrip = Item::spell("Anathema", 0).favored();
        assert_eq!(item_corruption(&favored_cantrip, None).expression, "0");

        let sword = Item::other("Sword").with_override(CorruptionOverride::new(
            OverrideMode::Override,
            "1d6",
        ));
        assert_eq!(item_corruption(&sword, None).expression, "1d6");
        assert_eq!(item_corruption(&Item::other("Rope"), None).expression, "0");
    }

    #[test]
    fn test_descriptor_wire_format() {
        let descriptor = CorruptionDescriptor::new("1d4 + 1", CorruptionTarget::Permanent);
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "permanent");
        assert!(json.get("total").is_none());

        let resolved: CorruptionDescriptor =
            serde_json::from_str(r#"{"expression": "1", "type": "temp", "total": 1}"#).unwrap();
        assert!(resolved.is_resolved());
    }

    fn actor_with(ability_scores: AbilityScores, prof: i32, full_caster: bool) -> Actor {
        let progression = if full_caster {
            SpellProgression::Full
        } else {
            SpellProgression::None
        };
        Actor::character("Test")
            .with_abilities(ability_scores)
            .with_proficiency(prof)
            .with_class(ClassItem::new("Class", 5, "d8", progression).unwrap())
    }

    #[test]
    fn test_max_thorough_is_zero() {
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 18), 3, true)
            .with_corruption(
                CorruptionResource::default()
                    .with_ability(CorruptionAbility::Thorough)
                    .with_bonus(BonusValue::Flat(5)),
            );
        assert_eq!(max_corruption(&actor).unwrap(), 0);
    }

    #[test]
    fn test_max_custom_uses_stored_value() {
        let actor = actor_with(AbilityScores::default(), 3, true).with_corruption(
            CorruptionResource::default()
                .with_custom_max(17)
                .with_bonus(BonusValue::Flat(5)),
        );
        assert_eq!(max_corruption(&actor).unwrap(), 17);
    }

    #[test]
    fn test_max_full_caster() {
        // CHA 14 -> +2
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 14), 3, true);
        assert_eq!(max_corruption(&actor).unwrap(), 10);
    }

    #[test]
    fn test_max_non_full_caster() {
        // CHA 8 -> -1; max(-1 + 4, 2)
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 8), 2, false);
        assert_eq!(max_corruption(&actor).unwrap(), 3);

        // CHA 3 -> -4; floor of 2 applies
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 3), 2, false);
        assert_eq!(max_corruption(&actor).unwrap(), 2);
    }

    #[test]
    fn test_max_adds_bonus_after_floor() {
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 3), 2, false)
            .with_corruption(CorruptionResource::default().with_bonus(BonusValue::Formula(
                "1 + 2".to_string(),
            )));
        assert_eq!(max_corruption(&actor).unwrap(), 5);
    }

    #[test]
    fn test_fractional_bonus_floors() {
        assert_eq!(BonusValue::Formula("1.5".to_string()).simplify().unwrap(), 1);
        assert_eq!(BonusValue::Formula("-1.5".to_string()).simplify().unwrap(), -2);

        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 3), 2, false)
            .with_corruption(
                CorruptionResource::default().with_bonus(BonusValue::Formula("1.5".to_string())),
            );
        assert_eq!(max_corruption(&actor).unwrap(), 3);
    }

    #[test]
    fn test_max_rejects_random_bonus() {
        let actor = actor_with(AbilityScores::default(), 2, false).with_corruption(
            CorruptionResource::default().with_bonus(BonusValue::Formula("1d4".to_string())),
        );
        assert!(matches!(
            max_corruption(&actor),
            Err(CorruptionError::NonDeterministicBonus(_))
        ));
    }

    #[test]
    fn test_unknown_ability_is_rejected_at_the_boundary() {
        let result: Result<CorruptionResource, _> =
            serde_json::from_str(r#"{"temp": 1, "ability": "luck"}"#);
        assert!(result.is_err());

        let parsed: CorruptionResource =
            serde_json::from_str(r#"{"temp": 1, "permanent": 2, "ability": "wis", "bonus": "2"}"#)
                .unwrap();
        assert_eq!(
            parsed.ability,
            CorruptionAbility::Ability(Ability::Wisdom)
        );
        assert_eq!(parsed.bonus.simplify().unwrap(), 2);
    }

    #[test]
    fn test_derived_view() {
        let actor = actor_with(AbilityScores::new(10, 10, 10, 10, 10, 14), 3, true)
            .with_corruption(CorruptionResource::new(4, 2));
        let view = corruption(&actor).unwrap();
        assert_eq!(view.value, 6);
        assert_eq!(view.max, 10);
    }
}
