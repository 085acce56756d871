//! Character, NPC and item snapshots.
//!
//! These are read-only views of the host's documents. The host owns the
//! real data; this crate reads a snapshot, computes a patch
//! ([`crate::update::ActorUpdate`]) and hands it back.

use crate::corruption::{CorruptionDescriptor, CorruptionOverride, CorruptionResource};
use crate::currency::Currency;
use crate::dice::DieType;
use crate::spellcasting::SpellProgression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Malformed or missing host data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActorError {
    #[error("Unknown ability key '{0}'")]
    UnknownAbility(String),

    #[error("Invalid hit die denomination '{0}'")]
    InvalidDenomination(String),

    #[error("{0} has no class data")]
    MissingClassData(String),

    #[error("No item with id {0}")]
    ItemNotFound(ItemId),

    #[error("Item {0} is not a spell")]
    NotASpell(ItemId),
}

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for embedded items (classes included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    #[serde(rename = "str")]
    Strength,
    #[serde(rename = "dex")]
    Dexterity,
    #[serde(rename = "con")]
    Constitution,
    #[serde(rename = "int")]
    Intelligence,
    #[serde(rename = "wis")]
    Wisdom,
    #[serde(rename = "cha")]
    Charisma,
}

impl Ability {
    /// Host data key (`"str"`, `"dex"`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Ability::Strength => "str",
            Ability::Dexterity => "dex",
            Ability::Constitution => "con",
            Ability::Intelligence => "int",
            Ability::Wisdom => "wis",
            Ability::Charisma => "cha",
        }
    }

    pub fn from_key(key: &str) -> Result<Ability, ActorError> {
        Ability::all()
            .into_iter()
            .find(|ability| ability.key() == key)
            .ok_or_else(|| ActorError::UnknownAbility(key.to_string()))
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        // Floor division: 8-9 = -1, 10-11 = 0, 12-13 = +1
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit points. `temp_max` is a cumulative modifier on top of `maximum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    #[serde(default)]
    pub temp_max: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temp_max: 0,
        }
    }

    pub fn effective_max(&self) -> i32 {
        self.maximum + self.temp_max
    }

    /// Hit points after healing `amount`, capped at the effective maximum.
    pub fn healed(&self, amount: i32) -> i32 {
        (self.current + amount).min(self.effective_max())
    }
}

// ============================================================================
// Classes
// ============================================================================

/// A class item: levels, hit dice and spell progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassItem {
    pub id: ItemId,
    pub name: String,
    pub levels: u8,
    pub hit_die: DieType,
    #[serde(default)]
    pub hit_dice_spent: u8,
    #[serde(default)]
    pub progression: SpellProgression,
}

impl ClassItem {
    /// Build a class from host data, validating the denomination (`"d8"`).
    pub fn new(
        name: impl Into<String>,
        levels: u8,
        denomination: &str,
        progression: SpellProgression,
    ) -> Result<Self, ActorError> {
        let hit_die = DieType::from_denomination(denomination)
            .ok_or_else(|| ActorError::InvalidDenomination(denomination.to_string()))?;
        Ok(Self {
            id: ItemId::new(),
            name: name.into(),
            levels,
            hit_die,
            hit_dice_spent: 0,
            progression,
        })
    }

    pub fn hit_dice_remaining(&self) -> u8 {
        self.levels.saturating_sub(self.hit_dice_spent)
    }
}

// ============================================================================
// Items
// ============================================================================

/// How a spell is prepared. At-will and innate casting never corrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preparation {
    #[default]
    Prepared,
    Always,
    AtWill,
    Innate,
    Pact,
    Ritual,
}

impl Preparation {
    pub fn is_free_casting(&self) -> bool {
        matches!(self, Preparation::AtWill | Preparation::Innate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Spell {
        level: u8,
        #[serde(default)]
        favored: bool,
        #[serde(default)]
        preparation: Preparation,
    },
    Other,
}

/// When limited uses come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryPeriod {
    #[serde(rename = "sr")]
    ShortRest,
    #[serde(rename = "lr")]
    LongRest,
    #[serde(rename = "day")]
    Day,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUses {
    pub spent: u32,
    pub max: u32,
    pub recovery: Vec<RecoveryPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub uses: Option<ItemUses>,
    #[serde(default)]
    pub corruption_override: Option<CorruptionOverride>,
    #[serde(default)]
    pub last_corruption: Option<CorruptionDescriptor>,
}

impl Item {
    pub fn spell(name: impl Into<String>, level: u8) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            kind: ItemKind::Spell {
                level,
                favored: false,
                preparation: Preparation::Prepared,
            },
            uses: None,
            corruption_override: None,
            last_corruption: None,
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            kind: ItemKind::Other,
            uses: None,
            corruption_override: None,
            last_corruption: None,
        }
    }

    pub fn favored(mut self) -> Self {
        if let ItemKind::Spell { favored, .. } = &mut self.kind {
            *favored = true;
        }
        self
    }

    pub fn with_preparation(mut self, mode: Preparation) -> Self {
        if let ItemKind::Spell { preparation, .. } = &mut self.kind {
            *preparation = mode;
        }
        self
    }

    pub fn with_uses(mut self, max: u32, recovery: Vec<RecoveryPeriod>) -> Self {
        self.uses = Some(ItemUses {
            spent: 0,
            max,
            recovery,
        });
        self
    }

    pub fn with_override(mut self, custom: CorruptionOverride) -> Self {
        self.corruption_override = Some(custom);
        self
    }

    pub fn spell_level(&self) -> Option<u8> {
        match self.kind {
            ItemKind::Spell { level, .. } => Some(level),
            ItemKind::Other => None,
        }
    }

    pub fn is_favored(&self) -> bool {
        matches!(self.kind, ItemKind::Spell { favored: true, .. })
    }
}

/// An actor-level limited resource (primary/secondary/tertiary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub label: String,
    pub value: i32,
    pub max: i32,
    #[serde(default)]
    pub short_rest: bool,
    #[serde(default)]
    pub long_rest: bool,
}

// ============================================================================
// Spell Slots
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub total: u8,
    pub used: u8,
}

impl SlotInfo {
    pub fn available(&self) -> u8 {
        self.total.saturating_sub(self.used)
    }
}

/// Spell slot table, tiers 1 through 9.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots {
    /// Highest unlocked spell level.
    pub max_level: u8,
    pub slots: [SlotInfo; 9],
}

impl SpellSlots {
    pub fn tier(&self, level: u8) -> Option<&SlotInfo> {
        (1..=9)
            .contains(&level)
            .then(|| &self.slots[level as usize - 1])
    }

    pub fn tier_mut(&mut self, level: u8) -> Option<&mut SlotInfo> {
        if (1..=9).contains(&level) {
            Some(&mut self.slots[level as usize - 1])
        } else {
            None
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActorKind {
    Character,
    Npc {
        /// Stored caster level; above zero marks a full caster.
        #[serde(default)]
        spell_level: u8,
    },
}

/// Per-actor ruleset extension flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesetFlags {
    pub syb5e_actor: bool,
    pub soulless: bool,
    pub shadow: String,
    pub manner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub kind: ActorKind,
    pub abilities: AbilityScores,
    pub proficiency: i32,
    pub hit_points: HitPoints,
    #[serde(default)]
    pub classes: Vec<ClassItem>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(default)]
    pub spell_slots: SpellSlots,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub corruption: CorruptionResource,
    #[serde(default)]
    pub flags: RulesetFlags,
}

impl Actor {
    /// A player character flagged for the ruleset.
    pub fn character(name: impl Into<String>) -> Self {
        Self::with_kind(name, ActorKind::Character)
    }

    /// An NPC flagged for the ruleset.
    pub fn npc(name: impl Into<String>, spell_level: u8) -> Self {
        Self::with_kind(name, ActorKind::Npc { spell_level })
    }

    fn with_kind(name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            kind,
            abilities: AbilityScores::default(),
            proficiency: 2,
            hit_points: HitPoints::new(10),
            classes: Vec::new(),
            items: Vec::new(),
            resources: BTreeMap::new(),
            spell_slots: SpellSlots::default(),
            currency: Currency::default(),
            corruption: CorruptionResource::default(),
            flags: RulesetFlags {
                syb5e_actor: true,
                ..RulesetFlags::default()
            },
        }
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_proficiency(mut self, proficiency: i32) -> Self {
        self.proficiency = proficiency;
        self
    }

    pub fn with_hit_points(mut self, current: i32, maximum: i32) -> Self {
        self.hit_points = HitPoints {
            current,
            maximum,
            temp_max: 0,
        };
        self
    }

    pub fn with_class(mut self, class: ClassItem) -> Self {
        self.classes.push(class);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_corruption(mut self, corruption: CorruptionResource) -> Self {
        self.corruption = corruption;
        self
    }

    pub fn soulless(mut self) -> Self {
        self.flags.soulless = true;
        self
    }

    pub fn is_syb_actor(&self) -> bool {
        self.flags.syb5e_actor
    }

    pub fn is_character(&self) -> bool {
        matches!(self.kind, ActorKind::Character)
    }

    /// Total character level across classes.
    pub fn level(&self) -> u32 {
        self.classes.iter().map(|c| c.levels as u32).sum()
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    pub fn item(&self, id: ItemId) -> Result<&Item, ActorError> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .ok_or(ActorError::ItemNotFound(id))
    }

    pub fn class(&self, id: ItemId) -> Result<&ClassItem, ActorError> {
        self.classes
            .iter()
            .find(|class| class.id == id)
            .ok_or(ActorError::ItemNotFound(id))
    }

    /// Largest hit die among the actor's classes.
    pub fn largest_hit_die(&self) -> Option<DieType> {
        self.classes.iter().map(|c| c.hit_die).max()
    }

    /// Unspent hit dice keyed by denomination.
    pub fn hit_dice_by_denomination(&self) -> HashMap<DieType, u32> {
        let mut by_size = HashMap::new();
        for class in &self.classes {
            *by_size.entry(class.hit_die).or_insert(0) += class.hit_dice_remaining() as u32;
        }
        by_size
    }

    pub fn hit_dice_remaining(&self) -> u32 {
        self.classes
            .iter()
            .map(|c| c.hit_dice_remaining() as u32)
            .sum()
    }

    /// First class with an unspent die of `denomination` (any die when `None`).
    pub fn class_with_hit_die(&self, denomination: Option<DieType>) -> Option<&ClassItem> {
        self.classes.iter().find(|class| {
            class.hit_dice_remaining() > 0 && denomination.map_or(true, |d| class.hit_die == d)
        })
    }
}
