//! Caster classification.
//!
//! Works out the highest spell level an actor can reach and whether it
//! got there on the full-caster track. The result feeds the corruption
//! threshold and floors the derived spell-slot table.

use crate::actor::{Actor, ActorKind, ClassItem};
use crate::error::Syb5eError;
use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};

/// Spell slot progression of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellProgression {
    #[default]
    None,
    Full,
    Half,
    Third,
    Pact,
    Artificer,
    /// Progression key this crate has no table for.
    #[serde(other)]
    Unknown,
}

// Highest spell level by class level, index 0 unused.
const FULL: [u8; 21] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 9, 9];
const HALF: [u8; 21] = [0, 0, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5];
const THIRD: [u8; 21] = [0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 4, 4];
const PACT: [u8; 21] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5];
const ARTIFICER: [u8; 21] = [0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5];

const LEVEL_SHORT: [&str; 10] = [
    "0", "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th",
];

impl SpellProgression {
    /// Level table, or `None` for classes that never cast.
    pub fn table(&self) -> Option<&'static [u8; 21]> {
        match self {
            SpellProgression::Full => Some(&FULL),
            SpellProgression::Half => Some(&HALF),
            SpellProgression::Third => Some(&THIRD),
            SpellProgression::Pact => Some(&PACT),
            SpellProgression::Artificer => Some(&ARTIFICER),
            SpellProgression::None | SpellProgression::Unknown => None,
        }
    }

    /// Highest spell level at `class_level`. Levels past the table read 0.
    pub fn spell_level(&self, class_level: u8) -> Option<u8> {
        self.table()
            .map(|table| table.get(class_level as usize).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SpellcastingLevel {
    pub level: u8,
    pub full_caster: bool,
}

impl SpellcastingLevel {
    /// Short label for display ("3rd").
    pub fn label(&self) -> &'static str {
        LEVEL_SHORT
            .get(self.level as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Classify a character from its classes.
///
/// Only a strictly higher spell level replaces the running best, so on a
/// tie the earlier class keeps its full-caster status.
pub fn classify(classes: &[ClassItem]) -> SpellcastingLevel {
    classes
        .iter()
        .fold(SpellcastingLevel::default(), |best, class| {
            match class.progression.spell_level(class.levels) {
                Some(level) if level > best.level => SpellcastingLevel {
                    level,
                    full_caster: class.progression == SpellProgression::Full,
                },
                _ => best,
            }
        })
}

/// Classify an NPC from its stored caster level. Any caster level makes
/// it a full caster.
pub fn classify_npc(spell_level: u8) -> SpellcastingLevel {
    let full_caster = spell_level > 0;
    let level = if full_caster {
        SpellProgression::Full.spell_level(spell_level).unwrap_or(0)
    } else {
        0
    };
    SpellcastingLevel { level, full_caster }
}

pub fn spell_progression(actor: &Actor) -> SpellcastingLevel {
    match actor.kind {
        ActorKind::Character => classify(&actor.classes),
        ActorKind::Npc { spell_level } => classify_npc(spell_level),
    }
}

/// Write the max spell level into the slot table and give every unlocked
/// tier at least one slot.
pub fn modify_derived_progression(actor: &mut Actor) {
    let progression = spell_progression(actor);
    actor.spell_slots.max_level = progression.level;

    for tier in 1..=progression.level {
        if let Some(slot) = actor.spell_slots.tier_mut(tier) {
            slot.total = slot.total.max(1);
        }
    }
}

/// Runs [`modify_derived_progression`] after the host's derived data pass.
pub struct SpellProgressionStage;

impl Stage<Actor> for SpellProgressionStage {
    fn name(&self) -> &str {
        "spell-progression"
    }

    fn after(&self, actor: &mut Actor) -> Result<(), Syb5eError> {
        if actor.is_syb_actor() {
            modify_derived_progression(actor);
        }
        Ok(())
    }
}
