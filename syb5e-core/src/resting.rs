//! Rest resolution.
//!
//! Short rest: no automatic healing, temporary corruption drops by the
//! proficiency bonus. Long rest: heal the largest hit die plus CON, temporary
//! corruption drops by twice the proficiency bonus. Extended rest: full
//! heal, every hit die back, temporary corruption cleared.
//!
//! Hit dice can also be spent during short and long rests, either to heal
//! or to shed another proficiency bonus worth of temporary corruption.
//!
//! Everything here is pure. [`resolve_rest`] turns a snapshot into a
//! [`RestResult`]; the runtime commits it.

use crate::actor::{Ability, Actor, ActorError, ActorKind, RecoveryPeriod};
use crate::corruption::CorruptionResource;
use crate::dice::DieType;
use crate::update::{ActorUpdate, ItemUpdate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestType {
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "ext")]
    Extended,
}

impl RestType {
    /// Whether the rest recovers long-rest resources and uses.
    pub fn is_long_or_longer(&self) -> bool {
        !matches!(self, RestType::Short)
    }
}

impl fmt::Display for RestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestType::Short => write!(f, "Short Rest"),
            RestType::Long => write!(f, "Long Rest"),
            RestType::Extended => write!(f, "Extended Rest"),
        }
    }
}

/// Net change to hit points, remaining hit dice and temporary corruption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestDeltas {
    pub hit_points: i32,
    pub hit_dice: i32,
    pub corruption: i32,
}

impl RestDeltas {
    pub fn any(&self) -> bool {
        self.hit_points != 0 || self.hit_dice != 0 || self.corruption != 0
    }

    pub fn combined(&self, other: &RestDeltas) -> RestDeltas {
        RestDeltas {
            hit_points: self.hit_points + other.hit_points,
            hit_dice: self.hit_dice + other.hit_dice,
            corruption: self.corruption + other.corruption,
        }
    }

    /// Change between two snapshots of the same actor.
    pub fn between(before: &Actor, after: &Actor) -> RestDeltas {
        RestDeltas {
            hit_points: after.hit_points.current - before.hit_points.current,
            hit_dice: after.hit_dice_remaining() as i32 - before.hit_dice_remaining() as i32,
            corruption: after.corruption.temp - before.corruption.temp,
        }
    }
}

/// Outcome of one rest, before it is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct RestResult {
    pub rest_type: RestType,
    /// Changes made by the rest itself.
    pub deltas: RestDeltas,
    /// Changes made by hit dice spent in the rest dialog.
    pub dialog_deltas: RestDeltas,
    pub new_day: bool,
    pub actor_update: ActorUpdate,
    pub item_updates: Vec<ItemUpdate>,
}

impl RestResult {
    pub fn total_deltas(&self) -> RestDeltas {
        self.deltas.combined(&self.dialog_deltas)
    }
}

// ============================================================================
// Recovery amounts
// ============================================================================

/// Hit points the rest heals before clamping.
pub fn rest_hp_gain(actor: &Actor, rest_type: RestType) -> Result<i32, ActorError> {
    match rest_type {
        RestType::Short => Ok(0),
        RestType::Long => {
            let hit_die = match (actor.largest_hit_die(), actor.kind) {
                (Some(die), _) => die.sides() as i32,
                (None, ActorKind::Npc { .. }) => 0,
                (None, ActorKind::Character) => {
                    return Err(ActorError::MissingClassData(actor.name.clone()))
                }
            };
            Ok((hit_die + actor.modifier(Ability::Constitution)).max(0))
        }
        RestType::Extended => Ok(actor.hit_points.effective_max()),
    }
}

/// Temporary corruption the rest removes, never more than the actor has.
pub fn corruption_recovery(actor: &Actor, rest_type: RestType) -> i32 {
    let temp = actor.corruption.temp;
    let prof = actor.proficiency;
    let recovery = match rest_type {
        RestType::Short => prof,
        RestType::Long => 2 * prof,
        RestType::Extended => temp,
    };
    recovery.min(temp).max(0)
}

/// Write the healed temp corruption into `update` and return the delta.
pub fn corruption_heal_update(
    current: &CorruptionResource,
    amount: i32,
    update: &mut ActorUpdate,
) -> i32 {
    let new_temp = (current.temp - amount).max(0);
    update.corruption_temp = Some(new_temp);
    new_temp - current.temp
}

/// Restore up to `max_hit_dice` spent hit dice, largest dice first.
/// Returns the class updates and how many dice came back.
pub fn hit_dice_recovery(actor: &Actor, max_hit_dice: u32) -> (Vec<ItemUpdate>, u32) {
    let mut classes: Vec<_> = actor
        .classes
        .iter()
        .filter(|class| class.hit_dice_spent > 0)
        .collect();
    classes.sort_by(|a, b| b.hit_die.cmp(&a.hit_die));

    let mut budget = max_hit_dice;
    let mut updates = Vec::new();
    for class in classes {
        if budget == 0 {
            break;
        }
        let recovered = (class.hit_dice_spent as u32).min(budget);
        budget -= recovered;
        updates.push(ItemUpdate::hit_dice_spent(
            class.id,
            class.hit_dice_spent - recovered as u8,
        ));
    }

    (updates, max_hit_dice - budget)
}

/// New values for limited resources: short-rest resources on a short
/// rest, long-rest resources otherwise.
pub fn resource_recovery(actor: &Actor, rest_type: RestType) -> BTreeMap<String, i32> {
    actor
        .resources
        .iter()
        .filter(|(_, resource)| match rest_type {
            RestType::Short => resource.short_rest,
            RestType::Long | RestType::Extended => resource.long_rest,
        })
        .filter(|(_, resource)| resource.value != resource.max)
        .map(|(key, resource)| (key.clone(), resource.max))
        .collect()
}

/// Reset spent item uses whose recovery period the rest covers.
pub fn item_use_recovery(actor: &Actor, rest_type: RestType, new_day: bool) -> Vec<ItemUpdate> {
    let recovers = |period: &RecoveryPeriod| match period {
        RecoveryPeriod::ShortRest => true,
        RecoveryPeriod::LongRest => rest_type.is_long_or_longer(),
        RecoveryPeriod::Day => new_day,
    };

    actor
        .items
        .iter()
        .filter_map(|item| {
            let uses = item.uses.as_ref()?;
            (uses.spent > 0 && uses.recovery.iter().any(recovers))
                .then(|| ItemUpdate::uses_spent(item.id, 0))
        })
        .collect()
}

/// Resolve a rest against a snapshot, in rule order: hit points, hit dice
/// (extended only), corruption, resources, item uses.
///
/// Hit points are clamped to the effective max before the rest. For a
/// soulless actor the pre-update stage then raises the max by the healed
/// corruption, so hit points can end below the new max.
pub fn resolve_rest(
    actor: &Actor,
    rest_type: RestType,
    new_day: bool,
) -> Result<RestResult, ActorError> {
    let mut update = ActorUpdate::new();
    let mut item_updates = Vec::new();
    let mut deltas = RestDeltas::default();

    let hp = &actor.hit_points;
    let gain = rest_hp_gain(actor, rest_type)?;
    let final_hp = (hp.current + gain).min(hp.effective_max());
    update.hp_value = Some(final_hp);
    deltas.hit_points = final_hp - hp.current;

    if rest_type == RestType::Extended {
        let (class_updates, recovered) = hit_dice_recovery(actor, actor.level());
        item_updates.extend(class_updates);
        deltas.hit_dice = recovered as i32;
    }

    let recovery = corruption_recovery(actor, rest_type);
    deltas.corruption = corruption_heal_update(&actor.corruption, recovery, &mut update);

    update.resources = resource_recovery(actor, rest_type);
    item_updates.extend(item_use_recovery(actor, rest_type, new_day));

    Ok(RestResult {
        rest_type,
        deltas,
        dialog_deltas: RestDeltas::default(),
        new_day,
        actor_update: update,
        item_updates,
    })
}

// ============================================================================
// Hit die spending
// ============================================================================

/// Pick the class a hit die is spent from and build its update.
///
/// With a denomination, the first class of that size with a die left;
/// without, the first class with any die left.
pub fn spend_hit_die(actor: &Actor, denomination: Option<DieType>) -> Option<(ItemUpdate, DieType)> {
    let class = actor.class_with_hit_die(denomination)?;
    Some((
        ItemUpdate::hit_dice_spent(class.id, class.hit_dice_spent + 1),
        class.hit_die,
    ))
}

/// Hit points after healing a hit die roll plus CON, clamped.
pub fn hit_die_heal(actor: &Actor, roll: i32) -> i32 {
    let amount = (roll + actor.modifier(Ability::Constitution)).max(0);
    actor.hit_points.healed(amount)
}

// ============================================================================
// Chat summary
// ============================================================================

/// Chat card for a finished rest, as translation keys plus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestMessage {
    pub flavor: &'static str,
    pub content: String,
    pub name: String,
    pub dhd: i32,
    pub dhp: i32,
    pub dco: i32,
}

pub fn rest_message(actor_name: &str, rest_type: RestType, new_day: bool, deltas: &RestDeltas) -> RestMessage {
    let (flavor, terse, length) = match rest_type {
        RestType::Short => ("SYB5E.Rest.Flavor.Short", "Short", "Short"),
        RestType::Long if new_day => ("SYB5E.Rest.Flavor.LongOvernight", "Long", "Long"),
        RestType::Long => ("SYB5E.Rest.Flavor.Long", "Long", "Long"),
        RestType::Extended if new_day => (
            "SYB5E.Rest.Flavor.ExtendedRestOvernight",
            "ExtendedShort",
            "Extended",
        ),
        RestType::Extended => (
            "SYB5E.Rest.Flavor.ExtendedRestNormal",
            "ExtendedShort",
            "Extended",
        ),
    };

    let content = if deltas.any() {
        format!("SYB5E.Rest.Results.{length}Full")
    } else {
        format!("SYB5E.Rest.Results.{terse}")
    };

    RestMessage {
        flavor,
        content,
        name: actor_name.to_string(),
        dhd: deltas.hit_dice,
        dhp: deltas.hit_points,
        dco: deltas.corruption.abs(),
    }
}
