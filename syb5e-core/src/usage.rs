//! Item usage: spell slots become corruption.
//!
//! The flow runs in three steps:
//!
//! 1. Before consumption, [`swap_consumption`] turns spell slot use into
//!    corruption use. Ruleset actors never spend slots.
//! 2. On consumption, [`usage_updates`] stores the cost descriptor on the
//!    item and attaches it to the usage chat record.
//! 3. When that chat record renders, [`reconciliation`] decides whether to
//!    roll and apply the cost, show the already rolled result, or do
//!    nothing. A descriptor with a `total` is never applied again.

use crate::actor::{Actor, Item};
use crate::corruption::{item_corruption, CorruptionDescriptor, CorruptionTarget, NO_CORRUPTION};
use crate::host::{ChatMessage, UserId};
use crate::update::{ActorUpdate, ItemUpdate};
use serde::{Deserialize, Serialize};

/// What an item use will consume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageConfig {
    pub consume_corruption: bool,
    pub consume_spell_slot: bool,
}

pub fn swap_consumption(actor: &Actor, item: &Item, usage: &mut UsageConfig) {
    if !actor.is_syb_actor() {
        return;
    }

    // Slots only exist for leveled spells; everything else with a cost
    // must still corrupt.
    let level = item.spell_level().unwrap_or(0);
    let costs_something = item_corruption(item, None).expression != NO_CORRUPTION;
    usage.consume_corruption =
        usage.consume_corruption || usage.consume_spell_slot || (level < 1 && costs_something);
    usage.consume_spell_slot = false;
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageUpdates {
    pub item_update: ItemUpdate,
    /// Attach to the chat record when set.
    pub corruption: Option<CorruptionDescriptor>,
}

/// Updates for a consumed use. Without corruption the item's last
/// descriptor is cleared.
pub fn usage_updates(item: &Item, usage: &UsageConfig, cast_level: Option<u8>) -> UsageUpdates {
    if !usage.consume_corruption {
        return UsageUpdates {
            item_update: ItemUpdate::last_corruption(item.id, None),
            corruption: None,
        };
    }

    let descriptor = item_corruption(item, cast_level);
    UsageUpdates {
        item_update: ItemUpdate::last_corruption(item.id, Some(descriptor.clone())),
        corruption: Some(descriptor),
    }
}

// ============================================================================
// Chat reconciliation
// ============================================================================

/// Rolled corruption shown under a chat card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionCard {
    /// Translation key.
    pub header: &'static str,
    pub expression: String,
    pub total: i32,
}

impl CorruptionCard {
    /// Card for a resolved descriptor; `None` while unrolled.
    pub fn for_descriptor(descriptor: &CorruptionDescriptor) -> Option<Self> {
        let header = match descriptor.target {
            CorruptionTarget::Temp => "SYB5E.Corruption.TempDamage",
            CorruptionTarget::Permanent => "SYB5E.Corruption.PermDamage",
        };
        descriptor.total.map(|total| Self {
            header,
            expression: descriptor.expression.clone(),
            total,
        })
    }
}

/// What to do with a chat record as it renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Roll and apply this descriptor.
    Resolve(CorruptionDescriptor),
    Render(CorruptionCard),
    Ignore,
}

/// Only the author resolves a pending descriptor; everyone renders a
/// resolved one.
pub fn reconciliation(message: &ChatMessage, viewer: UserId) -> Reconciliation {
    let Some(descriptor) = &message.corruption else {
        return Reconciliation::Ignore;
    };

    if let Some(card) = CorruptionCard::for_descriptor(descriptor) {
        return Reconciliation::Render(card);
    }

    if message.author == viewer {
        Reconciliation::Resolve(descriptor.clone())
    } else {
        Reconciliation::Ignore
    }
}

/// Actor patch adding `gained` to the descriptor's target field. A zero
/// roll changes nothing.
pub fn corruption_gain(actor: &Actor, target: CorruptionTarget, gained: i32) -> Option<ActorUpdate> {
    (gained != 0).then(|| {
        let current = actor.corruption.get(target);
        ActorUpdate::new().with_corruption(target, current + gained)
    })
}

/// Outcome of a chat render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRender {
    Nothing,
    /// The descriptor was rolled and applied during this render.
    Applied(CorruptionCard),
    /// A previously rolled result.
    Card(CorruptionCard),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ItemId, Preparation};
    use crate::corruption::{CorruptionOverride, CorruptionResource, OverrideMode};
    use crate::host::MessageId;
    use serde_json::Value;

    fn message(author: UserId, corruption: Option<CorruptionDescriptor>) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(),
            author,
            actor_id: None,
            item_id: Some(ItemId::new()),
            flavor: String::new(),
            content: String::new(),
            params: Value::Null,
            corruption,
        }
    }

    #[test]
    fn test_spell_slot_becomes_corruption() {
        let actor = Actor::character("Ylva");
        let spell = Item::spell("Witch Hammer", 2);
        let mut usage = UsageConfig {
            consume_corruption: false,
            consume_spell_slot: true,
        };
        swap_consumption(&actor, &spell, &mut usage);
        assert!(usage.consume_corruption);
        assert!(!usage.consume_spell_slot);
    }

    #[test]
    fn test_cantrip_with_cost_corrupts() {
        let actor = Actor::character("Ylva");
        let mut usage = UsageConfig::default();
        swap_consumption(&actor, &Item::spell("Anathema", 0), &mut usage);
        assert!(usage.consume_corruption);

        let mut usage = UsageConfig::default();
        swap_consumption(&actor, &Item::spell("Anathema", 0).favored(), &mut usage);
        assert!(!usage.consume_corruption);

        let mut usage = UsageConfig::default();
        let innate = Item::spell("Shadow", 0).with_preparation(Preparation::Innate);
        swap_consumption(&actor, &innate, &mut usage);
        assert!(!usage.consume_corruption);
    }

    #[test]
    fn test_cursed_item_corrupts() {
        let actor = Actor::character("Ylva");
        let cursed = Item::other("Cursed Blade")
            .with_override(CorruptionOverride::new(OverrideMode::Override, "1d4"));
        let mut usage = UsageConfig::default();
        swap_consumption(&actor, &cursed, &mut usage);
        assert!(usage.consume_corruption);
    }

    #[test]
    fn test_foreign_actor_untouched() {
        let mut actor = Actor::character("Plain");
        actor.flags.syb5e_actor = false;
        let mut usage = UsageConfig {
            consume_corruption: false,
            consume_spell_slot: true,
        };
        swap_consumption(&actor, &Item::spell("Fireball", 3), &mut usage);
        assert!(usage.consume_spell_slot);
        assert!(!usage.consume_corruption);
    }

    #[test]
    fn test_usage_updates() {
        let spell = Item::spell("Witch Hammer", 2);
        let consumed = UsageConfig {
            consume_corruption: true,
            consume_spell_slot: false,
        };
        let updates = usage_updates(&spell, &consumed, Some(3));
        let descriptor = updates.corruption.unwrap();
        assert_eq!(descriptor.expression, "1d4 + 3");
        assert_eq!(
            updates.item_update.last_corruption,
            Some(Some(descriptor))
        );

        let updates = usage_updates(&spell, &UsageConfig::default(), None);
        assert!(updates.corruption.is_none());
        assert_eq!(updates.item_update.last_corruption, Some(None));
    }

    #[test]
    fn test_reconciliation_guard() {
        let me = UserId::new();
        let pending = CorruptionDescriptor::new("1d4 + 1", CorruptionTarget::Temp);

        assert_eq!(
            reconciliation(&message(me, Some(pending.clone())), me),
            Reconciliation::Resolve(pending.clone())
        );
        assert_eq!(
            reconciliation(&message(UserId::new(), Some(pending.clone())), me),
            Reconciliation::Ignore
        );
        assert_eq!(reconciliation(&message(me, None), me), Reconciliation::Ignore);

        let resolved = pending.resolved(3);
        match reconciliation(&message(me, Some(resolved)), me) {
            Reconciliation::Render(card) => {
                assert_eq!(card.header, "SYB5E.Corruption.TempDamage");
                assert_eq!(card.total, 3);
            }
            other => panic!("expected a card, got {other:?}"),
        }
    }

    #[test]
    fn test_corruption_gain() {
        let actor = Actor::character("Ylva").with_corruption(CorruptionResource::new(2, 1));
        let update = corruption_gain(&actor, CorruptionTarget::Permanent, 2).unwrap();
        assert_eq!(update.corruption_permanent, Some(3));
        assert_eq!(update.corruption_temp, None);
        assert!(corruption_gain(&actor, CorruptionTarget::Temp, 0).is_none());
    }
}
