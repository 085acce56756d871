//! Partial document patches.
//!
//! Every field is optional; `None` leaves the stored value alone. The host
//! applies a patch as one transaction.

use crate::actor::{Actor, ActorError, ItemId, ItemKind};
use crate::corruption::{BonusValue, CorruptionDescriptor, CorruptionTarget};
use crate::currency::Currency;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorUpdate {
    pub hp_value: Option<i32>,
    pub hp_temp_max: Option<i32>,
    pub corruption_temp: Option<i32>,
    pub corruption_permanent: Option<i32>,
    pub corruption_bonus: Option<BonusValue>,
    pub corruption_max: Option<i32>,
    /// New `value` per resource key.
    pub resources: BTreeMap<String, i32>,
    pub currency: Option<Currency>,
}

impl ActorUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hp(mut self, value: i32) -> Self {
        self.hp_value = Some(value);
        self
    }

    pub fn with_corruption(mut self, target: CorruptionTarget, value: i32) -> Self {
        self.set_corruption(target, value);
        self
    }

    pub fn set_corruption(&mut self, target: CorruptionTarget, value: i32) {
        match target {
            CorruptionTarget::Temp => self.corruption_temp = Some(value),
            CorruptionTarget::Permanent => self.corruption_permanent = Some(value),
        }
    }

    /// True when the patch writes temp or permanent corruption.
    pub fn touches_corruption(&self) -> bool {
        self.corruption_temp.is_some() || self.corruption_permanent.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `other` into this patch. Fields set in `other` win.
    pub fn merge(&mut self, other: ActorUpdate) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.hp_value, other.hp_value);
        take(&mut self.hp_temp_max, other.hp_temp_max);
        take(&mut self.corruption_temp, other.corruption_temp);
        take(&mut self.corruption_permanent, other.corruption_permanent);
        take(&mut self.corruption_bonus, other.corruption_bonus);
        take(&mut self.corruption_max, other.corruption_max);
        take(&mut self.currency, other.currency);
        self.resources.extend(other.resources);
    }

    /// Write the patch into a snapshot. Corruption never goes below zero.
    pub fn apply_to(&self, actor: &mut Actor) {
        if let Some(value) = self.hp_value {
            actor.hit_points.current = value;
        }
        if let Some(temp_max) = self.hp_temp_max {
            actor.hit_points.temp_max = temp_max;
        }
        if let Some(temp) = self.corruption_temp {
            actor.corruption.temp = temp.max(0);
        }
        if let Some(permanent) = self.corruption_permanent {
            actor.corruption.permanent = permanent.max(0);
        }
        if let Some(bonus) = &self.corruption_bonus {
            actor.corruption.bonus = bonus.clone();
        }
        if let Some(max) = self.corruption_max {
            actor.corruption.max = max;
        }
        for (key, value) in &self.resources {
            if let Some(resource) = actor.resources.get_mut(key) {
                resource.value = *value;
            }
        }
        if let Some(currency) = self.currency {
            actor.currency = currency;
        }
    }
}

/// Patch for one embedded item. Class items only take `hit_dice_spent`.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub item_id: ItemId,
    pub hit_dice_spent: Option<u8>,
    pub uses_spent: Option<u32>,
    pub favored: Option<bool>,
    /// `Some(None)` clears the stored descriptor.
    pub last_corruption: Option<Option<CorruptionDescriptor>>,
}

impl ItemUpdate {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            hit_dice_spent: None,
            uses_spent: None,
            favored: None,
            last_corruption: None,
        }
    }

    pub fn hit_dice_spent(item_id: ItemId, spent: u8) -> Self {
        Self {
            hit_dice_spent: Some(spent),
            ..Self::new(item_id)
        }
    }

    pub fn uses_spent(item_id: ItemId, spent: u32) -> Self {
        Self {
            uses_spent: Some(spent),
            ..Self::new(item_id)
        }
    }

    pub fn last_corruption(item_id: ItemId, descriptor: Option<CorruptionDescriptor>) -> Self {
        Self {
            last_corruption: Some(descriptor),
            ..Self::new(item_id)
        }
    }

    pub fn apply_to(&self, actor: &mut Actor) -> Result<(), ActorError> {
        if let Some(spent) = self.hit_dice_spent {
            let class = actor
                .classes
                .iter_mut()
                .find(|class| class.id == self.item_id)
                .ok_or(ActorError::ItemNotFound(self.item_id))?;
            class.hit_dice_spent = spent.min(class.levels);
        }

        if self.uses_spent.is_none() && self.favored.is_none() && self.last_corruption.is_none() {
            return Ok(());
        }

        let item = actor
            .items
            .iter_mut()
            .find(|item| item.id == self.item_id)
            .ok_or(ActorError::ItemNotFound(self.item_id))?;

        if let Some(spent) = self.uses_spent {
            if let Some(uses) = &mut item.uses {
                uses.spent = spent.min(uses.max);
            }
        }
        if let Some(value) = self.favored {
            match &mut item.kind {
                ItemKind::Spell { favored, .. } => *favored = value,
                ItemKind::Other => return Err(ActorError::NotASpell(self.item_id)),
            }
        }
        if let Some(descriptor) = &self.last_corruption {
            item.last_corruption = descriptor.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ClassItem, Item, RecoveryPeriod};
    use crate::corruption::CorruptionResource;
    use crate::spellcasting::SpellProgression;

    #[test]
    fn test_partial_update_preserves_other_fields() {
        let mut actor = Actor::character("Ylva")
            .with_hit_points(6, 12)
            .with_corruption(CorruptionResource::new(3, 1));

        ActorUpdate::new().with_hp(9).apply_to(&mut actor);

        assert_eq!(actor.hit_points.current, 9);
        assert_eq!(actor.hit_points.maximum, 12);
        assert_eq!(actor.corruption.temp, 3);
        assert_eq!(actor.corruption.permanent, 1);
    }

    #[test]
    fn test_corruption_clamped_at_zero() {
        let mut actor = Actor::character("Ylva").with_corruption(CorruptionResource::new(3, 1));
        ActorUpdate::new()
            .with_corruption(CorruptionTarget::Temp, -4)
            .apply_to(&mut actor);
        assert_eq!(actor.corruption.temp, 0);
    }

    #[test]
    fn test_merge_later_fields_win() {
        let mut update = ActorUpdate::new()
            .with_hp(5)
            .with_corruption(CorruptionTarget::Temp, 2);
        update.merge(ActorUpdate::new().with_hp(8));
        assert_eq!(update.hp_value, Some(8));
        assert_eq!(update.corruption_temp, Some(2));
        assert!(update.touches_corruption());
        assert!(!update.is_empty());
        assert!(ActorUpdate::new().is_empty());
    }

    #[test]
    fn test_item_updates() {
        let class = ClassItem::new("Warrior", 3, "d10", SpellProgression::None).unwrap();
        let class_id = class.id;
        let spell = Item::spell("Brimstone Cascade", 3).with_uses(2, vec![RecoveryPeriod::Day]);
        let spell_id = spell.id;
        let rope = Item::other("Rope");
        let rope_id = rope.id;
        let mut actor = Actor::character("Ylva")
            .with_class(class)
            .with_item(spell)
            .with_item(rope);

        ItemUpdate::hit_dice_spent(class_id, 9)
            .apply_to(&mut actor)
            .unwrap();
        assert_eq!(actor.classes[0].hit_dice_spent, 3);

        ItemUpdate::uses_spent(spell_id, 1).apply_to(&mut actor).unwrap();
        assert_eq!(actor.items[0].uses.as_ref().unwrap().spent, 1);

        let favor = ItemUpdate {
            favored: Some(true),
            ..ItemUpdate::new(rope_id)
        };
        assert_eq!(
            favor.apply_to(&mut actor),
            Err(ActorError::NotASpell(rope_id))
        );

        let missing = ItemId::new();
        assert_eq!(
            ItemUpdate::uses_spent(missing, 0).apply_to(&mut actor),
            Err(ActorError::ItemNotFound(missing))
        );
    }
}
