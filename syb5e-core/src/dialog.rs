//! Rest confirmation and corruption adjustment surfaces.
//!
//! These carry data only. Rendering belongs to the host, which shows a
//! [`RestDialog`] through its [`crate::host::RestPrompt`].

use crate::actor::{Actor, ActorId};
use crate::corruption::{self, BonusValue};
use crate::dice::DieType;
use crate::error::Syb5eError;
use crate::resting::{corruption_recovery, rest_hp_gain, RestType};
use crate::runtime::Syb5e;
use crate::update::ActorUpdate;
use serde::{Deserialize, Serialize};

/// The user's answer to the rest dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestChoice {
    Confirm { new_day: bool },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestPreview {
    pub hp: i32,
    pub max_hp: i32,
    pub temp_corruption: i32,
    pub max_corruption: i32,
    pub total_corruption: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HitDieOption {
    pub denomination: DieType,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestDialogContext {
    pub title: String,
    pub rest_type: RestType,
    /// Denominations with dice left, smallest first.
    pub hit_dice: Vec<HitDieOption>,
    pub preview: RestPreview,
    pub can_roll: bool,
    pub can_reduce_corruption: bool,
    pub prompt_new_day: bool,
    pub is_extended: bool,
    pub is_short: bool,
}

/// Dialog state for an actor snapshot.
pub fn dialog_context(actor: &Actor, rest_type: RestType) -> Result<RestDialogContext, Syb5eError> {
    let hp = &actor.hit_points;
    let gain = rest_hp_gain(actor, rest_type)?;
    let recovery = corruption_recovery(actor, rest_type);
    let temp_corruption = (actor.corruption.temp - recovery).max(0);

    let preview = RestPreview {
        hp: (hp.current + gain).min(hp.effective_max()),
        max_hp: hp.effective_max(),
        temp_corruption,
        max_corruption: corruption::max_corruption(actor)?,
        total_corruption: temp_corruption + actor.corruption.permanent,
    };

    let mut hit_dice: Vec<_> = actor
        .hit_dice_by_denomination()
        .into_iter()
        .filter(|(_, available)| *available > 0)
        .map(|(denomination, available)| HitDieOption {
            denomination,
            available,
        })
        .collect();
    hit_dice.sort_by_key(|option| option.denomination);

    let can_roll = actor.hit_dice_remaining() > 0;
    Ok(RestDialogContext {
        title: rest_type.to_string(),
        rest_type,
        hit_dice,
        preview,
        can_roll,
        can_reduce_corruption: can_roll && actor.corruption.temp > 0,
        prompt_new_day: rest_type != RestType::Short,
        is_extended: rest_type == RestType::Extended,
        is_short: rest_type == RestType::Short,
    })
}

/// An open rest dialog. Dice spent here are committed immediately and
/// stay spent if the rest is cancelled.
pub struct RestDialog<'a> {
    runtime: &'a Syb5e,
    actor_id: ActorId,
    rest_type: RestType,
    denomination: Option<DieType>,
}

impl<'a> RestDialog<'a> {
    pub fn new(runtime: &'a Syb5e, actor_id: ActorId, rest_type: RestType) -> Self {
        Self {
            runtime,
            actor_id,
            rest_type,
            denomination: None,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn rest_type(&self) -> RestType {
        self.rest_type
    }

    /// Choose the hit die used by the buttons below.
    pub fn select_hit_die(&mut self, denomination: DieType) {
        self.denomination = Some(denomination);
    }

    pub async fn context(&self) -> Result<RestDialogContext, Syb5eError> {
        let actor = self.runtime.host().store.actor(self.actor_id).await?;
        dialog_context(&actor, self.rest_type)
    }

    pub async fn roll_hit_die(&self) -> Result<bool, Syb5eError> {
        self.runtime
            .roll_hit_die(self.actor_id, self.denomination)
            .await
    }

    pub async fn reduce_corruption(&self) -> Result<bool, Syb5eError> {
        self.runtime
            .heal_corruption_with_hit_die(self.actor_id, self.denomination)
            .await
    }
}

/// Direct edits from the corruption dialog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionAdjustment {
    pub temp: Option<i32>,
    pub permanent: Option<i32>,
    pub bonus: Option<BonusValue>,
    /// Only read when the threshold is custom.
    pub max: Option<i32>,
}

impl From<CorruptionAdjustment> for ActorUpdate {
    fn from(adjustment: CorruptionAdjustment) -> Self {
        ActorUpdate {
            corruption_temp: adjustment.temp,
            corruption_permanent: adjustment.permanent,
            corruption_bonus: adjustment.bonus,
            corruption_max: adjustment.max,
            ..ActorUpdate::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{AbilityScores, ClassItem};
    use crate::corruption::CorruptionResource;
    use crate::spellcasting::SpellProgression;

    fn actor() -> Actor {
        let mut d8 = ClassItem::new("Warrior", 3, "d8", SpellProgression::None).unwrap();
        d8.hit_dice_spent = 1;
        let d6 = ClassItem::new("Mystic", 1, "d6", SpellProgression::Full).unwrap();
        Actor::character("Ylva")
            .with_abilities(AbilityScores::new(10, 10, 12, 10, 10, 10))
            .with_hit_points(10, 30)
            .with_class(d8)
            .with_class(d6)
            .with_corruption(CorruptionResource::new(5, 2))
    }

    #[test]
    fn test_long_rest_preview() {
        let context = dialog_context(&actor(), RestType::Long).unwrap();
        assert_eq!(context.preview.hp, 19);
        assert_eq!(context.preview.max_hp, 30);
        assert_eq!(context.preview.temp_corruption, 1);
        assert_eq!(context.preview.total_corruption, 3);
        assert!(context.prompt_new_day);
        assert!(!context.is_short);
        assert_eq!(context.title, "Long Rest");
    }

    #[test]
    fn test_short_rest_context() {
        let context = dialog_context(&actor(), RestType::Short).unwrap();
        assert_eq!(context.preview.hp, 10);
        assert_eq!(context.preview.temp_corruption, 3);
        assert!(!context.prompt_new_day);
        assert!(context.is_short);
        assert!(context.can_roll);
        assert!(context.can_reduce_corruption);
        assert_eq!(
            context.hit_dice,
            vec![
                HitDieOption {
                    denomination: DieType::D6,
                    available: 1
                },
                HitDieOption {
                    denomination: DieType::D8,
                    available: 2
                },
            ]
        );
    }

    #[test]
    fn test_no_dice_left() {
        let mut actor = actor();
        for class in &mut actor.classes {
            class.hit_dice_spent = class.levels;
        }
        let context = dialog_context(&actor, RestType::Short).unwrap();
        assert!(!context.can_roll);
        assert!(!context.can_reduce_corruption);
        assert!(context.hit_dice.is_empty());
    }

    #[test]
    fn test_adjustment_into_update() {
        let update: ActorUpdate = CorruptionAdjustment {
            temp: Some(0),
            bonus: Some(BonusValue::Flat(2)),
            ..CorruptionAdjustment::default()
        }
        .into();
        assert_eq!(update.corruption_temp, Some(0));
        assert_eq!(update.corruption_bonus, Some(BonusValue::Flat(2)));
        assert!(update.hp_value.is_none());
    }
}
