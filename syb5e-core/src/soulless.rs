//! The soulless trait: corruption eats into maximum hit points.

use crate::actor::Actor;
use crate::error::Syb5eError;
use crate::pipeline::{PendingUpdate, Stage};
use crate::update::ActorUpdate;

/// Fold the hit point side of a corruption change into `update`.
///
/// Every point of corruption gained lowers the max hp modifier by one (and
/// every point healed raises it). Current hp is capped at the new maximum
/// but never raised. Returns whether the patch was changed.
pub fn mirror(actor: &Actor, update: &mut ActorUpdate) -> bool {
    if !actor.flags.soulless || !update.touches_corruption() {
        return false;
    }

    let current = &actor.corruption;
    let new_temp = update.corruption_temp.unwrap_or(current.temp).max(0);
    let new_permanent = update
        .corruption_permanent
        .unwrap_or(current.permanent)
        .max(0);
    let gained = (new_temp - current.temp) + (new_permanent - current.permanent);

    tracing::debug!(
        actor = %actor.name,
        temp = current.temp,
        permanent = current.permanent,
        gained,
        "Mirroring corruption onto hit points"
    );

    let hp = &actor.hit_points;
    let temp_max = update.hp_temp_max.unwrap_or(hp.temp_max) - gained;
    let value = update
        .hp_value
        .unwrap_or(hp.current)
        .min(hp.maximum + temp_max)
        .max(0);

    update.hp_temp_max = Some(temp_max);
    update.hp_value = Some(value);

    tracing::debug!(hp = value, temp_max, "Soulless hit point patch");
    true
}

/// Applies [`mirror`] to every pending update of a ruleset actor.
pub struct SoullessStage;

impl Stage<PendingUpdate> for SoullessStage {
    fn name(&self) -> &str {
        "soulless"
    }

    fn before(&self, pending: &mut PendingUpdate) -> Result<(), Syb5eError> {
        let PendingUpdate { actor, update } = pending;
        if actor.is_syb_actor() {
            mirror(actor, update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corruption::{CorruptionResource, CorruptionTarget};

    fn soulless(current: i32, maximum: i32) -> Actor {
        Actor::character("Hollow")
            .with_hit_points(current, maximum)
            .with_corruption(CorruptionResource::new(2, 1))
            .soulless()
    }

    #[test]
    fn test_gain_lowers_max_and_caps_current() {
        let actor = soulless(20, 20);
        let mut update = ActorUpdate::new().with_corruption(CorruptionTarget::Temp, 5);

        assert!(mirror(&actor, &mut update));
        assert_eq!(update.hp_temp_max, Some(-3));
        assert_eq!(update.hp_value, Some(17));
    }

    #[test]
    fn test_gain_does_not_raise_current() {
        let actor = soulless(8, 20);
        let mut update = ActorUpdate::new().with_corruption(CorruptionTarget::Permanent, 3);

        mirror(&actor, &mut update);
        assert_eq!(update.hp_temp_max, Some(-2));
        assert_eq!(update.hp_value, Some(8));
    }

    #[test]
    fn test_heal_restores_max() {
        let mut actor = soulless(15, 20);
        actor.hit_points.temp_max = -3;
        let mut update = ActorUpdate::new().with_corruption(CorruptionTarget::Temp, 0);

        mirror(&actor, &mut update);
        assert_eq!(update.hp_temp_max, Some(-1));
        // healing corruption never heals hit points
        assert_eq!(update.hp_value, Some(15));
    }

    #[test]
    fn test_combines_with_hp_in_same_patch() {
        let actor = soulless(10, 20);
        let mut update = ActorUpdate::new()
            .with_hp(20)
            .with_corruption(CorruptionTarget::Temp, 6);

        mirror(&actor, &mut update);
        assert_eq!(update.hp_temp_max, Some(-4));
        assert_eq!(update.hp_value, Some(16));
    }

    #[test]
    fn test_no_op_without_flag_or_corruption() {
        let actor = soulless(10, 20);
        let mut update = ActorUpdate::new().with_hp(12);
        assert!(!mirror(&actor, &mut update));
        assert_eq!(update.hp_temp_max, None);

        let plain = Actor::character("Ylva");
        let mut update = ActorUpdate::new().with_corruption(CorruptionTarget::Temp, 9);
        assert!(!mirror(&plain, &mut update));
        assert_eq!(update.hp_value, None);
    }

    #[test]
    fn test_stage_mirrors_pending_update() {
        let mut pending = PendingUpdate {
            actor: soulless(20, 20),
            update: ActorUpdate::new().with_corruption(CorruptionTarget::Temp, 4),
        };
        SoullessStage.before(&mut pending).unwrap();
        assert_eq!(pending.update.hp_temp_max, Some(-2));
    }
}
