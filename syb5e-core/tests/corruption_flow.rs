//! Corruption flow tests against the in-memory host.
//!
//! These tests verify:
//! - Casting a spell posts its cost and the author's client applies it once
//! - Other users' chat records are left alone
//! - Soulless hit point mirroring on direct updates
//! - Favored toggling, currency conversion and derived data hooks
//!
//! Run with: `cargo test -p syb5e-core --test corruption_flow`

use std::sync::Arc;

use serde_json::json;
use syb5e_core::config::ModuleSettings;
use syb5e_core::corruption::CorruptionTarget;
use syb5e_core::currency::Currency;
use syb5e_core::dialog::CorruptionAdjustment;
use syb5e_core::host::{ChatMessageData, LocalDice, ModuleEvent, UserId};
use syb5e_core::testing::{
    assert_corruption, assert_hp, sample_mystic, sample_warrior, FixedDice, InMemoryHost,
    ScriptedRestPrompt,
};
use syb5e_core::update::ActorUpdate;
use syb5e_core::usage::{ChatRender, UsageConfig};
use syb5e_core::{CorruptionDescriptor, Syb5e, Syb5eConfig};

// =============================================================================
// CASTING
// =============================================================================

#[tokio::test]
async fn test_cast_applies_corruption_once() {
    let store = InMemoryHost::new();
    let mystic = sample_mystic("Ylva");
    let spell_id = mystic.items[0].id;
    let id = store.insert_actor(mystic).await;
    let runtime = store.runtime(FixedDice::new(3), ScriptedRestPrompt::confirm_new_day());

    let mut usage = UsageConfig {
        consume_corruption: false,
        consume_spell_slot: true,
    };
    runtime.prepare_usage(id, spell_id, &mut usage).await.unwrap();
    assert!(usage.consume_corruption);
    assert!(!usage.consume_spell_slot);

    let card = ChatMessageData::new(id, "Witch Hammer", "SYB5E.Usage.Cast");
    let message = runtime
        .record_usage(id, spell_id, &usage, None, card)
        .await
        .unwrap();
    let pending = message.corruption.clone().unwrap();
    assert_eq!(pending.expression, "1d4 + 2");
    assert!(!pending.is_resolved());

    // 1d4 shows 3, plus 2
    let first = runtime.on_render_chat_message(message.id).await.unwrap();
    let ChatRender::Applied(card) = &first else {
        panic!("expected the cost to be applied, got {first:?}");
    };
    assert_eq!(card.total, 5);
    assert_eq!(card.header, "SYB5E.Corruption.TempDamage");

    let second = runtime.on_render_chat_message(message.id).await.unwrap();
    assert!(matches!(second, ChatRender::Card(ref card) if card.total == 5));

    let actor = store.snapshot(id).await.unwrap();
    assert_corruption(&actor, 5, 0);
    assert_eq!(
        actor.items[0].last_corruption,
        Some(CorruptionDescriptor::new("1d4 + 2", CorruptionTarget::Temp).resolved(5))
    );
    assert_eq!(
        store.events(),
        vec![ModuleEvent::CorruptionApplied {
            actor_id: id,
            item_id: spell_id,
            target: CorruptionTarget::Temp,
            total: 5,
        }]
    );
}

#[tokio::test]
async fn test_upcast_and_favored_costs() {
    let store = InMemoryHost::new();
    let mystic = sample_mystic("Ylva");
    let spell_id = mystic.items[0].id;
    let cantrip_id = mystic.items[1].id;
    let id = store.insert_actor(mystic).await;
    let runtime = store.runtime(FixedDice::new(1), ScriptedRestPrompt::confirm_new_day());

    let usage = UsageConfig {
        consume_corruption: true,
        consume_spell_slot: false,
    };
    let card = ChatMessageData::new(id, "Witch Hammer", "SYB5E.Usage.Cast");
    let message = runtime
        .record_usage(id, spell_id, &usage, Some(3), card)
        .await
        .unwrap();
    assert_eq!(message.corruption.unwrap().expression, "1d4 + 3");

    let mut usage = UsageConfig::default();
    runtime.prepare_usage(id, cantrip_id, &mut usage).await.unwrap();
    assert!(!usage.consume_corruption);

    let card = ChatMessageData::new(id, "Anathema", "SYB5E.Usage.Cast");
    let message = runtime
        .record_usage(id, cantrip_id, &usage, None, card)
        .await
        .unwrap();
    assert!(message.corruption.is_none());
    assert_eq!(
        runtime.on_render_chat_message(message.id).await.unwrap(),
        ChatRender::Nothing
    );
}

#[tokio::test]
async fn test_other_users_message_is_ignored() {
    let store = InMemoryHost::new();
    let mystic = sample_mystic("Ylva");
    let spell_id = mystic.items[0].id;
    let id = store.insert_actor(mystic).await;
    let runtime = store.runtime(FixedDice::new(4), ScriptedRestPrompt::confirm_new_day());

    let data = ChatMessageData::new(id, "Witch Hammer", "SYB5E.Usage.Cast")
        .with_item(spell_id)
        .with_corruption(CorruptionDescriptor::new("1d4 + 2", CorruptionTarget::Temp));
    let message = store.post_as(UserId::new(), data).await;

    assert_eq!(
        runtime.on_render_chat_message(message.id).await.unwrap(),
        ChatRender::Nothing
    );
    let actor = store.snapshot(id).await.unwrap();
    assert_corruption(&actor, 0, 0);
    assert_eq!(store.commit_count().await, 0);
}

// =============================================================================
// ACTOR UPDATES
// =============================================================================

#[tokio::test]
async fn test_soulless_update_mirrors_hit_points() {
    let store = InMemoryHost::new();
    let mut warrior = sample_warrior("Hollow").soulless();
    warrior.hit_points.current = 24;
    warrior.hit_points.temp_max = -6;
    let id = store.insert_actor(warrior).await;
    let runtime = store.runtime(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day());

    let committed = runtime
        .update_actor(
            id,
            ActorUpdate::new().with_corruption(CorruptionTarget::Permanent, 4),
            Vec::new(),
        )
        .await
        .unwrap();
    assert_eq!(committed.hp_temp_max, Some(-9));
    assert_eq!(committed.hp_value, Some(21));

    let actor = store.snapshot(id).await.unwrap();
    assert_corruption(&actor, 5, 4);
    assert_hp(&actor, 21, 21);
}

#[tokio::test]
async fn test_adjust_corruption_clamps_at_zero() {
    let store = InMemoryHost::new();
    let id = store.insert_actor(sample_warrior("Ylva")).await;
    let runtime = store.runtime(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day());

    runtime
        .adjust_corruption(
            id,
            CorruptionAdjustment {
                temp: Some(-3),
                permanent: Some(2),
                ..CorruptionAdjustment::default()
            },
        )
        .await
        .unwrap();

    let actor = store.snapshot(id).await.unwrap();
    assert_corruption(&actor, 0, 2);
}

#[tokio::test]
async fn test_toggle_favored() {
    let store = InMemoryHost::new();
    let mystic = sample_mystic("Ylva");
    let spell_id = mystic.items[0].id;
    let id = store.insert_actor(mystic).await;
    let runtime = store.runtime(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day());

    assert!(runtime.toggle_favored(id, spell_id).await.unwrap());
    assert!(store.snapshot(id).await.unwrap().items[0].is_favored());
    assert!(!runtime.toggle_favored(id, spell_id).await.unwrap());
    assert!(!store.snapshot(id).await.unwrap().items[0].is_favored());
}

// =============================================================================
// CURRENCY
// =============================================================================

#[tokio::test]
async fn test_convert_currency() {
    let store = InMemoryHost::new();
    let mut warrior = sample_warrior("Ylva");
    warrior.currency = Currency::new(25, 13, 1);
    let id = store.insert_actor(warrior).await;
    let runtime = store.runtime(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day());

    let converted = runtime.convert_currency(id).await.unwrap();
    assert_eq!(converted, Some(Currency::new(5, 5, 2)));
    assert_eq!(
        store.snapshot(id).await.unwrap().currency,
        Currency::new(5, 5, 2)
    );
}

#[tokio::test]
async fn test_convert_currency_disabled() {
    let store = InMemoryHost::new();
    let id = store.insert_actor(sample_warrior("Ylva")).await;
    let config = Syb5eConfig::new().with_settings(ModuleSettings {
        use_symbaroum_currency: false,
        ..ModuleSettings::default()
    });
    let runtime = Syb5e::new(
        config,
        store.host(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day()),
    );

    assert_eq!(runtime.convert_currency(id).await.unwrap(), None);
    assert_eq!(store.commit_count().await, 0);
}

// =============================================================================
// DERIVED DATA
// =============================================================================

#[tokio::test]
async fn test_derived_data_and_roll_data() {
    let store = InMemoryHost::new();
    let runtime = store.runtime(Arc::new(LocalDice), ScriptedRestPrompt::confirm_new_day());
    let mut mystic = sample_mystic("Ylva");

    runtime
        .prepare_derived_data(&mut mystic, |_| Ok(()))
        .unwrap();
    assert_eq!(mystic.spell_slots.max_level, 3);

    let data = runtime
        .roll_data(&mystic, json!({ "attributes": { "hp": 28 } }))
        .unwrap();
    assert_eq!(data["attributes"]["hp"], 28);
    assert_eq!(data["attributes"]["corruption"]["max"], 10);
    assert_eq!(runtime.corruption(&mystic).unwrap().max, 10);
}
