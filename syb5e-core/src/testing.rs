//! Testing utilities.
//!
//! This module provides in-memory stand-ins for the host platform:
//! - `InMemoryHost` for documents, chat, notifications and events
//! - `FixedDice` and `SeededDice` for deterministic rolls
//! - `ScriptedRestPrompt` to drive the rest dialog
//! - Sample actors and assertion helpers

use crate::actor::{AbilityScores, Actor, ActorId, ClassItem, Item};
use crate::config::Syb5eConfig;
use crate::corruption::{CorruptionDescriptor, CorruptionResource};
use crate::dialog::{RestChoice, RestDialog, RestDialogContext};
use crate::dice::{DieType, Formula};
use crate::host::{
    ChatLog, ChatMessage, ChatMessageData, DiceService, DocumentStore, EventBus, Host, HostError,
    MessageId, ModuleEvent, Notifier, RestPrompt, UserId,
};
use crate::runtime::Syb5e;
use crate::spellcasting::SpellProgression;
use crate::update::{ActorUpdate, ItemUpdate};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

// ============================================================================
// In-memory host
// ============================================================================

/// A notification raised through [`Notifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub key: String,
    pub params: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Warn,
    Error,
}

/// Document store, chat log, notifier and event bus in one.
pub struct InMemoryHost {
    user: UserId,
    actors: RwLock<HashMap<ActorId, Actor>>,
    messages: RwLock<Vec<ChatMessage>>,
    commits: RwLock<usize>,
    notifications: Mutex<Vec<Notification>>,
    events: Mutex<Vec<ModuleEvent>>,
}

impl InMemoryHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            user: UserId::new(),
            actors: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            commits: RwLock::new(0),
            notifications: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Bundle this host with the given dice and prompt.
    pub fn host(
        self: &Arc<Self>,
        dice: Arc<dyn DiceService>,
        prompt: Arc<dyn RestPrompt>,
    ) -> Host {
        Host {
            user: self.user,
            store: self.clone(),
            chat: self.clone(),
            dice,
            notifier: self.clone(),
            events: self.clone(),
            prompt,
        }
    }

    /// Runtime with default config.
    pub fn runtime(
        self: &Arc<Self>,
        dice: Arc<dyn DiceService>,
        prompt: Arc<dyn RestPrompt>,
    ) -> Syb5e {
        Syb5e::new(Syb5eConfig::default(), self.host(dice, prompt))
    }

    pub async fn insert_actor(&self, actor: Actor) -> ActorId {
        let id = actor.id;
        self.actors.write().await.insert(id, actor);
        id
    }

    pub async fn snapshot(&self, id: ActorId) -> Option<Actor> {
        self.actors.read().await.get(&id).cloned()
    }

    /// Post a message as another user.
    pub async fn post_as(&self, author: UserId, data: ChatMessageData) -> ChatMessage {
        let message = ChatMessage {
            id: MessageId::new(),
            author,
            actor_id: data.actor_id,
            item_id: data.item_id,
            flavor: data.flavor,
            content: data.content,
            params: data.params,
            corruption: data.corruption,
        };
        self.messages.write().await.push(message.clone());
        message
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn commit_count(&self) -> usize {
        *self.commits.read().await
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<ModuleEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn notify(&self, level: NotificationLevel, key: &str, params: Value) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push(Notification {
                level,
                key: key.to_string(),
                params,
            });
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryHost {
    async fn actor(&self, id: ActorId) -> Result<Actor, HostError> {
        self.snapshot(id).await.ok_or(HostError::ActorNotFound(id))
    }

    async fn commit(
        &self,
        id: ActorId,
        update: ActorUpdate,
        items: Vec<ItemUpdate>,
    ) -> Result<(), HostError> {
        let mut actors = self.actors.write().await;
        let stored = actors.get_mut(&id).ok_or(HostError::ActorNotFound(id))?;

        // All or nothing.
        let mut next = stored.clone();
        update.apply_to(&mut next);
        for item in &items {
            item.apply_to(&mut next)?;
        }
        *stored = next;

        *self.commits.write().await += 1;
        Ok(())
    }
}

#[async_trait]
impl ChatLog for InMemoryHost {
    async fn message(&self, id: MessageId) -> Result<ChatMessage, HostError> {
        self.messages
            .read()
            .await
            .iter()
            .find(|message| message.id == id)
            .cloned()
            .ok_or(HostError::MessageNotFound(id))
    }

    async fn create_message(&self, data: ChatMessageData) -> Result<ChatMessage, HostError> {
        Ok(self.post_as(self.user, data).await)
    }

    async fn set_message_corruption(
        &self,
        id: MessageId,
        corruption: CorruptionDescriptor,
    ) -> Result<(), HostError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(HostError::MessageNotFound(id))?;
        message.corruption = Some(corruption);
        Ok(())
    }
}

impl Notifier for InMemoryHost {
    fn warn(&self, key: &str, params: Value) {
        self.notify(NotificationLevel::Warn, key, params);
    }

    fn error(&self, key: &str, params: Value) {
        self.notify(NotificationLevel::Error, key, params);
    }
}

impl EventBus for InMemoryHost {
    fn emit(&self, event: ModuleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ============================================================================
// Dice
// ============================================================================

/// Every die shows the same face. Records each expression it evaluates.
pub struct FixedDice {
    face: u32,
    rolled: Mutex<Vec<String>>,
}

impl FixedDice {
    pub fn new(face: u32) -> Arc<Self> {
        Arc::new(Self {
            face,
            rolled: Mutex::new(Vec::new()),
        })
    }

    pub fn rolled(&self) -> Vec<String> {
        self.rolled.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DiceService for FixedDice {
    async fn evaluate(&self, expression: &str) -> Result<i32, HostError> {
        if let Ok(mut rolled) = self.rolled.lock() {
            rolled.push(expression.to_string());
        }
        let face = self.face;
        Ok(Formula::parse(expression)?
            .roll_with(|_| face)?
            .integer_total())
    }
}

/// Seeded random dice.
pub struct SeededDice {
    rng: Mutex<StdRng>,
}

impl SeededDice {
    pub fn new(seed: u64) -> Arc<Self> {
        Arc::new(Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }
}

#[async_trait]
impl DiceService for SeededDice {
    async fn evaluate(&self, expression: &str) -> Result<i32, HostError> {
        let formula = Formula::parse(expression)?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| HostError::Dialog("dice lock poisoned".to_string()))?;
        Ok(formula.roll_with_rng(&mut *rng)?.integer_total())
    }
}

// ============================================================================
// Rest prompt
// ============================================================================

/// A button press in the rest dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogStep {
    RollHitDie(Option<DieType>),
    ReduceCorruption(Option<DieType>),
}

/// Presses the scripted buttons, then answers with `choice`.
pub struct ScriptedRestPrompt {
    steps: Vec<DialogStep>,
    choice: RestChoice,
    contexts: Mutex<Vec<RestDialogContext>>,
}

impl ScriptedRestPrompt {
    pub fn new(choice: RestChoice) -> Arc<Self> {
        Self::with_steps(Vec::new(), choice)
    }

    pub fn with_steps(steps: Vec<DialogStep>, choice: RestChoice) -> Arc<Self> {
        Arc::new(Self {
            steps,
            choice,
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn confirm_new_day() -> Arc<Self> {
        Self::new(RestChoice::Confirm { new_day: true })
    }

    /// Dialog contexts seen, one per step plus the final one.
    pub fn contexts(&self) -> Vec<RestDialogContext> {
        self.contexts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, context: RestDialogContext) {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context);
        }
    }
}

#[async_trait]
impl RestPrompt for ScriptedRestPrompt {
    async fn confirm(&self, dialog: &mut RestDialog<'_>) -> Result<RestChoice, HostError> {
        let failed = |e: crate::error::Syb5eError| HostError::Dialog(e.to_string());

        for step in &self.steps {
            self.record(dialog.context().await.map_err(failed)?);
            let (denomination, heal_corruption) = match *step {
                DialogStep::RollHitDie(denomination) => (denomination, false),
                DialogStep::ReduceCorruption(denomination) => (denomination, true),
            };
            if let Some(denomination) = denomination {
                dialog.select_hit_die(denomination);
            }
            if heal_corruption {
                dialog.reduce_corruption().await.map_err(failed)?;
            } else {
                dialog.roll_hit_die().await.map_err(failed)?;
            }
        }

        self.record(dialog.context().await.map_err(failed)?);
        Ok(self.choice)
    }
}

// ============================================================================
// Sample actors
// ============================================================================

/// Level 3 warrior: prof 2, CON 12, d8 hit dice (2 spent), 10/30 hp,
/// 5 temporary and 1 permanent corruption.
pub fn sample_warrior(name: &str) -> Actor {
    let mut class = ClassItem::new("Warrior", 3, "d8", SpellProgression::None)
        .expect("d8 is a valid denomination");
    class.hit_dice_spent = 2;
    Actor::character(name)
        .with_abilities(AbilityScores::new(16, 12, 12, 10, 10, 10))
        .with_proficiency(2)
        .with_hit_points(10, 30)
        .with_class(class)
        .with_corruption(CorruptionResource::new(5, 1))
}

/// Level 5 mystic, a full caster with CHA 14 and two spells.
pub fn sample_mystic(name: &str) -> Actor {
    let class = ClassItem::new("Mystic", 5, "d6", SpellProgression::Full)
        .expect("d6 is a valid denomination");
    Actor::character(name)
        .with_abilities(AbilityScores::new(8, 12, 12, 12, 10, 14))
        .with_proficiency(3)
        .with_hit_points(28, 28)
        .with_class(class)
        .with_item(Item::spell("Witch Hammer", 2))
        .with_item(Item::spell("Anathema", 0).favored())
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert current and effective maximum hit points.
#[track_caller]
pub fn assert_hp(actor: &Actor, current: i32, max: i32) {
    let actual = (actor.hit_points.current, actor.hit_points.effective_max());
    assert_eq!(
        actual,
        (current, max),
        "Expected HP {current}/{max}, got {}/{}",
        actual.0,
        actual.1
    );
}

/// Assert temporary and permanent corruption.
#[track_caller]
pub fn assert_corruption(actor: &Actor, temp: i32, permanent: i32) {
    let actual = (actor.corruption.temp, actor.corruption.permanent);
    assert_eq!(
        actual,
        (temp, permanent),
        "Expected corruption {temp}+{permanent}, got {}+{}",
        actual.0,
        actual.1
    );
}

#[track_caller]
pub fn assert_hit_dice_remaining(actor: &Actor, expected: u32) {
    let actual = actor.hit_dice_remaining();
    assert_eq!(
        actual, expected,
        "Expected {expected} hit dice remaining, got {actual}"
    );
}
