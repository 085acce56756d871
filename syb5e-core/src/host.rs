//! Host platform boundary.
//!
//! The host owns documents, chat, dice, notifications and dialogs. This
//! crate only talks to it through the traits below; [`crate::testing`]
//! has in-memory versions of each.

use crate::actor::{Actor, ActorError, ActorId, ItemId};
use crate::corruption::{CorruptionDescriptor, CorruptionTarget};
use crate::dialog::{RestChoice, RestDialog};
use crate::dice::{self, DiceError};
use crate::resting::{RestDeltas, RestType};
use crate::update::{ActorUpdate, ItemUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by the host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("Actor {0} not found")]
    ActorNotFound(ActorId),

    #[error("Chat message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Update rejected: {0}")]
    UpdateRejected(#[from] ActorError),

    #[error("Dice evaluation failed: {0}")]
    Dice(#[from] DiceError),

    #[error("Dialog failed: {0}")]
    Dialog(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Chat
// ============================================================================

/// A stored chat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: UserId,
    pub actor_id: Option<ActorId>,
    pub item_id: Option<ItemId>,
    pub flavor: String,
    /// Translation key of the body.
    pub content: String,
    pub params: Value,
    pub corruption: Option<CorruptionDescriptor>,
}

/// What this crate asks the host to post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageData {
    pub actor_id: Option<ActorId>,
    pub item_id: Option<ItemId>,
    pub flavor: String,
    pub content: String,
    pub params: Value,
    pub corruption: Option<CorruptionDescriptor>,
}

impl ChatMessageData {
    pub fn new(actor_id: ActorId, flavor: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id),
            item_id: None,
            flavor: flavor.into(),
            content: content.into(),
            params: Value::Null,
            corruption: None,
        }
    }

    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_corruption(mut self, corruption: CorruptionDescriptor) -> Self {
        self.corruption = Some(corruption);
        self
    }
}

/// Notifications other modules can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ModuleEvent {
    RestCompleted {
        actor_id: ActorId,
        rest_type: RestType,
        deltas: RestDeltas,
        new_day: bool,
    },
    CorruptionApplied {
        actor_id: ActorId,
        item_id: ItemId,
        target: CorruptionTarget,
        total: i32,
    },
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn actor(&self, id: ActorId) -> Result<Actor, HostError>;

    /// Apply an actor patch and its item patches as one transaction.
    async fn commit(
        &self,
        id: ActorId,
        update: ActorUpdate,
        items: Vec<ItemUpdate>,
    ) -> Result<(), HostError>;
}

#[async_trait]
pub trait ChatLog: Send + Sync {
    async fn message(&self, id: MessageId) -> Result<ChatMessage, HostError>;

    async fn create_message(&self, data: ChatMessageData) -> Result<ChatMessage, HostError>;

    async fn set_message_corruption(
        &self,
        id: MessageId,
        corruption: CorruptionDescriptor,
    ) -> Result<(), HostError>;
}

#[async_trait]
pub trait DiceService: Send + Sync {
    /// Roll `expression` and return its whole-number total.
    async fn evaluate(&self, expression: &str) -> Result<i32, HostError>;
}

/// User-visible notifications. `key` is a translation key.
pub trait Notifier: Send + Sync {
    fn warn(&self, key: &str, params: Value);
    fn error(&self, key: &str, params: Value);
}

pub trait EventBus: Send + Sync {
    fn emit(&self, event: ModuleEvent);
}

/// Shows the rest dialog and waits for the user.
#[async_trait]
pub trait RestPrompt: Send + Sync {
    async fn confirm(&self, dialog: &mut RestDialog<'_>) -> Result<RestChoice, HostError>;
}

/// Everything the runtime needs from the host.
#[derive(Clone)]
pub struct Host {
    /// The local user; only their own chat records are reconciled.
    pub user: UserId,
    pub store: Arc<dyn DocumentStore>,
    pub chat: Arc<dyn ChatLog>,
    pub dice: Arc<dyn DiceService>,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<dyn EventBus>,
    pub prompt: Arc<dyn RestPrompt>,
}

/// Dice service backed by this crate's formula roller.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDice;

#[async_trait]
impl DiceService for LocalDice {
    async fn evaluate(&self, expression: &str) -> Result<i32, HostError> {
        roll_total(expression)
    }
}

fn roll_total(expression: &str) -> Result<i32, HostError> {
    Ok(dice::roll(expression)?.integer_total())
}
