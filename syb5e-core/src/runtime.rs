//! The module runtime.
//!
//! [`Syb5e`] is built once at startup from a [`Syb5eConfig`] and a [`Host`]
//! and answers the host's lifecycle callbacks. Every actor update it makes
//! goes through the pre-update pipeline, so the soulless rule sees all of
//! them.

use crate::actor::{Actor, ActorError, ActorId, ItemId, ItemKind};
use crate::config::Syb5eConfig;
use crate::corruption::{self, Corruption};
use crate::currency::{consolidate, Currency};
use crate::dialog::{CorruptionAdjustment, RestChoice, RestDialog};
use crate::dice::DieType;
use crate::error::Syb5eError;
use crate::host::{ChatMessage, ChatMessageData, Host, MessageId, ModuleEvent};
use crate::pipeline::{PendingUpdate, Pipeline, RollData, RollDataStage, Stage};
use crate::resting::{
    corruption_heal_update, hit_die_heal, resolve_rest, rest_message, spend_hit_die, RestDeltas,
    RestResult, RestType,
};
use crate::soulless::SoullessStage;
use crate::spellcasting::SpellProgressionStage;
use crate::update::{ActorUpdate, ItemUpdate};
use crate::usage::{
    corruption_gain, reconciliation, swap_consumption, usage_updates, ChatRender, CorruptionCard,
    Reconciliation, UsageConfig,
};
use serde_json::{json, Value};

/// Options for a rest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestOptions {
    /// Show the confirmation dialog.
    pub dialog: bool,
    /// Post the summary to chat.
    pub chat: bool,
    /// Used when no dialog is shown. Short rests never start a new day.
    pub new_day: bool,
}

impl RestOptions {
    pub fn new() -> Self {
        Self {
            dialog: true,
            chat: true,
            new_day: true,
        }
    }

    pub fn without_dialog(mut self) -> Self {
        self.dialog = false;
        self
    }

    pub fn without_chat(mut self) -> Self {
        self.chat = false;
        self
    }

    pub fn with_new_day(mut self, new_day: bool) -> Self {
        self.new_day = new_day;
        self
    }
}

impl Default for RestOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestOutcome {
    /// Not a ruleset actor; the host should run its own rest.
    PassThrough,
    /// Not a ruleset actor and the host has no equivalent.
    NotApplicable,
    /// The user closed the dialog. Nothing was committed by the rest.
    Cancelled,
    Completed(RestResult),
}

pub struct Syb5e {
    config: Syb5eConfig,
    host: Host,
    pre_update: Pipeline<PendingUpdate>,
    derived_data: Pipeline<Actor>,
    roll_data: Pipeline<RollData>,
}

impl Syb5e {
    pub fn new(config: Syb5eConfig, host: Host) -> Self {
        let mut runtime = Self {
            config,
            host,
            pre_update: Pipeline::new("actor pre-update"),
            derived_data: Pipeline::new("derived data"),
            roll_data: Pipeline::new("roll data"),
        };

        tracing::info!("Registering Symbaroum 5e rules");
        runtime.pre_update.register(SoullessStage);
        runtime.derived_data.register(SpellProgressionStage);
        runtime.roll_data.register(RollDataStage);
        runtime
    }

    pub fn config(&self) -> &Syb5eConfig {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Add a stage that sees every pending actor update.
    pub fn register_update_stage(&mut self, stage: impl Stage<PendingUpdate> + 'static) {
        self.pre_update.register(stage);
    }

    // ========================================================================
    // Derived data
    // ========================================================================

    /// Wrap the host's derived data preparation.
    pub fn prepare_derived_data(
        &self,
        actor: &mut Actor,
        base: impl FnOnce(&mut Actor) -> Result<(), Syb5eError>,
    ) -> Result<(), Syb5eError> {
        self.derived_data.run(actor, base)
    }

    /// Roll data for `actor`, starting from the host's own.
    pub fn roll_data(&self, actor: &Actor, base: Value) -> Result<Value, Syb5eError> {
        let mut payload = RollData {
            actor: actor.clone(),
            data: base,
        };
        self.roll_data.run(&mut payload, |_| Ok(()))?;
        Ok(payload.data)
    }

    pub fn corruption(&self, actor: &Actor) -> Result<Corruption, Syb5eError> {
        Ok(corruption::corruption(actor)?)
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Commit an update through the pre-update pipeline. Returns the patch
    /// as committed.
    pub async fn update_actor(
        &self,
        actor_id: ActorId,
        update: ActorUpdate,
        items: Vec<ItemUpdate>,
    ) -> Result<ActorUpdate, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        self.commit(actor, update, items).await
    }

    async fn commit(
        &self,
        actor: Actor,
        update: ActorUpdate,
        items: Vec<ItemUpdate>,
    ) -> Result<ActorUpdate, Syb5eError> {
        let mut pending = PendingUpdate { actor, update };
        self.pre_update.run(&mut pending, |_| Ok(()))?;
        self.host
            .store
            .commit(pending.actor.id, pending.update.clone(), items)
            .await?;
        Ok(pending.update)
    }

    pub async fn adjust_corruption(
        &self,
        actor_id: ActorId,
        adjustment: CorruptionAdjustment,
    ) -> Result<ActorUpdate, Syb5eError> {
        self.update_actor(actor_id, adjustment.into(), Vec::new())
            .await
    }

    /// Flip a spell's favored flag. Returns the new value.
    pub async fn toggle_favored(&self, actor_id: ActorId, item_id: ItemId) -> Result<bool, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        let item = actor.item(item_id)?;
        let favored = match item.kind {
            ItemKind::Spell { favored, .. } => !favored,
            ItemKind::Other => return Err(ActorError::NotASpell(item_id).into()),
        };

        let update = ItemUpdate {
            favored: Some(favored),
            ..ItemUpdate::new(item_id)
        };
        self.host
            .store
            .commit(actor_id, ActorUpdate::new(), vec![update])
            .await?;
        Ok(favored)
    }

    /// Carry coins upward. `None` when the actor or the setting does not
    /// use the Symbaroum purse.
    pub async fn convert_currency(&self, actor_id: ActorId) -> Result<Option<Currency>, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        if !actor.is_syb_actor() {
            tracing::error!("{} is not a Symbaroum actor", actor.name);
            return Ok(None);
        }
        if !self.config.settings.use_symbaroum_currency {
            return Ok(None);
        }

        let converted = consolidate(&actor.currency, &self.config.currency_conversion);
        let update = ActorUpdate {
            currency: Some(converted),
            ..ActorUpdate::default()
        };
        self.commit(actor, update, Vec::new()).await?;
        Ok(Some(converted))
    }

    // ========================================================================
    // Hit dice
    // ========================================================================

    /// Spend a hit die to heal. Warns and returns false when none is left.
    pub async fn roll_hit_die(
        &self,
        actor_id: ActorId,
        denomination: Option<DieType>,
    ) -> Result<bool, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        let Some((class_update, die)) = spend_hit_die(&actor, denomination) else {
            self.warn_no_hit_dice(&actor, denomination);
            return Ok(false);
        };

        let roll = self.host.dice.evaluate(&format!("1{die}")).await?;
        let hp = hit_die_heal(&actor, roll);
        self.commit(actor, ActorUpdate::new().with_hp(hp), vec![class_update])
            .await?;
        Ok(true)
    }

    /// Spend a hit die to shed a proficiency bonus of temporary corruption.
    pub async fn heal_corruption_with_hit_die(
        &self,
        actor_id: ActorId,
        denomination: Option<DieType>,
    ) -> Result<bool, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        if actor.corruption.temp <= 0 {
            tracing::debug!("{} has no temporary corruption to heal", actor.name);
            return Ok(false);
        }
        let Some((class_update, _)) = spend_hit_die(&actor, denomination) else {
            self.warn_no_hit_dice(&actor, denomination);
            return Ok(false);
        };

        let mut update = ActorUpdate::new();
        corruption_heal_update(&actor.corruption, actor.proficiency, &mut update);
        self.commit(actor, update, vec![class_update]).await?;
        Ok(true)
    }

    fn warn_no_hit_dice(&self, actor: &Actor, denomination: Option<DieType>) {
        let formula = denomination.map(|d| d.to_string()).unwrap_or_default();
        self.host.notifier.warn(
            "DND5E.HitDiceWarn",
            json!({ "name": actor.name, "formula": formula }),
        );
    }

    // ========================================================================
    // Resting
    // ========================================================================

    pub async fn short_rest(
        &self,
        actor_id: ActorId,
        options: RestOptions,
    ) -> Result<RestOutcome, Syb5eError> {
        self.rest(actor_id, RestType::Short, options).await
    }

    pub async fn long_rest(
        &self,
        actor_id: ActorId,
        options: RestOptions,
    ) -> Result<RestOutcome, Syb5eError> {
        self.rest(actor_id, RestType::Long, options).await
    }

    pub async fn extended_rest(
        &self,
        actor_id: ActorId,
        options: RestOptions,
    ) -> Result<RestOutcome, Syb5eError> {
        self.rest(actor_id, RestType::Extended, options).await
    }

    async fn rest(
        &self,
        actor_id: ActorId,
        rest_type: RestType,
        options: RestOptions,
    ) -> Result<RestOutcome, Syb5eError> {
        let initial = self.host.store.actor(actor_id).await?;
        if !initial.is_syb_actor() {
            return Ok(match rest_type {
                RestType::Extended => RestOutcome::NotApplicable,
                RestType::Short | RestType::Long => RestOutcome::PassThrough,
            });
        }

        let new_day = if options.dialog {
            let mut dialog = RestDialog::new(self, actor_id, rest_type);
            match self.host.prompt.confirm(&mut dialog).await? {
                RestChoice::Confirm { new_day } => new_day,
                RestChoice::Cancel => {
                    tracing::debug!("Rest dialog cancelled");
                    return Ok(RestOutcome::Cancelled);
                }
            }
        } else {
            options.new_day
        };
        let new_day = new_day && rest_type != RestType::Short;

        // The dialog may have spent hit dice; rest from the current state.
        let actor = if options.dialog {
            self.host.store.actor(actor_id).await?
        } else {
            initial.clone()
        };

        let mut result = resolve_rest(&actor, rest_type, new_day)?;
        result.dialog_deltas = RestDeltas::between(&initial, &actor);

        let name = actor.name.clone();
        result.actor_update = self
            .commit(actor, result.actor_update.clone(), result.item_updates.clone())
            .await?;

        let deltas = result.total_deltas();
        if options.chat {
            let message = rest_message(&name, rest_type, new_day, &deltas);
            let params = json!({
                "name": message.name,
                "dhd": message.dhd,
                "dhp": message.dhp,
                "dco": message.dco,
            });
            self.host
                .chat
                .create_message(
                    ChatMessageData::new(actor_id, message.flavor, message.content)
                        .with_params(params),
                )
                .await?;
        }

        self.host.events.emit(ModuleEvent::RestCompleted {
            actor_id,
            rest_type,
            deltas,
            new_day,
        });
        Ok(RestOutcome::Completed(result))
    }

    // ========================================================================
    // Item usage
    // ========================================================================

    /// Pre-consumption: trade spell slots for corruption.
    pub async fn prepare_usage(
        &self,
        actor_id: ActorId,
        item_id: ItemId,
        usage: &mut UsageConfig,
    ) -> Result<(), Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        swap_consumption(&actor, actor.item(item_id)?, usage);
        Ok(())
    }

    /// Consumption: store the cost on the item and post the usage card
    /// with the cost attached.
    pub async fn record_usage(
        &self,
        actor_id: ActorId,
        item_id: ItemId,
        usage: &UsageConfig,
        cast_level: Option<u8>,
        card: ChatMessageData,
    ) -> Result<ChatMessage, Syb5eError> {
        let actor = self.host.store.actor(actor_id).await?;
        let updates = usage_updates(actor.item(item_id)?, usage, cast_level);

        self.host
            .store
            .commit(actor_id, ActorUpdate::new(), vec![updates.item_update])
            .await?;

        let mut card = card.with_item(item_id);
        card.actor_id = Some(actor_id);
        card.corruption = updates.corruption;
        Ok(self.host.chat.create_message(card).await?)
    }

    /// Chat render: roll a pending cost once, or show the rolled one.
    pub async fn on_render_chat_message(&self, message_id: MessageId) -> Result<ChatRender, Syb5eError> {
        let message = self.host.chat.message(message_id).await?;
        let descriptor = match reconciliation(&message, self.host.user) {
            Reconciliation::Ignore => return Ok(ChatRender::Nothing),
            Reconciliation::Render(card) => return Ok(ChatRender::Card(card)),
            Reconciliation::Resolve(descriptor) => descriptor,
        };

        let (Some(actor_id), Some(item_id)) = (message.actor_id, message.item_id) else {
            tracing::warn!("Corruption on message {} has no item", message_id);
            return Ok(ChatRender::Nothing);
        };

        let gained = self
            .host
            .dice
            .evaluate(&format!("ceil({})", descriptor.expression))
            .await?;
        let actor = self.host.store.actor(actor_id).await?;
        let resolved = descriptor.resolved(gained);

        let update = corruption_gain(&actor, descriptor.target, gained).unwrap_or_default();
        let item_update = ItemUpdate::last_corruption(item_id, Some(resolved.clone()));
        self.commit(actor, update, vec![item_update]).await?;
        self.host
            .chat
            .set_message_corruption(message_id, resolved.clone())
            .await?;

        tracing::info!(
            "Applied {} {:?} corruption from '{}'",
            gained,
            descriptor.target,
            descriptor.expression
        );
        self.host.events.emit(ModuleEvent::CorruptionApplied {
            actor_id,
            item_id,
            target: descriptor.target,
            total: gained,
        });

        match CorruptionCard::for_descriptor(&resolved) {
            Some(card) => Ok(ChatRender::Applied(card)),
            None => Ok(ChatRender::Nothing),
        }
    }
}
