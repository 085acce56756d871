//! Named stages wrapped around a host operation.
//!
//! A [`Pipeline`] runs every stage's `before` in registration order, then
//! the base operation, then every `after` in reverse order.

use crate::actor::Actor;
use crate::corruption;
use crate::error::Syb5eError;
use crate::update::ActorUpdate;
use serde_json::{json, Value};

pub trait Stage<T>: Send + Sync {
    fn name(&self) -> &str;

    fn before(&self, _payload: &mut T) -> Result<(), Syb5eError> {
        Ok(())
    }

    fn after(&self, _payload: &mut T) -> Result<(), Syb5eError> {
        Ok(())
    }
}

pub struct Pipeline<T> {
    name: &'static str,
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T> Pipeline<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
    }

    pub fn register(&mut self, stage: impl Stage<T> + 'static) {
        tracing::debug!("Registering stage '{}' on {}", stage.name(), self.name);
        self.stages.push(Box::new(stage));
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run the stages around `base`. The first failing hook aborts the run.
    pub fn run<R>(
        &self,
        payload: &mut T,
        base: impl FnOnce(&mut T) -> Result<R, Syb5eError>,
    ) -> Result<R, Syb5eError> {
        for stage in &self.stages {
            stage.before(payload)?;
        }
        let output = base(payload)?;
        for stage in self.stages.iter().rev() {
            stage.after(payload)?;
        }
        Ok(output)
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// An actor update that has not been committed yet.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub actor: Actor,
    pub update: ActorUpdate,
}

/// Roll data handed to the host's dice engine.
#[derive(Debug, Clone)]
pub struct RollData {
    pub actor: Actor,
    pub data: Value,
}

/// Exposes corruption, shadow and manner to roll formulas.
pub struct RollDataStage;

impl Stage<RollData> for RollDataStage {
    fn name(&self) -> &str {
        "roll-data"
    }

    fn after(&self, payload: &mut RollData) -> Result<(), Syb5eError> {
        if !payload.actor.is_syb_actor() {
            return Ok(());
        }

        let corruption = serde_json::to_value(corruption::corruption(&payload.actor)?)?;
        section(&mut payload.data, "attributes")["corruption"] = corruption;

        let details = section(&mut payload.data, "details");
        details["shadow"] = json!(payload.actor.flags.shadow);
        details["manner"] = json!(payload.actor.flags.manner);
        Ok(())
    }
}

fn section<'a>(data: &'a mut Value, key: &str) -> &'a mut Value {
    if !data.is_object() {
        *data = json!({});
    }
    let slot = &mut data[key];
    if !slot.is_object() {
        *slot = json!({});
    }
    slot
}
