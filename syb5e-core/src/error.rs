use crate::actor::ActorError;
use crate::corruption::CorruptionError;
use crate::dice::DiceError;
use crate::host::HostError;
use thiserror::Error;

/// Top-level error for the [`crate::runtime::Syb5e`] facade.
#[derive(Debug, Error)]
pub enum Syb5eError {
    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),

    #[error("Actor data error: {0}")]
    Actor(#[from] ActorError),

    #[error("Corruption error: {0}")]
    Corruption(#[from] CorruptionError),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
