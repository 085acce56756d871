//! Symbaroum house rules for a D&D 5e ruleset host.
//!
//! This crate provides:
//! - Corruption as a replacement for spell slots
//! - Short, long and extended rests with corruption recovery
//! - Soulless characters whose corruption eats their hit point maximum
//! - Symbaroum coinage (thaler, shilling, ortega)
//! - Spellcasting level derived from class progressions
//!
//! # Quick Start
//!
//! ```ignore
//! use syb5e_core::{RestOptions, Syb5e, Syb5eConfig};
//!
//! async fn rest(host: syb5e_core::host::Host, actor_id: syb5e_core::actor::ActorId)
//!     -> Result<(), syb5e_core::Syb5eError>
//! {
//!     let runtime = Syb5e::new(Syb5eConfig::default(), host);
//!     let outcome = runtime.long_rest(actor_id, RestOptions::new()).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod corruption;
pub mod currency;
pub mod dialog;
pub mod dice;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod resting;
pub mod runtime;
pub mod soulless;
pub mod spellcasting;
pub mod testing;
pub mod update;
pub mod usage;

// Primary public API
pub use actor::{Actor, ActorId, Item, ItemId};
pub use config::Syb5eConfig;
pub use corruption::{Corruption, CorruptionDescriptor, CorruptionTarget};
pub use error::Syb5eError;
pub use resting::{RestResult, RestType};
pub use runtime::{RestOptions, RestOutcome, Syb5e};
pub use testing::{InMemoryHost, ScriptedRestPrompt};
