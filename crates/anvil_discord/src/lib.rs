//! Anvil Discord - gateway transport for Anvil bots
//!
//! Implements the core's [`anvil_core::ChatHost`] over serenity and feeds
//! gateway events into an [`anvil_core::Bot`].

pub mod bot;
pub mod convert;
pub mod error;
pub mod handler;
pub mod host;

pub use bot::{DiscordBot, default_intents};
pub use error::{DiscordError, Result};
pub use handler::Handler;
pub use host::SerenityHost;

// Re-export serenity for convenience
pub use serenity;
