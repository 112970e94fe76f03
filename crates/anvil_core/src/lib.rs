//! Anvil Core - fragment-based chat bot framework
//!
//! This crate loads command and service fragments from TOML manifests,
//! parses and routes chat messages to them, resolves typed arguments,
//! enforces authority and cooldown constraints, and reports failures back to
//! the channel. It is transport-agnostic: the chat platform is reached only
//! through the [`ChatHost`] trait.

pub mod args;
pub mod auth;
pub mod bot;
pub mod builtin;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fragment;
pub mod host;
pub mod language;
pub mod parser;
pub mod registry;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use args::{ArgType, ArgValue, ArgumentSpec, ArgumentType, ArgumentTypes, Arguments};
pub use auth::{
    AuthStore, ChatEnvironment, Constraints, CooldownTracker, OWNER_AUTHORITY, SpecificTarget,
};
pub use bot::{Bot, BotBuilder, LoadSummary};
pub use config::{Settings, load_settings, load_settings_from_standard_locations};
pub use context::CommandContext;
pub use dispatch::{CommandHandler, DispatchState, Outcome};
pub use error::{ArgumentError, ConstraintFailure, CoreError, Result};
pub use fragment::{Command, CommandAction, CommandDefinition, Fragment, FragmentCatalog, FragmentMeta};
pub use host::{ChatHost, InboundMessage, Snowflake};
pub use language::Language;
pub use registry::CommandRegistry;
pub use service::{Service, ServiceManager};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        ArgType, Arguments, Bot, ChatHost, Command, CommandAction, CommandContext,
        CommandDefinition, CoreError, FragmentCatalog, FragmentMeta, InboundMessage, Result,
        Service, Settings,
    };
    pub use crate::fragment::action;
}
