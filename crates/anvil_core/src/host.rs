//! The chat transport as seen from the core.
//!
//! The core never talks to a gateway directly. Inbound events arrive as
//! [`InboundMessage`] values and every outbound effect or directory lookup
//! goes through a [`ChatHost`] implementation supplied by the transport crate.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Chat platform identifiers are 64-bit snowflakes.
pub type Snowflake = u64;

/// Identifier of a message sent by the host.
pub type MessageId = Snowflake;

/// The author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
}

/// A role held by the author in the guild the message was sent in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: Snowflake,
    pub name: String,
}

/// A user found through the host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
    /// Role names held in the guild the lookup was made for
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A channel found through the host directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: Snowflake,
    pub name: String,
    pub guild_id: Option<Snowflake>,
}

/// One inbound chat message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
    /// Display names used only for message logging
    #[serde(default)]
    pub guild_name: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
}

impl InboundMessage {
    /// Whether the message was sent in a direct-message channel
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.iter().any(|r| r.id == role_id)
    }
}

/// Everything the core needs from the transport.
///
/// Implementations own connection state, rate limiting and rendering; the
/// core only asks for plain-text sends and directory lookups.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// Send `content` to a channel, returning the new message id
    async fn send(&self, channel_id: Snowflake, content: &str) -> Result<MessageId>;

    /// Reply to a message, mentioning its author
    async fn reply(&self, message: &InboundMessage, content: &str) -> Result<MessageId> {
        let mention = format!("<@{}>, {}", message.author.id, content);
        self.send(message.channel_id, &mention).await
    }

    /// Send a direct message to a user
    async fn direct_message(&self, user_id: Snowflake, content: &str) -> Result<MessageId>;

    /// Delete a previously sent message once `after` has elapsed
    async fn delete_message_after(
        &self,
        channel_id: Snowflake,
        message_id: MessageId,
        after: Duration,
    ) -> Result<()>;

    /// The bot's own user id, once known
    fn current_user_id(&self) -> Option<Snowflake>;

    async fn resolve_user(&self, guild_id: Option<Snowflake>, id: Snowflake) -> Option<UserRef>;

    async fn resolve_channel(
        &self,
        guild_id: Option<Snowflake>,
        id: Snowflake,
    ) -> Option<ChannelRef>;

    async fn resolve_role(&self, guild_id: Snowflake, id: Snowflake) -> Option<RoleRef>;

    /// Names of the permissions `user_id` holds in `channel_id`.
    ///
    /// Names follow the platform's flag names, e.g. `KICK_MEMBERS`.
    async fn permissions(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<String>>;
}

lazy_static! {
    static ref MENTION: Regex = Regex::new(r"^<(?:@!?|@&|#)(\d+)>$").unwrap();
}

/// Extract the snowflake out of a user, role or channel mention, or a bare id.
pub fn resolve_id(input: &str) -> Option<Snowflake> {
    let input = input.trim();
    if let Some(caps) = MENTION.captures(input) {
        return caps.get(1).and_then(|m| m.as_str().parse().ok());
    }
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse().ok();
    }
    None
}
