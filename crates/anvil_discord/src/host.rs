use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anvil_core::host::{ChannelRef, MessageId, RoleRef, UserRef};
use anvil_core::{ChatHost, CoreError, Result, Snowflake};
use async_trait::async_trait;
use serenity::all::{Channel, ChannelId, GuildId, Http, MessageId as DiscordMessageId, UserId};
use tracing::{debug, warn};

use crate::DiscordError;
use crate::convert::{MESSAGE_LIMIT, permission_names, split_message};

/// [`ChatHost`] backed by Discord's REST API.
pub struct SerenityHost {
    http: Arc<Http>,
    /// Zero until the bot's own user is known
    current_user: AtomicU64,
}

impl SerenityHost {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            current_user: AtomicU64::new(0),
        }
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }

    pub fn set_current_user(&self, id: Snowflake) {
        self.current_user.store(id, Ordering::SeqCst);
    }

    async fn say(&self, channel: ChannelId, content: &str) -> Result<MessageId> {
        let mut last = 0;
        for chunk in split_message(content, MESSAGE_LIMIT) {
            // Discord rejects blank messages
            if chunk.trim().is_empty() && last != 0 {
                continue;
            }
            let sent = channel.say(&self.http, &chunk).await.map_err(|cause| {
                CoreError::transport(
                    "send a message",
                    DiscordError::MessageSendFailed {
                        destination: format!("channel {}", channel),
                        message_length: chunk.chars().count(),
                        cause,
                    },
                )
            })?;
            last = sent.id.get();
        }
        Ok(last)
    }
}

#[async_trait]
impl ChatHost for SerenityHost {
    async fn send(&self, channel_id: Snowflake, content: &str) -> Result<MessageId> {
        self.say(ChannelId::new(channel_id), content).await
    }

    async fn direct_message(&self, user_id: Snowflake, content: &str) -> Result<MessageId> {
        let channel = UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| CoreError::transport("open a direct message channel", e))?;
        self.say(channel.id, content).await
    }

    async fn delete_message_after(
        &self,
        channel_id: Snowflake,
        message_id: MessageId,
        after: Duration,
    ) -> Result<()> {
        let http = self.http.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let channel = ChannelId::new(channel_id);
            if let Err(e) = channel
                .delete_message(&http, DiscordMessageId::new(message_id))
                .await
            {
                // already deleted by someone else is the usual cause
                debug!(channel = channel_id, message = message_id, error = %e, "auto-delete failed");
            }
        });
        Ok(())
    }

    fn current_user_id(&self) -> Option<Snowflake> {
        match self.current_user.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    async fn resolve_user(&self, guild_id: Option<Snowflake>, id: Snowflake) -> Option<UserRef> {
        let user_id = UserId::new(id);
        let (user, roles) = match guild_id {
            Some(guild_id) => {
                let guild = GuildId::new(guild_id);
                let member = guild.member(&self.http, user_id).await.ok()?;
                let roles = if member.roles.is_empty() {
                    Vec::new()
                } else {
                    match guild.roles(&self.http).await {
                        Ok(all) => member
                            .roles
                            .iter()
                            .filter_map(|role_id| all.get(role_id))
                            .map(|role| role.name.clone())
                            .collect(),
                        Err(e) => {
                            warn!(guild = guild_id, error = %e, "could not fetch member roles");
                            Vec::new()
                        }
                    }
                };
                (member.user, roles)
            }
            None => (self.http.get_user(user_id).await.ok()?, Vec::new()),
        };
        Some(UserRef {
            id,
            name: user.name,
            bot: user.bot,
            roles,
        })
    }

    async fn resolve_channel(
        &self,
        guild_id: Option<Snowflake>,
        id: Snowflake,
    ) -> Option<ChannelRef> {
        match self.http.get_channel(ChannelId::new(id)).await.ok()? {
            Channel::Guild(channel) => {
                let owner = channel.guild_id.get();
                // channels from other guilds are not visible from here
                if guild_id.is_some_and(|g| g != owner) {
                    return None;
                }
                Some(ChannelRef {
                    id,
                    name: channel.name,
                    guild_id: Some(owner),
                })
            }
            Channel::Private(channel) => Some(ChannelRef {
                id,
                name: channel.recipient.name,
                guild_id: None,
            }),
            _ => None,
        }
    }

    async fn resolve_role(&self, guild_id: Snowflake, id: Snowflake) -> Option<RoleRef> {
        let roles = match GuildId::new(guild_id).roles(&self.http).await {
            Ok(roles) => roles,
            Err(e) => {
                warn!(guild = guild_id, error = %e, "could not fetch roles");
                return None;
            }
        };
        roles
            .into_iter()
            .find(|(role_id, _)| role_id.get() == id)
            .map(|(_, role)| RoleRef {
                id,
                name: role.name,
            })
    }

    async fn permissions(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<String>> {
        let guild = self
            .http
            .get_guild(GuildId::new(guild_id))
            .await
            .map_err(|e| CoreError::transport("fetch the guild", e))?;
        let channel = self
            .http
            .get_channel(ChannelId::new(channel_id))
            .await
            .map_err(|e| CoreError::transport("fetch the channel", e))?;
        let member = GuildId::new(guild_id)
            .member(&self.http, UserId::new(user_id))
            .await
            .map_err(|e| CoreError::transport("fetch the member", e))?;

        let permissions = match channel.guild() {
            Some(channel) => guild.user_permissions_in(&channel, &member),
            None => return Ok(Vec::new()),
        };
        Ok(permission_names(permissions))
    }
}
