#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::Result;
use crate::auth::AuthStore;
use crate::bot::Bot;
use crate::config::Settings;
use crate::context::CommandContext;
use crate::fragment::{Command, CommandDefinition, FragmentMeta, action};
use crate::host::{
    Author, ChannelRef, ChatHost, InboundMessage, MessageId, RoleRef, Snowflake, UserRef,
};
use crate::language::Language;

pub const TEST_GUILD: Snowflake = 10;
pub const TEST_CHANNEL: Snowflake = 100;
pub const TEST_DM_CHANNEL: Snowflake = 200;
pub const TEST_OWNER: Snowflake = 99;
pub const TEST_SELF: Snowflake = 500;

#[derive(Default)]
struct FakeState {
    users: HashMap<Snowflake, String>,
    member_roles: HashMap<Snowflake, Vec<String>>,
    channels: HashMap<Snowflake, String>,
    roles: HashMap<Snowflake, String>,
    permissions: HashMap<Snowflake, Vec<String>>,
    sent: Vec<(Snowflake, String)>,
    direct: Vec<(Snowflake, String)>,
    deleted: Vec<(Snowflake, MessageId, Duration)>,
}

/// In-memory host that records every outbound effect.
#[derive(Clone)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
    next_id: Arc<AtomicU64>,
}

impl FakeHost {
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.channels.insert(TEST_CHANNEL, "general".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
            next_id: Arc::new(AtomicU64::new(1000)),
        }
    }

    pub fn with_user(self, id: Snowflake, name: &str) -> Self {
        self.state.lock().users.insert(id, name.to_string());
        self
    }

    /// A user holding the named roles in the test guild
    pub fn with_member(self, id: Snowflake, name: &str, roles: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            state.users.insert(id, name.to_string());
            state
                .member_roles
                .insert(id, roles.iter().map(|r| r.to_string()).collect());
        }
        self
    }

    pub fn with_channel(self, id: Snowflake, name: &str) -> Self {
        self.state.lock().channels.insert(id, name.to_string());
        self
    }

    pub fn with_role(self, id: Snowflake, name: &str) -> Self {
        self.state.lock().roles.insert(id, name.to_string());
        self
    }

    pub fn with_permissions(self, user_id: Snowflake, permissions: &[&str]) -> Self {
        self.state
            .lock()
            .permissions
            .insert(user_id, permissions.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn sent(&self) -> Vec<(Snowflake, String)> {
        self.state.lock().sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn direct_messages(&self) -> Vec<(Snowflake, String)> {
        self.state.lock().direct.clone()
    }

    pub fn deleted(&self) -> Vec<(Snowflake, MessageId, Duration)> {
        self.state.lock().deleted.clone()
    }

    fn next_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatHost for FakeHost {
    async fn send(&self, channel_id: Snowflake, content: &str) -> Result<MessageId> {
        self.state.lock().sent.push((channel_id, content.to_string()));
        Ok(self.next_id())
    }

    async fn direct_message(&self, user_id: Snowflake, content: &str) -> Result<MessageId> {
        self.state.lock().direct.push((user_id, content.to_string()));
        Ok(self.next_id())
    }

    async fn delete_message_after(
        &self,
        channel_id: Snowflake,
        message_id: MessageId,
        after: Duration,
    ) -> Result<()> {
        self.state.lock().deleted.push((channel_id, message_id, after));
        Ok(())
    }

    fn current_user_id(&self) -> Option<Snowflake> {
        Some(TEST_SELF)
    }

    async fn resolve_user(&self, _guild_id: Option<Snowflake>, id: Snowflake) -> Option<UserRef> {
        let state = self.state.lock();
        state.users.get(&id).map(|name| UserRef {
            id,
            name: name.clone(),
            bot: false,
            roles: state.member_roles.get(&id).cloned().unwrap_or_default(),
        })
    }

    async fn resolve_channel(
        &self,
        guild_id: Option<Snowflake>,
        id: Snowflake,
    ) -> Option<ChannelRef> {
        self.state.lock().channels.get(&id).map(|name| ChannelRef {
            id,
            name: name.clone(),
            guild_id,
        })
    }

    async fn resolve_role(&self, _guild_id: Snowflake, id: Snowflake) -> Option<RoleRef> {
        self.state.lock().roles.get(&id).map(|name| RoleRef {
            id,
            name: name.clone(),
        })
    }

    async fn permissions(
        &self,
        _guild_id: Snowflake,
        _channel_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .permissions
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn guild_message(author_id: Snowflake, content: &str) -> InboundMessage {
    InboundMessage {
        id: 1,
        author: Author {
            id: author_id,
            name: format!("user{}", author_id),
            bot: false,
        },
        content: content.to_string(),
        guild_id: Some(TEST_GUILD),
        channel_id: TEST_CHANNEL,
        roles: Vec::new(),
        guild_name: Some("Test Guild".to_string()),
        channel_name: Some("general".to_string()),
    }
}

pub fn direct_message(author_id: Snowflake, content: &str) -> InboundMessage {
    InboundMessage {
        guild_id: None,
        channel_id: TEST_DM_CHANNEL,
        guild_name: None,
        channel_name: None,
        ..guild_message(author_id, content)
    }
}

pub async fn test_bot(host: FakeHost) -> Bot {
    test_bot_with(host, |_| {}).await
}

/// A bot owned by user 99 with an in-memory authority store.
pub async fn test_bot_with(host: FakeHost, configure: impl FnOnce(&mut Settings)) -> Bot {
    let mut settings = Settings::default();
    settings.general.owner = Some(TEST_OWNER);
    configure(&mut settings);

    Bot::builder(settings, Arc::new(host))
        .auth_store(AuthStore::in_memory())
        .language(Language::english())
        .build()
        .await
        .unwrap()
}

/// Context for `message` as if it invoked a command with the `!` prefix.
pub fn context_for(bot: &Bot, message: InboundMessage, authority: i64) -> CommandContext {
    let rest = message.content.strip_prefix('!').unwrap_or(&message.content);
    let label_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let label = rest[..label_end].to_string();
    let remainder = rest[label_end..].trim_start().to_string();

    CommandContext::new(bot.clone(), Arc::new(message), authority).with_invocation(
        "!",
        label,
        remainder,
    )
}

pub fn command_with_meta(meta: FragmentMeta) -> Command {
    Command::new(
        CommandDefinition::new(meta),
        action(|_ctx, _args| async move { Ok(()) }),
    )
}

pub fn test_command(name: &str) -> Command {
    command_with_meta(FragmentMeta::new(name))
}
