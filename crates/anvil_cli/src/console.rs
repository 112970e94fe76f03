//! Offline host used by `anvil try`: prints what the bot would send.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anvil_core::host::{ChannelRef, MessageId, RoleRef, UserRef};
use anvil_core::{ChatHost, Result, Snowflake};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::output::Output;

pub const CONSOLE_GUILD: Snowflake = 1;
pub const CONSOLE_CHANNEL: Snowflake = 2;
pub const CONSOLE_SELF: Snowflake = 3;

/// Every directory lookup succeeds and every permission is granted.
#[derive(Default)]
pub struct ConsoleHost {
    next_id: AtomicU64,
    transcript: Mutex<Vec<(String, String)>>,
    quiet: bool,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record without printing
    #[cfg(test)]
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn transcript(&self) -> Vec<(String, String)> {
        self.transcript.lock().clone()
    }

    fn record(&self, destination: String, content: &str) -> MessageId {
        if !self.quiet {
            Output::new().bot_message(&destination, content);
        }
        self.transcript.lock().push((destination, content.to_string()));
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatHost for ConsoleHost {
    async fn send(&self, channel_id: Snowflake, content: &str) -> Result<MessageId> {
        Ok(self.record(format!("#{}", channel_id), content))
    }

    async fn direct_message(&self, user_id: Snowflake, content: &str) -> Result<MessageId> {
        Ok(self.record(format!("dm @{}", user_id), content))
    }

    async fn delete_message_after(
        &self,
        _channel_id: Snowflake,
        _message_id: MessageId,
        _after: Duration,
    ) -> Result<()> {
        Ok(())
    }

    fn current_user_id(&self) -> Option<Snowflake> {
        Some(CONSOLE_SELF)
    }

    async fn resolve_user(&self, _guild_id: Option<Snowflake>, id: Snowflake) -> Option<UserRef> {
        Some(UserRef {
            id,
            name: format!("user-{}", id),
            bot: false,
            roles: Vec::new(),
        })
    }

    async fn resolve_channel(
        &self,
        guild_id: Option<Snowflake>,
        id: Snowflake,
    ) -> Option<ChannelRef> {
        Some(ChannelRef {
            id,
            name: format!("channel-{}", id),
            guild_id,
        })
    }

    async fn resolve_role(&self, _guild_id: Snowflake, id: Snowflake) -> Option<RoleRef> {
        Some(RoleRef {
            id,
            name: format!("role-{}", id),
        })
    }

    async fn permissions(
        &self,
        _guild_id: Snowflake,
        _channel_id: Snowflake,
        _user_id: Snowflake,
    ) -> Result<Vec<String>> {
        Ok(vec!["ADMINISTRATOR".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_records_sends_and_dms() {
        let host = ConsoleHost::quiet();
        assert_eq!(host.send(CONSOLE_CHANNEL, "hello").await.unwrap(), 1);
        assert_eq!(host.direct_message(7, "psst").await.unwrap(), 2);
        assert_eq!(
            host.transcript(),
            vec![
                ("#2".to_string(), "hello".to_string()),
                ("dm @7".to_string(), "psst".to_string())
            ]
        );
    }
}
