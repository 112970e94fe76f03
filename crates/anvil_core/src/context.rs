//! Per-invocation state handed to command actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::bot::Bot;
use crate::config::Settings;
use crate::host::{ChatHost, InboundMessage, MessageId, Snowflake};

/// How long an auto-deleted response stays visible: 4s plus 100ms per character.
pub fn response_ttl(content: &str) -> Duration {
    Duration::from_millis(4_000 + 100 * content.chars().count() as u64)
}

/// One command invocation: the message, who sent it and what they invoked.
///
/// Cloning is cheap and clones share the "has responded" flag, so the
/// dispatcher can tell whether an action already answered before failing.
#[derive(Clone)]
pub struct CommandContext {
    bot: Bot,
    message: Arc<InboundMessage>,
    authority: i64,
    prefix: String,
    label: String,
    remainder: String,
    responded: Arc<AtomicBool>,
}

impl CommandContext {
    pub fn new(bot: Bot, message: Arc<InboundMessage>, authority: i64) -> Self {
        Self {
            bot,
            message,
            authority,
            prefix: String::new(),
            label: String::new(),
            remainder: String::new(),
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record what was typed: the prefix, the name or alias, and the rest
    pub fn with_invocation(
        mut self,
        prefix: impl Into<String>,
        label: impl Into<String>,
        remainder: impl Into<String>,
    ) -> Self {
        self.prefix = prefix.into();
        self.label = label.into();
        self.remainder = remainder.into();
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn host(&self) -> &dyn ChatHost {
        self.bot.host()
    }

    pub fn settings(&self) -> &Settings {
        self.bot.settings()
    }

    pub fn message(&self) -> &InboundMessage {
        &self.message
    }

    /// Effective authority of the invoker, resolved before dispatch
    pub fn authority(&self) -> i64 {
        self.authority
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The command name or alias exactly as typed
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The raw argument text after the label
    pub fn join_arguments(&self) -> &str {
        &self.remainder
    }

    pub fn is_direct(&self) -> bool {
        self.message.is_direct()
    }

    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    /// Authority of another user in the invocation's guild
    pub fn authority_of(&self, user_id: Snowflake, role_names: &[String]) -> i64 {
        match self.message.guild_id {
            Some(guild_id) => self.bot.auth().get_authority(guild_id, user_id, role_names),
            None => self.bot.auth().get_direct_authority(user_id),
        }
    }

    /// Send `content` to the invoking channel.
    ///
    /// Blank content is replaced with an "empty response" notice. When
    /// `auto_delete_responses` is on, the message is deleted after
    /// [`response_ttl`].
    pub async fn respond(&self, content: &str) -> Result<MessageId> {
        self.send(content, self.settings().options.auto_delete_responses)
            .await
    }

    /// Respond prefixed with the success emoji
    pub async fn ok(&self, content: &str) -> Result<MessageId> {
        let text = format!("{} {}", self.settings().emojis.success, content);
        self.respond(&text).await
    }

    /// Respond prefixed with the error emoji; always auto-deleted
    pub async fn fail(&self, content: &str) -> Result<MessageId> {
        let text = format!("{} {}", self.settings().emojis.error, content);
        self.send(&text, true).await
    }

    /// Reply mentioning the invoker
    pub async fn reply(&self, content: &str) -> Result<MessageId> {
        let content = self.non_empty(content);
        self.responded.store(true, Ordering::SeqCst);
        self.host().reply(&self.message, &content).await
    }

    /// Send `content` to the invoker as a direct message
    pub async fn private_reply(&self, content: &str) -> Result<MessageId> {
        let content = self.non_empty(content);
        self.responded.store(true, Ordering::SeqCst);
        self.host()
            .direct_message(self.message.author.id, &content)
            .await
    }

    async fn send(&self, content: &str, auto_delete: bool) -> Result<MessageId> {
        let content = self.non_empty(content);
        self.responded.store(true, Ordering::SeqCst);
        let id = self.host().send(self.message.channel_id, &content).await?;

        if auto_delete {
            if let Err(e) = self
                .host()
                .delete_message_after(self.message.channel_id, id, response_ttl(&content))
                .await
            {
                warn!(error = %e, message = id, "could not schedule response deletion");
            }
        }
        Ok(id)
    }

    fn non_empty(&self, content: &str) -> String {
        if content.trim().is_empty() {
            format!(
                "{} {}",
                self.settings().emojis.error,
                self.bot.language().get("response.empty", &[])
            )
        } else {
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::{FakeHost, context_for, guild_message, test_bot, test_bot_with};

    #[test]
    fn test_ttl_grows_with_length() {
        assert_eq!(response_ttl(""), Duration::from_millis(4_000));
        assert_eq!(response_ttl("abcde"), Duration::from_millis(4_500));
    }

    #[tokio::test]
    async fn test_empty_response_is_replaced() {
        let host = FakeHost::new();
        let bot = test_bot(host.clone()).await;
        let ctx = context_for(&bot, guild_message(1, "!x"), 0);

        assert!(!ctx.has_responded());
        ctx.respond("   ").await.unwrap();
        assert!(ctx.has_responded());
        assert_eq!(host.sent_texts(), vec![":thinking: *Empty response.*"]);
        assert!(host.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_ok_and_fail() {
        let host = FakeHost::new();
        let bot = test_bot(host.clone()).await;
        let ctx = context_for(&bot, guild_message(1, "!x"), 0);

        ctx.ok("done").await.unwrap();
        ctx.fail("nope").await.unwrap();

        assert_eq!(
            host.sent_texts(),
            vec![":white_check_mark: done", ":thinking: nope"]
        );
        // only the failure is auto-deleted
        let deleted = host.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].2, response_ttl(":thinking: nope"));
    }

    #[tokio::test]
    async fn test_auto_delete_option() {
        let host = FakeHost::new();
        let bot = test_bot_with(host.clone(), |settings| {
            settings.options.auto_delete_responses = true;
        })
        .await;
        let ctx = context_for(&bot, guild_message(1, "!x"), 0);

        ctx.respond("hello").await.unwrap();
        assert_eq!(host.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_private_reply_and_reply() {
        let host = FakeHost::new();
        let bot = test_bot(host.clone()).await;
        let ctx = context_for(&bot, guild_message(1, "!x"), 0);

        ctx.private_reply("secret").await.unwrap();
        ctx.reply("public").await.unwrap();

        assert_eq!(host.direct_messages(), vec![(1, "secret".to_string())]);
        assert_eq!(host.sent_texts(), vec!["<@1>, public"]);
    }

    #[tokio::test]
    async fn test_join_arguments_is_raw_remainder() {
        let bot = test_bot(FakeHost::new()).await;
        let ctx = context_for(&bot, guild_message(1, r#"!say "hello  world" -x"#), 0);
        assert_eq!(ctx.label(), "say");
        assert_eq!(ctx.join_arguments(), r#""hello  world" -x"#);
    }
}
