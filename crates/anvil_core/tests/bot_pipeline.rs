//! End-to-end message handling against fragment directories on disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anvil_core::auth::AuthStore;
use anvil_core::host::{Author, ChannelRef, MessageId, RoleRef, UserRef};
use anvil_core::{
    Bot, ChatHost, ConstraintFailure, CoreError, InboundMessage, Outcome, Result, Settings,
    Snowflake,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tracing_test::traced_test;

#[derive(Clone, Default)]
struct RecordingHost {
    sent: Arc<Mutex<Vec<(Snowflake, String)>>>,
}

impl RecordingHost {
    fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl ChatHost for RecordingHost {
    async fn send(&self, channel_id: Snowflake, content: &str) -> Result<MessageId> {
        let mut sent = self.sent.lock();
        sent.push((channel_id, content.to_string()));
        Ok(sent.len() as MessageId)
    }

    async fn direct_message(&self, _user_id: Snowflake, _content: &str) -> Result<MessageId> {
        Ok(0)
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
        Some(500)
    }

    async fn resolve_user(&self, _guild_id: Option<Snowflake>, id: Snowflake) -> Option<UserRef> {
        Some(UserRef {
            id,
            name: format!("user{}", id),
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
            name: "general".to_string(),
            guild_id,
        })
    }

    async fn resolve_role(&self, _guild_id: Snowflake, _id: Snowflake) -> Option<RoleRef> {
        None
    }

    async fn permissions(
        &self,
        _guild_id: Snowflake,
        _channel_id: Snowflake,
        _user_id: Snowflake,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn message(author: Snowflake, content: &str) -> InboundMessage {
    InboundMessage {
        id: 1,
        author: Author {
            id: author,
            name: format!("user{}", author),
            bot: false,
        },
        content: content.to_string(),
        guild_id: Some(10),
        channel_id: 100,
        roles: Vec::new(),
        guild_name: Some("Test Guild".to_string()),
        channel_name: Some("general".to_string()),
    }
}

const PING: &str = r#"
[meta]
name = "ping"
[run]
handler = "internal.ping"
"#;

const ECHO: &str = r#"
[meta]
name = "echo"
aliases = ["say"]
[[arguments]]
name = "text"
required = true
variadic = true
[run]
respond = "{text}"
"#;

const SLOW: &str = r#"
[meta]
name = "slow"
[constraints]
cooldown = 5
[run]
respond = "done"
"#;

fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.general.owner = Some(99);
    settings.paths.internal = dir.join("internal");
    settings.paths.commands = dir.join("commands");
    settings.paths.services = dir.join("services");
    settings.paths.tasks = dir.join("tasks");
    settings.paths.languages = dir.join("languages");
    settings.paths.auth_store = dir.join("auth/store.json");
    settings.paths.auth_schema = dir.join("auth/schema.json");
    settings
}

/// A bot over a temp tree holding the internal `ping` and the `echo`/`slow` commands.
async fn bot_with_fragments(host: RecordingHost) -> (Bot, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "internal/ping.toml", PING);
    write(dir.path(), "commands/echo.toml", ECHO);
    write(dir.path(), "commands/slow.toml", SLOW);

    let bot = Bot::builder(settings_in(dir.path()), Arc::new(host))
        .build()
        .await
        .unwrap();
    bot.setup().await.unwrap();
    (bot, dir)
}

#[tokio::test]
async fn test_chained_commands_dispatch_in_order() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    let outcomes = bot.handle_message(message(1, "!ping & say hello there")).await;

    assert_eq!(outcomes, vec![Outcome::Completed, Outcome::Completed]);
    assert_eq!(host.texts(), vec!["Pong!", "hello there"]);
}

#[tokio::test]
async fn test_chain_does_not_split_role_mentions() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    bot.handle_message(message(1, "!echo hi <@&42>")).await;
    assert_eq!(host.texts(), vec!["hi <@&42>"]);
}

#[tokio::test]
async fn test_unprefixed_and_unknown_messages_are_ignored() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    assert!(bot.handle_message(message(1, "ping")).await.is_empty());
    assert!(bot.handle_message(message(1, "!nope")).await.is_empty());
    assert!(bot.handle_message(message(1, "! ping")).await.is_empty());
    assert!(host.texts().is_empty());
}

#[tokio::test]
async fn test_prefix_query_and_bots() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    let mut from_bot = message(7, "!ping");
    from_bot.author.bot = true;
    assert!(bot.handle_message(from_bot).await.is_empty());
    assert!(bot.handle_message(message(500, "!ping")).await.is_empty());

    bot.handle_message(message(1, "?prefix")).await;
    assert_eq!(host.texts(), vec!["My prefixes are: !"]);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_window() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    assert_eq!(bot.handle_message(message(1, "!slow")).await, vec![Outcome::Completed]);

    let second = bot.handle_message(message(1, "!slow")).await;
    assert!(matches!(
        second.as_slice(),
        [Outcome::ConstraintsRejected(ConstraintFailure::OnCooldown { .. })]
    ));

    // other users are unaffected
    assert_eq!(bot.handle_message(message(2, "!slow")).await, vec![Outcome::Completed]);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(bot.handle_message(message(1, "!slow")).await, vec![Outcome::Completed]);
    let again = bot.handle_message(message(1, "!slow")).await;
    assert!(matches!(again.as_slice(), [Outcome::ConstraintsRejected(_)]));
}

#[tokio::test]
#[traced_test]
async fn test_bad_fragment_does_not_abort_loading() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "internal/ping.toml", PING);
    write(dir.path(), "commands/a_broken.toml", "[meta\nname = ");
    write(dir.path(), "commands/b_echo.toml", ECHO);
    write(dir.path(), "commands/c_unknown.toml", "[run]\nhandler = \"nowhere\"\n[meta]\nname = \"x\"");

    let bot = Bot::builder(settings_in(dir.path()), Arc::new(RecordingHost::default()))
        .build()
        .await
        .unwrap();
    let summary = bot.setup().await.unwrap();

    assert_eq!(summary.commands, 2);
    assert!(bot.registry().contains("echo"));
    assert!(!bot.registry().contains("x"));
    assert!(logs_contain("skipping fragment that failed to load"));
}

#[tokio::test]
async fn test_internal_fragments_need_primitive_listing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "internal/ping.toml", PING);
    let mut settings = settings_in(dir.path());
    settings.primitive_commands = vec!["help".to_string()];

    let bot = Bot::builder(settings, Arc::new(RecordingHost::default()))
        .build()
        .await
        .unwrap();
    let summary = bot.setup().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(!bot.registry().contains("ping"));
}

#[tokio::test]
async fn test_missing_internal_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bot = Bot::builder(settings_in(dir.path()), Arc::new(RecordingHost::default()))
        .build()
        .await
        .unwrap();

    assert!(matches!(
        bot.setup().await,
        Err(CoreError::InternalFragmentsUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_auth_store_bootstrap_persists_new_guilds() {
    let host = RecordingHost::default();
    let (bot, dir) = bot_with_fragments(host).await;
    write(dir.path(), "auth/schema.json", r#"{"roles": {"Moderator": 2}}"#);

    // the schema is read when the store is opened, so rebuild
    let bot = {
        drop(bot);
        Bot::builder(settings_in(dir.path()), Arc::new(RecordingHost::default()))
            .build()
            .await
            .unwrap()
    };

    assert_eq!(bot.setup_auth_store(&[10, 20]).await.unwrap(), 2);
    assert_eq!(bot.setup_auth_store(&[10, 20, 30]).await.unwrap(), 1);
    assert_eq!(bot.auth().get_authority(20, 5, &["Moderator".to_string()]), 2);
    assert_eq!(bot.auth().get_authority(20, 5, &[]), 0);

    let reopened = AuthStore::open(dir.path().join("auth/store.json"), None)
        .await
        .unwrap();
    assert_eq!(reopened.guilds(), vec![10, 20, 30]);
}

#[tokio::test]
async fn test_reload_picks_up_new_fragments() {
    let host = RecordingHost::default();
    let (bot, dir) = bot_with_fragments(host.clone()).await;
    assert!(!bot.registry().contains("wave"));

    write(
        dir.path(),
        "commands/wave.toml",
        "[meta]\nname = \"wave\"\n[run]\nrespond = \"{author} waves\"",
    );
    let summary = bot.reload().await.unwrap();

    assert_eq!(summary.commands, 4);
    bot.handle_message(message(3, "!wave")).await;
    assert_eq!(host.texts(), vec!["<@3> waves"]);
}

#[tokio::test]
async fn test_suspended_bot_and_edits() {
    let host = RecordingHost::default();
    let (bot, _dir) = bot_with_fragments(host.clone()).await;

    assert!(bot.handle_message_update(message(1, "!ping")).await.is_empty());

    bot.suspend();
    assert!(bot.handle_message(message(1, "!ping")).await.is_empty());
    bot.resume();
    assert_eq!(bot.handle_message(message(1, "!ping")).await, vec![Outcome::Completed]);
}
