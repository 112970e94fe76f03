use std::sync::Arc;

use anvil_core::auth::AuthStore;
use anvil_core::host::Author;
use anvil_core::{Bot, InboundMessage, Outcome, Settings};
use miette::Result;
use owo_colors::OwoColorize;

use crate::console::{CONSOLE_CHANNEL, CONSOLE_GUILD, ConsoleHost};
use crate::output::Output;

/// Connect to Discord and run until interrupted
#[cfg(feature = "discord")]
pub async fn run(settings: Settings) -> Result<()> {
    let output = Output::new();
    output.status("Connecting to Discord...");

    let bot = anvil_discord::DiscordBot::connect(settings).await?;
    output.success(&format!(
        "Loaded {} commands and {} services",
        bot.bot().registry().len(),
        bot.bot().services().len()
    ));
    bot.run().await?;
    Ok(())
}

#[cfg(not(feature = "discord"))]
pub async fn run(_settings: Settings) -> Result<()> {
    Err(miette::miette!(
        "this build has no transport; rebuild with the `discord` feature"
    ))
}

/// An offline bot over the console host; the authority store is never written.
async fn offline_bot(settings: Settings, host: Arc<ConsoleHost>) -> Result<Bot> {
    let owner = settings.general.owner;
    let bot = Bot::builder(settings, host)
        .auth_store(AuthStore::in_memory().with_owner(owner))
        .build()
        .await?;
    Ok(bot)
}

/// Load every fragment directory and report what was found
pub async fn check(settings: Settings) -> Result<()> {
    let output = Output::new();
    let bot = offline_bot(settings, Arc::new(ConsoleHost::new())).await?;
    let summary = bot.setup().await?;

    output.section("Commands");
    for command in bot.registry().commands() {
        let aliases = &command.meta().aliases;
        let mut line = command.name().bright_green().to_string();
        if !aliases.is_empty() {
            line.push_str(&format!(" ({})", aliases.join(", ")));
        }
        if !command.meta().description.is_empty() {
            line.push_str(&format!(": {}", command.meta().description));
        }
        println!("  {}", line);
    }

    output.section("Services");
    let services = bot.services().all();
    if services.is_empty() {
        output.status("none");
    }
    for service in services {
        println!("  {}", service.meta().name.bright_green());
    }

    println!();
    output.info("Commands:", &summary.commands.to_string());
    output.info("Services:", &summary.services.to_string());
    if summary.skipped > 0 {
        output.info("Skipped:", &summary.skipped.to_string());
    }
    bot.shutdown().await?;
    Ok(())
}

/// Dispatch one message through an offline bot and print the responses
pub async fn try_message(settings: Settings, content: &str, author: Option<u64>) -> Result<()> {
    let output = Output::new();
    let author = author.or(settings.general.owner).unwrap_or(10);

    let bot = offline_bot(settings, Arc::new(ConsoleHost::new())).await?;
    bot.setup().await?;

    let message = InboundMessage {
        id: 1,
        author: Author {
            id: author,
            name: "console".to_string(),
            bot: false,
        },
        content: content.to_string(),
        guild_id: Some(CONSOLE_GUILD),
        channel_id: CONSOLE_CHANNEL,
        roles: Vec::new(),
        guild_name: Some("console".to_string()),
        channel_name: Some("console".to_string()),
    };

    let outcomes = bot.handle_message(message).await;
    if outcomes.is_empty() {
        output.status("not a command invocation");
    }
    for outcome in outcomes {
        match outcome {
            Outcome::Completed => output.success("completed"),
            other => output.error(&format!("{}: {:?}", other.state(), other)),
        }
    }
    bot.shutdown().await?;
    Ok(())
}
