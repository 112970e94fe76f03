use std::sync::Arc;

use anvil_core::{Bot, Settings};
use serenity::all::{Client, GatewayError, GatewayIntents, Http};
use tracing::{info, warn};

use crate::handler::Handler;
use crate::host::SerenityHost;
use crate::{DiscordError, Result};

/// Intents the message pipeline needs
pub fn default_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// A [`Bot`] wired to a Discord gateway connection.
pub struct DiscordBot {
    bot: Bot,
    host: Arc<SerenityHost>,
    token: String,
    intents: GatewayIntents,
}

impl DiscordBot {
    /// Authenticate, build the bot and load its fragments.
    ///
    /// Fails fast on a bad token or an unreadable internal fragments
    /// directory; nothing else here is fatal.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let token = settings.token().ok_or(DiscordError::MissingToken)?;

        let http = Arc::new(Http::new(&token));
        let me = http
            .get_current_user()
            .await
            .map_err(|e| DiscordError::authentication(&token, e))?;
        info!(user = %me.name, "authenticated with Discord");

        let host = Arc::new(SerenityHost::new(http));
        host.set_current_user(me.id.get());

        let bot = Bot::builder(settings, host.clone()).build().await?;
        bot.setup().await?;

        Ok(Self {
            bot,
            host,
            token,
            intents: default_intents(),
        })
    }

    pub fn with_intents(mut self, intents: GatewayIntents) -> Self {
        self.intents = intents;
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Run until the gateway closes or Ctrl-C is pressed, then shut the bot down.
    pub async fn run(self) -> Result<()> {
        let handler = Handler::new(self.bot.clone(), self.host.clone());
        let mut client = Client::builder(&self.token, self.intents)
            .event_handler(handler)
            .await
            .map_err(|cause| DiscordError::ClientBuildFailed { cause })?;

        let shards = client.shard_manager.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, closing gateway");
                shards.shutdown_all().await;
            }
        });

        info!("Starting Discord bot...");
        let result = client.start().await;

        if let Err(e) = self.bot.shutdown().await {
            warn!(error = %e, "shutdown did not complete cleanly");
        }

        match result {
            Ok(()) => Ok(()),
            Err(serenity::Error::Gateway(GatewayError::InvalidAuthentication)) => {
                Err(DiscordError::authentication(
                    &self.token,
                    serenity::Error::Gateway(GatewayError::InvalidAuthentication),
                ))
            }
            Err(cause) => Err(DiscordError::GatewayFailed { cause }),
        }
    }
}
