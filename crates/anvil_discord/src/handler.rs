use std::sync::Arc;

use anvil_core::Bot;
use serenity::all::{Context, EventHandler, Guild, Message, MessageUpdateEvent, Ready};
use serenity::async_trait;
use tracing::{error, info};

use crate::convert::inbound_message;
use crate::host::SerenityHost;

/// Feeds gateway events into a [`Bot`].
pub struct Handler {
    bot: Bot,
    host: Arc<SerenityHost>,
}

impl Handler {
    pub fn new(bot: Bot, host: Arc<SerenityHost>) -> Self {
        Self { bot, host }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
        self.host.set_current_user(ready.user.id.get());

        let guilds: Vec<u64> = ready.guilds.iter().map(|g| g.id.get()).collect();
        if let Err(e) = self.bot.on_ready(&guilds).await {
            error!(error = %e, "bot failed to become ready");
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new != Some(true) {
            return;
        }
        info!(guild = %guild.name, "joined new guild");
        if let Err(e) = self.bot.setup_auth_store(&[guild.id.get()]).await {
            error!(error = %e, "could not add authority entry for new guild");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let inbound = inbound_message(&ctx.cache, &msg);
        self.bot.handle_message(inbound).await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Message>,
        new: Option<Message>,
        _event: MessageUpdateEvent,
    ) {
        let Some(msg) = new else {
            return;
        };
        let inbound = inbound_message(&ctx.cache, &msg);
        self.bot.handle_message_update(inbound).await;
    }
}
