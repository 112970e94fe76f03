//! The bot: owns every subsystem and routes inbound messages into dispatch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::args::{ArgumentType, ArgumentTypes};
use crate::auth::{AuthStore, CooldownTracker};
use crate::config::Settings;
use crate::context::CommandContext;
use crate::dispatch::{CommandHandler, Outcome};
use crate::fragment::{Fragment, FragmentCatalog, FragmentLoader, scan};
use crate::host::{ChatHost, InboundMessage, Snowflake};
use crate::language::Language;
use crate::parser::CommandParser;
use crate::registry::CommandRegistry;
use crate::service::ServiceManager;
use crate::{CoreError, Result};

/// Counts from one fragment loading pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub commands: usize,
    pub services: usize,
    /// Fragments that loaded but could not be registered, or internal ones left disabled
    pub skipped: usize,
}

struct BotInner {
    settings: Settings,
    host: Arc<dyn ChatHost>,
    registry: CommandRegistry,
    services: ServiceManager,
    auth: AuthStore,
    cooldowns: CooldownTracker,
    language: RwLock<Arc<Language>>,
    catalog: FragmentCatalog,
    argument_types: ArgumentTypes,
    suspended: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    started_at: DateTime<Utc>,
}

/// Shared handle to a running bot. Cloning is cheap.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    settings: Settings,
    host: Arc<dyn ChatHost>,
    catalog: FragmentCatalog,
    argument_types: ArgumentTypes,
    auth: Option<AuthStore>,
    language: Option<Language>,
}

impl BotBuilder {
    /// Replace the handler catalog (defaults to the built-ins)
    pub fn catalog(mut self, catalog: FragmentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Register a custom argument type before fragments are loaded
    pub fn argument_type(mut self, kind: Arc<dyn ArgumentType>) -> Self {
        self.argument_types.register(kind);
        self
    }

    /// Use this store instead of opening the one named in the settings
    pub fn auth_store(mut self, store: AuthStore) -> Self {
        self.auth = Some(store);
        self
    }

    /// Use this table instead of loading the configured locale
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub async fn build(self) -> Result<Bot> {
        let owner = self.settings.general.owner;
        let auth = match self.auth {
            Some(store) => store,
            None => {
                AuthStore::open(
                    self.settings.paths.auth_store.clone(),
                    Some(&self.settings.paths.auth_schema),
                )
                .await?
            }
        }
        .with_owner(owner);

        let language = match self.language {
            Some(language) => language,
            None => load_language(&self.settings).await,
        };

        let cooldowns = CooldownTracker::new(self.settings.cooldowns.max_entries);

        Ok(Bot {
            inner: Arc::new(BotInner {
                settings: self.settings,
                host: self.host,
                registry: CommandRegistry::new(),
                services: ServiceManager::new(),
                auth,
                cooldowns,
                language: RwLock::new(Arc::new(language)),
                catalog: self.catalog,
                argument_types: self.argument_types,
                suspended: AtomicBool::new(false),
                sweeper: Mutex::new(None),
                started_at: Utc::now(),
            }),
        })
    }
}

async fn load_language(settings: &Settings) -> Language {
    match Language::load(&settings.paths.languages, &settings.general.locale).await {
        Ok(language) => language,
        Err(e) => {
            warn!(error = %e, locale = %settings.general.locale, "falling back to built-in English");
            Language::english()
        }
    }
}

impl Bot {
    pub fn builder(settings: Settings, host: Arc<dyn ChatHost>) -> BotBuilder {
        BotBuilder {
            settings,
            host,
            catalog: FragmentCatalog::with_builtins(),
            argument_types: ArgumentTypes::new(),
            auth: None,
            language: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn host(&self) -> &dyn ChatHost {
        self.inner.host.as_ref()
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    pub fn services(&self) -> &ServiceManager {
        &self.inner.services
    }

    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.inner.cooldowns
    }

    pub fn argument_types(&self) -> &ArgumentTypes {
        &self.inner.argument_types
    }

    pub fn language(&self) -> Arc<Language> {
        self.inner.language.read().clone()
    }

    pub fn owner(&self) -> Option<Snowflake> {
        self.inner.settings.general.owner
    }

    pub fn prefixes(&self) -> &[String] {
        &self.inner.settings.general.prefixes
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Load every fragment directory and start the cooldown sweeper.
    ///
    /// Fails only when the internal fragments directory cannot be read.
    pub async fn setup(&self) -> Result<LoadSummary> {
        if self.settings().options.auto_reset_auth_store {
            self.auth().reset_all();
            self.auth().save().await?;
        }

        let summary = self.load_fragments().await?;
        self.start_sweeper();
        info!(
            commands = summary.commands,
            services = summary.services,
            skipped = summary.skipped,
            "bot setup complete"
        );
        Ok(summary)
    }

    async fn load_fragments(&self) -> Result<LoadSummary> {
        let paths = &self.settings().paths;
        let loader = FragmentLoader::new(&self.inner.catalog, &self.inner.argument_types);
        let mut summary = LoadSummary::default();

        let internal = scan(&paths.internal).ok_or_else(|| CoreError::InternalFragmentsUnavailable {
            path: paths.internal.clone(),
        })?;
        for fragment in loader.load_multiple(&internal).await {
            if !self.settings().is_primitive(fragment.name()) {
                debug!(fragment = fragment.name(), "internal fragment not enabled");
                summary.skipped += 1;
                continue;
            }
            self.register_fragment(fragment, &mut summary);
        }

        for dir in [&paths.commands, &paths.services, &paths.tasks] {
            for fragment in self.load_directory(&loader, dir).await {
                self.register_fragment(fragment, &mut summary);
            }
        }

        Ok(summary)
    }

    async fn load_directory(&self, loader: &FragmentLoader<'_>, dir: &Path) -> Vec<Fragment> {
        match scan(dir) {
            Some(paths) => loader.load_multiple(&paths).await,
            None => {
                warn!(dir = %dir.display(), "fragment directory unreadable, skipping");
                Vec::new()
            }
        }
    }

    fn register_fragment(&self, fragment: Fragment, summary: &mut LoadSummary) {
        let result = match &fragment {
            Fragment::Command(command) => self.registry().register(command.clone()),
            Fragment::Service(service) => self.services().register(service.clone()),
        };
        match (result, &fragment) {
            (Ok(()), Fragment::Command(_)) => summary.commands += 1,
            (Ok(()), Fragment::Service(_)) => summary.services += 1,
            (Err(e), _) => {
                warn!(fragment = fragment.name(), kind = fragment.kind(), error = %e, "fragment not registered");
                summary.skipped += 1;
            }
        }
    }

    fn start_sweeper(&self) {
        let mut sweeper = self.inner.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let interval = self.settings().cooldowns.sweep_interval();
        let weak: Weak<BotInner> = Arc::downgrade(&self.inner);
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.cooldowns.sweep();
            }
        }));
    }

    /// Called once the transport is connected and knows its guilds.
    pub async fn on_ready(&self, guild_ids: &[Snowflake]) -> Result<()> {
        self.setup_auth_store(guild_ids).await?;
        let started = self.services().start_all(self).await;
        info!(guilds = guild_ids.len(), services = started, "bot ready");
        Ok(())
    }

    /// Reload the authority store and add schema entries for first-seen guilds.
    pub async fn setup_auth_store(&self, guild_ids: &[Snowflake]) -> Result<usize> {
        let auth = self.auth();
        auth.reload().await?;

        let created = guild_ids.iter().filter(|id| auth.create(**id)).count();
        if created > 0 {
            info!(created, "added authority entries for new guilds");
        }
        auth.save().await?;
        Ok(created)
    }

    /// Handle one inbound message. Returns the outcome of every command it invoked.
    pub async fn handle_message(&self, message: InboundMessage) -> Vec<Outcome> {
        self.route(message, false).await
    }

    /// Handle an edited message; ignored unless `update_on_message_edit` is on.
    pub async fn handle_message_update(&self, message: InboundMessage) -> Vec<Outcome> {
        if !self.settings().options.update_on_message_edit {
            return Vec::new();
        }
        self.route(message, true).await
    }

    async fn route(&self, message: InboundMessage, edited: bool) -> Vec<Outcome> {
        if self.is_suspended() {
            return Vec::new();
        }

        let options = &self.settings().options;
        if options.log_messages {
            log_message(&message, edited);
        }

        if message.author.bot && options.ignore_bots {
            return Vec::new();
        }
        if self.host().current_user_id() == Some(message.author.id) {
            return Vec::new();
        }

        if options.prefix_command && message.content.trim() == "?prefix" {
            let prefixes = self.prefixes().join(" ");
            let text = self
                .language()
                .get("prefix.query", &[("prefixes", prefixes.as_str())]);
            if let Err(e) = self.host().send(message.channel_id, &text).await {
                warn!(error = %e, "could not answer prefix query");
            }
            return Vec::new();
        }

        if !CommandParser::validate(&message.content, self.registry(), self.prefixes()) {
            return Vec::new();
        }

        let segments = if options.allow_command_chain {
            CommandParser::split_chain(&message.content, self.prefixes())
        } else {
            vec![message.content.clone()]
        };

        let message = Arc::new(message);
        let mut outcomes = Vec::with_capacity(segments.len());
        for segment in segments {
            if let Some(outcome) = self.handle_command_message(&message, &segment).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Dispatch `content` as one command invocation from `message`.
    ///
    /// Returns `None` when `content` is not a registered command.
    pub async fn handle_command_message(
        &self,
        message: &Arc<InboundMessage>,
        content: &str,
    ) -> Option<Outcome> {
        let parsed = CommandParser::parse(content, self.registry(), self.prefixes())?;

        let authority = match message.guild_id {
            Some(guild_id) => {
                self.auth()
                    .get_authority(guild_id, message.author.id, &message.role_names())
            }
            None => self.auth().get_direct_authority(message.author.id),
        };

        let ctx = CommandContext::new(self.clone(), message.clone(), authority).with_invocation(
            parsed.prefix,
            parsed.label,
            parsed.remainder.clone(),
        );
        Some(CommandHandler::handle(&ctx, &parsed.command, &parsed.remainder).await)
    }

    /// Drop every fragment and load them again from disk.
    pub async fn reload(&self) -> Result<LoadSummary> {
        let commands = self.registry().unregister_all();
        let services = self.services().unregister_all().await;
        debug!(commands, services, "fragments unloaded");

        let language = load_language(self.settings()).await;
        *self.inner.language.write() = Arc::new(language);

        let summary = self.load_fragments().await?;
        self.services().start_all(self).await;
        info!(
            commands = summary.commands,
            services = summary.services,
            "fragments reloaded"
        );
        Ok(summary)
    }

    /// Ignore every inbound message until [`Bot::resume`]
    pub fn suspend(&self) {
        self.inner.suspended.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.suspended.store(false, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::SeqCst)
    }

    /// Stop services and the sweeper, then persist the authority store.
    pub async fn shutdown(&self) -> Result<()> {
        self.suspend();
        self.services().stop_all().await;
        if let Some(sweeper) = self.inner.sweeper.lock().take() {
            sweeper.abort();
        }
        self.auth().save().await?;
        info!("bot shut down");
        Ok(())
    }
}

fn log_message(message: &InboundMessage, edited: bool) {
    let suffix = if edited { " [Edited]" } else { "" };
    match (&message.guild_name, &message.channel_name) {
        (Some(guild), Some(channel)) => info!(
            "[{} @ {} # {}] {}{}",
            message.author.name, guild, channel, message.content, suffix
        ),
        _ => info!(
            "[{} @ DMs] {}{}",
            message.author.name, message.content, suffix
        ),
    }
}
