use async_trait::async_trait;
use miette::miette;
use tracing::info;

use crate::args::Arguments;
use crate::auth::{OWNER_AUTHORITY, display_authority};
use crate::context::CommandContext;
use crate::fragment::CommandAction;
use crate::host::resolve_id;

/// Shows the authority level of a user, the invoker by default.
pub struct AuthCommand;

#[async_trait]
impl CommandAction for AuthCommand {
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()> {
        let author = &ctx.message().author;
        let level = match args.user("user") {
            Some(user) if user.id != author.id => ctx.authority_of(user.id, &user.roles),
            _ => ctx.authority(),
        };
        let name = args.user("user").map_or(author.name.as_str(), |user| user.name.as_str());
        ctx.respond(&format!(
            "`{}` has authority level **{}**.",
            name,
            display_authority(level)
        ))
        .await?;
        Ok(())
    }
}

enum AuthTarget {
    User {
        id: u64,
        name: String,
        roles: Vec<String>,
    },
    Role(String),
}

/// Sets a user's or role's authority level in the current guild and saves the store.
pub struct SetAuthCommand;

impl SetAuthCommand {
    async fn target(ctx: &CommandContext, guild_id: u64, raw: &str) -> Option<AuthTarget> {
        let raw = raw.trim();
        match resolve_id(raw) {
            Some(id) if raw.starts_with("<@&") => ctx
                .host()
                .resolve_role(guild_id, id)
                .await
                .map(|role| AuthTarget::Role(role.name)),
            Some(id) => ctx
                .host()
                .resolve_user(Some(guild_id), id)
                .await
                .map(|user| AuthTarget::User {
                    id: user.id,
                    name: user.name,
                    roles: user.roles,
                }),
            None if raw.is_empty() => None,
            None => Some(AuthTarget::Role(raw.to_string())),
        }
    }
}

#[async_trait]
impl CommandAction for SetAuthCommand {
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()> {
        let Some(guild_id) = ctx.message().guild_id else {
            ctx.fail("Authority levels can only be set in a server.").await?;
            return Ok(());
        };
        let raw = args.text("target").unwrap_or_default();
        let level = args.integer("level").unwrap_or_default();

        let Some(target) = Self::target(ctx, guild_id, raw).await else {
            ctx.fail(&format!("Could not find a user or role matching `{}`.", raw))
                .await?;
            return Ok(());
        };

        let own = ctx.authority();
        if own != OWNER_AUTHORITY && level >= own {
            ctx.fail(&format!(
                "You can only grant levels below your own ({}).",
                own
            ))
            .await?;
            return Ok(());
        }

        let auth = ctx.bot().auth();
        let label = match target {
            AuthTarget::User { id, name, roles } => {
                if own != OWNER_AUTHORITY && ctx.authority_of(id, &roles) >= own {
                    ctx.fail(&format!("`{}` is not below your authority.", name))
                        .await?;
                    return Ok(());
                }
                auth.set_user_authority(guild_id, id, level);
                name
            }
            AuthTarget::Role(role) => {
                auth.set_role_authority(guild_id, role.clone(), level);
                role
            }
        };
        auth.save().await?;

        info!(guild = guild_id, target = %label, level, "authority changed");
        ctx.ok(&format!("Authority of `{}` is now **{}**.", label, level))
            .await?;
        Ok(())
    }
}

/// Lists registered services and whether they are running.
pub struct ReflectCommand;

#[async_trait]
impl CommandAction for ReflectCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        let bot = ctx.bot();
        let uptime = chrono::Utc::now() - bot.started_at();
        let mut lines = vec![format!(
            "Up for {}h {}m. {} commands loaded.",
            uptime.num_hours(),
            uptime.num_minutes() % 60,
            bot.registry().len()
        )];

        let services = bot.services().all();
        if services.is_empty() {
            lines.push("No services are registered.".to_string());
        } else {
            lines.push("**Services**".to_string());
            for service in services {
                let state = if service.is_running() {
                    "running"
                } else {
                    "stopped"
                };
                lines.push(format!("`{}`: {}", service.meta().name, state));
            }
        }
        ctx.respond(&lines.join("\n")).await?;
        Ok(())
    }
}

/// Reloads every fragment from disk.
pub struct RestartCommand;

#[async_trait]
impl CommandAction for RestartCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        let summary = ctx.bot().reload().await?;
        ctx.ok(&format!(
            "Reloaded {} commands and {} services.",
            summary.commands, summary.services
        ))
        .await?;
        Ok(())
    }
}

/// Always fails, for checking that faults are reported and contained.
pub struct ThrowCommand;

#[async_trait]
impl CommandAction for ThrowCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        Err(miette!(
            "deliberate failure requested by {}",
            ctx.message().author.name
        ))
    }
}
