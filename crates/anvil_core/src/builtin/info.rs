use async_trait::async_trait;

use crate::args::{Arguments, usage_line};
use crate::auth::display_authority;
use crate::context::CommandContext;
use crate::fragment::{Command, CommandAction};

/// Lists every visible command, by direct message when `dm_help` is on.
pub struct HelpCommand;

#[async_trait]
impl CommandAction for HelpCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        let mut lines = vec!["**Commands**".to_string()];
        for command in ctx.bot().registry().commands() {
            if command.definition.silent || !command.definition.enabled {
                continue;
            }
            let description = &command.meta().description;
            if description.is_empty() {
                lines.push(format!("`{}{}`", ctx.prefix(), command.name()));
            } else {
                lines.push(format!("`{}{}`: {}", ctx.prefix(), command.name(), description));
            }
        }
        lines.push(format!(
            "Use `{}usage <command>` for details.",
            ctx.prefix()
        ));
        let text = lines.join("\n");

        if ctx.settings().options.dm_help && !ctx.is_direct() {
            ctx.private_reply(&text).await?;
            ctx.ok("Sent you a list of commands.").await?;
        } else {
            ctx.respond(&text).await?;
        }
        Ok(())
    }
}

/// Describes one command in detail.
pub struct UsageCommand;

#[async_trait]
impl CommandAction for UsageCommand {
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()> {
        let name = args.text("command").unwrap_or_default();
        let name = name.strip_prefix(ctx.prefix()).unwrap_or(name);
        match ctx.bot().registry().get(name) {
            Some(command) => {
                ctx.respond(&describe(&command, ctx.prefix())).await?;
            }
            None => {
                ctx.fail(&format!("There is no command called `{}`.", name))
                    .await?;
            }
        }
        Ok(())
    }
}

pub(crate) fn describe(command: &Command, prefix: &str) -> String {
    let definition = &command.definition;
    let meta = &definition.meta;
    let mut lines = vec![format!("**{}**", meta.name)];

    if !meta.description.is_empty() {
        lines.push(meta.description.clone());
    }
    lines.push(format!(
        "Usage: `{}{}`",
        prefix,
        usage_line(&meta.name, &definition.arguments)
    ));
    if !meta.aliases.is_empty() {
        lines.push(format!("Aliases: {}", meta.aliases.join(", ")));
    }
    if !definition.constraints.cooldown.is_zero() {
        lines.push(format!(
            "Cooldown: {}s",
            definition.constraints.cooldown.as_secs()
        ));
    }
    if let Some(level) = definition.constraints.min_authority {
        lines.push(format!("Authority: {}", display_authority(level)));
    }
    for spec in &definition.arguments {
        let mut line = format!("  `{}` ({})", spec.name, spec.kind);
        if spec.required {
            line.push_str(", required");
        }
        if let Some(default) = &spec.default {
            line.push_str(&format!(", default {}", default));
        }
        if !spec.description.is_empty() {
            line.push_str(&format!(": {}", spec.description));
        }
        lines.push(line);
    }
    if let Some(notes) = &definition.notes {
        lines.push(format!("Notes: {}", notes));
    }
    lines.join("\n")
}

pub struct PingCommand;

#[async_trait]
impl CommandAction for PingCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        let started = std::time::Instant::now();
        ctx.respond("Pong!").await?;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "ping answered");
        Ok(())
    }
}

/// Same answer as the `?prefix` query, as a regular command.
pub struct PrefixCommand;

#[async_trait]
impl CommandAction for PrefixCommand {
    async fn run(&self, ctx: &CommandContext, _args: &Arguments) -> miette::Result<()> {
        let prefixes = ctx.bot().prefixes().join(" ");
        let text = ctx
            .bot()
            .language()
            .get("prefix.query", &[("prefixes", prefixes.as_str())]);
        ctx.respond(&text).await?;
        Ok(())
    }
}
