use tracing::{debug, warn};

use super::{Constraints, CooldownReservation, CooldownTracker};
use crate::context::CommandContext;
use crate::error::{ConstraintFailure, PermissionSubject};
use crate::fragment::Command;
use crate::host::{ChatHost, InboundMessage, Snowflake};

/// Evaluates a command's declared constraints against one invocation.
///
/// Checks run in a fixed order and stop at the first failure: environment,
/// allow/deny lists and minimum authority, cooldown, then issuer and bot
/// permissions. The owner passes `owner` list entries and has maximal
/// authority, but cooldowns and permissions still apply.
///
/// A passing check claims the cooldown window; the caller settles the
/// returned reservation once the command has run.
pub struct ConstraintChecker<'a> {
    cooldowns: &'a CooldownTracker,
    owner: Option<Snowflake>,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(cooldowns: &'a CooldownTracker, owner: Option<Snowflake>) -> Self {
        Self { cooldowns, owner }
    }

    pub async fn check(
        &self,
        ctx: &CommandContext,
        command: &Command,
    ) -> Result<Option<CooldownReservation>, ConstraintFailure> {
        let constraints = &command.definition.constraints;
        let message = ctx.message();

        if !constraints.environment.permits(message) {
            return Err(ConstraintFailure::WrongEnvironment {
                required: constraints.environment,
            });
        }

        self.check_identity(constraints, message, ctx.authority())?;

        let reservation = self
            .cooldowns
            .try_acquire(message.author.id, command.name(), constraints.cooldown)
            .map_err(ConstraintFailure::on_cooldown)?;

        if let Err(failure) = check_permissions(constraints, message, ctx.host()).await {
            if let Some(reservation) = reservation {
                self.cooldowns.release(reservation);
            }
            return Err(failure);
        }
        Ok(reservation)
    }

    fn check_identity(
        &self,
        constraints: &Constraints,
        message: &InboundMessage,
        authority: i64,
    ) -> Result<(), ConstraintFailure> {
        if !constraints.specific.is_empty()
            && !constraints
                .specific
                .iter()
                .any(|target| target.matches(message, self.owner))
        {
            return Err(ConstraintFailure::NotPermitted);
        }

        if let Some(target) = constraints
            .deny
            .iter()
            .find(|target| target.matches(message, self.owner))
        {
            debug!(%target, user = message.author.id, "invocation matched deny list");
            return Err(ConstraintFailure::NotPermitted);
        }

        match constraints.min_authority {
            Some(required) if authority < required => {
                Err(ConstraintFailure::InsufficientAuthority {
                    required,
                    actual: authority,
                })
            }
            _ => Ok(()),
        }
    }
}

async fn check_permissions(
    constraints: &Constraints,
    message: &InboundMessage,
    host: &dyn ChatHost,
) -> Result<(), ConstraintFailure> {
    if constraints.issuer_permissions.is_empty() && constraints.self_permissions.is_empty() {
        return Ok(());
    }

    // Direct messages carry no guild permission model
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    if !constraints.issuer_permissions.is_empty() {
        let granted = granted_permissions(host, guild_id, message.channel_id, message.author.id)
            .await;
        missing_permission(&constraints.issuer_permissions, &granted, PermissionSubject::Issuer)?;
    }

    if !constraints.self_permissions.is_empty() {
        let granted = match host.current_user_id() {
            Some(bot_id) => granted_permissions(host, guild_id, message.channel_id, bot_id).await,
            None => {
                warn!("bot user id unknown, treating bot permissions as empty");
                Vec::new()
            }
        };
        missing_permission(&constraints.self_permissions, &granted, PermissionSubject::Bot)?;
    }

    Ok(())
}

async fn granted_permissions(
    host: &dyn ChatHost,
    guild_id: Snowflake,
    channel_id: Snowflake,
    user_id: Snowflake,
) -> Vec<String> {
    match host.permissions(guild_id, channel_id, user_id).await {
        Ok(granted) => granted.iter().map(|p| normalize_permission(p)).collect(),
        Err(e) => {
            warn!(error = %e, user = user_id, guild = guild_id, "permission lookup failed");
            Vec::new()
        }
    }
}

fn missing_permission(
    required: &[String],
    granted: &[String],
    subject: PermissionSubject,
) -> Result<(), ConstraintFailure> {
    if granted.iter().any(|p| p == "ADMINISTRATOR") {
        return Ok(());
    }
    match required
        .iter()
        .find(|needed| !granted.contains(&normalize_permission(needed)))
    {
        Some(permission) => Err(ConstraintFailure::InsufficientPermissions {
            permission: permission.clone(),
            subject,
        }),
        None => Ok(()),
    }
}

/// `kick members`, `Kick-Members` and `KICK_MEMBERS` name the same permission.
pub fn normalize_permission(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
