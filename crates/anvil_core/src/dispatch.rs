//! Runs one parsed invocation through argument resolution, constraints and execution.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, Span, debug, error, field, info_span, warn};
use uuid::Uuid;

use crate::args::{ArgumentResolver, ResolveContext, tokenize, usage_line};
use crate::auth::{ConstraintChecker, display_authority};
use crate::context::CommandContext;
use crate::error::{ArgumentError, ConstraintFailure, PermissionSubject};
use crate::fragment::Command;

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Parsed,
    ArgsResolved,
    AuthCleared,
    Executing,
    Completed,
    Failed,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::ArgsResolved => "args_resolved",
            Self::AuthCleared => "auth_cleared",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Disabled,
    ArgumentsRejected(ArgumentError),
    ConstraintsRejected(ConstraintFailure),
    /// The action returned an error or panicked
    Faulted { message: String },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn state(&self) -> DispatchState {
        match self {
            Self::Completed => DispatchState::Completed,
            _ => DispatchState::Failed,
        }
    }
}

/// The dispatcher.
///
/// Every failure is reported to the invoking channel at most once and never
/// escapes `handle`.
pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle(ctx: &CommandContext, command: &Arc<Command>, raw_arguments: &str) -> Outcome {
        let span = info_span!(
            "dispatch",
            command = %command.name(),
            user = ctx.message().author.id,
            invocation = %Uuid::new_v4(),
            state = field::Empty,
        );

        async {
            let outcome = Self::run(ctx, command, raw_arguments).await;
            advance(outcome.state());
            debug!(outcome = ?outcome, "dispatch finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(ctx: &CommandContext, command: &Arc<Command>, raw_arguments: &str) -> Outcome {
        advance(DispatchState::Received);
        let definition = &command.definition;

        if !definition.enabled {
            report(ctx, "failure.disabled", &[]).await;
            return Outcome::Disabled;
        }

        let tokens = tokenize(raw_arguments, &definition.arguments);
        advance(DispatchState::Parsed);

        let bot = ctx.bot();
        let resolve_ctx = ResolveContext {
            message: ctx.message(),
            host: ctx.host(),
            types: bot.argument_types(),
            command: command.name(),
        };
        let arguments =
            match ArgumentResolver::resolve(&tokens, &definition.arguments, &resolve_ctx).await {
                Ok(arguments) => arguments,
                Err(e) => {
                    debug!(error = %e, "arguments rejected");
                    report_argument_error(ctx, command, &e).await;
                    return Outcome::ArgumentsRejected(e);
                }
            };
        advance(DispatchState::ArgsResolved);

        let reservation = match ConstraintChecker::new(bot.cooldowns(), bot.owner())
            .check(ctx, command)
            .await
        {
            Ok(reservation) => reservation,
            Err(failure) => {
                debug!(failure = %failure, "constraints rejected invocation");
                report_constraint_failure(ctx, &failure).await;
                return Outcome::ConstraintsRejected(failure);
            }
        };
        advance(DispatchState::AuthCleared);

        advance(DispatchState::Executing);
        let result = AssertUnwindSafe(command.action.run(ctx, &arguments))
            .catch_unwind()
            .await;

        let message = match result {
            Ok(Ok(())) => {
                if let Some(reservation) = reservation {
                    bot.cooldowns().confirm(reservation);
                }
                return Outcome::Completed;
            }
            Ok(Err(report)) => format!("{}", report),
            Err(panic) => panic_message(panic.as_ref()),
        };
        // Only success keeps the window
        if let Some(reservation) = reservation {
            bot.cooldowns().release(reservation);
        }

        error!(error = %message, "command handler failed");
        if ctx.has_responded() {
            debug!("handler already responded, apology suppressed");
        } else {
            report(ctx, "command.fault", &[]).await;
        }
        Outcome::Faulted { message }
    }
}

fn advance(state: DispatchState) {
    Span::current().record("state", state.as_str());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

async fn report(ctx: &CommandContext, key: &str, vars: &[(&str, &str)]) {
    let text = ctx.bot().language().get(key, vars);
    if let Err(e) = ctx.fail(&text).await {
        warn!(error = %e, "could not report failure to channel");
    }
}

async fn report_argument_error(ctx: &CommandContext, command: &Command, error: &ArgumentError) {
    match error {
        ArgumentError::MissingRequiredArgument { name } => {
            let label = if ctx.label().is_empty() {
                command.name()
            } else {
                ctx.label()
            };
            let usage = format!(
                "{}{}",
                ctx.prefix(),
                usage_line(label, &command.definition.arguments)
            );
            report(
                ctx,
                "argument.missing",
                &[("argument", name.as_str()), ("usage", usage.as_str())],
            )
            .await
        }
        ArgumentError::InvalidArgumentType {
            name,
            expected,
            provided,
        } => {
            report(
                ctx,
                "argument.invalid",
                &[
                    ("argument", name.as_str()),
                    ("expected", expected.as_str()),
                    ("provided", provided.as_str()),
                ],
            )
            .await
        }
        ArgumentError::UnresolvedReference {
            name,
            kind,
            provided,
        } => {
            report(
                ctx,
                "argument.unresolved",
                &[
                    ("argument", name.as_str()),
                    ("kind", kind.as_str()),
                    ("provided", provided.as_str()),
                ],
            )
            .await
        }
        ArgumentError::CustomResolverFailed {
            name,
            type_name,
            reason,
        } => {
            report(
                ctx,
                "argument.custom",
                &[
                    ("argument", name.as_str()),
                    ("type", type_name.as_str()),
                    ("reason", reason.as_str()),
                ],
            )
            .await
        }
        ArgumentError::UnknownArgumentType { name, type_name } => {
            report(
                ctx,
                "argument.unknown_type",
                &[("argument", name.as_str()), ("type", type_name.as_str())],
            )
            .await
        }
    }
}

async fn report_constraint_failure(ctx: &CommandContext, failure: &ConstraintFailure) {
    match failure {
        ConstraintFailure::Disabled => report(ctx, "failure.disabled", &[]).await,
        ConstraintFailure::WrongEnvironment { required } => {
            let environment = required.to_string();
            report(
                ctx,
                "failure.environment",
                &[("environment", environment.as_str())],
            )
            .await
        }
        ConstraintFailure::NotPermitted => report(ctx, "failure.not_permitted", &[]).await,
        ConstraintFailure::InsufficientAuthority { required, actual } => {
            let required = display_authority(*required);
            let actual = display_authority(*actual);
            report(
                ctx,
                "failure.authority",
                &[("required", required.as_str()), ("actual", actual.as_str())],
            )
            .await
        }
        ConstraintFailure::OnCooldown { remaining_secs } => {
            let seconds = remaining_secs.to_string();
            report(ctx, "failure.cooldown", &[("seconds", seconds.as_str())]).await
        }
        ConstraintFailure::InsufficientPermissions {
            permission,
            subject,
        } => {
            let key = match subject {
                PermissionSubject::Issuer => "failure.permission.issuer",
                PermissionSubject::Bot => "failure.permission.bot",
            };
            report(ctx, key, &[("permission", permission.as_str())]).await
        }
    }
}
