//! Binds tokens to a command's argument schema and coerces them to typed values.

use tracing::debug;

use super::{
    ArgType, ArgValue, ArgumentSpec, ArgumentTypes, Arguments, ContextDefault, DefaultContext,
    DefaultValue, Token, translate_state,
};
use crate::error::ArgumentError;
use crate::host::{ChannelRef, ChatHost, InboundMessage, UserRef, resolve_id};

/// Everything argument resolution may consult besides the tokens themselves.
pub struct ResolveContext<'a> {
    pub message: &'a InboundMessage,
    pub host: &'a dyn ChatHost,
    pub types: &'a ArgumentTypes,
    /// Name of the command being resolved for
    pub command: &'a str,
}

enum Binding {
    Value(String),
    /// A flag passed without a value
    Present,
}

/// Stateless resolver; see [`ArgumentResolver::resolve`].
pub struct ArgumentResolver;

impl ArgumentResolver {
    /// Map `tokens` onto `schema`.
    ///
    /// Flags bind first, then positionals fill the remaining entries in
    /// declared order. Missing required arguments are reported before any
    /// coercion, naming the first one in schema order.
    pub async fn resolve(
        tokens: &[Token],
        schema: &[ArgumentSpec],
        ctx: &ResolveContext<'_>,
    ) -> Result<Arguments, ArgumentError> {
        let mut arguments = Arguments::new();
        let mut bindings: Vec<Option<Binding>> = schema.iter().map(|_| None).collect();

        for token in tokens {
            if let Token::Flag { name, short, value } = token {
                let index = if *short {
                    let mut letters = name.chars();
                    match (letters.next(), letters.next()) {
                        (Some(letter), None) => schema.iter().position(|s| s.short == Some(letter)),
                        _ => None,
                    }
                } else {
                    schema.iter().position(|s| s.name == *name)
                };

                match index {
                    Some(i) if bindings[i].is_none() => {
                        bindings[i] = Some(match value {
                            Some(v) => Binding::Value(v.clone()),
                            None => Binding::Present,
                        });
                    }
                    Some(_) => debug!(flag = %name, "ignoring repeated flag"),
                    None => arguments.insert_extra_flag(name.clone(), value.clone()),
                }
            }
        }

        let mut positionals = tokens.iter().filter_map(|t| match t {
            Token::Positional(p) => Some(p.clone()),
            Token::Flag { .. } => None,
        });

        for (spec, binding) in schema.iter().zip(bindings.iter_mut()) {
            if binding.is_some() {
                continue;
            }
            if spec.variadic {
                let rest: Vec<String> = positionals.by_ref().collect();
                if !rest.is_empty() {
                    *binding = Some(Binding::Value(rest.join(" ")));
                }
                continue;
            }
            match positionals.next() {
                Some(value) => *binding = Some(Binding::Value(value)),
                None => break,
            }
        }

        for extra in positionals {
            arguments.push_extra_positional(extra);
        }

        if let Some(spec) = schema
            .iter()
            .zip(bindings.iter())
            .find(|(spec, binding)| binding.is_none() && spec.required && spec.default.is_none())
            .map(|(spec, _)| spec)
        {
            return Err(ArgumentError::MissingRequiredArgument {
                name: spec.name.clone(),
            });
        }

        for (spec, binding) in schema.iter().zip(bindings) {
            let value = match binding {
                Some(Binding::Value(raw)) => Some(coerce(spec, &raw, ctx).await?),
                Some(Binding::Present) => {
                    if spec.kind == ArgType::Boolean {
                        Some(ArgValue::Boolean(true))
                    } else {
                        return Err(ArgumentError::InvalidArgumentType {
                            name: spec.name.clone(),
                            expected: spec.kind.to_string(),
                            provided: format!("--{}", spec.name),
                        });
                    }
                }
                None => match &spec.default {
                    Some(default) => resolve_default(spec, default, ctx).await?,
                    None => None,
                },
            };

            if let Some(value) = value {
                arguments.insert(spec.name.clone(), value);
            }
        }

        Ok(arguments)
    }
}

async fn resolve_default(
    spec: &ArgumentSpec,
    default: &DefaultValue,
    ctx: &ResolveContext<'_>,
) -> Result<Option<ArgValue>, ArgumentError> {
    match default {
        DefaultValue::Literal(raw) => coerce(spec, raw, ctx).await.map(Some),
        DefaultValue::Contextual(ContextDefault::Author) => Ok(Some(ArgValue::User(UserRef {
            id: ctx.message.author.id,
            name: ctx.message.author.name.clone(),
            bot: ctx.message.author.bot,
            roles: ctx.message.role_names(),
        }))),
        DefaultValue::Contextual(ContextDefault::Channel) => Ok(Some(ArgValue::Channel(ChannelRef {
            id: ctx.message.channel_id,
            name: ctx.message.channel_name.clone().unwrap_or_default(),
            guild_id: ctx.message.guild_id,
        }))),
        DefaultValue::Computed(compute) => Ok(compute(&DefaultContext {
            message: ctx.message,
            command: ctx.command,
        })),
    }
}

async fn coerce(
    spec: &ArgumentSpec,
    raw: &str,
    ctx: &ResolveContext<'_>,
) -> Result<ArgValue, ArgumentError> {
    let invalid = || ArgumentError::InvalidArgumentType {
        name: spec.name.clone(),
        expected: spec.kind.to_string(),
        provided: raw.to_string(),
    };
    let unresolved = |kind: &str| ArgumentError::UnresolvedReference {
        name: spec.name.clone(),
        kind: kind.to_string(),
        provided: raw.to_string(),
    };

    match &spec.kind {
        ArgType::Text => Ok(ArgValue::Text(raw.to_string())),
        ArgType::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ArgValue::Number)
            .ok_or_else(invalid),
        ArgType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(ArgValue::Integer)
            .map_err(|_| invalid()),
        ArgType::Boolean => translate_state(raw)
            .map(ArgValue::Boolean)
            .ok_or_else(invalid),
        ArgType::User => {
            let id = resolve_id(raw).ok_or_else(|| unresolved("user"))?;
            ctx.host
                .resolve_user(ctx.message.guild_id, id)
                .await
                .map(ArgValue::User)
                .ok_or_else(|| unresolved("user"))
        }
        ArgType::Channel => {
            let id = resolve_id(raw).ok_or_else(|| unresolved("channel"))?;
            ctx.host
                .resolve_channel(ctx.message.guild_id, id)
                .await
                .map(ArgValue::Channel)
                .ok_or_else(|| unresolved("channel"))
        }
        ArgType::Role => {
            let guild_id = ctx.message.guild_id.ok_or_else(|| unresolved("role"))?;
            let id = resolve_id(raw).ok_or_else(|| unresolved("role"))?;
            ctx.host
                .resolve_role(guild_id, id)
                .await
                .map(ArgValue::Role)
                .ok_or_else(|| unresolved("role"))
        }
        ArgType::Custom(type_name) => {
            let resolver =
                ctx.types
                    .get(type_name)
                    .ok_or_else(|| ArgumentError::UnknownArgumentType {
                        name: spec.name.clone(),
                        type_name: type_name.clone(),
                    })?;
            resolver
                .resolve(raw, ctx)
                .await
                .map_err(|reason| ArgumentError::CustomResolverFailed {
                    name: spec.name.clone(),
                    type_name: type_name.clone(),
                    reason,
                })
        }
    }
}
