//! On-disk TOML shape of a fragment module.
//!
//! ```toml
//! [meta]
//! name = "warn"
//! aliases = ["w"]
//!
//! [[arguments]]
//! name = "user"
//! type = "user"
//! required = true
//!
//! [constraints]
//! cooldown = 5
//! environment = "guild"
//!
//! [run]
//! handler = "moderation.warn"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CommandDefinition, FragmentMeta};
use crate::args::{ArgType, ArgumentSpec, ContextDefault, DefaultValue};
use crate::auth::{ChatEnvironment, Constraints, SpecificTarget};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    pub meta: Option<MetaSection>,
    #[serde(default)]
    pub arguments: Vec<ArgumentSection>,
    #[serde(default)]
    pub constraints: ConstraintSection,
    pub run: Option<RunSection>,
    pub service: Option<ServiceSection>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetaSection {
    #[serde(flatten)]
    pub meta: FragmentMeta,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArgumentSection {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub short: Option<char>,
    /// Literal default, coerced like user input
    #[serde(default)]
    pub default: Option<toml::Value>,
    /// `author` or `channel`
    #[serde(default)]
    pub default_from: Option<String>,
}

fn default_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConstraintSection {
    /// Seconds
    #[serde(default)]
    pub cooldown: u64,
    #[serde(default)]
    pub environment: ChatEnvironment,
    #[serde(default)]
    pub specific: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub owner_only: bool,
    #[serde(default)]
    pub min_authority: Option<i64>,
    #[serde(default)]
    pub issuer_permissions: Vec<String>,
    #[serde(default)]
    pub self_permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunSection {
    /// Name of a compiled-in handler
    pub handler: Option<String>,
    /// Response template with `{argument}` placeholders
    pub respond: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceSection {
    pub kind: String,
    #[serde(default)]
    pub options: toml::Table,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Build the command definition, reporting the first invalid field.
    pub fn command_definition(&self) -> Result<CommandDefinition, String> {
        let meta = self
            .meta
            .as_ref()
            .ok_or_else(|| "missing [meta] section".to_string())?;

        let arguments = self
            .arguments
            .iter()
            .map(ArgumentSection::to_spec)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommandDefinition {
            meta: meta.meta.clone(),
            arguments,
            constraints: self.constraints.to_constraints()?,
            enabled: meta.enabled,
            silent: meta.silent,
            notes: meta.notes.clone(),
        })
    }
}

impl ArgumentSection {
    pub fn to_spec(&self) -> Result<ArgumentSpec, String> {
        let mut spec = ArgumentSpec::new(self.name.clone(), ArgType::from_name(&self.kind))
            .describe(self.description.clone());
        spec.required = self.required;
        spec.variadic = self.variadic;
        spec.short = self.short;

        spec.default = match (&self.default, self.default_from.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "argument '{}' sets both default and default_from",
                    self.name
                ));
            }
            (Some(toml::Value::String(s)), None) => Some(DefaultValue::Literal(s.clone())),
            (Some(other), None) => Some(DefaultValue::Literal(other.to_string())),
            (None, Some(from)) => Some(DefaultValue::Contextual(match from {
                "author" | "user" => ContextDefault::Author,
                "channel" => ContextDefault::Channel,
                other => {
                    return Err(format!(
                        "argument '{}' has unknown default_from '{}'",
                        self.name, other
                    ));
                }
            })),
            (None, None) => None,
        };

        Ok(spec)
    }
}

impl ConstraintSection {
    pub fn to_constraints(&self) -> Result<Constraints, String> {
        let parse_targets = |entries: &[String]| {
            entries
                .iter()
                .map(|entry| entry.parse::<SpecificTarget>())
                .collect::<Result<Vec<_>, _>>()
        };

        let mut specific = parse_targets(&self.specific)?;
        if self.owner_only && !specific.contains(&SpecificTarget::BotOwner) {
            specific.push(SpecificTarget::BotOwner);
        }

        Ok(Constraints {
            cooldown: Duration::from_secs(self.cooldown),
            environment: self.environment,
            specific,
            deny: parse_targets(&self.deny)?,
            min_authority: self.min_authority,
            issuer_permissions: self.issuer_permissions.clone(),
            self_permissions: self.self_permissions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const WARN: &str = r#"
        [meta]
        name = "warn"
        description = "Warn a user"
        aliases = ["w"]

        [[arguments]]
        name = "user"
        type = "user"
        required = true

        [[arguments]]
        name = "reason"
        required = true
        variadic = true

        [constraints]
        cooldown = 5
        environment = "guild"
        specific = ["@285578743324606482", "&458130451572457483"]
        issuer_permissions = ["KICK_MEMBERS"]

        [run]
        handler = "moderation.warn"
    "#;

    #[test]
    fn test_command_manifest() {
        let manifest = Manifest::parse(WARN).unwrap();
        let definition = manifest.command_definition().unwrap();

        assert_eq!(definition.meta.name, "warn");
        assert_eq!(definition.meta.aliases, vec!["w"]);
        assert!(definition.enabled);
        assert_eq!(definition.arguments.len(), 2);
        assert_eq!(definition.arguments[0].kind, ArgType::User);
        assert_eq!(definition.arguments[1].kind, ArgType::Text);
        assert!(definition.arguments[1].variadic);
        assert_eq!(
            definition.constraints,
            Constraints {
                cooldown: Duration::from_secs(5),
                environment: ChatEnvironment::Guild,
                specific: vec![
                    SpecificTarget::User(285578743324606482),
                    SpecificTarget::Role(458130451572457483),
                ],
                deny: vec![],
                min_authority: None,
                issuer_permissions: vec!["KICK_MEMBERS".to_string()],
                self_permissions: vec![],
            }
        );
        assert_eq!(
            manifest.run.and_then(|r| r.handler).as_deref(),
            Some("moderation.warn")
        );
    }

    #[test]
    fn test_defaults() {
        let manifest = Manifest::parse(
            r#"
            [meta]
            name = "roll"
            [[arguments]]
            name = "sides"
            type = "integer"
            default = 6
            [[arguments]]
            name = "who"
            type = "user"
            default_from = "author"
            [run]
            respond = "{who} rolled a d{sides}"
            "#,
        )
        .unwrap();
        let definition = manifest.command_definition().unwrap();

        assert!(matches!(
            &definition.arguments[0].default,
            Some(DefaultValue::Literal(s)) if s == "6"
        ));
        assert!(matches!(
            definition.arguments[1].default,
            Some(DefaultValue::Contextual(ContextDefault::Author))
        ));
    }

    #[test]
    fn test_invalid_target_is_reported() {
        let manifest = Manifest::parse(
            r#"
            [meta]
            name = "x"
            [constraints]
            specific = ["nobody"]
            [run]
            respond = "x"
            "#,
        )
        .unwrap();
        assert!(manifest.command_definition().is_err());
    }

    #[test]
    fn test_service_manifest() {
        let manifest = Manifest::parse(
            r#"
            [meta]
            name = "heartbeat"
            [service]
            kind = "interval-message"
            [service.options]
            channel = 100
            interval_secs = 60
            message = "still here"
            "#,
        )
        .unwrap();

        let service = manifest.service.unwrap();
        assert_eq!(service.kind, "interval-message");
        assert_eq!(service.options.get("interval_secs").and_then(|v| v.as_integer()), Some(60));
        assert!(manifest.run.is_none());
    }
}
