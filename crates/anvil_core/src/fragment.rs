//! Fragments: the user-authored units the bot loads, commands and services.

pub mod catalog;
pub mod loader;
pub mod manifest;
pub mod template;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::args::{ArgumentSpec, Arguments};
use crate::auth::Constraints;
use crate::context::CommandContext;
use crate::service::Service;
use crate::{CoreError, Result};

pub use catalog::{FragmentCatalog, ServiceFactory};
pub use loader::{FragmentLoader, scan};
pub use manifest::Manifest;
pub use template::TemplateAction;

/// Descriptive metadata shared by every fragment kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl FragmentMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything about a command except the code it runs.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub meta: FragmentMeta,
    pub arguments: Vec<ArgumentSpec>,
    pub constraints: Constraints,
    /// Disabled commands stay registered but refuse to run
    pub enabled: bool,
    /// Hidden from `help`
    pub silent: bool,
    /// Free-form text shown by `usage`
    pub notes: Option<String>,
}

impl CommandDefinition {
    pub fn new(meta: FragmentMeta) -> Self {
        Self {
            meta,
            arguments: Vec::new(),
            constraints: Constraints::default(),
            enabled: true,
            silent: false,
            notes: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<ArgumentSpec>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Check the definition is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let name = &self.meta.name;
        let invalid = |reason: String| CoreError::invalid_fragment(name.clone(), reason);

        if name.trim().is_empty() {
            return Err(invalid("command name is empty".to_string()));
        }
        for key in std::iter::once(name).chain(self.meta.aliases.iter()) {
            if key.trim().is_empty() {
                return Err(invalid("aliases must not be empty".to_string()));
            }
            if key.chars().any(char::is_whitespace) {
                return Err(invalid(format!("'{}' contains whitespace", key)));
            }
        }

        let mut names = HashSet::new();
        let mut shorts = HashSet::new();
        for (index, spec) in self.arguments.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(invalid(format!("argument #{} has no name", index + 1)));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(invalid(format!("argument '{}' is declared twice", spec.name)));
            }
            if let Some(short) = spec.short {
                if !shorts.insert(short) {
                    return Err(invalid(format!("short flag '-{}' is declared twice", short)));
                }
            }
            if spec.variadic && index + 1 != self.arguments.len() {
                return Err(invalid(format!(
                    "variadic argument '{}' must be declared last",
                    spec.name
                )));
            }
        }

        Ok(())
    }
}

/// The code a command runs once its arguments are resolved and constraints pass.
#[async_trait]
pub trait CommandAction: Send + Sync {
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()>;
}

/// Adapter turning an async closure into a [`CommandAction`].
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> CommandAction for FnAction<F>
where
    F: Fn(CommandContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = miette::Result<()>> + Send,
{
    async fn run(&self, ctx: &CommandContext, args: &Arguments) -> miette::Result<()> {
        (self.0)(ctx.clone(), args.clone()).await
    }
}

/// Wrap an async closure as a shareable action.
pub fn action<F, Fut>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(CommandContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = miette::Result<()>> + Send + 'static,
{
    Arc::new(FnAction(f))
}

/// A registered command.
pub struct Command {
    pub definition: CommandDefinition,
    pub action: Arc<dyn CommandAction>,
    /// Manifest the command was loaded from, if any
    pub source: Option<PathBuf>,
}

impl Command {
    pub fn new(definition: CommandDefinition, action: Arc<dyn CommandAction>) -> Self {
        Self {
            definition,
            action,
            source: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.meta.name
    }

    pub fn meta(&self) -> &FragmentMeta {
        &self.definition.meta
    }

    /// Name and aliases, in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.definition.meta.name.as_str())
            .chain(self.definition.meta.aliases.iter().map(String::as_str))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("definition", &self.definition)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A loaded fragment, tagged by kind.
#[derive(Clone)]
pub enum Fragment {
    Command(Arc<Command>),
    Service(Arc<dyn Service>),
}

impl Fragment {
    pub fn meta(&self) -> &FragmentMeta {
        match self {
            Self::Command(command) => command.meta(),
            Self::Service(service) => service.meta(),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Service(_) => "service",
        }
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(match self {
            Self::Command(_) => "Command",
            Self::Service(_) => "Service",
        })
        .field(&self.name())
        .finish()
    }
}
