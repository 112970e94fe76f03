use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::auth::ChatEnvironment;

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Failed to load fragment")]
    #[diagnostic(
        code(anvil_core::load_error),
        help("Fragment at {} was skipped: {reason}", path.display())
    )]
    LoadError { path: PathBuf, reason: String },

    #[error("Fragment key already registered")]
    #[diagnostic(
        code(anvil_core::registration_conflict),
        help("'{key}' is already claimed by command '{existing}'")
    )]
    RegistrationConflict {
        key: String,
        existing: String,
        rejected: String,
    },

    #[error("Invalid fragment definition")]
    #[diagnostic(code(anvil_core::invalid_fragment), help("{reason}"))]
    InvalidFragment { name: String, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(#[from] ConstraintFailure),

    #[error("Command '{command}' failed while executing")]
    #[diagnostic(
        code(anvil_core::handler_fault),
        help("The command's handler returned an error or panicked: {message}")
    )]
    HandlerFault { command: String, message: String },

    #[error("Configuration error")]
    #[diagnostic(
        code(anvil_core::configuration_error),
        help("Check configuration file at {config_path}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Authority store operation failed")]
    #[diagnostic(
        code(anvil_core::auth_store_error),
        help("Could not {operation} the authority store at {}", path.display())
    )]
    AuthStoreError {
        path: PathBuf,
        operation: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Internal fragments directory is unavailable")]
    #[diagnostic(
        code(anvil_core::internal_fragments_unavailable),
        help(
            "The directory {} could not be read; the bot cannot start without its internal fragments",
            path.display()
        )
    )]
    InternalFragmentsUnavailable { path: PathBuf },

    #[error("Service '{service}' failed")]
    #[diagnostic(code(anvil_core::service_error), help("Service {operation} failed: {reason}"))]
    ServiceError {
        service: String,
        operation: String,
        reason: String,
    },

    #[error("Transport operation failed")]
    #[diagnostic(
        code(anvil_core::transport_error),
        help("The chat transport could not {operation}")
    )]
    TransportError {
        operation: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Language file error")]
    #[diagnostic(
        code(anvil_core::language_error),
        help("Could not load language table from {}: {reason}", path.display())
    )]
    LanguageError { path: PathBuf, reason: String },
}

/// Failures while turning raw tokens into typed arguments.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("Missing required argument `{name}`")]
    #[diagnostic(code(anvil_core::args::missing_required))]
    MissingRequiredArgument { name: String },

    #[error("Argument `{name}` expects {expected}, got `{provided}`")]
    #[diagnostic(code(anvil_core::args::invalid_type))]
    InvalidArgumentType {
        name: String,
        expected: String,
        provided: String,
    },

    #[error("Could not find the {kind} `{provided}` for argument `{name}`")]
    #[diagnostic(code(anvil_core::args::unresolved_reference))]
    UnresolvedReference {
        name: String,
        kind: String,
        provided: String,
    },

    #[error("Argument `{name}` is not a valid {type_name}: {reason}")]
    #[diagnostic(code(anvil_core::args::custom_resolver_failed))]
    CustomResolverFailed {
        name: String,
        type_name: String,
        reason: String,
    },

    #[error("Argument `{name}` uses unknown type `{type_name}`")]
    #[diagnostic(
        code(anvil_core::args::unknown_type),
        help("Register the type with BotBuilder::with_argument_type before loading fragments")
    )]
    UnknownArgumentType { name: String, type_name: String },
}

impl ArgumentError {
    /// The argument the error is about.
    pub fn argument(&self) -> &str {
        match self {
            Self::MissingRequiredArgument { name }
            | Self::InvalidArgumentType { name, .. }
            | Self::UnresolvedReference { name, .. }
            | Self::CustomResolverFailed { name, .. }
            | Self::UnknownArgumentType { name, .. } => name,
        }
    }
}

/// Which side of the invocation a permission check was evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionSubject {
    Issuer,
    Bot,
}

impl std::fmt::Display for PermissionSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issuer => write!(f, "you"),
            Self::Bot => write!(f, "the bot"),
        }
    }
}

/// A declared command constraint that rejected an invocation.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ConstraintFailure {
    #[error("This command is disabled")]
    #[diagnostic(code(anvil_core::constraint::disabled))]
    Disabled,

    #[error("This command can only be used in {required}")]
    #[diagnostic(code(anvil_core::constraint::wrong_environment))]
    WrongEnvironment { required: ChatEnvironment },

    #[error("You are not permitted to use this command")]
    #[diagnostic(code(anvil_core::constraint::not_permitted))]
    NotPermitted,

    #[error("This command requires authority {required}, you have {actual}")]
    #[diagnostic(code(anvil_core::constraint::insufficient_authority))]
    InsufficientAuthority { required: i64, actual: i64 },

    #[error("This command is on cooldown for {remaining_secs} more second(s)")]
    #[diagnostic(code(anvil_core::constraint::on_cooldown))]
    OnCooldown { remaining_secs: u64 },

    #[error("{subject} must have the `{permission}` permission")]
    #[diagnostic(code(anvil_core::constraint::insufficient_permissions))]
    InsufficientPermissions {
        permission: String,
        subject: PermissionSubject,
    },
}

impl ConstraintFailure {
    /// Cooldown failure for a remaining window, rounded up to whole seconds.
    pub fn on_cooldown(remaining: Duration) -> Self {
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        Self::OnCooldown {
            remaining_secs: secs,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn load_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LoadError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_fragment(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFragment {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(
        operation: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransportError {
            operation: operation.into(),
            cause: Box::new(cause),
        }
    }

    pub fn auth_store(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::AuthStoreError {
            path: path.into(),
            operation: operation.into(),
            cause: Box::new(cause),
        }
    }

    pub fn configuration(
        config_path: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigurationError {
            config_path: config_path.into(),
            field: field.into(),
            expected: expected.into(),
            cause: Box::new(cause),
        }
    }
}
