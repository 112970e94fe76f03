//! Authority levels, invocation constraints and the cooldown cache.

pub mod constraints;
pub mod cooldown;
pub mod store;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::{InboundMessage, Snowflake};

pub use constraints::ConstraintChecker;
pub use cooldown::{CooldownReservation, CooldownTracker};
pub use store::{AuthStore, GuildAuthEntry};

/// Authority the configured bot owner always resolves to.
pub const OWNER_AUTHORITY: i64 = i64::MAX;

/// Authority of a user with no store entry and no matching roles.
pub const DEFAULT_AUTHORITY: i64 = 0;

/// Where a command may be invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatEnvironment {
    #[default]
    Any,
    Guild,
    #[serde(alias = "dm")]
    Direct,
}

impl ChatEnvironment {
    pub fn permits(&self, message: &InboundMessage) -> bool {
        match self {
            Self::Any => true,
            Self::Guild => !message.is_direct(),
            Self::Direct => message.is_direct(),
        }
    }
}

impl fmt::Display for ChatEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any channel"),
            Self::Guild => write!(f, "servers"),
            Self::Direct => write!(f, "direct messages"),
        }
    }
}

/// An entry of a command's allow- or deny-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecificTarget {
    User(Snowflake),
    Role(Snowflake),
    Channel(Snowflake),
    Guild(Snowflake),
    BotOwner,
}

impl SpecificTarget {
    pub fn matches(&self, message: &InboundMessage, owner: Option<Snowflake>) -> bool {
        match self {
            Self::User(id) => message.author.id == *id,
            Self::Role(id) => message.has_role(*id),
            Self::Channel(id) => message.channel_id == *id,
            Self::Guild(id) => message.guild_id == Some(*id),
            Self::BotOwner => owner == Some(message.author.id),
        }
    }
}

impl FromStr for SpecificTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("owner") {
            return Ok(Self::BotOwner);
        }

        let mut chars = s.chars();
        let sigil = chars.next().ok_or_else(|| "empty target".to_string())?;
        let id: Snowflake = chars
            .as_str()
            .parse()
            .map_err(|_| format!("'{}' does not contain a valid id", s))?;

        match sigil {
            '@' => Ok(Self::User(id)),
            '&' => Ok(Self::Role(id)),
            '#' => Ok(Self::Channel(id)),
            '$' => Ok(Self::Guild(id)),
            other => Err(format!(
                "unknown target kind '{}' (expected @user, &role, #channel, $guild or owner)",
                other
            )),
        }
    }
}

impl fmt::Display for SpecificTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "@{}", id),
            Self::Role(id) => write!(f, "&{}", id),
            Self::Channel(id) => write!(f, "#{}", id),
            Self::Guild(id) => write!(f, "${}", id),
            Self::BotOwner => write!(f, "owner"),
        }
    }
}

/// Preconditions a command declares for its own invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub cooldown: Duration,
    pub environment: ChatEnvironment,
    /// If non-empty, the invocation must match at least one entry
    pub specific: Vec<SpecificTarget>,
    pub deny: Vec<SpecificTarget>,
    pub min_authority: Option<i64>,
    pub issuer_permissions: Vec<String>,
    pub self_permissions: Vec<String>,
}

impl Constraints {
    pub fn owner_only(mut self) -> Self {
        self.specific.push(SpecificTarget::BotOwner);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn in_environment(mut self, environment: ChatEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

/// Render an authority level for humans.
pub fn display_authority(level: i64) -> String {
    if level == OWNER_AUTHORITY {
        "owner".to_string()
    } else {
        level.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{direct_message, guild_message};

    #[test]
    fn test_parse_targets() {
        assert_eq!("@42".parse(), Ok(SpecificTarget::User(42)));
        assert_eq!("&7".parse(), Ok(SpecificTarget::Role(7)));
        assert_eq!("#100".parse(), Ok(SpecificTarget::Channel(100)));
        assert_eq!("$10".parse(), Ok(SpecificTarget::Guild(10)));
        assert_eq!("Owner".parse(), Ok(SpecificTarget::BotOwner));
        assert!("!42".parse::<SpecificTarget>().is_err());
        assert!("@abc".parse::<SpecificTarget>().is_err());
        assert!("".parse::<SpecificTarget>().is_err());
    }

    #[test]
    fn test_environment() {
        let guild = guild_message(1, "!x");
        let dm = direct_message(1, "!x");

        assert!(ChatEnvironment::Any.permits(&guild));
        assert!(ChatEnvironment::Any.permits(&dm));
        assert!(ChatEnvironment::Guild.permits(&guild));
        assert!(!ChatEnvironment::Guild.permits(&dm));
        assert!(ChatEnvironment::Direct.permits(&dm));
        assert!(!ChatEnvironment::Direct.permits(&guild));
    }

    #[test]
    fn test_target_matching() {
        let message = guild_message(1, "!x");
        assert!(SpecificTarget::User(1).matches(&message, None));
        assert!(!SpecificTarget::User(2).matches(&message, None));
        assert!(SpecificTarget::Channel(100).matches(&message, None));
        assert!(SpecificTarget::Guild(10).matches(&message, None));
        assert!(SpecificTarget::BotOwner.matches(&message, Some(1)));
        assert!(!SpecificTarget::BotOwner.matches(&message, None));
    }
}
