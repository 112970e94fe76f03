//! Name and alias lookup for registered commands.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::fragment::Command;
use crate::{CoreError, Result};

#[derive(Default)]
struct RegistryInner {
    /// Lowercased command name to command
    commands: BTreeMap<String, Arc<Command>>,
    /// Lowercased name or alias to lowercased command name
    keys: HashMap<String, String>,
}

/// Maps every name and alias to exactly one command.
///
/// Keys are case-insensitive. A key can only be claimed once, and a rejected
/// registration leaves the registry as it was.
#[derive(Default)]
pub struct CommandRegistry {
    inner: RwLock<RegistryInner>,
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, command: Arc<Command>) -> Result<()> {
        command.definition.validate()?;

        let name = normalize(command.name());
        let mut keys: Vec<String> = command.keys().map(normalize).collect();
        keys.sort();
        keys.dedup();

        let mut inner = self.inner.write();
        if let Some((key, existing)) = keys
            .iter()
            .find_map(|key| inner.keys.get(key).map(|existing| (key, existing)))
        {
            let existing = inner
                .commands
                .get(existing)
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| existing.clone());
            return Err(CoreError::RegistrationConflict {
                key: key.clone(),
                existing,
                rejected: command.name().to_string(),
            });
        }

        for key in keys {
            inner.keys.insert(key, name.clone());
        }
        debug!(command = %command.name(), "command registered");
        inner.commands.insert(name, command);
        Ok(())
    }

    /// Look up a command by name or alias. Blank and absent keys find nothing.
    pub fn get<'a>(&self, key: impl Into<Option<&'a str>>) -> Option<Arc<Command>> {
        let key = normalize(key.into()?);
        if key.is_empty() {
            return None;
        }
        let inner = self.inner.read();
        inner
            .keys
            .get(&key)
            .and_then(|name| inner.commands.get(name))
            .cloned()
    }

    pub fn contains<'a>(&self, key: impl Into<Option<&'a str>>) -> bool {
        self.get(key).is_some()
    }

    /// Remove a command and every alias it claimed.
    pub fn unregister(&self, name: &str) -> Option<Arc<Command>> {
        let mut inner = self.inner.write();
        let name = inner.keys.get(&normalize(name))?.clone();
        let command = inner.commands.remove(&name)?;
        inner.keys.retain(|_, owner| *owner != name);
        debug!(command = %command.name(), "command unregistered");
        Some(command)
    }

    pub fn unregister_all(&self) -> usize {
        let mut inner = self.inner.write();
        let count = inner.commands.len();
        inner.commands.clear();
        inner.keys.clear();
        count
    }

    /// All commands, sorted by name
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.inner.read().commands.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fragment::FragmentMeta;
    use crate::test_helpers::{command_with_meta, test_command};

    #[test]
    fn test_lookup_by_name_and_alias() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("warn").with_aliases(["w", "caution"]),
            )))
            .unwrap();

        assert!(registry.contains("warn"));
        assert!(registry.contains("W"));
        assert_eq!(registry.get("caution").map(|c| c.name().to_string()), Some("warn".to_string()));
        assert!(!registry.contains("kick"));
    }

    #[test]
    fn test_blank_keys_find_nothing() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(test_command("ping"))).unwrap();

        assert!(!registry.contains(Option::<&str>::None));
        assert!(!registry.contains(""));
        assert!(!registry.contains("   "));
        assert!(registry.get(Option::<&str>::None).is_none());
    }

    #[test]
    fn test_conflicting_alias_is_rejected_whole() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("warn").with_aliases(["w"]),
            )))
            .unwrap();

        let err = registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("whois").with_aliases(["W"]),
            )))
            .unwrap_err();

        match err {
            CoreError::RegistrationConflict {
                key,
                existing,
                rejected,
            } => {
                assert_eq!(key, "w");
                assert_eq!(existing, "warn");
                assert_eq!(rejected, "whois");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // nothing of the rejected command leaked in
        assert!(!registry.contains("whois"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let registry = CommandRegistry::new();
        registry.register(Arc::new(test_command("ping"))).unwrap();
        assert!(registry.register(Arc::new(test_command("PING"))).is_err());
    }

    #[test]
    fn test_own_alias_matching_name_is_fine() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("ping").with_aliases(["Ping"]),
            )))
            .unwrap();
        assert!(registry.contains("ping"));
    }

    #[test]
    fn test_unregister_frees_aliases() {
        let registry = CommandRegistry::new();
        registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("warn").with_aliases(["w"]),
            )))
            .unwrap();

        assert!(registry.unregister("w").is_some());
        assert!(!registry.contains("warn"));
        assert!(!registry.contains("w"));

        registry
            .register(Arc::new(command_with_meta(
                FragmentMeta::new("whois").with_aliases(["w"]),
            )))
            .unwrap();
        assert_eq!(registry.get("w").map(|c| c.name().to_string()), Some("whois".to_string()));
    }

    #[test]
    fn test_commands_are_sorted() {
        let registry = CommandRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Arc::new(test_command(name))).unwrap();
        }
        let names: Vec<String> = registry
            .commands()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.unregister_all(), 3);
        assert!(registry.is_empty());
    }
}
