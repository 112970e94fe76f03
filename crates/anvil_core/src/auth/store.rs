//! JSON-file backed store of per-guild authority levels.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DEFAULT_AUTHORITY, OWNER_AUTHORITY};
use crate::host::Snowflake;
use crate::{CoreError, Result};

/// Authority levels granted within one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildAuthEntry {
    /// Direct per-user overrides
    #[serde(default)]
    pub users: BTreeMap<Snowflake, i64>,
    /// Levels granted by role name
    #[serde(default)]
    pub roles: BTreeMap<String, i64>,
}

impl GuildAuthEntry {
    /// Highest level granted by the user override or any of the roles
    pub fn authority(&self, user_id: Snowflake, role_names: &[String]) -> i64 {
        let direct = self.users.get(&user_id).copied();
        let from_roles = role_names
            .iter()
            .filter_map(|name| self.roles.get(name).copied())
            .max();

        direct
            .into_iter()
            .chain(from_roles)
            .max()
            .unwrap_or(DEFAULT_AUTHORITY)
            .max(DEFAULT_AUTHORITY)
    }
}

/// Per-guild authority records, loaded at startup and rewritten wholesale on save.
///
/// Reads never block on I/O. Saves are serialised through an async mutex so
/// only one whole-file write is in flight at a time.
#[derive(Debug)]
pub struct AuthStore {
    path: Option<PathBuf>,
    schema: GuildAuthEntry,
    owner: Option<Snowflake>,
    entries: RwLock<BTreeMap<Snowflake, GuildAuthEntry>>,
    save_lock: tokio::sync::Mutex<()>,
}

impl AuthStore {
    /// A store that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            schema: GuildAuthEntry::default(),
            owner: None,
            entries: RwLock::new(BTreeMap::new()),
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// A store persisted at `path`; call [`AuthStore::reload`] to read it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Open the store at `path`, reading the optional schema file first.
    pub async fn open(path: impl Into<PathBuf>, schema_path: Option<&Path>) -> Result<Self> {
        let mut store = Self::new(path);
        if let Some(schema_path) = schema_path {
            store.schema = load_schema(schema_path).await?;
        }
        store.reload().await?;
        Ok(store)
    }

    /// Template entry for guilds seen for the first time
    pub fn with_schema(mut self, schema: GuildAuthEntry) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_owner(mut self, owner: Option<Snowflake>) -> Self {
        self.owner = owner;
        self
    }

    pub fn owner(&self) -> Option<Snowflake> {
        self.owner
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the in-memory entries with the file's contents.
    ///
    /// A missing file is an empty store.
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str::<BTreeMap<Snowflake, GuildAuthEntry>>(&content)
                .map_err(|e| CoreError::auth_store(path, "parse", e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no authority store on disk yet");
                BTreeMap::new()
            }
            Err(e) => return Err(CoreError::auth_store(path, "read", e)),
        };

        debug!(guilds = loaded.len(), "authority store loaded");
        *self.entries.write() = loaded;
        Ok(())
    }

    /// Write every entry back to disk.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().await;
        let snapshot = self.entries.read().clone();
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| CoreError::auth_store(path, "serialize", e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::auth_store(parent, "create directory for", e))?;
        }

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| CoreError::auth_store(&staging, "write", e))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| CoreError::auth_store(path, "replace", e))?;

        debug!(path = %path.display(), guilds = snapshot.len(), "authority store saved");
        Ok(())
    }

    pub fn contains(&self, guild_id: Snowflake) -> bool {
        self.entries.read().contains_key(&guild_id)
    }

    /// Add an entry for `guild_id` from the schema. Returns false if one already existed.
    pub fn create(&self, guild_id: Snowflake) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&guild_id) {
            return false;
        }
        entries.insert(guild_id, self.schema.clone());
        true
    }

    /// Reset every entry back to the schema
    pub fn reset_all(&self) {
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            *entry = self.schema.clone();
        }
        info!(guilds = entries.len(), "authority store reset to schema");
    }

    pub fn entry(&self, guild_id: Snowflake) -> Option<GuildAuthEntry> {
        self.entries.read().get(&guild_id).cloned()
    }

    pub fn guilds(&self) -> Vec<Snowflake> {
        self.entries.read().keys().copied().collect()
    }

    /// Effective authority of a user in a guild. Never fails; unknown users get `0`.
    pub fn get_authority(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_names: &[String],
    ) -> i64 {
        if self.owner == Some(user_id) {
            return OWNER_AUTHORITY;
        }
        self.entries
            .read()
            .get(&guild_id)
            .map(|entry| entry.authority(user_id, role_names))
            .unwrap_or(DEFAULT_AUTHORITY)
    }

    /// Authority outside of any guild, where only ownership counts
    pub fn get_direct_authority(&self, user_id: Snowflake) -> i64 {
        if self.owner == Some(user_id) {
            OWNER_AUTHORITY
        } else {
            DEFAULT_AUTHORITY
        }
    }

    pub fn set_user_authority(&self, guild_id: Snowflake, user_id: Snowflake, level: i64) {
        let mut entries = self.entries.write();
        let schema = &self.schema;
        entries
            .entry(guild_id)
            .or_insert_with(|| schema.clone())
            .users
            .insert(user_id, level);
    }

    pub fn set_role_authority(&self, guild_id: Snowflake, role: impl Into<String>, level: i64) {
        let mut entries = self.entries.write();
        let schema = &self.schema;
        entries
            .entry(guild_id)
            .or_insert_with(|| schema.clone())
            .roles
            .insert(role.into(), level);
    }
}

async fn load_schema(path: &Path) -> Result<GuildAuthEntry> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            serde_json::from_str(&content).map_err(|e| CoreError::auth_store(path, "parse schema", e))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no authority schema, new guilds start empty");
            Ok(GuildAuthEntry::default())
        }
        Err(e) => Err(CoreError::auth_store(path, "read schema", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_user_gets_floor() {
        let store = AuthStore::in_memory();
        assert_eq!(store.get_authority(10, 1, &[]), 0);
        assert_eq!(store.get_authority(10, 1, &roles(&["Nobody"])), 0);

        store.create(10);
        assert_eq!(store.get_authority(10, 1, &roles(&["Nobody"])), 0);
    }

    #[test]
    fn test_authority_is_max_of_user_and_roles() {
        let store = AuthStore::in_memory();
        store.set_role_authority(10, "Moderator", 2);
        store.set_role_authority(10, "Admin", 5);
        store.set_user_authority(10, 1, 3);

        assert_eq!(store.get_authority(10, 1, &[]), 3);
        assert_eq!(store.get_authority(10, 1, &roles(&["Moderator"])), 3);
        assert_eq!(store.get_authority(10, 1, &roles(&["Moderator", "Admin"])), 5);
        assert_eq!(store.get_authority(10, 2, &roles(&["Moderator"])), 2);
        assert_eq!(store.get_authority(11, 1, &roles(&["Admin"])), 0);
    }

    #[test]
    fn test_owner_always_wins() {
        let store = AuthStore::in_memory().with_owner(Some(99));
        assert_eq!(store.get_authority(10, 99, &[]), OWNER_AUTHORITY);
        assert_eq!(store.get_direct_authority(99), OWNER_AUTHORITY);
        assert_eq!(store.get_direct_authority(1), 0);
    }

    #[test]
    fn test_create_uses_schema() {
        let mut schema = GuildAuthEntry::default();
        schema.roles.insert("Moderator".to_string(), 1);
        let store = AuthStore::in_memory().with_schema(schema.clone());

        assert!(store.create(10));
        assert!(!store.create(10));
        assert_eq!(store.entry(10), Some(schema));
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth").join("store.json");

        let store = AuthStore::new(&path);
        store.set_user_authority(10, 1, 4);
        store.set_role_authority(10, "Admin", 7);
        store.save().await.unwrap();

        let reopened = AuthStore::open(&path, None).await.unwrap();
        assert_eq!(reopened.get_authority(10, 1, &[]), 4);
        assert_eq!(reopened.get_authority(10, 2, &roles(&["Admin"])), 7);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = AuthStore::open(dir.path().join("absent.json"), None)
            .await
            .unwrap();
        assert!(store.guilds().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = AuthStore::open(&path, None).await.unwrap_err();
        assert!(matches!(err, CoreError::AuthStoreError { .. }));
    }

    #[test]
    fn test_reset_all() {
        let store = AuthStore::in_memory();
        store.set_user_authority(10, 1, 4);
        store.reset_all();
        assert_eq!(store.get_authority(10, 1, &[]), 0);
        assert!(store.contains(10));
    }
}
