//! Bot settings
//!
//! Settings are read from a TOML file once at startup and handed to the
//! [`Bot`](crate::Bot) as a read-only value. Relative paths in `[paths]`
//! resolve against the settings file's directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::Snowflake;
use crate::{CoreError, Result};

/// Resolve a path relative to a base directory
/// If the path is absolute, return it as-is
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Top-level settings for an Anvil bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Internal fragments that are enabled; every other internal fragment is skipped
    #[serde(default = "default_primitive_commands")]
    pub primitive_commands: Vec<String>,

    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub options: BotOptions,

    #[serde(default)]
    pub emojis: EmojiSettings,

    #[serde(default)]
    pub cooldowns: CooldownSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primitive_commands: default_primitive_commands(),
            general: GeneralSettings::default(),
            paths: PathSettings::default(),
            options: BotOptions::default(),
            emojis: EmojiSettings::default(),
            cooldowns: CooldownSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Command prefixes; the longest matching one wins
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// User id of the bot owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Snowflake>,

    /// Language table to load from the languages directory
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Gateway token; usually supplied through the environment instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            owner: None,
            locale: default_locale(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub internal: PathBuf,
    pub commands: PathBuf,
    pub services: PathBuf,
    pub tasks: PathBuf,
    pub languages: PathBuf,
    pub auth_store: PathBuf,
    pub auth_schema: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            internal: PathBuf::from("fragments/internal"),
            commands: PathBuf::from("fragments/commands"),
            services: PathBuf::from("fragments/services"),
            tasks: PathBuf::from("fragments/tasks"),
            languages: PathBuf::from("languages"),
            auth_store: PathBuf::from("auth/store.json"),
            auth_schema: PathBuf::from("auth/schema.json"),
        }
    }
}

impl PathSettings {
    fn resolve_against(&mut self, base_dir: &Path) {
        for path in [
            &mut self.internal,
            &mut self.commands,
            &mut self.services,
            &mut self.tasks,
            &mut self.languages,
            &mut self.auth_store,
            &mut self.auth_schema,
        ] {
            *path = resolve_path(base_dir, path);
        }
    }
}

/// Behaviour switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotOptions {
    /// Split `a & b` into separate invocations
    pub allow_command_chain: bool,
    pub ignore_bots: bool,
    /// Delete every command response after a length-dependent delay
    pub auto_delete_responses: bool,
    /// Re-dispatch commands when their message is edited
    pub update_on_message_edit: bool,
    pub log_messages: bool,
    /// Answer `?prefix` with the configured prefixes
    pub prefix_command: bool,
    /// Send `help` output as a direct message
    pub dm_help: bool,
    /// Reset every authority entry to the schema at startup
    pub auto_reset_auth_store: bool,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            allow_command_chain: true,
            ignore_bots: true,
            auto_delete_responses: false,
            update_on_message_edit: false,
            log_messages: false,
            prefix_command: true,
            dm_help: true,
            auto_reset_auth_store: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmojiSettings {
    pub success: String,
    pub error: String,
}

impl Default for EmojiSettings {
    fn default() -> Self {
        Self {
            success: ":white_check_mark:".to_string(),
            error: ":thinking:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    /// Hard cap on tracked (user, command) windows
    pub max_entries: usize,
    /// How often expired windows are swept
    pub sweep_interval_secs: u64,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            max_entries: crate::auth::cooldown::DEFAULT_MAX_ENTRIES,
            sweep_interval_secs: 300,
        }
    }
}

impl CooldownSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_primitive_commands() -> Vec<String> {
    [
        "help", "usage", "ping", "auth", "setauth", "prefix", "reflect", "restart", "throw",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Settings {
    /// Load settings from standard locations
    pub async fn load() -> Result<Self> {
        load_settings_from_standard_locations().await
    }

    /// Load settings from a specific file
    pub async fn load_from(path: &Path) -> Result<Self> {
        load_settings(path).await
    }

    /// Save settings to a specific file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        save_settings(self, path).await
    }

    /// Resolve the gateway token: settings first, then `ANVIL_TOKEN`, then `DISCORD_TOKEN`
    pub fn token(&self) -> Option<String> {
        self.general
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("ANVIL_TOKEN").ok())
            .or_else(|| std::env::var("DISCORD_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.primitive_commands
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name))
    }
}

/// Load settings from a TOML file
pub async fn load_settings(path: &Path) -> Result<Settings> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::configuration(path.display().to_string(), "file", "readable TOML file", e))?;

    let mut settings: Settings = toml::from_str(&content).map_err(|e| {
        CoreError::configuration(
            path.display().to_string(),
            "content",
            "valid TOML settings",
            e,
        )
    })?;

    if settings.general.prefixes.iter().all(|p| p.is_empty()) {
        return Err(CoreError::configuration(
            path.display().to_string(),
            "general.prefixes",
            "at least one non-empty prefix",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "no usable prefix"),
        ));
    }

    // Resolve paths relative to the settings file's directory
    let base_dir = path.parent().unwrap_or(Path::new("."));
    settings.paths.resolve_against(base_dir);

    Ok(settings)
}

/// Save settings to a TOML file
pub async fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            CoreError::configuration(parent.display().to_string(), "directory", "writable directory", e)
        })?;
    }

    let content = toml::to_string_pretty(settings).map_err(|e| {
        CoreError::configuration(
            path.display().to_string(),
            "serialization",
            "serializable settings",
            e,
        )
    })?;

    tokio::fs::write(path, content).await.map_err(|e| {
        CoreError::configuration(path.display().to_string(), "file", "writable file location", e)
    })?;

    Ok(())
}

/// Standard settings file locations
pub fn settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Project-specific settings
    paths.push(PathBuf::from("anvil.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("anvil").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".anvil").join("config.toml"));
    }

    paths
}

/// Load settings from the first standard location that exists, else defaults
pub async fn load_settings_from_standard_locations() -> Result<Settings> {
    for path in settings_paths() {
        if path.exists() {
            return load_settings(&path).await;
        }
    }

    Ok(Settings::default())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.general.prefixes, vec!["!"]);
        assert!(settings.options.allow_command_chain);
        assert!(settings.options.ignore_bots);
        assert!(!settings.options.update_on_message_edit);
        assert_eq!(settings.emojis.error, ":thinking:");
        assert!(settings.is_primitive("HELP"));
        assert!(!settings.is_primitive("eval"));
    }

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anvil.toml");
        tokio::fs::write(
            &path,
            r#"
            primitive_commands = ["help"]

            [general]
            prefixes = ["!", "!!"]
            owner = 285578743324606482

            [paths]
            commands = "my/commands"
            auth_store = "/var/lib/anvil/store.json"

            [options]
            ignore_bots = false
            "#,
        )
        .await
        .unwrap();

        let settings = load_settings(&path).await.unwrap();
        assert_eq!(settings.general.prefixes, vec!["!", "!!"]);
        assert_eq!(settings.general.owner, Some(285578743324606482));
        assert_eq!(settings.paths.commands, dir.path().join("my/commands"));
        assert_eq!(settings.paths.internal, dir.path().join("fragments/internal"));
        assert_eq!(
            settings.paths.auth_store,
            PathBuf::from("/var/lib/anvil/store.json")
        );
        assert!(!settings.options.ignore_bots);
        // unspecified options keep their defaults
        assert!(settings.options.prefix_command);
        assert_eq!(settings.primitive_commands, vec!["help"]);
    }

    #[tokio::test]
    async fn test_invalid_settings_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anvil.toml");
        tokio::fs::write(&path, "[general]\nprefixes = 3").await.unwrap();

        match load_settings(&path).await {
            Err(CoreError::ConfigurationError {
                config_path, field, ..
            }) => {
                assert_eq!(config_path, path.display().to_string());
                assert_eq!(field, "content");
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_prefix_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anvil.toml");
        tokio::fs::write(&path, "[general]\nprefixes = [\"\"]").await.unwrap();
        assert!(load_settings(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("anvil.toml");

        let mut settings = Settings::default();
        settings.general.owner = Some(42);
        settings.options.log_messages = true;
        save_settings(&settings, &path).await.unwrap();

        let loaded = load_settings(&path).await.unwrap();
        assert_eq!(loaded.general.owner, Some(42));
        assert!(loaded.options.log_messages);
    }
}
