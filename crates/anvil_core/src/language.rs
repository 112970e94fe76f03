//! User-facing strings, overridable per locale.
//!
//! A locale file is `<languages>/<locale>.toml` holding `key = "text"` pairs.
//! Dotted keys may be written as nested tables. Placeholders use `{name}`.
//! Keys missing from the file fall back to the built-in English text.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::{CoreError, Result};

const ENGLISH: &[(&str, &str)] = &[
    ("failure.disabled", "This command is currently disabled."),
    ("failure.environment", "This command can only be used in {environment}."),
    ("failure.not_permitted", "You are not permitted to use this command."),
    (
        "failure.authority",
        "This command requires authority level {required}, but you have {actual}.",
    ),
    (
        "failure.cooldown",
        "Please wait {seconds} more second(s) before using this command again.",
    ),
    (
        "failure.permission.issuer",
        "You need the `{permission}` permission to use this command.",
    ),
    (
        "failure.permission.bot",
        "I need the `{permission}` permission to run this command.",
    ),
    ("argument.missing", "Missing required argument `{argument}`. Usage: `{usage}`"),
    (
        "argument.invalid",
        "Argument `{argument}` expects {expected}, but got `{provided}`.",
    ),
    (
        "argument.unresolved",
        "Could not find the {kind} `{provided}` for argument `{argument}`.",
    ),
    ("argument.custom", "Argument `{argument}` is not a valid {type}: {reason}"),
    (
        "argument.unknown_type",
        "Argument `{argument}` uses an unknown type `{type}`.",
    ),
    (
        "command.fault",
        "Sorry, something went wrong while running that command.",
    ),
    ("response.empty", "*Empty response.*"),
    ("prefix.query", "My prefixes are: {prefixes}"),
];

/// A key to text lookup table with `{placeholder}` substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    locale: String,
    entries: HashMap<String, String>,
}

impl Default for Language {
    fn default() -> Self {
        Self::english()
    }
}

impl Language {
    /// The built-in English table
    pub fn english() -> Self {
        Self {
            locale: "en".to_string(),
            entries: ENGLISH
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Load `<dir>/<locale>.toml` over the English table.
    ///
    /// A missing file is not an error; the English table is used as is.
    pub async fn load(dir: &Path, locale: &str) -> Result<Self> {
        let mut language = Self::english();
        language.locale = locale.to_string();

        let path = dir.join(format!("{}.toml", locale));
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no language file, using built-in English");
                return Ok(language);
            }
            Err(e) => {
                return Err(CoreError::LanguageError {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let table: toml::Table = toml::from_str(&content).map_err(|e| CoreError::LanguageError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut overrides = 0;
        flatten(&table, "", &mut |key, value| {
            language.entries.insert(key, value);
            overrides += 1;
        });
        debug!(locale, overrides, "language table loaded");
        Ok(language)
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Text for `key` with every `{name}` replaced, or the key itself if unknown.
    pub fn get(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let mut text = self
            .entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string());
        for (name, value) in vars {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

fn flatten(table: &toml::Table, prefix: &str, sink: &mut dyn FnMut(String, String)) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten(nested, &full, sink),
            toml::Value::String(text) => sink(full, text.clone()),
            other => sink(full, other.to_string()),
        }
    }
}
