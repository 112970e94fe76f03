//! Recognises command invocations in raw message content.

use std::sync::Arc;

use crate::fragment::Command;
use crate::registry::CommandRegistry;

/// A message matched against the registry.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command: Arc<Command>,
    pub prefix: String,
    /// The name or alias exactly as typed
    pub label: String,
    /// Everything after the label, leading whitespace removed
    pub remainder: String,
}

/// Stateless helpers; all inputs are passed explicitly.
pub struct CommandParser;

impl CommandParser {
    /// The longest configured prefix `content` starts with.
    pub fn longest_prefix<'p>(content: &str, prefixes: &'p [String]) -> Option<&'p str> {
        prefixes
            .iter()
            .filter(|p| !p.is_empty() && content.starts_with(p.as_str()))
            .max_by_key(|p| p.len())
            .map(String::as_str)
    }

    /// Whether `content` starts with a prefix followed directly by a registered key.
    pub fn validate(content: &str, registry: &CommandRegistry, prefixes: &[String]) -> bool {
        Self::parse(content, registry, prefixes).is_some()
    }

    pub fn parse(
        content: &str,
        registry: &CommandRegistry,
        prefixes: &[String],
    ) -> Option<ParsedCommand> {
        let prefix = Self::longest_prefix(content, prefixes)?;
        let rest = &content[prefix.len()..];

        let label_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let label = &rest[..label_end];
        if label.is_empty() {
            return None;
        }

        let command = registry.get(label)?;
        Some(ParsedCommand {
            command,
            prefix: prefix.to_string(),
            label: label.to_string(),
            remainder: rest[label_end..].trim_start().to_string(),
        })
    }

    /// Split a chained message on `&` into individual invocations.
    ///
    /// `&` inside quotes or inside a `<...>` mention does not split. Empty
    /// segments are dropped. A segment written without a prefix inherits the
    /// prefix of the first segment.
    pub fn split_chain(content: &str, prefixes: &[String]) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut quote: Option<char> = None;
        let mut in_mention = false;

        for c in content.chars() {
            match (quote, c) {
                (Some(open), c) if c == open => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'' | '`') => quote = Some(c),
                (None, '<') => in_mention = true,
                (None, '>') => in_mention = false,
                (None, '&') if !in_mention => {
                    segments.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
            current.push(c);
        }
        segments.push(current);

        let segments: Vec<String> = segments
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let Some(lead) = segments
            .first()
            .and_then(|first| Self::longest_prefix(first, prefixes))
        else {
            return segments;
        };
        let lead = lead.to_string();

        segments
            .into_iter()
            .map(|segment| {
                if Self::longest_prefix(&segment, prefixes).is_some() {
                    segment
                } else {
                    format!("{}{}", lead, segment)
                }
            })
            .collect()
    }
}
