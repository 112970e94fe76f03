//! Conversions between serenity models and the core's transport-neutral types.

use anvil_core::InboundMessage;
use anvil_core::host::{Author, RoleRef};
use serenity::all::{Cache, Message, Permissions};

/// Discord's per-message character limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Build the core's view of a gateway message.
///
/// Role, guild and channel names come from the cache; anything not cached
/// is left out rather than fetched.
pub fn inbound_message(cache: &Cache, msg: &Message) -> InboundMessage {
    let role_ids = msg
        .member
        .as_ref()
        .map(|member| member.roles.clone())
        .unwrap_or_default();

    let mut roles = Vec::with_capacity(role_ids.len());
    let mut guild_name = None;
    let mut channel_name = None;

    if let Some(guild) = msg.guild_id.and_then(|id| cache.guild(id)) {
        guild_name = Some(guild.name.clone());
        channel_name = guild
            .channels
            .get(&msg.channel_id)
            .map(|channel| channel.name.clone());
        for id in role_ids {
            if let Some(role) = guild.roles.get(&id) {
                roles.push(RoleRef {
                    id: id.get(),
                    name: role.name.clone(),
                });
            }
        }
    }

    InboundMessage {
        id: msg.id.get(),
        author: Author {
            id: msg.author.id.get(),
            name: msg.author.name.clone(),
            bot: msg.author.bot,
        },
        content: msg.content.clone(),
        guild_id: msg.guild_id.map(|id| id.get()),
        channel_id: msg.channel_id.get(),
        roles,
        guild_name,
        channel_name,
    }
}

/// Flag names of every permission in `permissions`, e.g. `KICK_MEMBERS`
pub fn permission_names(permissions: Permissions) -> Vec<String> {
    permissions
        .iter_names()
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Split `content` into chunks of at most `max_length` characters, preferring line breaks.
pub fn split_message(content: &str, max_length: usize) -> Vec<String> {
    if content.chars().count() <= max_length {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // A chunk may hold nothing but blank lines, so emptiness can't mark it open
    let mut started = false;

    for line in content.lines() {
        let line_len = line.chars().count();
        if started && current_len + line_len + 1 > max_length {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
            started = false;
        }

        if !started && line_len > max_length {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_length) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if started {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
        started = true;
    }

    if started {
        chunks.push(current);
    }
    chunks
}
