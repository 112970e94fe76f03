use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::host::Snowflake;

/// Default upper bound on live cooldown entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Tracks when each (user, command) pair may next run.
///
/// Entries store the instant their window closes, so expired entries can be
/// swept without knowing the command's configured cooldown.
#[derive(Debug)]
pub struct CooldownTracker {
    windows: DashMap<(Snowflake, String), Instant>,
    max_entries: usize,
}

/// A window claimed for an invocation that has not finished yet.
///
/// Hand it back with [`CooldownTracker::confirm`] when the command succeeds or
/// [`CooldownTracker::release`] when it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct CooldownReservation {
    user_id: Snowflake,
    command: String,
    cooldown: Duration,
    closes_at: Instant,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl CooldownTracker {
    pub fn new(max_entries: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Time left before `user_id` may run `command` again, if any.
    pub fn remaining(&self, user_id: Snowflake, command: &str) -> Option<Duration> {
        let key = (user_id, command.to_string());
        let closes_at = *self.windows.get(&key)?;
        let now = Instant::now();
        if closes_at > now {
            Some(closes_at - now)
        } else {
            None
        }
    }

    /// Start a new window for `user_id` on `command`. Zero-length cooldowns are not tracked.
    pub fn record(&self, user_id: Snowflake, command: &str, cooldown: Duration) {
        if cooldown.is_zero() {
            return;
        }
        self.windows
            .insert((user_id, command.to_string()), Instant::now() + cooldown);
        self.enforce_capacity();
    }

    fn enforce_capacity(&self) {
        if self.windows.len() > self.max_entries {
            self.sweep();
            self.evict_to_capacity();
        }
    }

    /// Check the window and claim it in one step.
    ///
    /// Returns the time left when the window is still open. Zero-length
    /// cooldowns never block and claim nothing.
    pub fn try_acquire(
        &self,
        user_id: Snowflake,
        command: &str,
        cooldown: Duration,
    ) -> Result<Option<CooldownReservation>, Duration> {
        if cooldown.is_zero() {
            return Ok(None);
        }

        let now = Instant::now();
        let closes_at = now + cooldown;
        match self.windows.entry((user_id, command.to_string())) {
            Entry::Occupied(entry) if *entry.get() > now => return Err(*entry.get() - now),
            Entry::Occupied(mut entry) => {
                entry.insert(closes_at);
            }
            Entry::Vacant(entry) => {
                entry.insert(closes_at);
            }
        }
        self.enforce_capacity();

        Ok(Some(CooldownReservation {
            user_id,
            command: command.to_string(),
            cooldown,
            closes_at,
        }))
    }

    /// Keep a claimed window, restarting it from now.
    pub fn confirm(&self, reservation: CooldownReservation) {
        self.record(reservation.user_id, &reservation.command, reservation.cooldown);
    }

    /// Give a claimed window back. A newer window for the same pair is left alone.
    pub fn release(&self, reservation: CooldownReservation) {
        self.windows.remove_if(
            &(reservation.user_id, reservation.command),
            |_, closes_at| *closes_at == reservation.closes_at,
        );
    }

    /// Drop every entry whose window has closed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows.retain(|_, closes_at| *closes_at > now);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, remaining = self.windows.len(), "swept expired cooldowns");
        }
        removed
    }

    fn evict_to_capacity(&self) {
        let excess = self.windows.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }

        let mut oldest: Vec<((Snowflake, String), Instant)> = self
            .windows
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        oldest.sort_by_key(|(_, closes_at)| *closes_at);

        for (key, _) in oldest.into_iter().take(excess) {
            self.windows.remove(&key);
        }
        warn!(
            evicted = excess,
            max_entries = self.max_entries,
            "cooldown cache at capacity, evicted windows closest to expiry"
        );
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn clear(&self) {
        self.windows.clear();
    }
}
