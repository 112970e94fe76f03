use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Result;
use crate::bot::Bot;
use crate::fragment::FragmentMeta;
use crate::host::Snowflake;
use crate::service::Service;

pub(super) const KIND: &str = "interval-message";

const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Posts a fixed message to a channel on a timer.
///
/// ```toml
/// [service]
/// kind = "interval-message"
/// [service.options]
/// channel = 432269407654248459
/// interval_secs = 600
/// message = "Remember to read the rules!"
/// ```
pub struct IntervalMessage {
    meta: FragmentMeta,
    channel: Snowflake,
    interval: Duration,
    message: String,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IntervalMessage {
    pub fn new(meta: FragmentMeta, channel: Snowflake, interval: Duration, message: String) -> Self {
        Self {
            meta,
            channel,
            interval,
            message,
            task: Mutex::new(None),
        }
    }

    /// Build from `[service.options]`
    pub fn from_options(meta: FragmentMeta, options: &toml::Table) -> std::result::Result<Self, String> {
        let channel = match options.get("channel") {
            Some(toml::Value::Integer(id)) if *id > 0 => *id as Snowflake,
            Some(toml::Value::String(id)) => id
                .trim()
                .parse()
                .map_err(|_| format!("`channel` is not a channel id: {}", id))?,
            Some(other) => return Err(format!("`channel` is not a channel id: {}", other)),
            None => return Err("missing `channel` option".to_string()),
        };

        let secs = match options.get("interval_secs") {
            Some(toml::Value::Integer(secs)) if *secs > 0 => *secs as u64,
            Some(other) => return Err(format!("`interval_secs` must be a positive integer, got {}", other)),
            None => DEFAULT_INTERVAL_SECS,
        };

        let message = match options.get("message") {
            Some(toml::Value::String(text)) if !text.trim().is_empty() => text.clone(),
            _ => return Err("missing or empty `message` option".to_string()),
        };

        Ok(Self::new(meta, channel, Duration::from_secs(secs), message))
    }

    pub fn channel(&self) -> Snowflake {
        self.channel
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Service for IntervalMessage {
    fn meta(&self) -> &FragmentMeta {
        &self.meta
    }

    async fn start(&self, bot: &Bot) -> Result<()> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let bot = bot.clone();
        let name = self.meta.name.clone();
        let channel = self.channel;
        let interval = self.interval;
        let message = self.message.clone();

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if bot.is_suspended() {
                    continue;
                }
                match bot.host().send(channel, &message).await {
                    Ok(_) => debug!(service = %name, channel, "interval message sent"),
                    Err(e) => warn!(service = %name, channel, error = %e, "interval message failed"),
                }
            }
        }));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}
