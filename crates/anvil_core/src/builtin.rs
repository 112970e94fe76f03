//! Built-in handlers and service kinds
//!
//! Internal fragment manifests under `fragments/internal/` refer to these by
//! name. Each is enabled only when listed in `primitive_commands`.

mod admin;
mod info;
mod interval;

use std::sync::Arc;

pub use admin::{AuthCommand, ReflectCommand, RestartCommand, SetAuthCommand, ThrowCommand};
pub use info::{HelpCommand, PingCommand, PrefixCommand, UsageCommand};
pub use interval::IntervalMessage;

use crate::fragment::FragmentCatalog;

/// Add every built-in handler and service kind to `catalog`.
pub fn register(catalog: &mut FragmentCatalog) {
    catalog.register_handler("internal.help", Arc::new(HelpCommand));
    catalog.register_handler("internal.usage", Arc::new(UsageCommand));
    catalog.register_handler("internal.ping", Arc::new(PingCommand));
    catalog.register_handler("internal.prefix", Arc::new(PrefixCommand));
    catalog.register_handler("internal.auth", Arc::new(AuthCommand));
    catalog.register_handler("internal.setauth", Arc::new(SetAuthCommand));
    catalog.register_handler("internal.reflect", Arc::new(ReflectCommand));
    catalog.register_handler("internal.restart", Arc::new(RestartCommand));
    catalog.register_handler("internal.throw", Arc::new(ThrowCommand));

    catalog.register_service(interval::KIND, |meta, options| {
        IntervalMessage::from_options(meta, options).map(|s| Arc::new(s) as _)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_is_registered() {
        let catalog = FragmentCatalog::with_builtins();
        assert_eq!(
            catalog.handler_names(),
            vec![
                "internal.auth",
                "internal.help",
                "internal.ping",
                "internal.prefix",
                "internal.reflect",
                "internal.restart",
                "internal.setauth",
                "internal.throw",
                "internal.usage",
            ]
        );
        assert!(catalog.service("interval-message").is_some());
    }
}
