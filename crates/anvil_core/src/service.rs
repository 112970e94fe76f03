//! Long-running fragments that live alongside the command pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::bot::Bot;
use crate::fragment::FragmentMeta;
use crate::{CoreError, Result};

/// A background fragment started after the bot connects.
#[async_trait]
pub trait Service: Send + Sync {
    fn meta(&self) -> &FragmentMeta;

    /// Begin work. Must return promptly; long work belongs in a spawned task.
    async fn start(&self, bot: &Bot) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Registered services keyed by name.
#[derive(Default)]
pub struct ServiceManager {
    services: RwLock<BTreeMap<String, Arc<dyn Service>>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: Arc<dyn Service>) -> Result<()> {
        let name = service.meta().name.to_lowercase();
        let mut services = self.services.write();
        if services.contains_key(&name) {
            return Err(CoreError::ServiceError {
                service: service.meta().name.clone(),
                operation: "registration".to_string(),
                reason: "a service with this name is already registered".to_string(),
            });
        }
        services.insert(name, service);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.read().get(&name.to_lowercase()).cloned()
    }

    /// Every service, sorted by name
    pub fn all(&self) -> Vec<Arc<dyn Service>> {
        self.services.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Start every service that is not already running. Returns how many started.
    pub async fn start_all(&self, bot: &Bot) -> usize {
        let mut started = 0;
        for service in self.all() {
            if service.is_running() {
                continue;
            }
            match service.start(bot).await {
                Ok(()) => {
                    info!(service = %service.meta().name, "service started");
                    started += 1;
                }
                Err(e) => warn!(service = %service.meta().name, error = %e, "service failed to start"),
            }
        }
        started
    }

    /// Stop every running service. Returns how many stopped.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for service in self.all() {
            if !service.is_running() {
                continue;
            }
            match service.stop().await {
                Ok(()) => stopped += 1,
                Err(e) => warn!(service = %service.meta().name, error = %e, "service failed to stop"),
            }
        }
        stopped
    }

    /// Stop and forget every service
    pub async fn unregister_all(&self) -> usize {
        self.stop_all().await;
        let mut services = self.services.write();
        let count = services.len();
        services.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::test_helpers::{FakeHost, test_bot};

    struct Flag {
        meta: FragmentMeta,
        running: AtomicBool,
    }

    impl Flag {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                meta: FragmentMeta::new(name),
                running: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Service for Flag {
        fn meta(&self) -> &FragmentMeta {
            &self.meta
        }

        async fn start(&self, _bot: &Bot) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let manager = ServiceManager::new();
        manager.register(Flag::new("clock")).unwrap();
        assert!(matches!(
            manager.register(Flag::new("Clock")),
            Err(CoreError::ServiceError { .. })
        ));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop_all() {
        let bot = test_bot(FakeHost::new()).await;
        let manager = ServiceManager::new();
        let a = Flag::new("a");
        let b = Flag::new("b");
        manager.register(a.clone()).unwrap();
        manager.register(b.clone()).unwrap();

        assert_eq!(manager.start_all(&bot).await, 2);
        assert!(a.is_running() && b.is_running());
        // already running services are left alone
        assert_eq!(manager.start_all(&bot).await, 0);

        assert_eq!(manager.stop_all().await, 2);
        assert!(!a.is_running());
        assert_eq!(manager.unregister_all().await, 2);
        assert!(manager.is_empty());
    }
}
