//! Connection lifecycle events of a cache client

use crate::logging::log_cache_operation;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Connection established and usable
    Ready,
    /// Connection lost; the backend is reconnecting on its own
    Reconnecting,
    /// Connection closed
    End,
    Error(String),
}

impl CacheEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::End => "end",
            Self::Error(_) => "error",
        }
    }
}

pub type CacheEventListener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Logs lifecycle events and forwards them to registered listeners
#[derive(Clone)]
pub struct CacheEvents {
    cache: Arc<str>,
    listeners: Arc<RwLock<Vec<CacheEventListener>>>,
}

impl CacheEvents {
    pub fn new(cache: &str) -> Self {
        Self {
            cache: Arc::from(cache),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn cache(&self) -> &str {
        &self.cache
    }

    pub fn subscribe(&self, listener: CacheEventListener) {
        self.listeners.write().push(listener);
    }

    /// Events are observed, never thrown
    pub fn emit(&self, event: CacheEvent) {
        match &event {
            CacheEvent::Ready => log_cache_operation("ready", &self.cache, None, "connected", None),
            CacheEvent::End => log_cache_operation("end", &self.cache, None, "closed", None),
            CacheEvent::Reconnecting => {
                warn!(cache = %self.cache, "🔄 Cache connection lost, reconnecting")
            }
            CacheEvent::Error(message) => {
                error!(cache = %self.cache, error = %message, "❌ Cache error")
            }
        }

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for CacheEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEvents")
            .field("cache", &self.cache)
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
