//! Payload handler registry: routes message payloads to handlers by kind.
//!
//! Built and injected at startup; each instance is independent so tests can
//! construct isolated registries.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CampaignError, CampaignResult};

/// Handles one kind of message payload.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, payload: serde_json::Value) -> CampaignResult<()>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn PayloadHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning the one it replaced.
    pub fn register(
        &self,
        kind: impl Into<String>,
        handler: Arc<dyn PayloadHandler>,
    ) -> Option<Arc<dyn PayloadHandler>> {
        let kind = kind.into();
        debug!(kind = %kind, "Registering payload handler");
        self.handlers.write().insert(kind, handler)
    }

    pub fn unregister(&self, kind: &str) -> bool {
        self.handlers.write().remove(kind).is_some()
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.handlers.read().contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Route `payload` to the handler registered for `kind`.
    pub async fn dispatch(&self, kind: &str, payload: serde_json::Value) -> CampaignResult<()> {
        // Clone out of the lock so it is not held across the await.
        let handler = self.handlers.read().get(kind).cloned();
        match handler {
            Some(handler) => handler.handle(payload).await,
            None => {
                warn!(kind = %kind, "No handler registered for payload");
                Err(CampaignError::UnknownPayload(kind.to_string()))
            }
        }
    }
}
