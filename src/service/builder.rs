//! A builder for assembling a [`PushService`].
//!
//! Collaborators default to in-process implementations where one exists:
//! - data store: [`MemDataStore`]
//! - document writer: [`JsonDocumentWriter`]
//! - subtree filter: none, filters are then ignored with a warning
//!
//! The transport has no default and must be supplied.
//!
//! ## Example
//! ```ignore
//! let service = PushServiceBuilder::new(PushConfig::new()?)
//!     .store(store)
//!     .transport(transport)
//!     .build()
//!     .await?;
//! let id = service.generate_id();
//! service.establish(Subscription::periodic(&id, "OPERATIONAL", period)).await?;
//! service.register_periodic(&id).await?;
//! ```

use std::sync::Arc;

use config::ConfigError;
use tracing::debug;
use tracing::info;

use super::PushService;
use crate::DataStore;
use crate::DocumentWriter;
use crate::Error;
use crate::JsonDocumentWriter;
use crate::MemDataStore;
use crate::NotificationComposer;
use crate::NotificationEngine;
use crate::PushConfig;
use crate::Result;
use crate::SubscriptionRegistry;
use crate::SubtreeFilter;
use crate::Transport;

pub struct PushServiceBuilder {
    config: PushConfig,
    store: Option<Arc<dyn DataStore>>,
    transport: Option<Arc<dyn Transport>>,
    filter: Option<Arc<dyn SubtreeFilter>>,
    writer: Option<Arc<dyn DocumentWriter>>,
}

impl PushServiceBuilder {
    pub fn new(config: PushConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            filter: None,
            writer: None,
        }
    }

    pub fn store(
        mut self,
        store: Arc<dyn DataStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn filter(
        mut self,
        filter: Arc<dyn SubtreeFilter>,
    ) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn writer(
        mut self,
        writer: Arc<dyn DocumentWriter>,
    ) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Validates the configuration, wires the components and initialises
    /// the subscription mirror.
    ///
    /// # Errors
    /// [`Error::Config`] for an invalid configuration or a missing transport.
    pub async fn build(self) -> Result<PushService> {
        let config = self.config.validate()?;
        let transport = self.transport.ok_or_else(|| {
            Error::Config(ConfigError::Message("a transport must be configured".into()))
        })?;
        let store = self.store.unwrap_or_else(|| {
            debug!("no data store supplied, using in-memory store");
            Arc::new(MemDataStore::new()) as Arc<dyn DataStore>
        });
        let writer = self
            .writer
            .unwrap_or_else(|| Arc::new(JsonDocumentWriter) as Arc<dyn DocumentWriter>);

        let registry = Arc::new(SubscriptionRegistry::new(config.registry.clone(), Some(store.clone())));
        registry.init_mirror().await;

        let engine = NotificationEngine::new(
            registry.clone(),
            store,
            transport,
            NotificationComposer::new(writer, self.filter),
            config.engine.clone(),
        );

        info!(?config, "push service ready");
        Ok(PushService::new(config, registry, engine))
    }
}
