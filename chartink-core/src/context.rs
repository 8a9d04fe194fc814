//! Shared handles for the HTTP layer

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreBackend, WebhookConfig};
use crate::processor::WebhookProcessor;
use crate::store::{AlertReader, AlertStore, InMemoryAlertStore, SupabaseAlertStore};

/// Everything a request handler needs, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub processor: WebhookProcessor,
    pub reader: Arc<dyn AlertReader>,
    pub config: Arc<WebhookConfig>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn AlertStore>,
        reader: Arc<dyn AlertReader>,
        config: WebhookConfig,
    ) -> Self {
        Self {
            processor: WebhookProcessor::new(store),
            reader,
            config: Arc::new(config),
        }
    }

    /// Context backed by a fresh in-memory store
    pub fn in_memory(config: WebhookConfig) -> Self {
        let store = Arc::new(InMemoryAlertStore::new());
        Self::new(store.clone(), store, config)
    }

    /// Connect the store backend named in the configuration
    pub fn from_config(config: WebhookConfig) -> Result<Self> {
        match &config.store {
            StoreBackend::Supabase(supabase) => {
                info!("Using Supabase store at {} (table {})", supabase.url, supabase.table);
                let store = Arc::new(
                    SupabaseAlertStore::new(supabase.clone())
                        .context("failed to configure Supabase store")?,
                );
                Ok(Self::new(store.clone(), store, config))
            }
            StoreBackend::Memory => {
                info!("Using in-memory alert store; alerts will not survive a restart");
                Ok(Self::in_memory(config))
            }
        }
    }
}
