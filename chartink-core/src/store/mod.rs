//! Alert persistence collaborators
//!
//! The processor only ever appends through [`AlertStore`]; the read side
//! ([`AlertReader`]) is used by the HTTP layer for recent alerts and health.

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAlertStore;
pub use supabase::{SupabaseAlertStore, SupabaseConfig};

use async_trait::async_trait;
use thiserror::Error;

use crate::alerts::{NormalizedAlert, StoredAlert};

/// Custom result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database request failed: {0}")]
    Request(String),

    #[error("Database returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Database insertion failed")]
    EmptyResponse,

    #[error("Invalid database response: {0}")]
    Decode(String),

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for StoreError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Insert-only sink for normalized alerts
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist one alert, returning it with its assigned id and timestamp
    async fn insert(&self, alert: &NormalizedAlert) -> StoreResult<StoredAlert>;
    fn name(&self) -> &str;
}

/// Read side over the persisted alerts
#[async_trait]
pub trait AlertReader: Send + Sync {
    /// Up to `limit` alerts, newest first
    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredAlert>>;

    /// Cheap round trip used by health checks
    async fn ping(&self) -> StoreResult<()>;
}
