//! Webhook processing pipeline: normalize, then persist

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::alerts::{normalize, AlertError, AlertResult};
use crate::store::AlertStore;

/// What the caller learns about a stored alert
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertSummary {
    pub id: i64,
    pub total_stocks: usize,
    pub avg_price: Option<f64>,
}

/// Result of processing one webhook, in its wire shape
#[derive(Debug)]
pub enum ProcessOutcome {
    Stored(AlertSummary),
    Failed(AlertError),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Stored(summary) => json!({
                "success": true,
                "message": "Alert stored successfully",
                "data": summary,
            }),
            Self::Failed(err) => json!({
                "success": false,
                "error": err.to_string(),
            }),
        }
    }
}

impl From<AlertResult<AlertSummary>> for ProcessOutcome {
    fn from(result: AlertResult<AlertSummary>) -> Self {
        match result {
            Ok(summary) => Self::Stored(summary),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Runs inbound payloads through the normalizer and into the store
#[derive(Clone)]
pub struct WebhookProcessor {
    store: Arc<dyn AlertStore>,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self { store }
    }

    pub async fn process(&self, payload: &Map<String, Value>) -> AlertResult<AlertSummary> {
        let normalization = normalize(payload).map_err(|e| {
            warn!("Rejected webhook payload: {}", e);
            e
        })?;

        if !normalization.skipped.is_empty() {
            warn!(
                "Skipped {} malformed stock entries for scan {}",
                normalization.skipped.len(),
                normalization.alert.scan_name
            );
        }

        let stored = self.store.insert(&normalization.alert).await.map_err(|e| {
            error!("Failed to store alert via {}: {}", self.store.name(), e);
            AlertError::from(e)
        })?;

        info!(
            "Successfully stored alert: {} with {} stocks",
            stored.alert.scan_name, stored.alert.total_stocks
        );

        Ok(AlertSummary {
            id: stored.id,
            total_stocks: stored.alert.total_stocks,
            avg_price: stored.alert.avg_trigger_price,
        })
    }
}

/// Payload used by the built-in test endpoint
pub fn sample_payload() -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("scan_name".to_string(), json!("Short term breakouts"));
    payload.insert("scan_url".to_string(), json!("short-term-breakouts"));
    payload.insert("alert_name".to_string(), json!("Alert for Short term breakouts"));
    payload.insert(
        "stocks".to_string(),
        json!("SEPOWER@3.75,ASTEC@541.8,EDUCOMP@2.1,KSERASERA@0.2"),
    );
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{NormalizedAlert, StoredAlert};
    use crate::store::{AlertReader, InMemoryAlertStore, StoreError, StoreResult};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl AlertStore for FailingStore {
        async fn insert(&self, _alert: &NormalizedAlert) -> StoreResult<StoredAlert> {
            Err(StoreError::EmptyResponse)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_process_sample_payload() {
        let store = Arc::new(InMemoryAlertStore::new());
        let processor = WebhookProcessor::new(store.clone());

        let summary = processor.process(&sample_payload()).await.unwrap();
        assert_eq!(
            summary,
            AlertSummary {
                id: 1,
                total_stocks: 4,
                avg_price: Some(136.96),
            }
        );

        let stored = store.recent(1).await.unwrap();
        assert_eq!(stored[0].alert.stocks, vec!["SEPOWER", "ASTEC", "EDUCOMP", "KSERASERA"]);
    }

    #[tokio::test]
    async fn test_invalid_payload_never_reaches_store() {
        let store = Arc::new(InMemoryAlertStore::new());
        let processor = WebhookProcessor::new(store.clone());

        let mut payload = sample_payload();
        payload.insert("stocks".to_string(), json!("BADENTRY"));

        let result = processor.process(&payload).await;
        assert!(matches!(result, Err(AlertError::NoValidStocks)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let processor = WebhookProcessor::new(Arc::new(FailingStore));

        let outcome = ProcessOutcome::from(processor.process(&sample_payload()).await);
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.to_json(),
            json!({ "success": false, "error": "Database insertion failed" })
        );
    }

    #[test]
    fn test_success_shape() {
        let outcome = ProcessOutcome::Stored(AlertSummary {
            id: 7,
            total_stocks: 2,
            avg_price: Some(822.05),
        });
        assert_eq!(
            outcome.to_json(),
            json!({
                "success": true,
                "message": "Alert stored successfully",
                "data": { "id": 7, "total_stocks": 2, "avg_price": 822.05 }
            })
        );
    }
}
