//! ChartInk Webhook Library
//!
//! Normalizes ChartInk screener webhooks into typed alerts with trigger
//! price statistics, stores them, and serves the webhook and read API.

pub mod alerts;
pub mod api;
pub mod config;
pub mod context;
pub mod processor;
pub mod store;

// Re-export main types for easy access
pub use alerts::{
    normalize, AlertError, AlertResult, InboundAlert, NormalizedAlert, PriceMetrics,
    StockEncoding, StoredAlert,
};
pub use api::WebhookApiServer;
pub use config::{ConfigError, StoreBackend, WebhookConfig};
pub use context::AppContext;
pub use processor::{AlertSummary, ProcessOutcome, WebhookProcessor};
pub use store::{
    AlertReader, AlertStore, InMemoryAlertStore, StoreError, SupabaseAlertStore, SupabaseConfig,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let context = AppContext::in_memory(WebhookConfig::default());
        let payload = match json!({
            "scan_name": "Breakouts",
            "scan_url": "breakouts",
            "alert_name": "Alert for Breakouts",
            "stocks": "NAUKRI, MANAPPURAM",
            "trigger_prices": "1378.4, 265.7"
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        let summary = context.processor.process(&payload).await.unwrap();
        assert_eq!(summary.avg_price, Some(822.05));

        let stored = context.reader.recent(1).await.unwrap().remove(0);
        assert_eq!(stored.id, summary.id);
        assert_eq!(
            alerts::compute_metrics(&stored.alert.trigger_prices),
            stored.alert.metrics()
        );
    }
}
