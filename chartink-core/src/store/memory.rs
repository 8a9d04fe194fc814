//! In-process alert store, used for local runs and tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{AlertReader, AlertStore, StoreResult};
use crate::alerts::{NormalizedAlert, StoredAlert};

/// Append-only alert log with sequential ids starting at 1
#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: RwLock<Vec<StoredAlert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn insert(&self, alert: &NormalizedAlert) -> StoreResult<StoredAlert> {
        let mut alerts = self.alerts.write();
        let stored = StoredAlert {
            id: alerts.len() as i64 + 1,
            created_at: Utc::now(),
            alert: alert.clone(),
        };
        alerts.push(stored.clone());
        Ok(stored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl AlertReader for InMemoryAlertStore {
    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredAlert>> {
        let mut recent = self.alerts.read().clone();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{assemble, InboundAlert, StockEncoding, TriggeredStock};

    fn alert(scan_name: &str) -> NormalizedAlert {
        let inbound = InboundAlert {
            scan_name: scan_name.to_string(),
            scan_url: "scan-url".to_string(),
            alert_name: "alert".to_string(),
            encoding: StockEncoding::Combined {
                stocks: "A@1".to_string(),
            },
        };
        assemble(&inbound, &[TriggeredStock::new("A", 1.0)])
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryAlertStore::new();

        let first = store.insert(&alert("first")).await.unwrap();
        let second = store.insert(&alert("second")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.alert.scan_name, "second");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_bounded() {
        let store = InMemoryAlertStore::new();
        for name in ["a", "b", "c"] {
            store.insert(&alert(name)).await.unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        let names: Vec<&str> = recent.iter().map(|r| r.alert.scan_name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);

        assert_eq!(store.recent(10).await.unwrap().len(), 3);
    }

    #[test]
    fn test_empty_store() {
        let store = InMemoryAlertStore::new();
        assert!(store.is_empty());
        assert!(tokio_test::block_on(store.recent(5)).unwrap().is_empty());
        assert!(tokio_test::block_on(store.ping()).is_ok());
    }
}
