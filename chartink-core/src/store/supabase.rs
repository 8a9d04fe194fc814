//! Supabase (PostgREST) backed alert store

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, error};
use url::Url;

use super::{AlertReader, AlertStore, StoreError, StoreResult};
use crate::alerts::{NormalizedAlert, StoredAlert};

pub const DEFAULT_TABLE: &str = "chartink_alerts";

/// Connection settings for a Supabase project
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub table: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_role_key: service_role_key.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

// Keeps the service key out of logs
impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

pub struct SupabaseAlertStore {
    client: Client,
    table_url: Url,
    service_role_key: String,
}

impl SupabaseAlertStore {
    pub fn new(config: SupabaseConfig) -> StoreResult<Self> {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: SupabaseConfig, client: Client) -> StoreResult<Self> {
        let table_url = table_url(&config.url, &config.table)?;
        Ok(Self {
            client,
            table_url,
            service_role_key: config.service_role_key,
        })
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    fn select_url(&self, columns: &str, limit: usize, newest_first: bool) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", columns);
            if newest_first {
                query.append_pair("order", "created_at.desc");
            }
            query.append_pair("limit", &limit.to_string());
        }
        url
    }
}

/// `{base}/rest/v1/{table}`, tolerating a trailing slash on the base
fn table_url(base: &str, table: &str) -> StoreResult<Url> {
    if table.is_empty() {
        return Err(StoreError::Config("table name is empty".to_string()));
    }
    let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;
    Ok(base.join("rest/v1/")?.join(table)?)
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// First row of a `return=representation` insert response
fn first_row(rows: Vec<StoredAlert>) -> StoreResult<StoredAlert> {
    rows.into_iter().next().ok_or(StoreError::EmptyResponse)
}

#[async_trait]
impl AlertStore for SupabaseAlertStore {
    async fn insert(&self, alert: &NormalizedAlert) -> StoreResult<StoredAlert> {
        debug!("Inserting alert {} into {}", alert.scan_name, self.table_url);

        let response = self
            .authorized(self.client.post(self.table_url.clone()))
            .header("Prefer", "return=representation")
            .json(alert)
            .send()
            .await?;

        let rows: Vec<StoredAlert> = check_status(response)
            .await
            .map_err(|e| {
                error!("Failed to insert alert: {}", e);
                e
            })?
            .json()
            .await?;

        first_row(rows)
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[async_trait]
impl AlertReader for SupabaseAlertStore {
    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredAlert>> {
        let response = self
            .authorized(self.client.get(self.select_url("*", limit, true)))
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        let response = self
            .authorized(self.client.get(self.select_url("id", 1, false)))
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }
}
