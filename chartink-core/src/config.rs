//! Server configuration, read from the environment

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

use crate::store::supabase::SupabaseConfig;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Where accepted alerts are written
#[derive(Clone, Debug)]
pub enum StoreBackend {
    Supabase(SupabaseConfig),
    Memory,
}

/// Webhook server configuration
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub bind_host: IpAddr,
    pub port: u16,
    pub store: StoreBackend,
    pub recent_limit_default: usize,
    pub recent_limit_max: usize,
    pub max_body_bytes: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8082,
            store: StoreBackend::Memory,
            recent_limit_default: 10,
            recent_limit_max: 100,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl WebhookConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store = match lookup("ALERT_STORE").as_deref().unwrap_or("supabase") {
            "memory" => StoreBackend::Memory,
            "supabase" => {
                let url = required(&lookup, "SUPABASE_URL")?;
                let key = required(&lookup, "SUPABASE_SERVICE_ROLE_KEY")?;
                let mut supabase = SupabaseConfig::new(url, key);
                if let Ok(table) = required(&lookup, "SUPABASE_TABLE") {
                    supabase.table = table;
                }
                StoreBackend::Supabase(supabase)
            }
            other => {
                return Err(ConfigError::Invalid {
                    var: "ALERT_STORE",
                    value: other.to_string(),
                })
            }
        };

        let config = Self {
            bind_host: parsed(&lookup, "BIND_HOST", defaults.bind_host)?,
            port: parsed(&lookup, "PORT", defaults.port)?,
            store,
            recent_limit_default: parsed(
                &lookup,
                "RECENT_ALERTS_DEFAULT",
                defaults.recent_limit_default,
            )?,
            recent_limit_max: parsed(&lookup, "RECENT_ALERTS_MAX", defaults.recent_limit_max)?,
            max_body_bytes: parsed(&lookup, "MAX_BODY_BYTES", defaults.max_body_bytes)?,
        };

        if config.recent_limit_max == 0 {
            return Err(ConfigError::Invalid {
                var: "RECENT_ALERTS_MAX",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }

    /// Requested page size for recent alerts, defaulted and capped
    pub fn recent_limit(&self, requested: Option<&str>) -> usize {
        requested
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(self.recent_limit_default)
            .clamp(1, self.recent_limit_max)
    }
}

/// Unset and blank values both count as missing
fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parsed<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
