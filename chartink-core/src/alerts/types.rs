//! Alert data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Status written on every freshly ingested alert
pub const PROCESSING_STATUS_NEW: &str = "new";

/// Upstream system the alerts originate from
pub const SOURCE_PLATFORM: &str = "ChartInk";

/// Validated inbound webhook, with the stock encoding detected
#[derive(Clone, Debug, PartialEq)]
pub struct InboundAlert {
    pub scan_name: String,
    pub scan_url: String,
    pub alert_name: String,
    pub encoding: StockEncoding,
}

/// The two wire formats ChartInk uses for the stock list
#[derive(Clone, Debug, PartialEq)]
pub enum StockEncoding {
    /// `stocks: "A,B"` alongside `trigger_prices: "1.0,2.0"`
    Split {
        stocks: String,
        trigger_prices: String,
    },
    /// `stocks: "A@1.0,B@2.0"`
    Combined { stocks: String },
}

impl StockEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Split { .. } => "split",
            Self::Combined { .. } => "combined",
        }
    }
}

/// A symbol with the price at which the screener fired
#[derive(Clone, Debug, PartialEq)]
pub struct TriggeredStock {
    pub symbol: String,
    pub trigger_price: f64,
}

impl TriggeredStock {
    pub fn new(symbol: impl Into<String>, trigger_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            trigger_price,
        }
    }
}

/// Why a combined-encoding entry was dropped
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    MissingSeparator,
    InvalidPrice(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "Invalid stock format"),
            Self::InvalidPrice(price) => write!(f, "Invalid price format: {}", price),
        }
    }
}

/// Diagnostic for an entry skipped by the lenient combined parse
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedEntry {
    pub entry: String,
    pub reason: SkipReason,
}

/// Outcome of parsing the stock list
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedStocks {
    Split(Vec<TriggeredStock>),
    Combined {
        stocks: Vec<TriggeredStock>,
        skipped: Vec<SkippedEntry>,
    },
}

impl ParsedStocks {
    pub fn stocks(&self) -> &[TriggeredStock] {
        match self {
            Self::Split(stocks) => stocks,
            Self::Combined { stocks, .. } => stocks,
        }
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        match self {
            Self::Split(_) => &[],
            Self::Combined { skipped, .. } => skipped,
        }
    }
}

/// Trigger price statistics; all absent when there are no prices
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceMetrics {
    pub avg_trigger_price: Option<f64>,
    pub min_trigger_price: Option<f64>,
    pub max_trigger_price: Option<f64>,
}

/// Validated, statistics-annotated alert ready for persistence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAlert {
    pub scan_name: String,
    pub scan_url: String,
    pub alert_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stocks: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trigger_prices: Vec<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_stocks: usize,
    pub avg_trigger_price: Option<f64>,
    pub min_trigger_price: Option<f64>,
    pub max_trigger_price: Option<f64>,
    // Older rows were written without these columns
    #[serde(default, deserialize_with = "null_as_default")]
    pub processing_status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_platform: String,
}

impl NormalizedAlert {
    pub fn metrics(&self) -> PriceMetrics {
        PriceMetrics {
            avg_trigger_price: self.avg_trigger_price,
            min_trigger_price: self.min_trigger_price,
            max_trigger_price: self.max_trigger_price,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Alert as persisted, with store-assigned identity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredAlert {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub alert: NormalizedAlert,
}
