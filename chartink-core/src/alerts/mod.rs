//! ChartInk alert model and payload normalization

pub mod errors;
pub mod normalizer;
pub mod types;

pub use errors::{AlertError, AlertResult};
pub use normalizer::{
    assemble, compute_metrics, normalize, parse, parse_combined, parse_split, validate,
    Normalization, REQUIRED_FIELDS,
};
pub use types::{
    InboundAlert, NormalizedAlert, ParsedStocks, PriceMetrics, SkipReason, SkippedEntry,
    StockEncoding, StoredAlert, TriggeredStock, PROCESSING_STATUS_NEW, SOURCE_PLATFORM,
};
