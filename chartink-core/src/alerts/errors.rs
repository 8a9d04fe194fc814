//! Alert processing error types

use thiserror::Error;

use crate::store::StoreError;

/// Custom result type for alert processing
pub type AlertResult<T> = Result<T, AlertError>;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} field must be a string")]
    InvalidType(&'static str),

    #[error("Invalid price format: {0}")]
    PriceFormat(String),

    #[error("Mismatch: {stocks} stocks vs {prices} prices")]
    CountMismatch { stocks: usize, prices: usize },

    #[error("No valid stocks found in payload")]
    NoValidStocks,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AlertError {
    /// True when the fault lies in the inbound payload rather than downstream
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
