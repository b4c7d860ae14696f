//! Data source abstraction for fetching fills and token prices.

use crate::domain::{Address, Decimal, Fill, TimeMs};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

pub mod cached;
pub mod csv_import;
pub mod mock;

pub use cached::CachedPriceSource;
pub use csv_import::PriceRow;
pub use mock::MockDataSource;

/// Source of a wallet's swap fills.
#[async_trait]
pub trait FillSource: Send + Sync + fmt::Debug {
    /// Fetch fills for a wallet within a time range.
    ///
    /// # Arguments
    /// * `wallet` - Wallet address
    /// * `from` - Start time (inclusive)
    /// * `to` - End time (inclusive)
    ///
    /// Ordering of the result is unspecified; callers sort before processing.
    async fn fetch_fills(
        &self,
        wallet: &Address,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Fill>, DataSourceError>;
}

/// Source of daily USD token prices.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// USD price of `token` on `date`, or `None` when unknown.
    async fn get_price(
        &self,
        token: &Address,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DataSourceError>;

    /// Known prices of `token` for every day in `[start, end]`; days without
    /// a price are omitted.
    async fn get_prices(
        &self,
        token: &Address,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, DataSourceError> {
        let mut prices = Vec::new();
        let mut date = start;
        while date <= end {
            if let Some(price) = self.get_price(token, date).await? {
                prices.push((date, price));
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(prices)
    }
}

/// Error type for data source operations.
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// Backing store failure.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    /// The source could not be reached or refused the request.
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
    #[error("CSV parse error: {0}")]
    Csv(String),
    /// Malformed stored data or any other failure.
    #[error("Error: {0}")]
    Other(String),
}
