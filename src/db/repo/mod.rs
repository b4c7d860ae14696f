//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `fills.rs` - Raw token fill operations
//! - `lots.rs` - Open and closed lot operations
//! - `analytics.rs` - Equity curve, metrics, and composite score operations
//! - `prices.rs` - Daily token price operations

mod analytics;
mod fills;
mod lots;
mod prices;

use crate::datasource::{DataSourceError, FillSource, PriceSource};
use crate::domain::{Address, Decimal, Fill, TimeMs};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Read a TEXT decimal column, falling back to zero on malformed data.
fn decimal_column(row: &SqliteRow, column: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_else(|e| {
        warn!(column, value = %raw, error = %e, "Failed to parse decimal, using default");
        Decimal::default()
    })
}

fn optional_decimal_column(row: &SqliteRow, column: &str) -> Option<Decimal> {
    let raw: Option<String> = row.get(column);
    raw.and_then(|raw| match Decimal::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(column, value = %raw, error = %e, "Failed to parse decimal, treating as missing");
            None
        }
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[async_trait]
impl FillSource for Repository {
    async fn fetch_fills(
        &self,
        wallet: &Address,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Fill>, DataSourceError> {
        Ok(self.query_fills(wallet, Some(from), Some(to)).await?)
    }
}

#[async_trait]
impl PriceSource for Repository {
    async fn get_price(
        &self,
        token: &Address,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DataSourceError> {
        Ok(self.get_token_price(token, date).await?)
    }

    async fn get_prices(
        &self,
        token: &Address,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, DataSourceError> {
        Ok(self.query_token_prices(token, start, end).await?)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::setup_test_db;
    use super::*;

    #[tokio::test]
    async fn test_malformed_decimal_reads_as_zero() {
        let (repo, _temp) = setup_test_db().await;
        sqlx::query("INSERT INTO token_prices (token_address, date, price_usd) VALUES (?, ?, ?)")
            .bind("0xtoken")
            .bind("2024-01-01")
            .bind("not-a-number")
            .execute(repo.pool())
            .await
            .unwrap();

        let row = sqlx::query("SELECT price_usd FROM token_prices")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(decimal_column(&row, "price_usd"), Decimal::zero());
        assert_eq!(optional_decimal_column(&row, "price_usd"), None);
    }

    #[test]
    fn test_date_round_trip_format() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(format_date(date), "2024-02-29");
        assert_eq!(parse_date("2024-02-29").unwrap(), date);
        assert!(parse_date("29/02/2024").is_err());
    }
}
