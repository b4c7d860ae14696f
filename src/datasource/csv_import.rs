//! Parsing of fill and daily price exports in CSV form.
//!
//! Fill columns: `wallet,tx_hash,log_index,token_address,token_symbol,
//! token_decimals,direction,amount,price_usd,block_number,timestamp_ms,
//! gas_cost_usd,counterparty`. `price_usd`, `gas_cost_usd` and
//! `counterparty` may be empty.
//!
//! Price columns: `token_address,date,price_usd` with `YYYY-MM-DD` dates.

use super::DataSourceError;
use crate::domain::{Address, Decimal, Direction, Fill, FillKey, TimeMs, TokenInfo};
use chrono::NaiveDate;
use std::path::Path;

/// One row of a daily price export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub token: Address,
    pub date: NaiveDate,
    pub price_usd: Decimal,
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes)
}

fn parse_decimal(field: &str, raw: &str, line: usize) -> Result<Decimal, DataSourceError> {
    Decimal::from_str_canonical(raw)
        .map_err(|e| DataSourceError::Csv(format!("line {}: invalid {}: {}", line, field, e)))
}

fn optional_decimal(
    field: &str,
    raw: Option<String>,
    line: usize,
) -> Result<Option<Decimal>, DataSourceError> {
    match raw.filter(|s| !s.is_empty()) {
        Some(raw) => parse_decimal(field, &raw, line).map(Some),
        None => Ok(None),
    }
}

pub fn parse_fills_csv(bytes: &[u8]) -> Result<Vec<Fill>, DataSourceError> {
    #[derive(Debug, serde::Deserialize)]
    struct Row {
        wallet: String,
        tx_hash: String,
        log_index: i64,
        token_address: String,
        token_symbol: String,
        token_decimals: u8,
        direction: String,
        amount: String,
        price_usd: Option<String>,
        block_number: i64,
        timestamp_ms: i64,
        gas_cost_usd: Option<String>,
        counterparty: Option<String>,
    }

    let mut fills = Vec::new();
    for (i, record) in reader(bytes).deserialize::<Row>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = record.map_err(|e| DataSourceError::Csv(e.to_string()))?;

        let direction = row
            .direction
            .parse::<Direction>()
            .map_err(|e| DataSourceError::Csv(format!("line {}: {}", line, e)))?;
        let amount = parse_decimal("amount", &row.amount, line)?;
        let price_usd = optional_decimal("price_usd", row.price_usd, line)?;
        let gas_cost_usd =
            optional_decimal("gas_cost_usd", row.gas_cost_usd, line)?.unwrap_or_default();
        if let Some(px) = price_usd {
            if px.checked_mul(amount).is_none() {
                return Err(DataSourceError::Csv(format!(
                    "line {}: amount {} x price_usd {} overflows",
                    line, amount, px
                )));
            }
        }

        fills.push(Fill::new(
            FillKey::new(row.tx_hash, row.log_index),
            Address::new(row.wallet),
            TokenInfo::new(
                Address::new(row.token_address),
                row.token_symbol,
                row.token_decimals,
            ),
            direction,
            amount,
            price_usd,
            row.block_number,
            TimeMs::new(row.timestamp_ms),
            gas_cost_usd,
            row.counterparty.filter(|s| !s.is_empty()).map(Address::new),
        ));
    }

    Ok(fills)
}

pub fn parse_prices_csv(bytes: &[u8]) -> Result<Vec<PriceRow>, DataSourceError> {
    #[derive(Debug, serde::Deserialize)]
    struct Row {
        token_address: String,
        date: String,
        price_usd: String,
    }

    let mut prices = Vec::new();
    for (i, record) in reader(bytes).deserialize::<Row>().enumerate() {
        let line = i + 2;
        let row = record.map_err(|e| DataSourceError::Csv(e.to_string()))?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|e| DataSourceError::Csv(format!("line {}: invalid date: {}", line, e)))?;

        prices.push(PriceRow {
            token: Address::new(row.token_address),
            date,
            price_usd: parse_decimal("price_usd", &row.price_usd, line)?,
        });
    }

    Ok(prices)
}

pub fn read_fills_csv(path: &Path) -> Result<Vec<Fill>, DataSourceError> {
    let bytes = std::fs::read(path).map_err(|e| {
        DataSourceError::Unavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_fills_csv(&bytes)
}

pub fn read_prices_csv(path: &Path) -> Result<Vec<PriceRow>, DataSourceError> {
    let bytes = std::fs::read(path).map_err(|e| {
        DataSourceError::Unavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_prices_csv(&bytes)
}
