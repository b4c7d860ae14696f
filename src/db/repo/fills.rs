//! Token fill operations for the repository.

use crate::domain::{Address, Direction, Fill, FillKey, TimeMs, TokenInfo};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use super::{decimal_column, optional_decimal_column, Repository};

const INSERT_FILL_SQL: &str = r#"
    INSERT INTO token_fills (
        wallet, tx_hash, log_index, token_address, token_symbol, token_decimals,
        direction, amount, price_usd, value_usd, block_number, timestamp_ms,
        gas_cost_usd, counterparty, created_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(tx_hash, log_index) DO NOTHING
"#;

impl Repository {
    /// Insert a fill into the database idempotently.
    ///
    /// Returns `false` when a fill with the same `(tx_hash, log_index)` exists.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_fill(&self, fill: &Fill) -> Result<bool, sqlx::Error> {
        let result = bind_fill(sqlx::query(INSERT_FILL_SQL), fill, now_ms())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert multiple fills in a single transaction.
    ///
    /// Returns the number of newly inserted fills (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_fills_batch(&self, fills: &[Fill]) -> Result<usize, sqlx::Error> {
        if fills.is_empty() {
            return Ok(0);
        }

        let created_at = now_ms();
        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for fill in fills {
            let result = bind_fill(sqlx::query(INSERT_FILL_SQL), fill, created_at)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Query fills for a wallet with an optional time window, in the
    /// deterministic processing order.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_fills(
        &self,
        wallet: &Address,
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    ) -> Result<Vec<Fill>, sqlx::Error> {
        let from_ms = from.unwrap_or(TimeMs::new(0)).as_ms();
        let to_ms = to.unwrap_or(TimeMs::new(i64::MAX)).as_ms();

        let rows = sqlx::query(
            r#"
            SELECT wallet, tx_hash, log_index, token_address, token_symbol, token_decimals,
                   direction, amount, price_usd, block_number, timestamp_ms,
                   gas_cost_usd, counterparty
            FROM token_fills
            WHERE wallet = ? AND timestamp_ms >= ? AND timestamp_ms <= ?
            ORDER BY timestamp_ms ASC, block_number ASC, log_index ASC, tx_hash ASC
            "#,
        )
        .bind(wallet.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fill_from_row).collect()
    }

    /// Distinct tokens a wallet has ever traded.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_wallet_tokens(&self, wallet: &Address) -> Result<Vec<Address>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT token_address FROM token_fills WHERE wallet = ? ORDER BY token_address",
        )
        .bind(wallet.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Address::new(row.get::<String, _>("token_address")))
            .collect())
    }

    /// Count fills stored for a wallet.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_fills(&self, wallet: &Address) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM token_fills WHERE wallet = ?")
            .bind(wallet.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn bind_fill<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    fill: &'q Fill,
    created_at: i64,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(fill.wallet.as_str())
        .bind(fill.key.tx_hash.as_str())
        .bind(fill.key.log_index)
        .bind(fill.token.address.as_str())
        .bind(fill.token.symbol.as_str())
        .bind(i64::from(fill.token.decimals))
        .bind(fill.direction.as_str())
        .bind(fill.amount.to_canonical_string())
        .bind(fill.price_usd.map(|d| d.to_canonical_string()))
        .bind(fill.value_usd.map(|d| d.to_canonical_string()))
        .bind(fill.block_number)
        .bind(fill.timestamp.as_ms())
        .bind(fill.gas_cost_usd.to_canonical_string())
        .bind(fill.counterparty.as_ref().map(|a| a.as_str()))
        .bind(created_at)
}

fn fill_from_row(row: &SqliteRow) -> Result<Fill, sqlx::Error> {
    let direction_str: String = row.get("direction");
    let direction =
        Direction::from_str(&direction_str).map_err(|e| sqlx::Error::Decode(e.into()))?;
    let decimals: i64 = row.get("token_decimals");
    let decimals = u8::try_from(decimals).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let counterparty: Option<String> = row.get("counterparty");

    Ok(Fill::new(
        FillKey::new(row.get::<String, _>("tx_hash"), row.get("log_index")),
        Address::new(row.get::<String, _>("wallet")),
        TokenInfo::new(
            Address::new(row.get::<String, _>("token_address")),
            row.get::<String, _>("token_symbol"),
            decimals,
        ),
        direction,
        decimal_column(row, "amount"),
        optional_decimal_column(row, "price_usd"),
        row.get("block_number"),
        TimeMs::new(row.get("timestamp_ms")),
        decimal_column(row, "gas_cost_usd"),
        counterparty.map(Address::new),
    ))
}
