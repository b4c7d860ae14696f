//! Open and closed lot operations for the repository.

use crate::domain::{Address, FillKey, TimeMs};
use crate::engine::{ClosedTradeLot, OpenLot};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use super::{decimal_column, Repository};

impl Repository {
    /// Replace a wallet's persisted lots with the given engine output, atomically.
    ///
    /// Lots are a pure function of the wallet's fills, so the previous state is
    /// discarded rather than merged. Closed lots keep stable ids across runs.
    ///
    /// # Errors
    /// Returns an error if any database operation fails; nothing is committed then.
    pub async fn replace_wallet_lots(
        &self,
        wallet: &Address,
        open_lots: &[OpenLot],
        closed_lots: &[ClosedTradeLot],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM open_lots WHERE wallet = ?")
            .bind(wallet.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM closed_trade_lots WHERE wallet = ?")
            .bind(wallet.as_str())
            .execute(&mut *tx)
            .await?;

        for lot in open_lots {
            sqlx::query(
                r#"
                INSERT INTO open_lots (
                    wallet, entry_fill, token_address, token_symbol, entry_amount,
                    remaining_amount, entry_price_usd, entry_value_usd,
                    entry_gas_cost_usd, entry_timestamp_ms
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(lot.wallet.as_str())
            .bind(lot.entry_fill.to_string())
            .bind(lot.token.as_str())
            .bind(lot.token_symbol.as_str())
            .bind(lot.entry_amount.to_canonical_string())
            .bind(lot.remaining_amount.to_canonical_string())
            .bind(lot.entry_price_usd.to_canonical_string())
            .bind(lot.entry_value_usd.to_canonical_string())
            .bind(lot.entry_gas_cost_usd.to_canonical_string())
            .bind(lot.entry_timestamp.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        for lot in closed_lots {
            sqlx::query(
                r#"
                INSERT INTO closed_trade_lots (
                    id, wallet, token_address, token_symbol, trade_amount,
                    entry_price_usd, exit_price_usd, entry_timestamp_ms, exit_timestamp_ms,
                    hold_duration_days, entry_value_usd, exit_value_usd,
                    entry_gas_cost_usd, exit_gas_cost_usd, gross_pnl_usd, net_pnl_usd,
                    roi_percent, entry_fill, exit_fill
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    trade_amount = excluded.trade_amount,
                    exit_value_usd = excluded.exit_value_usd,
                    gross_pnl_usd = excluded.gross_pnl_usd,
                    net_pnl_usd = excluded.net_pnl_usd,
                    roi_percent = excluded.roi_percent
                "#,
            )
            .bind(lot.id.to_string())
            .bind(lot.wallet.as_str())
            .bind(lot.token.as_str())
            .bind(lot.token_symbol.as_str())
            .bind(lot.trade_amount.to_canonical_string())
            .bind(lot.entry_price_usd.to_canonical_string())
            .bind(lot.exit_price_usd.to_canonical_string())
            .bind(lot.entry_timestamp.as_ms())
            .bind(lot.exit_timestamp.as_ms())
            .bind(lot.hold_duration_days)
            .bind(lot.entry_value_usd.to_canonical_string())
            .bind(lot.exit_value_usd.to_canonical_string())
            .bind(lot.entry_gas_cost_usd.to_canonical_string())
            .bind(lot.exit_gas_cost_usd.to_canonical_string())
            .bind(lot.gross_pnl_usd.to_canonical_string())
            .bind(lot.net_pnl_usd.to_canonical_string())
            .bind(lot.roi_percent.to_canonical_string())
            .bind(lot.entry_fill.to_string())
            .bind(lot.exit_fill.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Closed lots for a wallet ordered by exit time.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_closed_lots(
        &self,
        wallet: &Address,
    ) -> Result<Vec<ClosedTradeLot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet, token_address, token_symbol, trade_amount,
                   entry_price_usd, exit_price_usd, entry_timestamp_ms, exit_timestamp_ms,
                   hold_duration_days, entry_value_usd, exit_value_usd,
                   entry_gas_cost_usd, exit_gas_cost_usd, gross_pnl_usd, net_pnl_usd,
                   roi_percent, entry_fill, exit_fill
            FROM closed_trade_lots
            WHERE wallet = ?
            ORDER BY exit_timestamp_ms ASC, exit_fill ASC, entry_timestamp_ms ASC
            "#,
        )
        .bind(wallet.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(closed_lot_from_row).collect()
    }

    /// Open lots for a wallet, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_open_lots(&self, wallet: &Address) -> Result<Vec<OpenLot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT wallet, entry_fill, token_address, token_symbol, entry_amount,
                   remaining_amount, entry_price_usd, entry_value_usd,
                   entry_gas_cost_usd, entry_timestamp_ms
            FROM open_lots
            WHERE wallet = ?
            ORDER BY token_address ASC, entry_timestamp_ms ASC, entry_fill ASC
            "#,
        )
        .bind(wallet.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OpenLot {
                    wallet: Address::new(row.get::<String, _>("wallet")),
                    token: Address::new(row.get::<String, _>("token_address")),
                    token_symbol: row.get("token_symbol"),
                    entry_amount: decimal_column(row, "entry_amount"),
                    remaining_amount: decimal_column(row, "remaining_amount"),
                    entry_price_usd: decimal_column(row, "entry_price_usd"),
                    entry_value_usd: decimal_column(row, "entry_value_usd"),
                    entry_gas_cost_usd: decimal_column(row, "entry_gas_cost_usd"),
                    entry_timestamp: TimeMs::new(row.get("entry_timestamp_ms")),
                    entry_fill: fill_key_column(row, "entry_fill")?,
                })
            })
            .collect()
    }
}

fn fill_key_column(row: &SqliteRow, column: &str) -> Result<FillKey, sqlx::Error> {
    let raw: String = row.get(column);
    FillKey::from_str(&raw).map_err(|e| sqlx::Error::Decode(e.into()))
}

fn closed_lot_from_row(row: &SqliteRow) -> Result<ClosedTradeLot, sqlx::Error> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(ClosedTradeLot {
        id,
        wallet: Address::new(row.get::<String, _>("wallet")),
        token: Address::new(row.get::<String, _>("token_address")),
        token_symbol: row.get("token_symbol"),
        trade_amount: decimal_column(row, "trade_amount"),
        entry_price_usd: decimal_column(row, "entry_price_usd"),
        exit_price_usd: decimal_column(row, "exit_price_usd"),
        entry_timestamp: TimeMs::new(row.get("entry_timestamp_ms")),
        exit_timestamp: TimeMs::new(row.get("exit_timestamp_ms")),
        hold_duration_days: row.get("hold_duration_days"),
        entry_value_usd: decimal_column(row, "entry_value_usd"),
        exit_value_usd: decimal_column(row, "exit_value_usd"),
        entry_gas_cost_usd: decimal_column(row, "entry_gas_cost_usd"),
        exit_gas_cost_usd: decimal_column(row, "exit_gas_cost_usd"),
        gross_pnl_usd: decimal_column(row, "gross_pnl_usd"),
        net_pnl_usd: decimal_column(row, "net_pnl_usd"),
        roi_percent: decimal_column(row, "roi_percent"),
        entry_fill: fill_key_column(row, "entry_fill")?,
        exit_fill: fill_key_column(row, "exit_fill")?,
    })
}
